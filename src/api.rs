use chrono::Utc;
use rocket::form::{self, error::ErrorKind};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket, State};
use serde::Serialize;
use serde_json::{json, Value};
use crate::booking::{BookingRequest, BookingService, ConfirmedBooking};
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::query::QueryService;
use crate::storage::{BookingId, BookingRecord, ClassId, ClassSlots};
use crate::studiotime::{DisplayOffset, StudioTime};

pub const API_PREFIX: &str = "/api/v1";

#[derive(Serialize, Debug)]
pub struct ClassView {
    pub id: ClassId,
    pub name: String,
    pub instructor: String,
    pub start_time: StudioTime,
    pub total_slots: i64,
    pub available_slots: i64,
}

impl ClassView {
    fn new(class: &ClassSlots, offset: &DisplayOffset) -> Self {
        let availability = class.availability();
        Self {
            id: class.class.id,
            name: class.class.name.clone(),
            instructor: class.class.instructor.clone(),
            start_time: offset.render(class.class.start_time),
            total_slots: availability.total_slots,
            available_slots: availability.available_slots,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct BookingView {
    pub id: BookingId,
    pub class_id: ClassId,
    pub client_name: String,
    pub client_email: String,
    pub booked_at: StudioTime,
    pub fitness_class: ClassView,
}

impl BookingView {
    fn new(booking: BookingRecord, class: ClassView, offset: &DisplayOffset) -> Self {
        Self {
            id: booking.id,
            class_id: booking.class_id,
            client_name: booking.client_name,
            client_email: booking.client_email,
            booked_at: offset.render(booking.booked_at),
            fitness_class: class,
        }
    }
    fn from_confirmed(confirmed: ConfirmedBooking, offset: &DisplayOffset) -> Self {
        let class = ClassView {
            id: confirmed.class.id,
            name: confirmed.class.name,
            instructor: confirmed.class.instructor,
            start_time: offset.render(confirmed.class.start_time),
            total_slots: confirmed.availability.total_slots,
            available_slots: confirmed.availability.available_slots,
        };
        Self::new(confirmed.booking, class, offset)
    }
}

#[derive(Serialize, Debug)]
pub struct ClassList {
    pub total: usize,
    pub classes: Vec<ClassView>,
}

#[derive(Serialize, Debug)]
pub struct BookingList {
    pub total: usize,
    pub bookings: Vec<BookingView>,
}

#[get("/")]
fn index(cfg: &State<AppConfig>) -> Value {
    json!({
        "message": format!("Welcome to {}", cfg.app_name),
        "health_check": format!("{API_PREFIX}/health"),
        "classes": format!("{API_PREFIX}/classes"),
        "version": env!("CARGO_PKG_VERSION"),
    })
}

#[get("/health")]
fn health() -> Value {
    json!({
        "message": "API is healthy",
        "details": {
            "status": "online",
            "timestamp": Utc::now().to_rfc3339(),
        }
    })
}

/// A missing parameter is `None`, one that does not parse is a validation error.
fn optional_number(name: &str, value: form::Result<'_, i64>) -> ApiResult<Option<i64>> {
    match value {
        Ok(n) => Ok(Some(n)),
        Err(errors) if errors.iter().all(|e| matches!(e.kind, ErrorKind::Missing)) => Ok(None),
        Err(errors) => Err(ApiError::Validation(format!("Invalid {name} parameter: {errors}"))),
    }
}

#[get("/classes?<skip>&<limit>")]
async fn get_classes(skip: form::Result<'_, i64>, limit: form::Result<'_, i64>, queries: &State<QueryService>, offset: &State<DisplayOffset>) -> ApiResult<Json<ClassList>> {
    let skip = optional_number("skip", skip)?;
    let limit = optional_number("limit", limit)?;
    let classes = queries.list_upcoming_classes(skip, limit).await?
        .iter()
        .map(|c| ClassView::new(c, offset))
        .collect::<Vec<_>>();
    Ok(Json(ClassList { total: classes.len(), classes }))
}

#[get("/classes/<class_id>")]
async fn get_class(class_id: ClassId, queries: &State<QueryService>, offset: &State<DisplayOffset>) -> ApiResult<Json<ClassView>> {
    let class = queries.get_class(class_id).await?;
    Ok(Json(ClassView::new(&class, offset)))
}

#[post("/book", data = "<request>")]
async fn post_book(request: Json<BookingRequest>, bookings: &State<BookingService>, offset: &State<DisplayOffset>) -> ApiResult<Custom<Json<BookingView>>> {
    let confirmed = bookings.book(&request).await?;
    Ok(Custom(Status::Created, Json(BookingView::from_confirmed(confirmed, offset))))
}

#[get("/bookings?<email>")]
async fn get_bookings(email: Option<&str>, queries: &State<QueryService>, offset: &State<DisplayOffset>) -> ApiResult<Json<BookingList>> {
    let bookings = queries.list_bookings(email).await?
        .into_iter()
        .map(|(booking, class)| {
            let class = ClassView::new(&class, offset);
            BookingView::new(booking, class, offset)
        })
        .collect::<Vec<_>>();
    Ok(Json(BookingList { total: bookings.len(), bookings }))
}

#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> Custom<Json<ErrorBody>> {
    let detail = match status.code {
        404 => format!("Resource {} not found", req.uri().path()),
        422 => "The request has missing or invalid fields".to_string(),
        500..=599 => "An unexpected error occurred. Please try again later.".to_string(),
        _ => status.reason_lossy().to_string(),
    };
    Custom(status, Json(ErrorBody::new(status, detail)))
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", routes![index])
        .mount(API_PREFIX, routes![
            health,
            get_classes,
            get_class,
            post_book,
            get_bookings,
        ])
        .register("/", catchers![default_catcher])
}
