use std::collections::HashMap;
use chrono::Utc;
use log::error;
use crate::booking::normalize_email;
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::storage::{BookingRecord, ClassId, ClassSlots, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    /// Missing values fall back to the defaults, `limit` is capped at `max_limit`.
    pub fn resolve(skip: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> ApiResult<Self> {
        let skip = skip.unwrap_or(0);
        if skip < 0 {
            return Err(ApiError::Validation(format!("skip must not be negative, got: {skip}")));
        }
        let limit = limit.unwrap_or(default_limit);
        if limit < 1 {
            return Err(ApiError::Validation(format!("limit must be at least 1, got: {limit}")));
        }
        Ok(Self { skip, limit: limit.min(max_limit) })
    }
}

/// Read-only access to classes and bookings.
#[derive(Clone, Debug)]
pub struct QueryService {
    storage: Storage,
    default_limit: i64,
    max_limit: i64,
}

impl QueryService {
    pub fn new(storage: Storage, cfg: &AppConfig) -> Self {
        Self {
            storage,
            default_limit: cfg.default_page_limit,
            max_limit: cfg.max_page_limit,
        }
    }

    pub async fn list_upcoming_classes(&self, skip: Option<i64>, limit: Option<i64>) -> ApiResult<Vec<ClassSlots>> {
        let page = Page::resolve(skip, limit, self.default_limit, self.max_limit)?;
        let classes = self.storage.list_classes(Utc::now(), page.skip, page.limit).await?;
        Ok(classes)
    }

    pub async fn get_class(&self, class_id: ClassId) -> ApiResult<ClassSlots> {
        self.storage.class_with_slots(class_id).await?
            .ok_or_else(|| ApiError::NotFound(format!("Class with ID {class_id} not found")))
    }

    /// Bookings of `email`, newest first, each with the class it belongs to.
    pub async fn list_bookings(&self, email: Option<&str>) -> ApiResult<Vec<(BookingRecord, ClassSlots)>> {
        let Some(email) = email else {
            return Err(ApiError::Validation("Email parameter is required".to_string()));
        };
        let email = normalize_email(email)?;
        let bookings = self.storage.list_bookings(&email).await?;
        let mut classes: HashMap<ClassId, ClassSlots> = HashMap::new();
        let mut ret = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let class = match classes.get(&booking.class_id) {
                Some(class) => class.clone(),
                None => {
                    let Some(class) = self.storage.class_with_slots(booking.class_id).await? else {
                        let reason = format!("Booking id: {} refers to missing class id: {}", booking.id, booking.class_id);
                        error!("{reason}");
                        return Err(ApiError::Internal(reason));
                    };
                    classes.insert(booking.class_id, class.clone());
                    class
                }
            };
            ret.push((booking, class));
        }
        Ok(ret)
    }
}
