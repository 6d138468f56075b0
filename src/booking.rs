use std::sync::LazyLock;
use chrono::Utc;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::availability::{self, Availability};
use crate::error::{ApiError, ApiResult};
use crate::storage::{BookingInsert, BookingRecord, ClassId, ClassRecord, NewBooking, Storage};
use crate::studiotime::now_millis;

const MAX_CLIENT_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+$")
        .expect("valid email regex")
});

/// Trims and lowercases `raw` and checks it looks like an email address.
///
/// Emails are compared case-insensitively everywhere: bookings store the
/// normalized form and lookups normalize before querying.
pub fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::Validation("Email address is required".to_string()));
    }
    if email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(&email) {
        return Err(ApiError::Validation(format!("Invalid email address: {}", raw.trim())));
    }
    Ok(email)
}

fn normalize_client_name(raw: &str) -> ApiResult<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_CLIENT_NAME_LEN {
        return Err(ApiError::Validation(format!("Client name must be 1 to {MAX_CLIENT_NAME_LEN} characters long")));
    }
    Ok(name.to_string())
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BookingRequest {
    pub class_id: ClassId,
    pub client_name: String,
    pub client_email: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmedBooking {
    pub booking: BookingRecord,
    pub class: ClassRecord,
    pub availability: Availability,
}

/// Validates booking requests and commits them.
#[derive(Clone, Debug)]
pub struct BookingService {
    storage: Storage,
}

impl BookingService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Books one slot of a class. The checks run in this order and the first
    /// failing one decides the error:
    /// class exists, class has not started, input is valid,
    /// no booking for the same email yet, a slot is free.
    pub async fn book(&self, request: &BookingRequest) -> ApiResult<ConfirmedBooking> {
        let class_id = request.class_id;
        let class = self.storage.get_class(class_id).await?
            .ok_or_else(|| ApiError::NotFound(format!("Class with ID {class_id} not found")))?;

        if class.start_time <= Utc::now() {
            return Err(class_started(&class));
        }

        let client_email = normalize_email(&request.client_email)?;
        let client_name = normalize_client_name(&request.client_name)?;

        if self.storage.find_booking(class_id, &client_email).await?.is_some() {
            return Err(already_booked(&class));
        }
        if availability::for_class(&self.storage, class_id).await?.is_full() {
            return Err(fully_booked(&class));
        }

        let new_booking = NewBooking {
            class_id,
            client_name: &client_name,
            client_email: &client_email,
            booked_at: now_millis(),
        };
        // a concurrent request may have taken the last slot, or the class may
        // have started, since the checks above
        let booking = match self.storage.insert_booking(&new_booking).await? {
            BookingInsert::Inserted(booking) => booking,
            BookingInsert::Duplicate => return Err(already_booked(&class)),
            BookingInsert::ClassFull => return Err(fully_booked(&class)),
            BookingInsert::ClassStarted => return Err(class_started(&class)),
        };
        let availability = availability::for_class(&self.storage, class_id).await?;
        info!("Booking created, id: {}, class: {} ({}), slots left: {}",
            booking.id, class.name, class_id, availability.available_slots);
        Ok(ConfirmedBooking { booking, class, availability })
    }
}

fn class_started(class: &ClassRecord) -> ApiError {
    debug!("Rejected booking of past class id: {}", class.id);
    ApiError::InvalidRequest("Cannot book a class that has already started or ended".to_string())
}

fn already_booked(class: &ClassRecord) -> ApiError {
    info!("Duplicate booking rejected, class id: {}", class.id);
    ApiError::Conflict(format!("You have already booked this class: {}", class.name))
}

fn fully_booked(class: &ClassRecord) -> ApiError {
    info!("Booking rejected, class id: {} is full", class.id);
    ApiError::Conflict(format!("Class is fully booked: {}", class.name))
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use crate::storage::test::{add_class, temp_storage};
    use super::*;

    fn request(class_id: ClassId, email: &str) -> BookingRequest {
        BookingRequest {
            class_id,
            client_name: "John Doe".to_string(),
            client_email: email.to_string(),
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("a@x.com").unwrap(), "a@x.com");
        assert_eq!(normalize_email("  John.Doe@Example.COM ").unwrap(), "john.doe@example.com");
        assert_eq!(normalize_email("first+tag@mail.studio.in").unwrap(), "first+tag@mail.studio.in");
        for invalid in ["", "   ", "invalid-email", "a@x", "@x.com", "a@.com", "a b@x.com", "a@x..com", ".a@x.com", "a@-x.com"] {
            let err = normalize_email(invalid).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{invalid} must be rejected");
        }
    }

    #[test]
    fn test_normalize_client_name() {
        assert_eq!(normalize_client_name("  Jane Doe ").unwrap(), "Jane Doe");
        assert!(normalize_client_name("   ").is_err());
        assert!(normalize_client_name(&"x".repeat(101)).is_err());
        assert!(normalize_client_name(&"x".repeat(100)).is_ok());
    }

    #[rocket::async_test]
    async fn test_book_last_slot_then_full() {
        let (storage, _dir) = temp_storage().await;
        let service = BookingService::new(storage.clone());
        let class = add_class(&storage, "HIIT Workout", TimeDelta::days(1), 1).await;

        let confirmed = service.book(&request(class.id, "a@x.com")).await.unwrap();
        assert_eq!(confirmed.booking.class_id, class.id);
        assert_eq!(confirmed.booking.client_email, "a@x.com");
        assert_eq!(confirmed.class, class);
        assert_eq!(confirmed.availability.available_slots, 0);

        let err = service.book(&request(class.id, "b@x.com")).await.unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(msg) if msg.contains("fully booked")), "{err:?}");
    }

    #[rocket::async_test]
    async fn test_book_duplicate_case_insensitive() {
        let (storage, _dir) = temp_storage().await;
        let service = BookingService::new(storage.clone());
        let class = add_class(&storage, "Morning Yoga", TimeDelta::days(1), 10).await;

        service.book(&request(class.id, "john@example.com")).await.unwrap();
        let err = service.book(&request(class.id, "John@Example.com")).await.unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(msg) if msg.contains("already booked")), "{err:?}");
        assert_eq!(storage.count_bookings(class.id).await.unwrap(), 1);
    }

    #[rocket::async_test]
    async fn test_book_duplicate_reported_before_full() {
        let (storage, _dir) = temp_storage().await;
        let service = BookingService::new(storage.clone());
        let class = add_class(&storage, "Spin", TimeDelta::days(1), 1).await;

        service.book(&request(class.id, "a@x.com")).await.unwrap();
        let err = service.book(&request(class.id, "a@x.com")).await.unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(msg) if msg.contains("already booked")), "{err:?}");
    }

    #[rocket::async_test]
    async fn test_book_missing_class() {
        let (storage, _dir) = temp_storage().await;
        let service = BookingService::new(storage);
        let err = service.book(&request(9999, "invalid-email")).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[rocket::async_test]
    async fn test_book_past_class() {
        let (storage, _dir) = temp_storage().await;
        let service = BookingService::new(storage.clone());
        let class = add_class(&storage, "Yesterday Pilates", TimeDelta::days(-1), 10).await;

        // past check comes before input validation
        for email in ["a@x.com", "not-an-email"] {
            let err = service.book(&request(class.id, email)).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidRequest(_)));
        }
        assert_eq!(storage.count_bookings(class.id).await.unwrap(), 0);
    }

    #[rocket::async_test]
    async fn test_book_invalid_input() {
        let (storage, _dir) = temp_storage().await;
        let service = BookingService::new(storage.clone());
        let class = add_class(&storage, "Zumba", TimeDelta::days(2), 10).await;

        let err = service.book(&request(class.id, "invalid-email")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let mut nameless = request(class.id, "a@x.com");
        nameless.client_name = "  ".to_string();
        let err = service.book(&nameless).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(storage.count_bookings(class.id).await.unwrap(), 0);
    }

    #[rocket::async_test]
    async fn test_concurrent_bookings_never_overbook() {
        const CAPACITY: i64 = 3;
        const ATTEMPTS: usize = 12;
        let (storage, _dir) = temp_storage().await;
        let service = BookingService::new(storage.clone());
        let class = add_class(&storage, "Weekend HIIT", TimeDelta::days(3), CAPACITY).await;

        let handles = (0..ATTEMPTS).map(|n| {
            let service = service.clone();
            let req = request(class.id, &format!("client{n}@example.com"));
            rocket::tokio::spawn(async move { service.book(&req).await })
        }).collect::<Vec<_>>();

        let mut succeeded = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(ApiError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected booking error: {e:?}"),
            }
        }
        assert_eq!(succeeded, CAPACITY as usize);
        assert_eq!(conflicts, ATTEMPTS - CAPACITY as usize);
        assert_eq!(storage.count_bookings(class.id).await.unwrap(), CAPACITY);
        assert!(availability::for_class(&storage, class.id).await.unwrap().is_full());
    }

    #[rocket::async_test]
    async fn test_concurrent_duplicates_book_once() {
        let (storage, _dir) = temp_storage().await;
        let service = BookingService::new(storage.clone());
        let class = add_class(&storage, "Power Yoga", TimeDelta::days(2), 20).await;

        let handles = (0..6).map(|_| {
            let service = service.clone();
            let req = request(class.id, "same@example.com");
            rocket::tokio::spawn(async move { service.book(&req).await })
        }).collect::<Vec<_>>();
        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert!(matches!(e, ApiError::Conflict(_)), "{e:?}"),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(storage.count_bookings(class.id).await.unwrap(), 1);
    }
}
