use serde::Serialize;
use crate::error::{ApiError, ApiResult};
use crate::storage::{ClassId, Storage};

/// Free slots of a class with `capacity` seats and `booked` bookings.
/// Never negative.
pub fn available_slots(capacity: i64, booked: i64) -> i64 {
    (capacity - booked).max(0)
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub total_slots: i64,
    pub booked: i64,
    pub available_slots: i64,
}

impl Availability {
    pub fn new(capacity: i64, booked: i64) -> Self {
        Self {
            total_slots: capacity,
            booked,
            available_slots: available_slots(capacity, booked),
        }
    }
    pub fn is_full(&self) -> bool {
        self.available_slots == 0
    }
}

/// Reads the current availability of one class.
///
/// This is a plain read. Callers deciding on a booking must still rely on
/// [`Storage::insert_booking`], which rechecks capacity atomically.
pub async fn for_class(storage: &Storage, class_id: ClassId) -> ApiResult<Availability> {
    let class = storage.get_class(class_id).await?
        .ok_or_else(|| ApiError::NotFound(format!("Class with ID {class_id} not found")))?;
    let booked = storage.count_bookings(class_id).await?;
    Ok(Availability::new(class.capacity, booked))
}
