use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use sqlx::{query_as, FromRow, SqlitePool};
use crate::availability::Availability;
use crate::studiotime::trimmed_to_sec;

pub type ClassId = i64;
pub type BookingId = i64;

#[derive(Serialize, FromRow, Clone, Debug, PartialEq)]
pub struct ClassRecord {
    pub id: ClassId,
    pub name: String,
    pub instructor: String,
    pub start_time: DateTime<Utc>,
    pub capacity: i64,
}

/// Class row together with the number of bookings held against it, read in
/// the same statement.
#[derive(FromRow, Clone, Debug)]
pub struct ClassSlots {
    #[sqlx(flatten)]
    pub class: ClassRecord,
    pub booked: i64,
}

impl ClassSlots {
    pub fn availability(&self) -> Availability {
        Availability::new(self.class.capacity, self.booked)
    }
}

#[derive(Serialize, FromRow, Clone, Debug, PartialEq)]
pub struct BookingRecord {
    pub id: BookingId,
    pub class_id: ClassId,
    pub client_name: String,
    pub client_email: String,
    pub booked_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewClass {
    pub name: String,
    pub instructor: String,
    pub start_time: DateTime<Utc>,
    pub capacity: i64,
}

#[derive(Clone, Debug)]
pub struct NewBooking<'a> {
    pub class_id: ClassId,
    pub client_name: &'a str,
    pub client_email: &'a str,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum BookingInsert {
    Inserted(BookingRecord),
    Duplicate,
    ClassFull,
    ClassStarted,
}

const CLASS_SLOTS_COLUMNS: &str = "c.id AS id, c.name AS name, c.instructor AS instructor, \
    c.start_time AS start_time, c.capacity AS capacity, \
    (SELECT COUNT(*) FROM bookings b WHERE b.class_id = c.id) AS booked";

/// Handle to the studio database. Cloning is cheap, all clones share one pool.
#[derive(Clone, Debug)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    pub async fn get_class(&self, class_id: ClassId) -> sqlx::Result<Option<ClassRecord>> {
        query_as::<_, ClassRecord>("SELECT id, name, instructor, start_time, capacity FROM classes WHERE id=?")
            .bind(class_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn class_with_slots(&self, class_id: ClassId) -> sqlx::Result<Option<ClassSlots>> {
        query_as::<_, ClassSlots>(&format!("SELECT {CLASS_SLOTS_COLUMNS} FROM classes c WHERE c.id=?"))
            .bind(class_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn count_bookings(&self, class_id: ClassId) -> sqlx::Result<i64> {
        let count: (i64, ) = query_as("SELECT COUNT(*) FROM bookings WHERE class_id=?")
            .bind(class_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn count_classes(&self) -> sqlx::Result<i64> {
        let count: (i64, ) = query_as("SELECT COUNT(*) FROM classes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn find_booking(&self, class_id: ClassId, client_email: &str) -> sqlx::Result<Option<BookingRecord>> {
        query_as::<_, BookingRecord>("SELECT * FROM bookings WHERE class_id=? AND client_email=?")
            .bind(class_id)
            .bind(client_email)
            .fetch_optional(&self.pool)
            .await
    }

    /// Inserts the booking only while the class still has a free slot and
    /// starts after `booked_at`.
    ///
    /// Capacity check and insert are one statement and SQLite serializes
    /// writers, so concurrent callers cannot both take the last slot. The
    /// `UNIQUE(class_id, client_email)` constraint covers concurrent duplicates.
    pub async fn insert_booking(&self, booking: &NewBooking<'_>) -> sqlx::Result<BookingInsert> {
        let res = query_as::<_, BookingRecord>(r#"
            INSERT INTO bookings (class_id, client_name, client_email, booked_at)
            SELECT c.id, ?, ?, ?
            FROM classes c
            WHERE c.id = ?
              AND c.start_time > ?
              AND (SELECT COUNT(*) FROM bookings b WHERE b.class_id = c.id) < c.capacity
            RETURNING id, class_id, client_name, client_email, booked_at"#)
            .bind(booking.client_name)
            .bind(booking.client_email)
            .bind(booking.booked_at)
            .bind(booking.class_id)
            .bind(booking.booked_at)
            .fetch_optional(&self.pool)
            .await;
        match res {
            Ok(Some(rec)) => Ok(BookingInsert::Inserted(rec)),
            Ok(None) => match self.get_class(booking.class_id).await? {
                Some(class) if class.start_time <= booking.booked_at => Ok(BookingInsert::ClassStarted),
                _ => Ok(BookingInsert::ClassFull),
            },
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(BookingInsert::Duplicate),
            Err(e) => Err(e),
        }
    }

    /// Upcoming classes starting strictly after `after`, earliest first.
    pub async fn list_classes(&self, after: DateTime<Utc>, skip: i64, limit: i64) -> sqlx::Result<Vec<ClassSlots>> {
        query_as::<_, ClassSlots>(&format!(
            "SELECT {CLASS_SLOTS_COLUMNS} FROM classes c WHERE c.start_time > ? ORDER BY c.start_time, c.id LIMIT ? OFFSET ?"))
            .bind(after)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await
    }

    /// Bookings of one (normalized) email, newest first.
    pub async fn list_bookings(&self, client_email: &str) -> sqlx::Result<Vec<BookingRecord>> {
        query_as::<_, BookingRecord>("SELECT * FROM bookings WHERE client_email=? ORDER BY booked_at DESC, id DESC")
            .bind(client_email)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn insert_class(&self, class: &NewClass) -> Result<ClassRecord, anyhow::Error> {
        anyhow::ensure!(class.capacity > 0, "Class capacity must be positive, got: {}", class.capacity);
        anyhow::ensure!(!class.name.trim().is_empty(), "Class name must not be empty");
        let start_time = trimmed_to_sec(class.start_time);
        let id: (i64, ) = query_as("INSERT INTO classes (name, instructor, start_time, capacity) VALUES (?, ?, ?, ?) RETURNING id")
            .bind(&class.name)
            .bind(&class.instructor)
            .bind(start_time)
            .bind(class.capacity)
            .fetch_one(&self.pool)
            .await?;
        info!("Class created, id: {}, name: {}", id.0, class.name);
        Ok(ClassRecord {
            id: id.0,
            name: class.name.clone(),
            instructor: class.instructor.clone(),
            start_time,
            capacity: class.capacity,
        })
    }
}
