use chrono::{NaiveTime, TimeDelta, Utc};
use log::info;
use crate::storage::{NewClass, Storage};
use crate::studiotime::DisplayOffset;

/// (name, instructor, days from today, local start hour, minute, capacity)
const DEMO_CLASSES: &[(&str, &str, i64, u32, u32, i64)] = &[
    ("Morning Yoga", "Priya Sharma", 1, 6, 30, 20),
    ("HIIT Workout", "Raj Kumar", 1, 7, 30, 15),
    ("Evening Zumba", "Anita Desai", 2, 18, 0, 25),
    ("Power Yoga", "Priya Sharma", 2, 19, 30, 20),
    ("Weekend HIIT", "Raj Kumar", 3, 8, 0, 30),
    ("Relaxation Yoga", "Priya Sharma", 3, 17, 0, 25),
];

/// Fills an empty database with a few upcoming classes, scheduled in studio
/// local time. Returns the number of classes created.
pub async fn seed_demo_classes(storage: &Storage, offset: &DisplayOffset) -> Result<usize, anyhow::Error> {
    let existing = storage.count_classes().await?;
    if existing > 0 {
        info!("Skipping demo classes, database already holds {existing} classes");
        return Ok(0);
    }
    let today = Utc::now().with_timezone(&offset.0).date_naive();
    for &(name, instructor, days, hour, minute, capacity) in DEMO_CLASSES {
        let time = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow::anyhow!("Invalid start time {hour}:{minute} of {name}"))?;
        let local_start = (today + TimeDelta::days(days)).and_time(time);
        let start_time = offset.from_local(local_start)
            .ok_or_else(|| anyhow::anyhow!("Start time {local_start} of {name} does not exist"))?;
        let class = storage.insert_class(&NewClass {
            name: name.to_string(),
            instructor: instructor.to_string(),
            start_time,
            capacity,
        }).await?;
        info!("Demo class: {} by {} on {}", class.name, class.instructor, offset.render(class.start_time).to_display_string());
    }
    Ok(DEMO_CLASSES.len())
}

#[cfg(test)]
mod tests {
    use crate::storage::test::temp_storage;
    use super::*;

    #[rocket::async_test]
    async fn test_seed_empty_database_once() {
        let (storage, _dir) = temp_storage().await;
        let ist = DisplayOffset::ist();
        assert_eq!(seed_demo_classes(&storage, &ist).await.unwrap(), DEMO_CLASSES.len());
        assert_eq!(seed_demo_classes(&storage, &ist).await.unwrap(), 0);
        assert_eq!(storage.count_classes().await.unwrap(), DEMO_CLASSES.len() as i64);

        let upcoming = storage.list_classes(Utc::now(), 0, 100).await.unwrap();
        assert_eq!(upcoming.len(), DEMO_CLASSES.len());
        let first = &upcoming[0].class;
        assert_eq!(first.name, "Morning Yoga");
        let shown = ist.render(first.start_time).to_iso_string();
        assert!(shown.ends_with("T06:30:00+05:30"), "{shown}");
    }
}
