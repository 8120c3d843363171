use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::time_format::hhmm;

/// One weekday slot of a staff member's schedule.
/// `day_of_week` runs 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffAvailability {
    pub id: i64,
    pub staff: i64,
    pub day_of_week: u8,
    pub is_available: bool,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub day_of_week: u8,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

fn default_available() -> bool {
    true
}

/// Replaces a staff member's whole week in one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityBulkUpdate {
    pub staff_id: i64,
    pub availability: Vec<AvailabilitySlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableStaff {
    pub staff_id: i64,
    pub name: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

/// Sunday-based weekday index for a calendar date.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sunday_is_zero() {
        let sunday = NaiveDate::from_ymd_opt(2025, 1, 19).unwrap();
        assert_eq!(day_of_week(sunday), 0);
        let saturday = NaiveDate::from_ymd_opt(2025, 1, 25).unwrap();
        assert_eq!(day_of_week(saturday), 6);
    }

    #[test]
    fn slot_defaults_to_available() {
        let slot: AvailabilitySlot = serde_json::from_str(
            r#"{"day_of_week":1,"start_time":"09:00","end_time":"17:00"}"#,
        )
        .unwrap();
        assert!(slot.is_available);
    }
}
