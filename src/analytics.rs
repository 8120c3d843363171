//! Owner dashboard figures: revenue, expenses, patient and appointment
//! counts, bucketed by a trailing date range.

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{self, AppointmentFilter, DatabaseError};
use crate::models::enums::{AppointmentStatus, BillingStatus, UserType};
use crate::models::{Appointment, Billing};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Annual,
}

impl DateRange {
    /// Days looked back from today. `Daily` is an exact-day match.
    pub fn lookback_days(&self) -> i64 {
        match self {
            Self::Daily => 0,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Annual => 365,
        }
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Self::Daily => date == today,
            _ => date >= today - Duration::days(self.lookback_days()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Annual => "annual",
        }
    }
}

impl std::str::FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "annual" => Ok(Self::Annual),
            other => Err(format!(
                "Invalid range '{other}'. Must be daily, weekly, monthly or annual."
            )),
        }
    }
}

/// Anything that can be bucketed by a calendar date.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for Billing {
    fn date(&self) -> NaiveDate {
        self.created_at.date()
    }
}

impl Dated for Appointment {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

pub fn filter_by_range<T: Dated>(items: Vec<T>, range: DateRange, today: NaiveDate) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| range.contains(item.date(), today))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub range: DateRange,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
    pub total_patients: i64,
    pub active_patients: i64,
    pub new_patients_this_month: i64,
    pub total_appointments: i64,
    pub appointments_in_range: i64,
    pub upcoming_appointments: i64,
    pub pending_requests: i64,
}

/// Revenue counts paid billings created inside the range; expenses are
/// the carrying cost of current inventory.
pub fn summarize(
    conn: &Connection,
    range: DateRange,
    today: NaiveDate,
) -> Result<AnalyticsSummary, DatabaseError> {
    let paid = db::list_billings(conn, None, Some(BillingStatus::Paid))?;
    let revenue: f64 = filter_by_range(paid, range, today)
        .iter()
        .map(|b| b.amount)
        .sum();
    let expenses = db::total_inventory_value(conn)?;

    let patients = db::list_users(conn, UserType::Patient, None)?;
    let active_patients = patients.iter().filter(|p| p.is_active_patient).count() as i64;
    let new_patients_this_month = patients
        .iter()
        .filter(|p| p.created_at.year() == today.year() && p.created_at.month() == today.month())
        .count() as i64;

    let appointments = db::list_appointments(conn, &AppointmentFilter::default())?;
    let total_appointments = appointments.len() as i64;
    let upcoming_appointments = appointments
        .iter()
        .filter(|a| a.date >= today && matches!(a.status, AppointmentStatus::Pending | AppointmentStatus::Confirmed))
        .count() as i64;
    let pending_requests = appointments.iter().filter(|a| a.status.is_request()).count() as i64;
    let appointments_in_range = filter_by_range(appointments, range, today).len() as i64;

    Ok(AnalyticsSummary {
        range,
        revenue,
        expenses,
        profit: revenue - expenses,
        total_patients: patients.len() as i64,
        active_patients,
        new_patients_this_month,
        total_appointments,
        appointments_in_range,
        upcoming_appointments,
        pending_requests,
    })
}
