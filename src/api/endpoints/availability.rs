//! Staff weekly availability endpoints.

use std::collections::HashSet;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_date_param, parse_id_param, ApiContext, ApiJson, AuthUser};
use crate::db;
use crate::models::enums::UserType;
use crate::models::{day_of_week, AvailabilityBulkUpdate, AvailabilitySlot, AvailableStaff, StaffAvailability};

#[derive(Debug, Deserialize)]
pub struct StaffQuery {
    pub staff_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

/// `GET /api/staff-availability/?staff_id=`
pub async fn list(
    State(ctx): State<ApiContext>,
    _user: AuthUser,
    Query(query): Query<StaffQuery>,
) -> Result<Json<Vec<StaffAvailability>>, ApiError> {
    let staff = parse_id_param("staff_id", query.staff_id.as_deref())?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::list_availability(&conn, staff)?))
}

fn validate_slots(slots: &[AvailabilitySlot]) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    for slot in slots {
        if slot.day_of_week > 6 {
            return Err(ApiError::BadRequest(format!(
                "day_of_week must be 0 (Sunday) to 6, got {}",
                slot.day_of_week
            )));
        }
        if !seen.insert(slot.day_of_week) {
            return Err(ApiError::BadRequest(format!(
                "day_of_week {} listed twice",
                slot.day_of_week
            )));
        }
        if slot.start_time >= slot.end_time {
            return Err(ApiError::BadRequest("start_time must be before end_time".into()));
        }
    }
    Ok(())
}

/// `POST /api/staff-availability/bulk_update/`: replaces the staff
/// member's whole week. Owners may edit anyone; staff only themselves.
pub async fn bulk_update(
    State(ctx): State<ApiContext>,
    user: AuthUser,
    ApiJson(update): ApiJson<AvailabilityBulkUpdate>,
) -> Result<Json<Vec<StaffAvailability>>, ApiError> {
    let actor = user.require_clinic()?;
    if !actor.is_owner() && actor.user_id != update.staff_id {
        return Err(ApiError::Forbidden("Staff can only edit their own availability".into()));
    }
    validate_slots(&update.availability)?;

    let conn = ctx.core.open_db()?;
    let staff = db::get_user(&conn, update.staff_id)?;
    if staff.user_type == UserType::Patient {
        return Err(ApiError::BadRequest("Availability is only kept for staff".into()));
    }
    let week = db::replace_availability(&conn, staff.id, &update.availability)?;
    tracing::info!(staff_id = staff.id, days = week.len(), by = actor.user_id, "Availability replaced");
    Ok(Json(week))
}

/// `GET /api/staff-availability/by_date/?date=YYYY-MM-DD`
pub async fn by_date(
    State(ctx): State<ApiContext>,
    _user: AuthUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<AvailableStaff>>, ApiError> {
    let raw = query
        .date
        .ok_or_else(|| ApiError::BadRequest("date parameter is required".into()))?;
    let date = parse_date_param("date", &raw)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(db::available_staff_on(&conn, day_of_week(date))?))
}
