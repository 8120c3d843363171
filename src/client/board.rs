//! Local appointment list with the patient request flow and the staff
//! review flow.
//!
//! The board never decides whether a transition is allowed; it sends the
//! action, and on success folds the server's answer into its list. A
//! failed call leaves the list untouched.

use chrono::{NaiveDate, NaiveTime};

use super::{ClientError, ClinicClient};
use crate::models::enums::AppointmentStatus;
use crate::models::{Appointment, AppointmentUpdate, CompletionNote, NewAppointment, RescheduleProposal};

/// What a patient fills in to request a visit.
#[derive(Debug, Clone, Default)]
pub struct AppointmentDraft {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub dentist: Option<i64>,
    pub service: Option<i64>,
    pub notes: String,
}

/// The four fields staff may edit directly.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffEdit {
    pub status: AppointmentStatus,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub notes: String,
}

impl StaffEdit {
    pub fn from_appointment(appt: &Appointment) -> Self {
        Self {
            status: appt.status,
            date: appt.date,
            time: appt.time,
            notes: appt.notes.clone(),
        }
    }
}

impl From<StaffEdit> for AppointmentUpdate {
    fn from(edit: StaffEdit) -> Self {
        AppointmentUpdate::staff_edit(edit.status, edit.date, edit.time, edit.notes)
    }
}

pub struct AppointmentBoard {
    client: ClinicClient,
    appointments: Vec<Appointment>,
}

impl AppointmentBoard {
    pub fn new(client: ClinicClient) -> Self {
        Self {
            client,
            appointments: Vec::new(),
        }
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn get(&self, id: i64) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    /// Reload the whole list from the server.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        self.appointments = self.client.list_appointments().await?;
        Ok(())
    }

    /// Appointments waiting on a staff decision: new bookings and
    /// patient reschedule or cancel requests.
    pub fn pending_requests(&self) -> Vec<&Appointment> {
        self.appointments
            .iter()
            .filter(|a| {
                matches!(
                    a.status,
                    AppointmentStatus::Pending
                        | AppointmentStatus::RescheduleRequested
                        | AppointmentStatus::CancelRequested
                )
            })
            .collect()
    }

    fn replace(&mut self, updated: Appointment) -> &Appointment {
        match self.appointments.iter().position(|a| a.id == updated.id) {
            Some(index) => {
                self.appointments[index] = updated;
                &self.appointments[index]
            }
            None => {
                self.appointments.insert(0, updated);
                &self.appointments[0]
            }
        }
    }

    fn remove(&mut self, id: i64) {
        self.appointments.retain(|a| a.id != id);
    }

    // ── Patient side ──

    /// Book a visit. The new record goes to the top of the list and the
    /// returned message is what the patient is shown.
    pub async fn request_appointment(&mut self, draft: AppointmentDraft) -> Result<String, ClientError> {
        let request = NewAppointment {
            patient: None,
            dentist: draft.dentist,
            service: draft.service,
            date: draft.date,
            time: draft.time,
            notes: draft.notes,
            status: Some(AppointmentStatus::Pending),
        };
        let created = self.client.create_appointment(&request).await?;
        let message = format!(
            "Appointment requested for {} at {}. The clinic will confirm it shortly.",
            created.date.format("%Y-%m-%d"),
            created.time.format("%H:%M"),
        );
        self.appointments.insert(0, created);
        Ok(message)
    }

    /// The current slot as an editable proposal, for prefilling the
    /// reschedule form.
    pub fn proposal_for(&self, id: i64) -> Option<RescheduleProposal> {
        self.get(id).map(RescheduleProposal::from_appointment)
    }

    pub async fn request_reschedule(
        &mut self,
        id: i64,
        proposal: &RescheduleProposal,
    ) -> Result<&Appointment, ClientError> {
        let updated = self.client.request_reschedule(id, proposal).await?;
        Ok(self.replace(updated))
    }

    pub async fn request_cancel(&mut self, id: i64, reason: &str) -> Result<&Appointment, ClientError> {
        let updated = self.client.request_cancel(id, reason).await?;
        Ok(self.replace(updated))
    }

    // ── Staff side ──

    pub async fn approve_reschedule(&mut self, id: i64) -> Result<&Appointment, ClientError> {
        let updated = self.client.approve_reschedule(id).await?;
        Ok(self.replace(updated))
    }

    pub async fn reject_reschedule(&mut self, id: i64) -> Result<&Appointment, ClientError> {
        let updated = self.client.reject_reschedule(id).await?;
        Ok(self.replace(updated))
    }

    /// The server deletes the appointment and sends no body.
    pub async fn approve_cancel(&mut self, id: i64) -> Result<(), ClientError> {
        self.client.approve_cancel(id).await?;
        self.remove(id);
        Ok(())
    }

    pub async fn reject_cancel(&mut self, id: i64) -> Result<&Appointment, ClientError> {
        let updated = self.client.reject_cancel(id).await?;
        Ok(self.replace(updated))
    }

    pub async fn mark_completed(&mut self, id: i64, note: &CompletionNote) -> Result<&Appointment, ClientError> {
        let updated = self.client.mark_completed(id, note).await?;
        Ok(self.replace(updated))
    }

    pub async fn save_edit(&mut self, id: i64, edit: StaffEdit) -> Result<&Appointment, ClientError> {
        let updated = self.client.update_appointment(id, &edit.into()).await?;
        Ok(self.replace(updated))
    }

    pub async fn delete(&mut self, id: i64) -> Result<(), ClientError> {
        self.client.delete_appointment(id).await?;
        self.remove(id);
        Ok(())
    }
}

pub fn status_label(status: AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::Pending => "Pending",
        AppointmentStatus::Confirmed => "Confirmed",
        AppointmentStatus::Cancelled => "Cancelled",
        AppointmentStatus::Completed => "Completed",
        AppointmentStatus::RescheduleRequested => "Reschedule Requested",
        AppointmentStatus::CancelRequested => "Cancellation Requested",
    }
}

/// Badge colour as a hex RGB string.
pub fn status_color(status: AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::Pending => "#f59e0b",
        AppointmentStatus::Confirmed => "#10b981",
        AppointmentStatus::Cancelled => "#ef4444",
        AppointmentStatus::Completed => "#3b82f6",
        AppointmentStatus::RescheduleRequested => "#8b5cf6",
        AppointmentStatus::CancelRequested => "#f97316",
    }
}
