//! Patient record export: a JSON bundle of everything on file for one
//! patient, and a printable PDF rendering of it.

use std::io::BufWriter;

use chrono::NaiveDateTime;
use printpdf::*;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{self, AppointmentFilter, DatabaseError};
use crate::models::enums::UserType;
use crate::models::time_format::format_time;
use crate::models::*;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("User {0} is not a patient")]
    NotAPatient(i64),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecordExport {
    pub generated_at: NaiveDateTime,
    pub patient: User,
    pub intake_form: Option<IntakeForm>,
    pub appointments: Vec<Appointment>,
    pub clinical_notes: Vec<ClinicalNote>,
    pub treatments: Vec<TreatmentAssignment>,
    pub billings: Vec<Billing>,
    pub files: Vec<FileAttachment>,
}

pub fn build_export(
    conn: &Connection,
    patient_id: i64,
    generated_at: NaiveDateTime,
) -> Result<PatientRecordExport, ExportError> {
    let patient = db::get_user(conn, patient_id)?;
    if patient.user_type != UserType::Patient {
        return Err(ExportError::NotAPatient(patient_id));
    }
    Ok(PatientRecordExport {
        generated_at,
        intake_form: db::find_intake_form_for_patient(conn, patient_id)?,
        appointments: db::list_appointments(conn, &AppointmentFilter::for_patient(Some(patient_id)))?,
        clinical_notes: db::list_clinical_notes(conn, Some(patient_id))?,
        treatments: db::list_treatments(conn, Some(patient_id))?,
        billings: db::list_billings(conn, Some(patient_id), None)?,
        files: db::list_file_attachments(conn, Some(patient_id))?,
        patient,
    })
}

pub fn export_file_name(export: &PatientRecordExport, extension: &str) -> String {
    let slug: String = export
        .patient
        .full_name()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!(
        "patient_record_{slug}_{}.{extension}",
        export.generated_at.format("%Y%m%d")
    )
}

// ─── PDF rendering ────────────────────────────────────────────────────────────

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;

/// Writes lines top-down, starting a new page when the cursor runs out.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, ExportError> {
        let (doc, page, layer) = PdfDocument::new(title, PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ExportError::Pdf(format!("font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ExportError::Pdf(format!("font error: {e}")))?;
        Ok(Self { doc, layer, font, bold, y: TOP })
    }

    fn advance(&mut self, step: f32) {
        self.y -= step;
        if self.y < BOTTOM {
            let (page, layer) = self.doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
    }

    fn title(&mut self, text: &str) {
        self.layer.use_text(text, 14.0, Mm(20.0), Mm(self.y), &self.bold);
        self.advance(10.0);
    }

    fn heading(&mut self, text: &str) {
        self.advance(3.0);
        self.layer.use_text(text, 11.0, Mm(20.0), Mm(self.y), &self.bold);
        self.advance(6.0);
    }

    fn line(&mut self, text: &str) {
        for wrapped in wrap_text(text, 90) {
            self.layer.use_text(&wrapped, 9.0, Mm(25.0), Mm(self.y), &self.font);
            self.advance(4.5);
        }
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| ExportError::Pdf(format!("save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| ExportError::Pdf(format!("buffer error: {e}")))
    }
}

pub fn render_pdf(export: &PatientRecordExport) -> Result<Vec<u8>, ExportError> {
    let patient = &export.patient;
    let mut w = PageWriter::new(&format!("Patient record: {}", patient.full_name()))?;

    w.title(&format!("Patient record: {}", patient.full_name()));
    w.line(&format!("Generated {}", export.generated_at.format("%Y-%m-%d %H:%M")));
    w.line(&format!("Email: {}   Phone: {}", patient.email, patient.phone));
    if let Some(birthday) = patient.birthday {
        w.line(&format!("Birthday: {birthday}"));
    }
    if !patient.address.is_empty() {
        w.line(&format!("Address: {}", patient.address));
    }

    if let Some(form) = &export.intake_form {
        w.heading("MEDICAL HISTORY");
        for (label, value) in [
            ("Allergies", &form.allergies),
            ("Current medications", &form.current_medications),
            ("Medical conditions", &form.medical_conditions),
            ("Previous dental treatments", &form.previous_dental_treatments),
            ("Dental concerns", &form.dental_concerns),
        ] {
            if !value.is_empty() {
                w.line(&format!("{label}: {value}"));
            }
        }
        if !form.emergency_contact_name.is_empty() {
            w.line(&format!(
                "Emergency contact: {} {}",
                form.emergency_contact_name, form.emergency_contact_phone
            ));
        }
    }

    w.heading("APPOINTMENTS");
    if export.appointments.is_empty() {
        w.line("None on file.");
    }
    for a in &export.appointments {
        w.line(&format!(
            "{} {}  {}  {}  {}",
            a.date,
            format_time(&a.time),
            a.status,
            a.service_name.as_deref().unwrap_or("General visit"),
            a.dentist_name.as_deref().unwrap_or("")
        ));
    }

    if !export.clinical_notes.is_empty() {
        w.heading("CLINICAL NOTES");
        for n in &export.clinical_notes {
            w.line(&format!("{}  {}", n.created_at.date(), n.treatment));
            if !n.diagnosis.is_empty() {
                w.line(&format!("  Diagnosis: {}", n.diagnosis));
            }
            if !n.notes.is_empty() {
                w.line(&format!("  {}", n.notes));
            }
        }
    }

    if !export.treatments.is_empty() {
        w.heading("TREATMENT PLAN");
        for t in &export.treatments {
            w.line(&format!("{}  [{}]", t.title, t.status.as_str()));
        }
    }

    if !export.billings.is_empty() {
        w.heading("BILLING");
        for b in &export.billings {
            w.line(&format!(
                "{}  {:.2}  {}  {}",
                b.created_at.date(),
                b.amount,
                b.status.as_str(),
                b.description
            ));
        }
    }

    if !export.files.is_empty() {
        w.heading("FILES");
        for f in &export.files {
            w.line(&format!("{}  {} ({})", f.uploaded_at.date(), f.title, f.file_type.as_str()));
        }
    }

    w.finish()
}

/// Word-wrap for PDF text lines.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{self, at, day};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::AppointmentStatus;

    fn generated() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-02-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn seeded() -> (Connection, i64) {
        let conn = open_memory_database().unwrap();
        let p = fixtures::user(&conn, "pat", UserType::Patient);
        fixtures::appointment(&conn, p, None, day(2025, 1, 20), at(10, 0), AppointmentStatus::Completed);
        db::insert_clinical_note(
            &conn,
            &NewClinicalNote {
                patient: p,
                appointment: None,
                treatment: "Filling".into(),
                diagnosis: "Caries on 36".into(),
                notes: String::new(),
            },
            None,
        )
        .unwrap();
        db::insert_intake_form(
            &conn,
            p,
            &IntakeFormInput {
                allergies: "Penicillin".into(),
                ..Default::default()
            },
        )
        .unwrap();
        (conn, p)
    }

    #[test]
    fn export_collects_patient_records() {
        let (conn, p) = seeded();
        let other = fixtures::user(&conn, "other", UserType::Patient);
        fixtures::appointment(&conn, other, None, day(2025, 1, 21), at(10, 0), AppointmentStatus::Pending);

        let export = build_export(&conn, p, generated()).unwrap();
        assert_eq!(export.patient.id, p);
        assert_eq!(export.appointments.len(), 1);
        assert_eq!(export.clinical_notes.len(), 1);
        assert_eq!(export.intake_form.unwrap().allergies, "Penicillin");
        assert!(export.billings.is_empty());
    }

    #[test]
    fn export_refuses_non_patients() {
        let (conn, _) = seeded();
        let staff = fixtures::user(&conn, "staff", UserType::Staff);
        assert!(matches!(build_export(&conn, staff, generated()), Err(ExportError::NotAPatient(_))));
        assert!(matches!(
            build_export(&conn, 999, generated()),
            Err(ExportError::Database(DatabaseError::NotFound { .. }))
        ));
    }

    #[test]
    fn pdf_has_magic_bytes() {
        let (conn, p) = seeded();
        let export = build_export(&conn, p, generated()).unwrap();
        let bytes = render_pdf(&export).unwrap();
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    #[test]
    fn long_exports_span_pages() {
        let (conn, p) = seeded();
        for i in 0..120 {
            fixtures::appointment(&conn, p, None, day(2024, 1, 1) + chrono::Duration::days(i), at(9, 0), AppointmentStatus::Completed);
        }
        let export = build_export(&conn, p, generated()).unwrap();
        let bytes = render_pdf(&export).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn file_name_is_slugged() {
        let (conn, p) = seeded();
        let export = build_export(&conn, p, generated()).unwrap();
        assert_eq!(export_file_name(&export, "pdf"), "patient_record_pat_test_20250201.pdf");
    }

    #[test]
    fn wrap_text_splits_long_lines() {
        let lines = wrap_text("one two three four five six", 10);
        assert!(lines.iter().all(|l| l.len() <= 10));
        assert_eq!(lines.join(" "), "one two three four five six");
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }
}
