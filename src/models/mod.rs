pub mod appointment;
pub mod availability;
pub mod billing;
pub mod clinical_note;
pub mod dental_record;
pub mod document;
pub mod enums;
pub mod file_attachment;
pub mod intake_form;
pub mod inventory;
pub mod notification;
pub mod service;
pub mod teeth_image;
pub mod time_format;
pub mod treatment;
pub mod user;

pub use appointment::*;
pub use availability::*;
pub use billing::*;
pub use clinical_note::*;
pub use dental_record::*;
pub use document::*;
pub use file_attachment::*;
pub use intake_form::*;
pub use inventory::*;
pub use notification::*;
pub use service::*;
pub use teeth_image::*;
pub use treatment::*;
pub use user::*;
