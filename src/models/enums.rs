use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(UserType {
    Patient => "patient",
    Staff => "staff",
    Owner => "owner",
});

str_enum!(AppointmentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
    RescheduleRequested => "reschedule_requested",
    CancelRequested => "cancel_requested",
});

str_enum!(ServiceCategory {
    All => "all",
    Orthodontics => "orthodontics",
    Restorations => "restorations",
    Xrays => "xrays",
    OralSurgery => "oral_surgery",
    Preventive => "preventive",
});

str_enum!(BillingStatus {
    Pending => "pending",
    Paid => "paid",
    Cancelled => "cancelled",
});

str_enum!(TreatmentStatus {
    Planned => "planned",
    Ongoing => "ongoing",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(NotificationType {
    NewAppointment => "new_appointment",
    RescheduleRequest => "reschedule_request",
    CancelRequest => "cancel_request",
});

str_enum!(FileType {
    Xray => "xray",
    Scan => "scan",
    Report => "report",
    Photo => "photo",
    Other => "other",
});

str_enum!(DocumentType {
    Xray => "xray",
    Scan => "scan",
    Report => "report",
    Other => "other",
});

impl UserType {
    /// Staff and owners share the clinic-side permissions.
    pub fn is_clinic(&self) -> bool {
        matches!(self, Self::Staff | Self::Owner)
    }
}

impl AppointmentStatus {
    /// A patient request is waiting for a staff decision.
    pub fn is_request(&self) -> bool {
        matches!(self, Self::RescheduleRequested | Self::CancelRequested)
    }

    /// The appointment still occupies its slot.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Completed)
    }
}
