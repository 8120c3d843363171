//! `HH:MM` wire format for clinic times.
//!
//! Serializes without seconds; accepts `HH:MM` or `HH:MM:SS` on input.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer};

pub const TIME_FORMAT: &str = "%H:%M";

pub fn parse_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
}

pub fn format_time(time: &NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub mod hhmm {
    use super::*;

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_time(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

pub mod hhmm_opt {
    use super::*;

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_some(&format_time(t)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.filter(|s| !s.is_empty())
            .map(|s| parse_time(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Deserialize)]
    struct Slot {
        #[serde(with = "hhmm")]
        at: NaiveTime,
        #[serde(with = "hhmm_opt", default)]
        alt: Option<NaiveTime>,
    }

    #[test]
    fn serializes_without_seconds() {
        let slot = Slot {
            at: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            alt: None,
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["at"], "14:00");
        assert!(json["alt"].is_null());
    }

    #[test]
    fn accepts_seconds_and_missing_optional() {
        let slot: Slot = serde_json::from_str(r#"{"at":"09:30:00"}"#).unwrap();
        assert_eq!(slot.at, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert!(slot.alt.is_none());

        let slot: Slot = serde_json::from_str(r#"{"at":"09:30","alt":"10:15"}"#).unwrap();
        assert_eq!(slot.alt, NaiveTime::from_hms_opt(10, 15, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Slot>(r#"{"at":"noon"}"#).is_err());
    }
}
