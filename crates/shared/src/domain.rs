use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        /// Opaque server-assigned identifier. Never parsed or ordered locally.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(MedicationId);
id_newtype!(HistoryEntryId);

/// A medication as held in the local cache. Field values come from the remote
/// service; `days_remaining` is server-computed and advisory only, never
/// recalculated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: MedicationId,
    pub name: String,
    pub dose: String,
    pub current_stock: u32,
    pub min_stock: u32,
    /// `"HH:MM"` entries in the order the server returned them.
    pub scheduled_times: Vec<String>,
    pub expiration_date: Option<NaiveDate>,
    pub days_remaining: Option<i64>,
}

impl Medication {
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.min_stock
    }

    /// Whether this medication is due at the given `"HH:MM"` minute.
    pub fn is_due_at(&self, minute_key: &str) -> bool {
        self.scheduled_times.iter().any(|t| t == minute_key)
    }
}

/// Local draft submitted on create/update. The id is absent; the server
/// assigns or already knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationDraft {
    pub name: String,
    pub dose: String,
    pub current_stock: u32,
    pub min_stock: u32,
    pub scheduled_times: Vec<String>,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidDraft {
    #[error("at least one scheduled time is required")]
    NoScheduledTimes,
    #[error("malformed scheduled time {0:?}, expected HH:MM")]
    BadScheduledTime(String),
    #[error("minimum stock must be at least 1")]
    MinStockZero,
}

impl MedicationDraft {
    /// Local validation applied before any network call is made.
    pub fn validate(&self) -> Result<(), InvalidDraft> {
        if self.scheduled_times.is_empty() {
            return Err(InvalidDraft::NoScheduledTimes);
        }
        for time in &self.scheduled_times {
            if !is_schedule_time(time) {
                return Err(InvalidDraft::BadScheduledTime(time.clone()));
            }
        }
        if self.min_stock == 0 {
            return Err(InvalidDraft::MinStockZero);
        }
        Ok(())
    }
}

/// Strict `"HH:MM"` check: two digits, colon, two digits, in range.
pub fn is_schedule_time(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !digits(&value[..2]) || !digits(&value[3..]) {
        return false;
    }
    let hours: u8 = value[..2].parse().unwrap_or(24);
    let minutes: u8 = value[3..].parse().unwrap_or(60);
    hours < 24 && minutes < 60
}

/// One stock movement as recorded by the server. Immutable; the client only
/// ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub timestamp: DateTime<Utc>,
    /// Denormalized display name, not an id reference.
    pub medication_name: String,
    pub quantity_delta: i64,
    /// Free-text movement tag from the server, e.g. "restock" or "dose".
    pub movement_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> MedicationDraft {
        MedicationDraft {
            name: "Ibuprofeno".to_string(),
            dose: "400mg".to_string(),
            current_stock: 12,
            min_stock: 4,
            scheduled_times: vec!["08:00".to_string(), "20:00".to_string()],
            expiration_date: None,
        }
    }

    #[test]
    fn draft_with_times_passes_validation() {
        assert_eq!(draft().validate(), Ok(()));
    }

    #[test]
    fn draft_without_times_is_rejected() {
        let mut d = draft();
        d.scheduled_times.clear();
        assert_eq!(d.validate(), Err(InvalidDraft::NoScheduledTimes));
    }

    #[test]
    fn draft_with_malformed_time_is_rejected() {
        let mut d = draft();
        d.scheduled_times.push("8:00".to_string());
        assert_eq!(
            d.validate(),
            Err(InvalidDraft::BadScheduledTime("8:00".to_string()))
        );
    }

    #[test]
    fn schedule_time_bounds() {
        assert!(is_schedule_time("00:00"));
        assert!(is_schedule_time("23:59"));
        assert!(!is_schedule_time("24:00"));
        assert!(!is_schedule_time("12:60"));
        assert!(!is_schedule_time("12-30"));
        assert!(!is_schedule_time("12:3"));
    }

    #[test]
    fn low_stock_includes_equal_boundary() {
        let med = Medication {
            id: MedicationId::from("a"),
            name: "A".to_string(),
            dose: "1".to_string(),
            current_stock: 4,
            min_stock: 4,
            scheduled_times: vec!["08:00".to_string()],
            expiration_date: None,
            days_remaining: None,
        };
        assert!(med.is_low_stock());
    }
}
