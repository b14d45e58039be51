//! Wire schema of the remote inventory service.
//!
//! The service speaks Spanish field names and Mongo-style `_id` keys. Records
//! are parsed into [`crate::domain`] types fail-fast: a malformed field is a
//! [`ParseError`], never a half-populated cache entry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    is_schedule_time, HistoryEntry, HistoryEntryId, Medication, MedicationDraft, MedicationId,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("negative stock value {0}")]
    NegativeStock(i64),
    #[error("minimum stock must be at least 1, got {0}")]
    InvalidMinStock(i64),
    #[error("malformed scheduled time {0:?}, expected HH:MM")]
    BadScheduledTime(String),
    #[error("malformed date {0:?}")]
    BadDate(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub password: String,
    #[serde(rename = "rememberMe")]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Body of `POST /tomas`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseTakenRequest {
    #[serde(rename = "medicamentoId")]
    pub medication_id: MedicationId,
}

/// `GET /medicamentos` element and the echo body of mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub nombre: String,
    pub dosis: String,
    #[serde(rename = "stockActual")]
    pub stock_actual: i64,
    #[serde(rename = "stockMinimo")]
    pub stock_minimo: i64,
    pub horarios: Vec<String>,
    #[serde(rename = "fechaVencimiento", default)]
    pub fecha_vencimiento: Option<String>,
    #[serde(rename = "diasRestantes", default)]
    pub dias_restantes: Option<i64>,
}

impl TryFrom<MedicationRecord> for Medication {
    type Error = ParseError;

    fn try_from(record: MedicationRecord) -> Result<Self, Self::Error> {
        let current_stock =
            u32::try_from(record.stock_actual).map_err(|_| ParseError::NegativeStock(record.stock_actual))?;
        if record.stock_minimo < 1 {
            return Err(ParseError::InvalidMinStock(record.stock_minimo));
        }
        let min_stock =
            u32::try_from(record.stock_minimo).map_err(|_| ParseError::InvalidMinStock(record.stock_minimo))?;
        for time in &record.horarios {
            if !is_schedule_time(time) {
                return Err(ParseError::BadScheduledTime(time.clone()));
            }
        }
        let expiration_date = record
            .fecha_vencimiento
            .as_deref()
            .map(parse_wire_date)
            .transpose()?;
        Ok(Medication {
            id: MedicationId(record.id),
            name: record.nombre,
            dose: record.dosis,
            current_stock,
            min_stock,
            scheduled_times: record.horarios,
            expiration_date,
            days_remaining: record.dias_restantes,
        })
    }
}

/// Submission body for `POST /medicamentos` and `PUT /medicamentos/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationUpsert {
    pub nombre: String,
    pub dosis: String,
    #[serde(rename = "stockActual")]
    pub stock_actual: u32,
    #[serde(rename = "stockMinimo")]
    pub stock_minimo: u32,
    pub horarios: Vec<String>,
    #[serde(rename = "fechaVencimiento", skip_serializing_if = "Option::is_none")]
    pub fecha_vencimiento: Option<String>,
}

impl From<&MedicationDraft> for MedicationUpsert {
    fn from(draft: &MedicationDraft) -> Self {
        Self {
            nombre: draft.name.clone(),
            dosis: draft.dose.clone(),
            stock_actual: draft.current_stock,
            stock_minimo: draft.min_stock,
            horarios: draft.scheduled_times.clone(),
            fecha_vencimiento: draft.expiration_date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// `GET /historial` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub fecha: String,
    #[serde(rename = "medicamentoNombre")]
    pub medicamento_nombre: String,
    pub movimiento: i64,
    pub tipo: String,
}

impl TryFrom<HistoryRecord> for HistoryEntry {
    type Error = ParseError;

    fn try_from(record: HistoryRecord) -> Result<Self, Self::Error> {
        let timestamp = parse_wire_timestamp(&record.fecha)?;
        Ok(HistoryEntry {
            id: HistoryEntryId(record.id),
            timestamp,
            medication_name: record.medicamento_nombre,
            quantity_delta: record.movimiento,
            movement_type: record.tipo,
        })
    }
}

// The service emits RFC 3339 timestamps for movements and either a bare date
// or a full timestamp for expirations, depending on how the record was saved.
fn parse_wire_date(raw: &str) -> Result<NaiveDate, ParseError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| ParseError::BadDate(raw.to_string()))
}

fn parse_wire_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ParseError::BadDate(raw.to_string()))
}
