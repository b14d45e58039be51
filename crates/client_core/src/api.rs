//! HTTP access to the remote inventory service.
//!
//! [`RemoteInventory`] is the seam between the client logic and the wire:
//! production code uses [`HttpInventory`], tests substitute stubs.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{HistoryEntry, Medication, MedicationDraft, MedicationId},
    error::ApiErrorBody,
    protocol::{
        DoseTakenRequest, HistoryRecord, LoginRequest, LoginResponse, MedicationRecord,
        MedicationUpsert,
    },
};

use crate::error::ClientError;

#[async_trait]
pub trait RemoteInventory: Send + Sync {
    async fn login(&self, password: &str, remember_me: bool) -> Result<String, ClientError>;
    async fn list_medications(&self, token: &str) -> Result<Vec<Medication>, ClientError>;
    async fn list_history(&self, token: &str) -> Result<Vec<HistoryEntry>, ClientError>;
    async fn create_medication(
        &self,
        token: &str,
        draft: &MedicationDraft,
    ) -> Result<Medication, ClientError>;
    async fn update_medication(
        &self,
        token: &str,
        id: &MedicationId,
        draft: &MedicationDraft,
    ) -> Result<Medication, ClientError>;
    async fn delete_medication(&self, token: &str, id: &MedicationId) -> Result<(), ClientError>;
    /// Records a dose-taken event and returns the updated medication record.
    async fn confirm_dose(
        &self,
        token: &str,
        id: &MedicationId,
    ) -> Result<Medication, ClientError>;
}

pub struct HttpInventory {
    http: Client,
    base_url: String,
}

impl HttpInventory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn parse_medication(response: Response) -> Result<Medication, ClientError> {
        let record: MedicationRecord = response
            .json()
            .await
            .map_err(|err| ClientError::Parse(err.to_string()))?;
        Ok(Medication::try_from(record)?)
    }
}

/// Maps the service's status-code semantics onto [`ClientError`]:
/// 2xx passes through, 401/403 is terminal for the session, 5xx is a
/// transient warmup condition, any other 4xx carries a message in the body.
async fn classify(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ClientError::Auth);
    }
    if status.is_server_error() {
        return Err(ClientError::TransientServer);
    }
    let body: ApiErrorBody = response.json().await.unwrap_or_default();
    let message = body
        .text()
        .map(str::to_string)
        .unwrap_or_else(|| format!("request rejected with status {status}"));
    Err(ClientError::Operation(message))
}

#[async_trait]
impl RemoteInventory for HttpInventory {
    async fn login(&self, password: &str, remember_me: bool) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.url("/login"))
            .json(&LoginRequest {
                password: password.to_string(),
                remember_me,
            })
            .send()
            .await?;
        let response = classify(response).await?;
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Parse(err.to_string()))?;
        Ok(body.token)
    }

    async fn list_medications(&self, token: &str) -> Result<Vec<Medication>, ClientError> {
        let response = self
            .http
            .get(self.url("/medicamentos"))
            .bearer_auth(token)
            .send()
            .await?;
        let response = classify(response).await?;
        let records: Vec<MedicationRecord> = response
            .json()
            .await
            .map_err(|err| ClientError::Parse(err.to_string()))?;
        records
            .into_iter()
            .map(|record| Medication::try_from(record).map_err(ClientError::from))
            .collect()
    }

    async fn list_history(&self, token: &str) -> Result<Vec<HistoryEntry>, ClientError> {
        let response = self
            .http
            .get(self.url("/historial"))
            .bearer_auth(token)
            .send()
            .await?;
        let response = classify(response).await?;
        let records: Vec<HistoryRecord> = response
            .json()
            .await
            .map_err(|err| ClientError::Parse(err.to_string()))?;
        records
            .into_iter()
            .map(|record| HistoryEntry::try_from(record).map_err(ClientError::from))
            .collect()
    }

    async fn create_medication(
        &self,
        token: &str,
        draft: &MedicationDraft,
    ) -> Result<Medication, ClientError> {
        let response = self
            .http
            .post(self.url("/medicamentos"))
            .bearer_auth(token)
            .json(&MedicationUpsert::from(draft))
            .send()
            .await?;
        Self::parse_medication(classify(response).await?).await
    }

    async fn update_medication(
        &self,
        token: &str,
        id: &MedicationId,
        draft: &MedicationDraft,
    ) -> Result<Medication, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/medicamentos/{id}")))
            .bearer_auth(token)
            .json(&MedicationUpsert::from(draft))
            .send()
            .await?;
        Self::parse_medication(classify(response).await?).await
    }

    async fn delete_medication(&self, token: &str, id: &MedicationId) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/medicamentos/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        classify(response).await?;
        Ok(())
    }

    async fn confirm_dose(
        &self,
        token: &str,
        id: &MedicationId,
    ) -> Result<Medication, ClientError> {
        let response = self
            .http
            .post(self.url("/tomas"))
            .bearer_auth(token)
            .json(&DoseTakenRequest {
                medication_id: id.clone(),
            })
            .send()
            .await?;
        Self::parse_medication(classify(response).await?).await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
