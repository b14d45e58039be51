//! Create/update/delete reconciliation.
//!
//! Every mutation validates locally first (no network call on a validation
//! failure), submits with the session token, and folds the server's echo back
//! into the cache. Authorization failures invalidate the session exactly like
//! the synchronizer; any other failure leaves the cache untouched.

use shared::domain::{Medication, MedicationDraft, MedicationId};
use tracing::info;

use crate::{ClientError, ClientEvent, DashboardClient};

impl DashboardClient {
    /// Creates a medication and appends the server-returned record to the
    /// cache, then re-fetches history best-effort.
    pub async fn create_medication(
        &self,
        draft: &MedicationDraft,
    ) -> Result<Medication, ClientError> {
        draft.validate()?;
        let token = self.require_token().await?;
        let created = match self.api.create_medication(&token, draft).await {
            Ok(created) => created,
            Err(err) => return Err(self.classify_mutation_failure(err).await),
        };
        {
            let mut inner = self.inner.lock().await;
            inner.medications.push(created.clone());
            inner.generation += 1;
        }
        self.emit(ClientEvent::MedicationsUpdated);
        info!(medication = %created.name, "medication created");
        self.refresh_history_best_effort(&token).await;
        Ok(created)
    }

    /// Updates a medication by id and replaces the matching cache entry, then
    /// re-fetches history best-effort.
    pub async fn update_medication(
        &self,
        id: &MedicationId,
        draft: &MedicationDraft,
    ) -> Result<Medication, ClientError> {
        draft.validate()?;
        let token = self.require_token().await?;
        let updated = match self.api.update_medication(&token, id, draft).await {
            Ok(updated) => updated,
            Err(err) => return Err(self.classify_mutation_failure(err).await),
        };
        self.fold_medication(updated.clone()).await;
        info!(medication = %updated.name, "medication updated");
        self.refresh_history_best_effort(&token).await;
        Ok(updated)
    }

    /// Deletes a medication by id and removes exactly that entry from the
    /// cache. The caller is responsible for having asked the user first.
    pub async fn delete_medication(&self, id: &MedicationId) -> Result<(), ClientError> {
        let token = self.require_token().await?;
        if let Err(err) = self.api.delete_medication(&token, id).await {
            return Err(self.classify_mutation_failure(err).await);
        }
        {
            let mut inner = self.inner.lock().await;
            inner.medications.retain(|m| &m.id != id);
            inner.generation += 1;
        }
        self.emit(ClientEvent::MedicationsUpdated);
        info!(medication_id = %id, "medication deleted");
        Ok(())
    }

    async fn classify_mutation_failure(&self, err: ClientError) -> ClientError {
        if matches!(err, ClientError::Auth) {
            self.invalidate_session().await;
        }
        err
    }
}
