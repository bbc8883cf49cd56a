//! Company service: read queries plus the transactional mutator.
//!
//! Every mutation runs one storage transaction that holds the write, the
//! verifying re-read and the event publish:
//!
//! ```text
//! Pending ──cancelled──▶ Cancelled (nothing touched)
//!    │
//!    ▼
//! Writing ─▶ Verifying ─▶ Emitting ─▶ Committed
//!    │           │            │
//!    └───────────┴────────────┴──────▶ RolledBack
//! ```
//!
//! The event is only published while the row change is still uncommitted,
//! and a publish failure rolls that change back. The reverse is not covered:
//! if the commit itself fails after a successful publish, the event has
//! already left. Cancellation is observed only at `Pending`; once the
//! transaction is open the mutation runs to completion.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use corpreg_companies::{Company, CompanyDraft, CompanyFilter};
use corpreg_core::CompanyId;
use corpreg_events::{DomainEvent, EmitError, EventEmitter, EventName};

use crate::store::{CompanyStore, CompanyTx, StoreError};

/// Step a failure happened in; rendered as the error prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    GetCompanies,
    GetCompany,
    BeginTransaction,
    CreateCompany,
    GetCreatedCompany,
    UpdateCompany,
    GetUpdatedCompany,
    DeleteCompany,
    MarshalEvent,
    SendCreateEvent,
    SendUpdateEvent,
    SendDeleteEvent,
    CommitTransaction,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::GetCompanies => "failed to get companies",
            Stage::GetCompany => "failed to get company",
            Stage::BeginTransaction => "failed to begin transaction",
            Stage::CreateCompany => "failed to create company",
            Stage::GetCreatedCompany => "failed to get created company",
            Stage::UpdateCompany => "failed to update company",
            Stage::GetUpdatedCompany => "failed to get updated company",
            Stage::DeleteCompany => "failed to delete company",
            Stage::MarshalEvent => "failed to marshal company for event",
            Stage::SendCreateEvent => "failed to send company create event",
            Stage::SendUpdateEvent => "failed to send company update event",
            Stage::SendDeleteEvent => "failed to send company delete event",
            Stage::CommitTransaction => "failed to commit transaction",
        }
    }
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    Writing,
    Verifying,
    Emitting,
    Committed,
    RolledBack,
}

impl MutationState {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationState::Pending => "pending",
            MutationState::Writing => "writing",
            MutationState::Verifying => "verifying",
            MutationState::Emitting => "emitting",
            MutationState::Committed => "committed",
            MutationState::RolledBack => "rolled_back",
        }
    }
}

impl core::fmt::Display for MutationState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was cancelled before any work started.
    #[error("request cancelled")]
    Cancelled,

    /// Storage failed (or the addressed row was missing) at `stage`.
    #[error("{stage}: {source}")]
    Storage { stage: Stage, source: StoreError },

    /// The event log refused or failed the publish; the write was rolled back.
    #[error("{stage}: {source}")]
    Publish { stage: Stage, source: EmitError },

    #[error("{stage}: {source}")]
    Serialize {
        stage: Stage,
        source: serde_json::Error,
    },

    /// Rolling back after `original` failed too.
    #[error("rollback failed {rollback}; {original}")]
    Rollback {
        rollback: StoreError,
        original: Box<ServiceError>,
    },
}

impl ServiceError {
    fn storage(stage: Stage, source: StoreError) -> Self {
        ServiceError::Storage { stage, source }
    }

    /// Stage of the failure that caused the error (the original one for
    /// rollback failures).
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ServiceError::Cancelled => None,
            ServiceError::Storage { stage, .. }
            | ServiceError::Publish { stage, .. }
            | ServiceError::Serialize { stage, .. } => Some(*stage),
            ServiceError::Rollback { original, .. } => original.stage(),
        }
    }

    /// True when the addressed company did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::Storage {
                source: StoreError::NotFound,
                ..
            }
        )
    }
}

/// Tracks one mutation through its states, logging every transition.
struct Mutation {
    operation: &'static str,
    state: MutationState,
}

impl Mutation {
    fn start(operation: &'static str, cancel: &CancellationToken) -> Result<Self, ServiceError> {
        if cancel.is_cancelled() {
            debug!(operation, "Skipping company mutation due to ctx cancelled");
            return Err(ServiceError::Cancelled);
        }
        Ok(Self {
            operation,
            state: MutationState::Pending,
        })
    }

    fn advance(&mut self, next: MutationState) {
        debug!(
            operation = self.operation,
            from = %self.state,
            to = %next,
            "Mutation state changed"
        );
        self.state = next;
    }
}

/// Company reads and transactional writes over a store and an event emitter.
#[derive(Clone)]
pub struct CompanyService {
    store: Arc<dyn CompanyStore>,
    emitter: Arc<dyn EventEmitter>,
}

impl core::fmt::Debug for CompanyService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompanyService").finish_non_exhaustive()
    }
}

impl CompanyService {
    pub fn new(store: Arc<dyn CompanyStore>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self { store, emitter }
    }

    pub fn store(&self) -> &Arc<dyn CompanyStore> {
        &self.store
    }

    #[instrument(skip(self, cancel), err)]
    pub async fn list(
        &self,
        cancel: &CancellationToken,
        filter: &CompanyFilter,
    ) -> Result<Vec<Company>, ServiceError> {
        if cancel.is_cancelled() {
            debug!("Skipping getting companies due to ctx cancelled");
            return Err(ServiceError::Cancelled);
        }
        self.store
            .list(filter)
            .await
            .map_err(|e| ServiceError::storage(Stage::GetCompanies, e))
    }

    #[instrument(skip(self, cancel), fields(company_id = %id), err)]
    pub async fn get(
        &self,
        cancel: &CancellationToken,
        id: CompanyId,
    ) -> Result<Option<Company>, ServiceError> {
        if cancel.is_cancelled() {
            debug!("Skipping getting company due to ctx cancelled");
            return Err(ServiceError::Cancelled);
        }
        self.store
            .get(id)
            .await
            .map_err(|e| ServiceError::storage(Stage::GetCompany, e))
    }

    /// Insert, re-read and publish `company_create`. Returns the stored record.
    #[instrument(skip_all, err)]
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        draft: CompanyDraft,
    ) -> Result<Company, ServiceError> {
        let mut mutation = Mutation::start("create", cancel)?;
        let mut tx = self.begin().await?;

        let result = async {
            mutation.advance(MutationState::Writing);
            let id = tx
                .insert(&draft)
                .await
                .map_err(|e| ServiceError::storage(Stage::CreateCompany, e))?;

            mutation.advance(MutationState::Verifying);
            let company = reread(tx.as_mut(), id, Stage::GetCreatedCompany).await?;

            mutation.advance(MutationState::Emitting);
            let payload = marshal(&company)?;
            self.emit(EventName::CompanyCreated, payload, Stage::SendCreateEvent)
                .await?;
            Ok::<_, ServiceError>(company)
        }
        .await;

        self.finish(tx, mutation, result).await
    }

    /// Overwrite every field of `id`, re-read and publish `company_update`.
    #[instrument(skip(self, cancel, draft), fields(company_id = %id), err)]
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        id: CompanyId,
        draft: CompanyDraft,
    ) -> Result<Company, ServiceError> {
        let mut mutation = Mutation::start("update", cancel)?;
        let mut tx = self.begin().await?;

        let result = async {
            mutation.advance(MutationState::Writing);
            tx.update(id, &draft)
                .await
                .map_err(|e| ServiceError::storage(Stage::UpdateCompany, e))?;

            mutation.advance(MutationState::Verifying);
            let company = reread(tx.as_mut(), id, Stage::GetUpdatedCompany).await?;

            mutation.advance(MutationState::Emitting);
            let payload = marshal(&company)?;
            self.emit(EventName::CompanyUpdated, payload, Stage::SendUpdateEvent)
                .await?;
            Ok::<_, ServiceError>(company)
        }
        .await;

        self.finish(tx, mutation, result).await
    }

    /// Remove `id` and publish `company_delete` with payload `{"id": <id>}`.
    #[instrument(skip(self, cancel), fields(company_id = %id), err)]
    pub async fn delete(&self, cancel: &CancellationToken, id: CompanyId) -> Result<(), ServiceError> {
        let mut mutation = Mutation::start("delete", cancel)?;
        let mut tx = self.begin().await?;

        let result = async {
            mutation.advance(MutationState::Writing);
            tx.delete(id)
                .await
                .map_err(|e| ServiceError::storage(Stage::DeleteCompany, e))?;

            mutation.advance(MutationState::Emitting);
            let event = DomainEvent::company_deleted(id);
            self.emit(event.name, event.payload, Stage::SendDeleteEvent)
                .await?;
            Ok::<_, ServiceError>(())
        }
        .await;

        self.finish(tx, mutation, result).await
    }

    /// Close the event emitter and the storage pool. Shutdown only.
    pub async fn shutdown(&self) {
        let emitter = Arc::clone(&self.emitter);
        match tokio::task::spawn_blocking(move || emitter.close()).await {
            Ok(Ok(())) => debug!("Event emitter closed"),
            Ok(Err(e)) => warn!(error = %e, "Failed to close event emitter"),
            Err(e) => warn!(error = %e, "Event emitter close task failed"),
        }
        self.store.close().await;
    }

    async fn begin(&self) -> Result<Box<dyn CompanyTx>, ServiceError> {
        self.store.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin transaction");
            ServiceError::storage(Stage::BeginTransaction, e)
        })
    }

    /// Publish on a blocking thread; the emitter waits for the log's ack.
    async fn emit(&self, name: EventName, payload: Vec<u8>, stage: Stage) -> Result<(), ServiceError> {
        let emitter = Arc::clone(&self.emitter);
        let outcome = tokio::task::spawn_blocking(move || emitter.send_event(name, &payload)).await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ServiceError::Publish { stage, source }),
            Err(join) => Err(ServiceError::Publish {
                stage,
                source: EmitError::Connection(format!("emitter task failed: {join}")),
            }),
        }
    }

    async fn finish<T>(
        &self,
        tx: Box<dyn CompanyTx>,
        mut mutation: Mutation,
        result: Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        match result {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    mutation.advance(MutationState::Committed);
                    Ok(value)
                }
                Err(e) => {
                    error!(error = %e, operation = mutation.operation, "Failed to commit transaction");
                    mutation.advance(MutationState::RolledBack);
                    Err(ServiceError::storage(Stage::CommitTransaction, e))
                }
            },
            Err(err) => {
                warn!(error = %err, operation = mutation.operation, "Rolling back company mutation");
                let rolled_back = tx.rollback().await;
                mutation.advance(MutationState::RolledBack);
                match rolled_back {
                    Ok(()) => Err(err),
                    Err(rollback) => {
                        error!(error = %rollback, "Rollback failed");
                        Err(ServiceError::Rollback {
                            rollback,
                            original: Box::new(err),
                        })
                    }
                }
            }
        }
    }
}

async fn reread(
    tx: &mut (dyn CompanyTx + 'static),
    id: CompanyId,
    stage: Stage,
) -> Result<Company, ServiceError> {
    tx.get(id)
        .await
        .map_err(|e| ServiceError::storage(stage, e))?
        .ok_or_else(|| ServiceError::storage(stage, StoreError::NotFound))
}

fn marshal(company: &Company) -> Result<Vec<u8>, ServiceError> {
    serde_json::to_vec(company).map_err(|source| ServiceError::Serialize {
        stage: Stage::MarshalEvent,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_prefixes_error_text() {
        let err = ServiceError::storage(Stage::UpdateCompany, StoreError::NotFound);
        assert_eq!(err.to_string(), "failed to update company: company not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn rollback_failure_keeps_original_text() {
        let err = ServiceError::Rollback {
            rollback: StoreError::Connection {
                operation: "rollback",
                message: "gone".to_string(),
            },
            original: Box::new(ServiceError::Publish {
                stage: Stage::SendCreateEvent,
                source: EmitError::Closed,
            }),
        };
        assert_eq!(
            err.to_string(),
            "rollback failed connection error in rollback: gone; \
             failed to send company create event: event emitter is closed"
        );
        assert_eq!(err.stage(), Some(Stage::SendCreateEvent));
    }

    #[test]
    fn cancelled_token_stops_at_pending() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            Mutation::start("create", &token),
            Err(ServiceError::Cancelled)
        ));
    }
}
