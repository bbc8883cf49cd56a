//! Infrastructure wiring: picks the store, event emitter and region lookup
//! for the configured mode and hands handlers an `AppState`.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use corpreg_auth::{ActionGate, HmacTokenVerifier, TokenVerifier};
use corpreg_events::{EventEmitter, RecordingEmitter};
use corpreg_infra::{
    CompanyService, CompanyStore, InMemoryCompanyStore, PostgresCompanyStore,
    event_log::RedisStreamsEmitter, region::IpApiClient,
};

use crate::config::Config;

/// Capabilities shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub companies: CompanyService,
    pub tokens: Arc<dyn TokenVerifier>,
    pub gate: ActionGate,
    /// Skip region approval (caller identity is still verified).
    pub dev_mode: bool,
}

impl AppState {
    pub fn new(
        companies: CompanyService,
        tokens: Arc<dyn TokenVerifier>,
        gate: ActionGate,
        dev_mode: bool,
    ) -> Self {
        Self {
            companies,
            tokens,
            gate,
            dev_mode,
        }
    }
}

/// Build the application state for `config`.
///
/// - `USE_PERSISTENT_STORES=true`: Postgres store + Redis Streams emitter.
/// - otherwise: in-memory store + in-memory emitter (nothing leaves the process).
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let (store, emitter): (Arc<dyn CompanyStore>, Arc<dyn EventEmitter>) =
        if config.use_persistent_stores {
            persistent_backends(config).await?
        } else {
            warn!("USE_PERSISTENT_STORES is off; companies and events are kept in memory");
            (
                Arc::new(InMemoryCompanyStore::new()),
                Arc::new(RecordingEmitter::new()),
            )
        };

    let lookup = IpApiClient::new(config.ipapi_base_url.clone(), config.ipapi_request_timeout)
        .context("failed to build region lookup client")?;
    let gate = ActionGate::new(Arc::new(lookup), config.allowed_country.clone());
    let tokens = Arc::new(HmacTokenVerifier::new(config.jwt_secret.as_bytes()));

    Ok(AppState::new(
        CompanyService::new(store, emitter),
        tokens,
        gate,
        config.dev_mode,
    ))
}

async fn persistent_backends(
    config: &Config,
) -> anyhow::Result<(Arc<dyn CompanyStore>, Arc<dyn EventEmitter>)> {
    let postgres = config
        .postgres
        .as_ref()
        .context("POSTGRES_* settings are required when USE_PERSISTENT_STORES=true")?;
    let store = PostgresCompanyStore::connect(&postgres.options())
        .await
        .context("failed to connect to postgres")?;
    info!(host = %postgres.host, database = %postgres.database, "postgres connected");

    let redis_url = config
        .events
        .redis_url
        .clone()
        .context("EVENTS_REDIS_URL is required when USE_PERSISTENT_STORES=true")?;
    let stream = config.events.stream.clone();
    let timeout = config.events.write_timeout;
    let emitter = tokio::task::spawn_blocking(move || {
        RedisStreamsEmitter::connect(redis_url, stream, timeout)
    })
    .await
    .context("event log connect task failed")?
    .context("failed to connect to event log")?;
    info!(stream = %emitter.stream_key(), "event log connected");

    Ok((Arc::new(store), Arc::new(emitter)))
}
