//! Bootstrap sequencing.
//!
//! # Responsibilities
//! - Validate configuration
//! - Bring up storage, mail transport and the rate-limit cache, in that order
//! - Compose the HTTP application and start listening
//!
//! # Design Decisions
//! - Fail fast: the first failing step ends the sequence, nothing is retried
//! - Steps run strictly in order, never concurrently
//! - Every spawned task is handed back so the caller can cancel it

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::cache::{CacheClient, CacheError};
use crate::config::{validate_config, BridgeConfig, ConfigError};
use crate::health::ResponseRegistry;
use crate::http::{self, ServerHandle};
use crate::mail::{Mailer, MailerError};
use crate::net::listener::ListenerError;
use crate::routing::{ApiSpecification, RouteComposer, RouteContext, RouteProvider};
use crate::security::{Authenticator, RateLimit};
use crate::storage::{StorageConnection, StorageError};

use super::shutdown::Shutdown;

/// Error returned by [`Engine::start`](crate::Engine::start).
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Mailer setup failed: {0}")]
    Mailer(#[from] MailerError),

    #[error("Cache setup failed: {0}")]
    Cache(#[from] CacheError),

    #[error("HTTP server failed to start: {0}")]
    Server(#[from] ListenerError),

    #[error("Engine already started")]
    AlreadyStarted,
}

/// Handles produced by a successful bootstrap.
#[derive(Debug, Clone)]
pub struct Subsystems {
    pub storage: Arc<StorageConnection>,
    pub mailer: Arc<Mailer>,
    pub cache: Arc<CacheClient>,
    pub server: ServerHandle,
}

/// Inputs of one bootstrap run.
pub struct Bootstrap<'a> {
    pub config: &'a Arc<BridgeConfig>,
    pub providers: &'a [Arc<dyn RouteProvider>],
    pub authenticator: Arc<dyn Authenticator>,
    pub registry: Arc<ResponseRegistry>,
    /// Memoized specification; built on first composition and kept for good.
    pub specification: &'a OnceLock<Arc<ApiSpecification>>,
    pub shutdown: &'a Shutdown,
}

impl Bootstrap<'_> {
    /// Run the sequence up to and including listening. Spawned tasks are
    /// pushed onto `tasks` as they start, so they can be cancelled even when
    /// a later step fails.
    pub async fn run(
        self,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<Subsystems, BootstrapError> {
        let config = self.config;
        validate_config(config).map_err(ConfigError::Validation)?;
        let connect_timeout = Duration::from_secs(config.health.connect_timeout_secs);

        let (storage, storage_task) =
            StorageConnection::open(&config.storage, connect_timeout, self.shutdown.subscribe())?;
        tasks.push(storage_task);
        let storage = Arc::new(storage);

        let mailer = Arc::new(Mailer::new(&config.mailer)?);

        let (cache, cache_task) =
            CacheClient::connect(&config.redis, connect_timeout, self.shutdown.subscribe())?;
        tasks.push(cache_task);
        let cache = Arc::new(cache);

        let context = RouteContext {
            config: Arc::clone(config),
            storage: Arc::clone(&storage),
            mailer: Arc::clone(&mailer),
            cache: Arc::clone(&cache),
        };
        let groups: Vec<_> = self
            .providers
            .iter()
            .map(|provider| (provider.name().to_string(), provider.definitions(&context)))
            .collect();

        let specification = Arc::clone(
            self.specification
                .get_or_init(|| Arc::new(ApiSpecification::build(&config.server, &groups))),
        );
        let composer = RouteComposer::new(
            Arc::clone(&cache),
            self.authenticator,
            RateLimit::from_config(&config.rate_limit),
            config.server.max_body_size,
        );
        let app = composer.compose(groups, specification, self.registry);

        let (server, server_task) = http::serve(app, &config.server, self.shutdown.subscribe()).await?;
        tasks.push(server_task);

        Ok(Subsystems {
            storage,
            mailer,
            cache,
            server,
        })
    }
}
