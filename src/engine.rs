//! Runtime supervisor.
//!
//! The [`Engine`] owns the configuration, the response registry and every
//! background task. `start` brings the subsystems up in order and arms the
//! health reporter and the registry sweep; `shutdown` (or dropping the
//! engine) tears them down again.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cache::CacheClient;
use crate::config::BridgeConfig;
use crate::health::{
    spawn_sweeper, DatabaseProbe, HealthReporter, LogSink, ReportSink, ResponseRegistry, ServerProbe,
};
use crate::http::ServerHandle;
use crate::lifecycle::{Bootstrap, BootstrapError, Shutdown, Subsystems};
use crate::mail::Mailer;
use crate::routing::{ApiSpecification, RouteProvider};
use crate::security::{ApiKeyAuthenticator, Authenticator};
use crate::storage::StorageConnection;

pub struct Engine {
    config: Arc<BridgeConfig>,
    providers: Vec<Arc<dyn RouteProvider>>,
    authenticator: Arc<dyn Authenticator>,
    sink: Arc<dyn ReportSink>,
    registry: Arc<ResponseRegistry>,
    specification: OnceLock<Arc<ApiSpecification>>,
    shutdown: Shutdown,
    started: bool,
    subsystems: Option<Subsystems>,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    pub fn new(config: BridgeConfig) -> Self {
        let authenticator = Arc::new(ApiKeyAuthenticator::from_config(&config.auth));
        Self {
            config: Arc::new(config),
            providers: Vec::new(),
            authenticator,
            sink: Arc::new(LogSink),
            registry: Arc::new(ResponseRegistry::new()),
            specification: OnceLock::new(),
            shutdown: Shutdown::new(),
            started: false,
            subsystems: None,
            tasks: Vec::new(),
        }
    }

    /// Add a route group. Groups are composed in registration order.
    pub fn with_routes(mut self, provider: impl RouteProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn with_authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }

    /// Replace the default log sink for health reports.
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Bootstrap every subsystem, start listening and arm the timers.
    ///
    /// On failure every task spawned so far is cancelled and the first error
    /// is returned. An engine starts at most once.
    pub async fn start(&mut self) -> Result<(), BootstrapError> {
        if self.started {
            return Err(BootstrapError::AlreadyStarted);
        }
        self.started = true;
        crate::health::process::mark_process_start();

        tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting bridge engine");

        let bootstrap = Bootstrap {
            config: &self.config,
            providers: &self.providers,
            authenticator: Arc::clone(&self.authenticator),
            registry: Arc::clone(&self.registry),
            specification: &self.specification,
            shutdown: &self.shutdown,
        };
        let subsystems = match bootstrap.run(&mut self.tasks).await {
            Ok(subsystems) => subsystems,
            Err(e) => {
                tracing::error!(error = %e, "Bootstrap failed");
                self.shutdown.trigger();
                self.abort_tasks();
                return Err(e);
            }
        };

        let health = &self.config.health;
        let reporter = HealthReporter::new(
            Arc::new(subsystems.server.clone()) as Arc<dyn ServerProbe>,
            Arc::clone(&subsystems.storage) as Arc<dyn DatabaseProbe>,
            Arc::clone(&self.registry),
            Arc::clone(&self.sink),
        );
        self.tasks.push(tokio::spawn(reporter.run(
            Duration::from_secs(health.report_interval_secs),
            self.shutdown.subscribe(),
        )));
        self.tasks.push(spawn_sweeper(
            Arc::clone(&self.registry),
            Duration::from_secs(health.sweep_interval_secs),
            self.shutdown.subscribe(),
        ));

        tracing::info!(address = %subsystems.server.local_addr(), "Bridge engine started");
        self.subsystems = Some(subsystems);
        Ok(())
    }

    /// Stop accepting, drain in-flight connections, then cancel every task.
    pub async fn shutdown(&mut self) {
        if !self.shutdown.trigger() {
            return;
        }
        tracing::info!(pending_responses = self.registry.count(), "Shutting down bridge engine");

        if let Some(server) = self.server() {
            let timeout = Duration::from_secs(self.config.server.drain_timeout_secs);
            if !server.drain(timeout).await {
                tracing::warn!(
                    remaining = server.active_connections(),
                    "Drain timeout elapsed, closing remaining connections"
                );
            }
        }

        self.abort_tasks();
        tracing::info!("Shutdown complete");
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ResponseRegistry> {
        &self.registry
    }

    /// The API specification served at `GET /`, once composed.
    pub fn specification(&self) -> Option<Arc<ApiSpecification>> {
        self.specification.get().cloned()
    }

    pub fn storage(&self) -> Option<&Arc<StorageConnection>> {
        self.subsystems.as_ref().map(|s| &s.storage)
    }

    pub fn mailer(&self) -> Option<&Arc<Mailer>> {
        self.subsystems.as_ref().map(|s| &s.mailer)
    }

    pub fn cache(&self) -> Option<&Arc<CacheClient>> {
        self.subsystems.as_ref().map(|s| &s.cache)
    }

    pub fn server(&self) -> Option<&ServerHandle> {
        self.subsystems.as_ref().map(|s| &s.server)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server().map(ServerHandle::local_addr)
    }

    /// Number of background tasks still owned by the engine.
    pub fn task_count(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown.trigger();
        self.abort_tasks();
    }
}
