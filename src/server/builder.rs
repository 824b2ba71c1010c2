//! ServerBuilder for fluent API to build the HTTP server

use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::router::build_ledger_routes;
use crate::config::{FynnessConfig, LedgerSettings};
use crate::core::events::EventBus;
use crate::core::store::LedgerStore;
use crate::ledger::LedgerService;
use crate::ledger::handlers::AppState;

/// Builder for the ledger HTTP server
///
/// # Example
///
/// ```rust,ignore
/// let app = ServerBuilder::new()
///     .with_store(InMemoryLedgerStore::new())
///     .with_event_bus(1024)
///     .build()?;
/// ```
pub struct ServerBuilder {
    store: Option<Arc<dyn LedgerStore>>,
    settings: LedgerSettings,
    custom_routes: Vec<Router>,
    event_bus: Option<EventBus>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            store: None,
            settings: LedgerSettings::default(),
            custom_routes: Vec::new(),
            event_bus: None,
        }
    }

    /// Settings and event bus capacity taken from a loaded configuration
    pub fn from_config(config: &FynnessConfig) -> Self {
        Self::new()
            .with_settings(config.ledger.clone())
            .with_event_bus(config.ledger.event_capacity)
    }

    /// Set the storage backend (required)
    pub fn with_store(self, store: impl LedgerStore + 'static) -> Self {
        self.with_shared_store(Arc::new(store))
    }

    /// Set a storage backend that is also used elsewhere
    pub fn with_shared_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_settings(mut self, settings: LedgerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add custom routes to the server
    ///
    /// Merged after the ledger routes, they share the tracing layer.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Enable the event bus; committed mutations are published on it
    ///
    /// # Arguments
    ///
    /// * `capacity` - Buffer size for the broadcast channel (recommended: 1024)
    pub fn with_event_bus(mut self, capacity: usize) -> Self {
        self.event_bus = Some(EventBus::new(capacity));
        self
    }

    /// The event bus, when enabled, so callers can subscribe before serving
    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }

    /// Build the ledger service the routes delegate to
    pub fn build_service(&mut self) -> Result<LedgerService> {
        let store = self
            .store
            .clone()
            .ok_or_else(|| anyhow::anyhow!("A ledger store is required. Call .with_store()"))?;

        let mut service = LedgerService::new(store, self.settings.clone());
        if let Some(bus) = self.event_bus.clone() {
            service = service.with_event_bus(bus);
        }
        Ok(service)
    }

    /// Build the final router
    pub fn build(mut self) -> Result<Router> {
        let service = self.build_service()?;
        tracing::debug!(storage = service.backend(), "building ledger router");

        let mut app = build_ledger_routes(AppState::new(service));
        for custom_router in std::mem::take(&mut self.custom_routes) {
            app = app.merge(custom_router);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
