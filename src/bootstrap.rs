//! # Bootstrap
//!
//! Wires configuration, the injected catalog and tasking backend, the order
//! store and the event publisher into one [`StapiSystem`].

use crate::backend::TaskingBackend;
use crate::catalog::Catalog;
use crate::config::{ConfigManager, StapiConfig};
use crate::error::StapiResult;
use crate::events::EventPublisher;
use crate::fulfillment::FulfillmentCoordinator;
use crate::search::OpportunitySearchEngine;
use crate::state_machine::{InMemoryOrderStore, OrderStateMachine, OrderStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// A fully wired core. Components share the catalog, backend, store and
/// publisher they were built with.
pub struct StapiSystem {
    pub config: StapiConfig,
    pub catalog: Arc<dyn Catalog>,
    pub backend: Arc<dyn TaskingBackend>,
    pub store: Arc<dyn OrderStore>,
    pub event_publisher: EventPublisher,
    pub search: Arc<OpportunitySearchEngine>,
    pub orders: Arc<OrderStateMachine>,
    pub fulfillment: Arc<FulfillmentCoordinator>,
}

/// Snapshot of how a system was assembled
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub environment: String,
    pub backend: String,
    pub mid_flight_cancel: bool,
    pub event_subscribers: usize,
}

impl StapiSystem {
    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            environment: self.config.environment.clone(),
            backend: self.backend.name().to_string(),
            mid_flight_cancel: self.backend.capabilities().supports_mid_flight_cancel,
            event_subscribers: self.event_publisher.subscriber_count(),
        }
    }
}

/// Bootstrap options. `None` means auto-detect.
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    pub config_directory: Option<PathBuf>,
    pub environment_override: Option<String>,
}

pub struct StapiBootstrap;

impl StapiBootstrap {
    /// Load configuration from disk and the environment, then wire the system
    /// with an in-memory order store.
    pub fn bootstrap(
        options: BootstrapConfig,
        catalog: Arc<dyn Catalog>,
        backend: Arc<dyn TaskingBackend>,
    ) -> StapiResult<StapiSystem> {
        let manager = match options.environment_override {
            Some(environment) => {
                ConfigManager::load_from_directory_with_env(options.config_directory, &environment)?
            }
            None => ConfigManager::load_from_directory(options.config_directory)?,
        };
        Ok(Self::from_config(
            manager.config().clone(),
            catalog,
            backend,
            Arc::new(InMemoryOrderStore::new()),
        ))
    }

    /// Wire a system from an already-loaded configuration.
    pub fn from_config(
        config: StapiConfig,
        catalog: Arc<dyn Catalog>,
        backend: Arc<dyn TaskingBackend>,
        store: Arc<dyn OrderStore>,
    ) -> StapiSystem {
        let event_publisher = EventPublisher::new(config.events.channel_capacity);
        let capabilities = backend.capabilities();

        let search = Arc::new(
            OpportunitySearchEngine::new(catalog.clone(), backend.clone())
                .with_pagination(config.search),
        );
        let orders = Arc::new(
            OrderStateMachine::new(
                catalog.clone(),
                store.clone(),
                event_publisher.clone(),
                capabilities,
            )
            .with_pagination(config.orders),
        );
        let fulfillment = Arc::new(FulfillmentCoordinator::new(orders.clone(), backend.clone()));

        info!(
            environment = %config.environment,
            backend = %backend.name(),
            mid_flight_cancel = capabilities.supports_mid_flight_cancel,
            "🚀 BOOTSTRAP: STAPI core ready"
        );

        StapiSystem {
            config,
            catalog,
            backend,
            store,
            event_publisher,
            search,
            orders,
            fulfillment,
        }
    }

    /// Defaults plus an in-memory store. Intended for tests and demos.
    pub fn in_memory(catalog: Arc<dyn Catalog>, backend: Arc<dyn TaskingBackend>) -> StapiSystem {
        Self::from_config(
            StapiConfig {
                environment: "test".to_string(),
                ..StapiConfig::default()
            },
            catalog,
            backend,
            Arc::new(InMemoryOrderStore::new()),
        )
    }
}
