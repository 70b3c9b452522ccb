//! Shared application state for the routemetrics gateway.
//!
//! Owns the process-wide metric registry (created once here, dropped at
//! shutdown) and the compiled route table. Handlers and middleware receive it
//! through axum `State`; there is no global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use routemetrics_core::error::Result;
use routemetrics_core::{compile_routes, ExpositionNames, MetricRegistry, RequestObserver, RouteTemplate};

use crate::config::GatewayConfig;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    observer: RequestObserver,
}

struct AppStateInner {
    cfg: GatewayConfig,
    routes: Arc<[RouteTemplate]>,
    names: ExpositionNames,
    draining: AtomicBool,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        // 1) Registry (validated bucket ladder / window)
        let registry = Arc::new(MetricRegistry::new(cfg.metrics.registry_options())?);

        // 2) Route table, malformed descriptors dropped with a warning
        let descriptors = cfg.route_descriptors();
        let routes: Arc<[RouteTemplate]> = compile_routes(&descriptors).into();
        if routes.len() != descriptors.len() {
            tracing::warn!(
                configured = descriptors.len(),
                usable = routes.len(),
                "some route templates were skipped"
            );
        }

        let observer = RequestObserver::new(registry, cfg.metrics.observer_options());

        tracing::info!(routes = routes.len(), "metrics state ready");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                routes,
                names: ExpositionNames::default(),
                draining: AtomicBool::new(false),
            }),
            observer,
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn routes(&self) -> &[RouteTemplate] {
        &self.inner.routes
    }

    pub fn observer(&self) -> &RequestObserver {
        &self.observer
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        self.observer.registry()
    }

    pub fn exposition_names(&self) -> &ExpositionNames {
        &self.inner.names
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.cfg.gateway.request_timeout_ms)
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }
}
