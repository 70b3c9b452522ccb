use std::collections::BTreeMap;

use serde::Deserialize;
use routemetrics_core::error::{Result, RouteMetricsError};
use routemetrics_core::exclusion::default_excluded_paths;
use routemetrics_core::matcher::{MatchOptions, DEFAULT_UNRESOLVED_LABEL};
use routemetrics_core::observer::{ObserverOptions, DEFAULT_FAILURE_STATUS};
use routemetrics_core::registry::{default_buckets, RegistryOptions, DEFAULT_SUMMARY_WINDOW};
use routemetrics_core::template::RouteDescriptor;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub metrics: MetricsSection,

    /// Route templates used for labeling, in registration order.
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RouteMetricsError::InvalidConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.gateway.validate()?;
        self.metrics.validate()?;

        // Malformed templates are skipped at runtime, not rejected here.
        Ok(())
    }

    pub fn route_descriptors(&self) -> Vec<RouteDescriptor> {
        self.routes
            .iter()
            .map(|r| RouteDescriptor {
                template: r.template.clone(),
                defaults: r.defaults.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=600000).contains(&self.request_timeout_ms) {
            return Err(RouteMetricsError::InvalidConfig(
                "gateway.request_timeout_ms must be between 100 and 600000".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_request_timeout_ms() -> u64 {
    30000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Substrings of the full URL that disable instrumentation.
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,

    /// Histogram upper bounds in seconds.
    #[serde(default = "default_buckets")]
    pub buckets: Vec<f64>,

    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,

    #[serde(default = "default_unresolved_label")]
    pub unresolved_label: String,

    /// Status recorded for requests that end without a response.
    #[serde(default = "default_failure_status")]
    pub failure_status: u16,

    #[serde(default = "default_summary_window")]
    pub summary_window: usize,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            excluded_paths: default_excluded_paths(),
            buckets: default_buckets(),
            case_sensitive: default_case_sensitive(),
            unresolved_label: default_unresolved_label(),
            failure_status: default_failure_status(),
            summary_window: default_summary_window(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        self.registry_options().validate()?;
        if self.summary_window > 65536 {
            return Err(RouteMetricsError::InvalidConfig(
                "metrics.summary_window must be between 1 and 65536".into(),
            ));
        }
        if !(100..=599).contains(&self.failure_status) {
            return Err(RouteMetricsError::InvalidConfig(
                "metrics.failure_status must be a valid HTTP status".into(),
            ));
        }
        if self.excluded_paths.iter().any(|p| p.is_empty()) {
            return Err(RouteMetricsError::InvalidConfig(
                "metrics.excluded_paths entries must not be empty".into(),
            ));
        }
        if self.unresolved_label.trim().is_empty() {
            return Err(RouteMetricsError::InvalidConfig(
                "metrics.unresolved_label must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            buckets: self.buckets.clone(),
            summary_window: self.summary_window,
        }
    }

    pub fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            excluded_paths: self.excluded_paths.clone(),
            matcher: MatchOptions {
                case_sensitive: self.case_sensitive,
                unresolved_label: self.unresolved_label.clone(),
            },
            failure_status: self.failure_status,
        }
    }
}

fn default_case_sensitive() -> bool {
    true
}
fn default_unresolved_label() -> String {
    DEFAULT_UNRESOLVED_LABEL.into()
}
fn default_failure_status() -> u16 {
    DEFAULT_FAILURE_STATUS
}
fn default_summary_window() -> usize {
    DEFAULT_SUMMARY_WINDOW
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteEntry {
    pub template: String,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}
