//! routemetrics core: route-template labeling and per-label request metrics.
//!
//! Given an already-dispatched request and the host's route templates, this
//! crate resolves a stable low-cardinality label (`GET /users/{id}`) and
//! updates the shared series for that label exactly once per request. It
//! carries no transport or runtime dependencies; hosts drive it through
//! [`RequestObserver`].
//!
//! ```text
//! RequestObserver::begin
//!   ├── ExclusionFilter      ← skip health/docs/scrape URLs entirely
//!   ├── RouteTemplateMatcher ← first matching template, else sentinel
//!   ├── MetricRegistry       ← lazily created RouteSeries per label
//!   └── Observation          ← gauge/timer guard, completes exactly once
//! ```
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied outside tests. Metric
//! bookkeeping is best effort and never fails a request.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod error;
pub mod exclusion;
pub mod exposition;
pub mod matcher;
pub mod observer;
pub mod registry;
pub mod template;

/// Shared result type.
pub use error::{Result, RouteMetricsError};
pub use exclusion::ExclusionFilter;
pub use exposition::{render_prometheus, ExpositionNames};
pub use matcher::{label_method, MatchOptions, RouteTemplateMatcher, OTHER_METHOD};
pub use observer::{Observation, ObserverOptions, Outcome, RequestMeta, RequestObserver, StatusSource};
pub use registry::{MetricRegistry, RegistryOptions, RouteSeries, SeriesSnapshot};
pub use template::{compile_routes, RouteDescriptor, RouteTemplate, TemplateSegment};
