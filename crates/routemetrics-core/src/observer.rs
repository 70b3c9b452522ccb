//! Per-request instrumentation lifecycle.
//!
//! `Idle -> InProgress -> Completed{Success|Error}`. `begin` moves a request
//! into `InProgress` (gauge +1, timer started) and hands back an
//! [`Observation`] guard. The guard completes exactly once: explicitly through
//! `finish`, or from `Drop` when the handler panicked or its future was
//! dropped, in which case the configured failure status is recorded.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::exclusion::{default_excluded_paths, ExclusionFilter};
use crate::matcher::{MatchOptions, RouteTemplateMatcher};
use crate::registry::{MetricRegistry, RouteSeries};
use crate::template::RouteTemplate;

/// The only status counted as success.
pub const SUCCESS_STATUS: u16 = 200;

/// Status recorded when a request ends without a response.
pub const DEFAULT_FAILURE_STATUS: u16 = 500;

/// Anything that carries an HTTP status code.
pub trait StatusSource {
    fn status_code(&self) -> u16;
}

impl StatusSource for u16 {
    fn status_code(&self) -> u16 {
        *self
    }
}

impl StatusSource for http::StatusCode {
    fn status_code(&self) -> u16 {
        self.as_u16()
    }
}

impl<B> StatusSource for http::Response<B> {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

/// Terminal classification of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error { code: u16 },
}

impl Outcome {
    pub fn from_status(code: u16) -> Self {
        if code == SUCCESS_STATUS {
            Outcome::Success
        } else {
            Outcome::Error { code }
        }
    }
}

/// What the observer needs to know about an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestMeta<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Full display URL, checked against the exclusion list.
    pub url: &'a str,
}

#[derive(Debug, Clone)]
pub struct ObserverOptions {
    pub excluded_paths: Vec<String>,
    pub matcher: MatchOptions,
    pub failure_status: u16,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            excluded_paths: default_excluded_paths(),
            matcher: MatchOptions::default(),
            failure_status: DEFAULT_FAILURE_STATUS,
        }
    }
}

/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct RequestObserver {
    inner: Arc<ObserverInner>,
}

struct ObserverInner {
    registry: Arc<MetricRegistry>,
    filter: ExclusionFilter,
    matcher: RouteTemplateMatcher,
    failure_status: u16,
}

impl RequestObserver {
    pub fn new(registry: Arc<MetricRegistry>, opts: ObserverOptions) -> Self {
        Self {
            inner: Arc::new(ObserverInner {
                registry,
                filter: ExclusionFilter::new(opts.excluded_paths),
                matcher: RouteTemplateMatcher::new(opts.matcher),
                failure_status: opts.failure_status,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.inner.registry
    }

    pub fn matcher(&self) -> &RouteTemplateMatcher {
        &self.inner.matcher
    }

    /// Start instrumenting a request. `None` means excluded: nothing was
    /// touched and nothing will be.
    pub fn begin(&self, req: &RequestMeta<'_>, routes: &[RouteTemplate]) -> Option<Observation> {
        if self.inner.filter.is_excluded(req.url) {
            tracing::trace!(url = %req.url, "request excluded from metrics");
            return None;
        }

        let label = self.inner.matcher.resolve(req.method, req.path, routes);
        let series = self.inner.registry.series_for(&label);
        series.in_progress_inc();

        Some(Observation {
            series,
            started: Instant::now(),
            failure_status: self.inner.failure_status,
            finished: false,
        })
    }

    /// Instrument an async handler. The handler's result is returned as is;
    /// `Ok` is classified by its status, `Err` always counts as an error with
    /// the status the failure carries.
    pub async fn observe<Fut, T, E>(
        &self,
        req: &RequestMeta<'_>,
        routes: &[RouteTemplate],
        handler: Fut,
    ) -> std::result::Result<T, E>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
        T: StatusSource,
        E: StatusSource,
    {
        let Some(obs) = self.begin(req, routes) else {
            return handler.await;
        };
        let result = handler.await;
        obs.finish(classify(&result));
        result
    }

    /// Blocking counterpart of [`observe`](Self::observe).
    pub fn observe_blocking<F, T, E>(
        &self,
        req: &RequestMeta<'_>,
        routes: &[RouteTemplate],
        handler: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        T: StatusSource,
        E: StatusSource,
    {
        let Some(obs) = self.begin(req, routes) else {
            return handler();
        };
        let result = handler();
        obs.finish(classify(&result));
        result
    }
}

fn classify<T: StatusSource, E: StatusSource>(result: &std::result::Result<T, E>) -> Outcome {
    match result {
        Ok(v) => Outcome::from_status(v.status_code()),
        Err(e) => Outcome::Error { code: e.status_code() },
    }
}

/// In-progress request. Completes exactly once.
#[must_use = "dropping an Observation records the request as failed"]
pub struct Observation {
    series: Arc<RouteSeries>,
    started: Instant,
    failure_status: u16,
    finished: bool,
}

impl Observation {
    pub fn label(&self) -> &str {
        self.series.label()
    }

    pub fn finish(mut self, outcome: Outcome) -> Outcome {
        self.complete(outcome);
        outcome
    }

    pub fn finish_status(self, code: u16) -> Outcome {
        self.finish(Outcome::from_status(code))
    }

    fn complete(&mut self, outcome: Outcome) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.series.observe_duration(self.started.elapsed());
        self.series.in_progress_dec();
        match outcome {
            Outcome::Success => self.series.record_success(),
            Outcome::Error { code } => self.series.record_error(code),
        }
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                label = %self.series.label(),
                status = self.failure_status,
                "request ended without a response"
            );
            self.complete(Outcome::Error { code: self.failure_status });
        }
    }
}
