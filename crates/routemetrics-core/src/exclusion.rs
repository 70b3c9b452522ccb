//! Exclusion gate (which requests are not instrumented at all).
//!
//! Matching is plain case-sensitive substring containment against the full
//! display URL, so `/health` also excludes `/healthz` and `/api/health/db`.

/// Swagger/docs, health probes and the scrape endpoint itself.
pub const DEFAULT_EXCLUDED_PATHS: [&str; 3] = ["/swagger", "/health", "/metrics"];

pub fn default_excluded_paths() -> Vec<String> {
    DEFAULT_EXCLUDED_PATHS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    excluded: Vec<String>,
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self::new(default_excluded_paths())
    }
}

impl ExclusionFilter {
    /// Entries are used as given. An empty entry is contained in every URL
    /// and so excludes everything; config validation rejects it upstream.
    pub fn new(excluded: Vec<String>) -> Self {
        Self { excluded }
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.excluded.iter().any(|needle| url.contains(needle.as_str()))
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }
}
