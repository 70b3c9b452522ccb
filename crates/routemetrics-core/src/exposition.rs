//! Prometheus text exposition of registry snapshots.
//!
//! The exporter reads; it never mutates series. Every family uses the label
//! name `method` for the full `"{METHOD} {template}"` label.

use std::fmt::Write;

use crate::registry::{MetricRegistry, SeriesSnapshot};

/// Metric family names.
#[derive(Debug, Clone)]
pub struct ExpositionNames {
    pub success: String,
    pub errors: String,
    pub in_progress: String,
    pub duration: String,
}

impl Default for ExpositionNames {
    fn default() -> Self {
        Self {
            success: "server_request_success_total".into(),
            errors: "server_request_error_total".into(),
            in_progress: "server_request_in_progress".into(),
            duration: "server_request_duration_seconds".into(),
        }
    }
}

/// Escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Render every series in Prometheus text format (version 0.0.4).
pub fn render_prometheus(registry: &MetricRegistry, names: &ExpositionNames) -> String {
    let snaps = registry.snapshot();
    let mut out = String::new();

    let _ = writeln!(out, "# HELP {} Number of successfully processed requests.", names.success);
    let _ = writeln!(out, "# TYPE {} counter", names.success);
    for s in &snaps {
        let _ = writeln!(out, "{}{{method=\"{}\"}} {}", names.success, escape_label(&s.label), s.success);
    }

    let _ = writeln!(out, "# HELP {} Number of unsuccessfully processed requests.", names.errors);
    let _ = writeln!(out, "# TYPE {} counter", names.errors);
    for s in &snaps {
        for (code, count) in &s.errors {
            let _ = writeln!(
                out,
                "{}{{method=\"{}\",code_error=\"{}\"}} {}",
                names.errors,
                escape_label(&s.label),
                code,
                count
            );
        }
    }

    let _ = writeln!(out, "# HELP {} Number of ongoing requests.", names.in_progress);
    let _ = writeln!(out, "# TYPE {} gauge", names.in_progress);
    for s in &snaps {
        let _ = writeln!(out, "{}{{method=\"{}\"}} {}", names.in_progress, escape_label(&s.label), s.in_progress);
    }

    let _ = writeln!(out, "# HELP {} Histogram of request duration in seconds.", names.duration);
    let _ = writeln!(out, "# TYPE {} histogram", names.duration);
    for s in &snaps {
        render_histogram(&names.duration, s, &mut out);
    }

    let window = format!("{}_window", names.duration);
    let _ = writeln!(out, "# HELP {window} Request duration quantiles over the most recent requests.");
    let _ = writeln!(out, "# TYPE {window} summary");
    for s in &snaps {
        let label = escape_label(&s.label);
        for (q, v) in [("0.5", s.window.p50), ("0.9", s.window.p90), ("0.99", s.window.p99)] {
            let _ = writeln!(out, "{window}{{method=\"{label}\",quantile=\"{q}\"}} {v}");
        }
        let _ = writeln!(out, "{window}_sum{{method=\"{label}\"}} {}", s.window.sum);
        let _ = writeln!(out, "{window}_count{{method=\"{label}\"}} {}", s.window.count);
    }

    out
}

fn render_histogram(name: &str, s: &SeriesSnapshot, out: &mut String) {
    let label = escape_label(&s.label);
    for (le, count) in s.duration.bounds.iter().zip(&s.duration.cumulative) {
        let _ = writeln!(out, "{name}_bucket{{method=\"{label}\",le=\"{le}\"}} {count}");
    }
    let _ = writeln!(out, "{name}_bucket{{method=\"{label}\",le=\"+Inf\"}} {}", s.duration.count);
    let _ = writeln!(out, "{name}_sum{{method=\"{label}\"}} {}", s.duration.sum_seconds);
    let _ = writeln!(out, "{name}_count{{method=\"{label}\"}} {}", s.duration.count);
}
