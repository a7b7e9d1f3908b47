use std::time::{Duration, Instant};

use tracing::{Span, field};

use super::TraceId;

/// Root span for one query or ingestion job.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id.as_str(),
        token = field::Empty,
        base = field::Empty
    )
}

/// Child span; inherits the trace id from the current root.
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("child", name = %name, token = field::Empty, base = field::Empty)
}

/// Records the token/base pair being computed on the current span.
pub fn annotate_token(token: u32, base: u32) {
    let span = Span::current();
    span.record("token", field::display(token));
    span.record("base", field::display(base));
}

/// Runs `f` and emits a `performance` warning when it takes longer than `max`.
pub fn warn_if_slow<F, T>(label: &'static str, max: Duration, f: F) -> T
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
