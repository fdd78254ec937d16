//! Shared metrics recording for `SQLite` backends.

use std::time::Instant;

/// Records operation metrics for storage operations.
///
/// Emits `storage_operations_total` (counter by status) and
/// `storage_operation_duration_ms` (latency histogram).
///
/// # Examples
///
/// ```ignore
/// use std::time::Instant;
/// use agentlore::storage::sqlite::record_operation_metrics;
///
/// let start = Instant::now();
/// let result = backend.get_node(&id);
/// let status = if result.is_ok() { "success" } else { "error" };
/// record_operation_metrics("sqlite_graph", "get_node", start, status);
/// ```
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Maps a result to the status label used by [`record_operation_metrics`].
#[must_use]
pub const fn status_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation_metrics_without_recorder() {
        // No recorder installed: the facade must be a no-op.
        let start = Instant::now();
        record_operation_metrics("sqlite_learning", "record_execution", start, "success");
        record_operation_metrics("sqlite_learning", "record_execution", start, "error");
    }

    #[test]
    fn test_status_label() {
        let ok: Result<(), ()> = Ok(());
        let err: Result<(), ()> = Err(());
        assert_eq!(status_label(&ok), "success");
        assert_eq!(status_label(&err), "error");
    }
}
