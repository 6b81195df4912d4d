use serde_json::Value;

use super::BulkAllowance;
use crate::error::{Error, PlatformErrorDetails, Result};

/// Check a bulk job result (a list of batch infos) against the allowances.
///
/// A batch counts as failed when its `state` is `Failed`. Record counts come
/// from `numberRecordsFailed`, which the bulk API reports as a string.
pub fn check_bulk_result(operation: &str, result: &Value, allowance: BulkAllowance) -> Result<()> {
    let batches: &[Value] = match result {
        Value::Array(items) => items,
        _ => std::slice::from_ref(result),
    };

    let failed_batches = batches
        .iter()
        .filter(|batch| batch.get("state").and_then(Value::as_str) == Some("Failed"))
        .count() as f64;
    let failed_records: f64 = batches
        .iter()
        .filter_map(|batch| batch.get("numberRecordsFailed"))
        .map(count_value)
        .sum();

    let mut problems = Vec::new();
    if let Some(limit) = allowance.failed_batches {
        if failed_batches > limit {
            problems.push(format!("{} failed batch(es), allowed {}", failed_batches, limit));
        }
    }
    if let Some(limit) = allowance.failed_records {
        if failed_records > limit {
            problems.push(format!("{} failed record(s), allowed {}", failed_records, limit));
        }
    }

    if problems.is_empty() {
        return Ok(());
    }

    Err(Error::platform_command_failed(
        format!("Bulk {} exceeded failure allowance: {}", operation, problems.join(", ")),
        PlatformErrorDetails {
            name: "BulkFailureAllowanceExceeded".to_string(),
            command: Some(format!("force:data:bulk:{}", operation)),
            summary: Some(result.clone()),
            ..Default::default()
        },
    ))
}

fn count_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
