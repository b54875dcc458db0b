//! Bulk executor backed by a Cosmos DB container
//!
//! Each micro-batch is sent as individual item requests with bounded
//! concurrency. Results come back in submission order. Failed requests are
//! mapped from the HTTP response carried by the SDK error; the message text
//! is only consulted when no response is attached.

use super::client::CosmosDbClient;
use crate::core::bulk::{
    BulkExecutionOptions, BulkExecutor, ExecutorError, ItemOperation, ItemResponse, ItemResult,
    OperationKind, PartitionKeyValue,
};
use crate::domain::{BulkError, CosmosDbError, Result};
use async_trait::async_trait;
use azure_core::error::ErrorKind;
use azure_core::http::headers::{HeaderName, Headers};
use azure_data_cosmos::PartitionKey;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_CHARGE: &str = "x-ms-request-charge";
const RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";

/// Status codes recognised in SDK error messages
const KNOWN_STATUS_CODES: [u16; 13] = [
    400, 401, 403, 404, 408, 409, 410, 412, 413, 429, 449, 500, 503,
];

/// Executes item operations against the configured container
pub struct CosmosBulkExecutor {
    client: Arc<CosmosDbClient>,
    max_concurrency: usize,
    request_timeout: Duration,
}

impl CosmosBulkExecutor {
    pub fn new(client: Arc<CosmosDbClient>) -> Self {
        let config = client.config();
        let max_concurrency = config.max_concurrency.max(1);
        let request_timeout = Duration::from_secs(config.request_timeout_seconds);
        Self {
            client,
            max_concurrency,
            request_timeout,
        }
    }

    async fn execute_one(&self, operation: &ItemOperation) -> ItemResult {
        let container = self.client.container();
        let partition_key = cosmos_partition_key(operation.partition_key())?;

        let request = async {
            match operation.kind() {
                OperationKind::Create => container
                    .create_item(partition_key, operation.document(), None)
                    .await
                    .map(|response| request_charge(response.headers())),
                OperationKind::Upsert => container
                    .upsert_item(partition_key, operation.document(), None)
                    .await
                    .map(|response| request_charge(response.headers())),
                OperationKind::Delete => container
                    .delete_item(partition_key, operation.id(), None)
                    .await
                    .map(|response| request_charge(response.headers())),
            }
        };

        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(charge)) => {
                Ok(ItemResponse::with_status(success_status(operation.kind())).charge(charge))
            }
            Ok(Err(e)) => Err(map_sdk_error(&e)),
            Err(_) => Err(ExecutorError::service(
                408,
                format!("request timed out after {:?}", self.request_timeout),
            )),
        }
    }
}

#[async_trait]
impl BulkExecutor for CosmosBulkExecutor {
    async fn execute(
        &self,
        operations: &[ItemOperation],
        options: &BulkExecutionOptions,
    ) -> Vec<ItemResult> {
        let requests: Vec<_> = operations
            .iter()
            .map(|operation| self.execute_one(operation).boxed())
            .collect();
        let results: Vec<ItemResult> = stream::iter(requests)
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let throttled = results
            .iter()
            .filter(|result| status_of(result) == Some(429))
            .count();

        if throttled > 0 {
            options.shrink();
            tracing::debug!(
                throttled,
                batch = operations.len(),
                micro_batch_size = options.micro_batch_size(),
                "Throttled, shrinking micro-batch"
            );
        } else {
            options.grow();
        }

        results
    }
}

fn status_of(result: &ItemResult) -> Option<u16> {
    match result {
        Ok(response) => Some(response.status_code),
        Err(e) => e.status_code(),
    }
}

fn success_status(kind: OperationKind) -> u16 {
    match kind {
        OperationKind::Create => 201,
        OperationKind::Upsert => 200,
        OperationKind::Delete => 204,
    }
}

/// Converts a partition key into the SDK's typed key
///
/// Integers that fit `i64` or `u64` are sent as integers, other numbers as
/// floating point.
fn cosmos_partition_key(
    value: &PartitionKeyValue,
) -> std::result::Result<PartitionKey, ExecutorError> {
    match value {
        PartitionKeyValue::String(s) => Ok(PartitionKey::from(s.clone())),
        PartitionKeyValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(PartitionKey::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(PartitionKey::from(u))
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => Ok(PartitionKey::from(f)),
                    _ => Err(ExecutorError::service(
                        400,
                        format!("unsupported numeric partition key: {n}"),
                    )),
                }
            }
        }
    }
}

fn request_charge(headers: &Headers) -> f64 {
    headers
        .get_optional_str(&HeaderName::from_static(REQUEST_CHARGE))
        .and_then(|value| value.parse().ok())
        .unwrap_or(0.0)
}

fn retry_after(headers: &Headers) -> Option<Duration> {
    headers
        .get_optional_str(&HeaderName::from_static(RETRY_AFTER_MS))
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| Duration::from_micros((ms * 1000.0) as u64))
}

/// Maps an SDK error onto an executor error
///
/// HTTP failures keep their status code, request charge and retry-after
/// hint. Errors without an HTTP status fall back to message parsing.
fn map_sdk_error(error: &azure_core::Error) -> ExecutorError {
    let message = error.to_string();

    if let ErrorKind::HttpResponse {
        status,
        raw_response,
        ..
    } = error.kind()
    {
        let (request_charge, retry_after) = match raw_response {
            Some(response) => (
                request_charge(response.headers()),
                retry_after(response.headers()),
            ),
            None => (0.0, None),
        };
        return ExecutorError::Service {
            status_code: u16::from(*status),
            request_charge,
            retry_after,
            message,
        };
    }

    match status_code_from_message(&message) {
        Some(status_code) => ExecutorError::service(status_code, message),
        None => ExecutorError::Unexpected(message),
    }
}

/// Best-effort status code extraction from an SDK error message
pub fn status_code_from_message(message: &str) -> Option<u16> {
    const NAMED: [(&str, u16); 12] = [
        ("Request rate is large", 429),
        ("TooManyRequests", 429),
        ("Conflict", 409),
        ("NotFound", 404),
        ("RequestTimeout", 408),
        ("PreconditionFailed", 412),
        ("RequestEntityTooLarge", 413),
        ("ServiceUnavailable", 503),
        ("InternalServerError", 500),
        ("Forbidden", 403),
        ("Unauthorized", 401),
        ("BadRequest", 400),
    ];

    if let Some((_, code)) = NAMED.iter().find(|(name, _)| message.contains(name)) {
        return Some(*code);
    }

    message
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter_map(|token| token.parse::<u16>().ok())
        .find(|code| KNOWN_STATUS_CODES.contains(code))
}

/// Resolves a JSON pointer style partition key path against a document
///
/// Strings and numbers are accepted and keep their JSON type. Booleans, nulls
/// and nested values cannot be used as partition keys.
pub fn partition_key_value(document: &Value, path: &str) -> Result<PartitionKeyValue> {
    if !path.starts_with('/') {
        return Err(BulkError::InvalidArgument(format!(
            "partition key path must start with '/': {path}"
        )));
    }

    match document.pointer(path) {
        Some(value) => PartitionKeyValue::from_json(value).ok_or_else(|| {
            BulkError::InvalidArgument(format!(
                "partition key at {path} must be a non-empty string or a number, got {value}"
            ))
        }),
        None => Err(BulkError::CosmosDb(CosmosDbError::PartitionKeyMissing(
            path.to_string(),
        ))),
    }
}

/// Reads the document's `id`
pub fn document_id(document: &Value) -> Result<String> {
    match document.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        _ => Err(BulkError::CosmosDb(CosmosDbError::DocumentIdMissing(
            truncate(&document.to_string(), 120),
        ))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
