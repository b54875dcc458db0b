//! Ingest command implementation
//!
//! Reads newline-delimited JSON documents and writes them through the bulk
//! writer to the configured container (or the dry-run executor).

use crate::adapters::cosmosdb::{document_id, partition_key_value, CosmosBulkExecutor, CosmosDbClient};
use crate::adapters::DryRunExecutor;
use crate::config::load_config;
use crate::core::bulk::{BulkExecutor, BulkWriter, ItemOperation, OperationContext, OperationKind};
use crate::domain::{BulkError, Result};
use clap::Args;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::watch;

const DEFAULT_PARTITION_KEY_PATH: &str = "/pk";
const MAX_REPORTED_FAILURES: usize = 10;

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// NDJSON file with one document per line (`-` reads stdin)
    #[arg(short, long)]
    pub input: String,

    /// Operation applied to every document
    #[arg(long, default_value = "upsert")]
    pub operation: OperationKind,

    /// Dry run mode - accept every write without contacting Cosmos DB
    #[arg(long)]
    pub dry_run: bool,

    /// Label attached to every operation in logs and failure reports
    #[arg(long, default_value = "ingest")]
    pub identifier: String,

    /// Write permanently failed documents to this NDJSON file
    #[arg(long)]
    pub failures_output: Option<PathBuf>,
}

/// Counters for one ingest run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub lines_read: u64,
    pub scheduled: u64,
    pub skipped: u64,
    pub interrupted: bool,
}

impl IngestArgs {
    /// Execute the ingest command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input, operation = %self.operation, "Starting ingest command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Configuration error: {e}");
                return Ok(2);
            }
        };

        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        let partition_key_path = config
            .cosmosdb
            .as_ref()
            .map(|c| c.partition_key.clone())
            .unwrap_or_else(|| DEFAULT_PARTITION_KEY_PATH.to_string());

        let executor: Arc<dyn BulkExecutor> = if config.application.dry_run {
            println!("🔍 DRY RUN MODE - No data will be written to the database");
            Arc::new(DryRunExecutor::default())
        } else {
            let Some(cosmos_config) = config.cosmosdb.clone() else {
                eprintln!("Configuration error: [cosmosdb] section is required");
                return Ok(2);
            };
            let client = match CosmosDbClient::new(cosmos_config) {
                Ok(client) => client,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Cosmos DB client");
                    eprintln!("Failed to connect to Cosmos DB: {e}");
                    return Ok(5);
                }
            };
            if let Err(e) = client.test_connection().await {
                tracing::error!(error = %e, "Cosmos DB connection test failed");
                eprintln!("Failed to connect to Cosmos DB: {e}");
                return Ok(5);
            }
            Arc::new(CosmosBulkExecutor::new(Arc::new(client)))
        };

        let writer = BulkWriter::new(executor, &config.bulk);
        let stats = if self.input == "-" {
            self.ingest(tokio::io::stdin(), &writer, &partition_key_path, shutdown_signal)
                .await
        } else {
            let file = tokio::fs::File::open(&self.input).await.map_err(|e| {
                anyhow::anyhow!("Failed to open input file {}: {}", self.input, e)
            })?;
            self.ingest(file, &writer, &partition_key_path, shutdown_signal)
                .await
        };

        let stats = match stats {
            Ok(stats) => stats,
            Err(e) => {
                writer.close();
                tracing::error!(error = %e, "Ingest failed");
                eprintln!("Ingest failed: {e}");
                return Ok(5);
            }
        };

        let summary = writer.summary();
        let failures = writer.failures();

        println!();
        println!("📊 Ingest Summary:");
        println!("  Run ID: {}", summary.run_id);
        println!("  Lines Read: {}", stats.lines_read);
        println!("  Scheduled: {}", stats.scheduled);
        println!("  Skipped (invalid): {}", stats.skipped);
        println!("  Succeeded: {}", summary.succeeded);
        println!("  Failed: {}", summary.failed);
        println!("  Request Charge: {:.2} RU", summary.request_charge);
        println!("  Duration: {:.2}s", summary.elapsed.as_secs_f64());
        println!("  Throughput: {:.1} docs/s", summary.throughput());
        println!("  Success Rate: {:.2}%", summary.success_rate());
        println!();

        if !failures.is_empty() {
            println!("⚠️  Failed documents:");
            for failure in failures.iter().take(MAX_REPORTED_FAILURES) {
                println!(
                    "  - {} ({})",
                    failure.ids.join(", "),
                    failure.error.as_deref().unwrap_or("unknown error")
                );
            }
            if failures.len() > MAX_REPORTED_FAILURES {
                println!("  ... and {} more", failures.len() - MAX_REPORTED_FAILURES);
            }
            println!();

            if let Some(path) = &self.failures_output {
                write_failures(path, &writer.status().bad_documents()).await?;
                println!("  Failed documents written to {}", path.display());
            }
        }

        let exit_code = if stats.interrupted {
            println!("⚠️  Ingest interrupted; writes in flight were abandoned.");
            130
        } else if summary.is_successful() && stats.skipped == 0 {
            println!("✅ Ingest completed successfully!");
            0
        } else {
            println!("⚠️  Ingest completed with failures");
            1
        };

        Ok(exit_code)
    }

    async fn ingest<R: AsyncRead + Unpin>(
        &self,
        reader: R,
        writer: &BulkWriter,
        partition_key_path: &str,
        mut shutdown_signal: watch::Receiver<bool>,
    ) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        let mut lines = BufReader::new(reader).split(b'\n');

        loop {
            let segment = tokio::select! {
                biased;
                Ok(_) = shutdown_signal.wait_for(|stop| *stop) => {
                    stats.interrupted = true;
                    break;
                }
                segment = lines.next_segment() => segment?,
            };
            let Some(mut bytes) = segment else { break };
            stats.lines_read += 1;

            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(
                        line = stats.lines_read,
                        error = %e,
                        "Skipping line that is not valid UTF-8"
                    );
                    stats.skipped += 1;
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let (operation, payload) = match parse_line(
                &line,
                self.operation,
                &self.identifier,
                partition_key_path,
            ) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(line = stats.lines_read, error = %e, "Skipping invalid document");
                    stats.skipped += 1;
                    continue;
                }
            };

            tokio::select! {
                biased;
                Ok(_) = shutdown_signal.wait_for(|stop| *stop) => {
                    stats.interrupted = true;
                    break;
                }
                scheduled = writer.schedule_write(operation, payload) => match scheduled {
                    Ok(()) => stats.scheduled += 1,
                    Err(BulkError::Closed) => {
                        stats.interrupted = true;
                        break;
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        if stats.interrupted {
            tracing::info!("Shutdown requested, closing bulk writer");
            writer.close();
            return Ok(stats);
        }

        tracing::info!(scheduled = stats.scheduled, "Input exhausted, flushing");
        tokio::select! {
            biased;
            Ok(_) = shutdown_signal.wait_for(|stop| *stop) => {
                stats.interrupted = true;
                writer.close();
            }
            _ = writer.flush() => {}
        }

        Ok(stats)
    }
}

/// Turns one NDJSON line into an operation and the payload reported back on success
pub fn parse_line(
    line: &str,
    kind: OperationKind,
    identifier: &str,
    partition_key_path: &str,
) -> Result<(ItemOperation, Value)> {
    let document: Value = serde_json::from_str(line)?;
    if !document.is_object() {
        return Err(BulkError::InvalidArgument(
            "document must be a JSON object".to_string(),
        ));
    }

    let id = document_id(&document)?;
    let partition_key = partition_key_value(&document, partition_key_path)?;
    let context = OperationContext::new(id, identifier)?;

    let operation = ItemOperation::new(kind, partition_key, document.clone(), context);
    Ok((operation, document))
}

async fn write_failures(path: &Path, documents: &[Value]) -> anyhow::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    for document in documents {
        let mut line = serde_json::to_vec(document)?;
        line.push(b'\n');
        file.write_all(&line).await?;
    }
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bulk::{BulkExecutionOptions, PartitionKeyValue, WriterSettings};
    use serde_json::json;

    fn args() -> IngestArgs {
        IngestArgs {
            input: "-".to_string(),
            operation: OperationKind::Create,
            dry_run: true,
            identifier: "test".to_string(),
            failures_output: None,
        }
    }

    #[test]
    fn test_parse_line_valid() {
        let (op, payload) = parse_line(
            r#"{"id": "a1", "pk": "tenant", "value": 3}"#,
            OperationKind::Upsert,
            "batch-1",
            "/pk",
        )
        .unwrap();

        assert_eq!(op.id(), "a1");
        assert_eq!(op.partition_key(), "tenant");
        assert_eq!(op.kind(), OperationKind::Upsert);
        assert_eq!(op.context().identifier(), "batch-1");
        assert_eq!(payload, json!({"id": "a1", "pk": "tenant", "value": 3}));
    }

    #[test]
    fn test_parse_line_rejects_bad_input() {
        assert!(parse_line("not json", OperationKind::Create, "x", "/pk").is_err());
        assert!(parse_line("[1, 2]", OperationKind::Create, "x", "/pk").is_err());
        assert!(parse_line(r#"{"pk": "p"}"#, OperationKind::Create, "x", "/pk").is_err());
        assert!(parse_line(r#"{"id": "a"}"#, OperationKind::Create, "x", "/pk").is_err());
    }

    #[tokio::test]
    async fn test_ingest_counts_lines() {
        let input = concat!(
            "{\"id\": \"1\", \"pk\": \"a\"}\n",
            "\n",
            "{\"id\": \"2\"}\n",
            "{\"id\": \"3\", \"pk\": \"b\"}\n",
        );
        let writer = BulkWriter::with_settings(
            Arc::new(DryRunExecutor::default()),
            WriterSettings::default(),
            BulkExecutionOptions::default(),
        );
        let (_tx, rx) = watch::channel(false);

        let stats = args()
            .ingest(input.as_bytes(), &writer, "/pk", rx)
            .await
            .unwrap();

        assert_eq!(stats.lines_read, 4);
        assert_eq!(stats.scheduled, 2);
        assert_eq!(stats.skipped, 1);
        assert!(!stats.interrupted);
        assert_eq!(writer.summary().succeeded, 2);
    }

    #[tokio::test]
    async fn test_ingest_skips_line_with_invalid_utf8() {
        let mut input = b"{\"id\": \"1\", \"pk\": \"a\"}\r\n".to_vec();
        input.extend_from_slice(b"{\"id\": \"\xff\", \"pk\": \"a\"}\n");
        input.extend_from_slice(b"{\"id\": \"3\", \"pk\": 42}");
        let writer = BulkWriter::with_settings(
            Arc::new(DryRunExecutor::default()),
            WriterSettings::default(),
            BulkExecutionOptions::default(),
        );
        let (_tx, rx) = watch::channel(false);

        let stats = args()
            .ingest(input.as_slice(), &writer, "/pk", rx)
            .await
            .unwrap();

        assert_eq!(stats.lines_read, 3);
        assert_eq!(stats.scheduled, 2);
        assert_eq!(stats.skipped, 1);
        assert!(!stats.interrupted);
        assert_eq!(writer.summary().succeeded, 2);
    }

    #[test]
    fn test_parse_line_keeps_numeric_partition_key() {
        let (op, _) =
            parse_line(r#"{"id": "n1", "pk": 7}"#, OperationKind::Create, "x", "/pk").unwrap();
        assert_eq!(op.partition_key(), &PartitionKeyValue::from(7_i64));

        let flag = parse_line(r#"{"id": "b1", "pk": true}"#, OperationKind::Create, "x", "/pk");
        assert!(flag.is_err());
    }

    #[tokio::test]
    async fn test_ingest_stops_on_shutdown() {
        let input = "{\"id\": \"1\", \"pk\": \"a\"}\n";
        let writer = BulkWriter::with_settings(
            Arc::new(DryRunExecutor::default()),
            WriterSettings::default(),
            BulkExecutionOptions::default(),
        );
        let (_tx, rx) = watch::channel(true);

        let stats = args()
            .ingest(input.as_bytes(), &writer, "/pk", rx)
            .await
            .unwrap();

        assert!(stats.interrupted);
        assert!(writer.is_closed());
    }
}
