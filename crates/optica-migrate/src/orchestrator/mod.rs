//! Migration orchestrator - main workflow coordinator.
//!
//! Sequence for a run: connect to source and sink, clear every destination
//! collection, run the dependency-ordered loader, report per-collection
//! counts. Both connections are released on every exit path.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::{DocumentSink, EntityType, SourceReader};
use crate::drivers::{MemorySink, MongoSink, MysqlReader};
use crate::error::{MigrateError, Result};
use crate::loader::{DependencyGraph, EntityReport, Loader};
use crate::relationships::{spec_for, RELATIONSHIPS};
use crate::remap::RemapContext;
use crate::transform::SkippedRow;

/// Upper bound on opening or pinging one endpoint during a health check.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(15);

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceReader>,
    sink: Arc<dyn DocumentSink>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: "completed" or "completed_with_skips".
    pub status: String,

    /// Documents went to an in-memory sink instead of the destination.
    pub dry_run: bool,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Per-collection summary, in load order.
    pub collections: Vec<CollectionSummary>,

    /// Total documents inserted.
    pub documents_inserted: u64,

    /// Source rows dropped by a row-level error.
    pub skipped_rows: Vec<SkippedRowSummary>,
}

/// Final state of one destination collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub entity: String,
    pub collection: String,
    pub source_rows: usize,
    pub documents_inserted: u64,
    /// Document count read back from the sink after the load.
    pub final_count: u64,
    pub skipped: usize,
    pub duration_ms: u64,
}

/// A skipped row as reported to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRowSummary {
    pub entity: String,
    pub key: Option<i64>,
    pub reason: String,
}

impl From<SkippedRow> for SkippedRowSummary {
    fn from(row: SkippedRow) -> Self {
        Self {
            entity: row.entity.to_string(),
            key: row.key,
            reason: row.reason,
        }
    }
}

/// Source row count against destination document count for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub entity: String,
    pub collection: String,
    pub source_rows: u64,
    pub documents: u64,
    pub matches: bool,
}

/// Connectivity of both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_type: String,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_type: String,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

/// One step of the computed load order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub position: usize,
    pub entity: String,
    pub collection: String,
    pub source_table: Option<String>,
    pub depends_on: Vec<String>,
}

impl Orchestrator {
    /// Connect to the MySQL source and the MongoDB sink.
    ///
    /// If the sink is unreachable the already-open source is closed before
    /// the error is returned.
    pub async fn connect(config: Config) -> Result<Self> {
        let max_conns = config.migration.get_max_source_connections();
        let source = MysqlReader::new(&config.source, max_conns).await?;

        let sink = match MongoSink::new(&config.target).await {
            Ok(sink) => sink,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::with_endpoints(config, Arc::new(source), Arc::new(sink)))
    }

    /// Create an orchestrator over already-open endpoints.
    pub fn with_endpoints(
        config: Config,
        source: Arc<dyn SourceReader>,
        sink: Arc<dyn DocumentSink>,
    ) -> Self {
        Self {
            config,
            source,
            sink,
        }
    }

    /// The computed load order, without touching any endpoint.
    pub fn plan() -> Result<Vec<PlanStep>> {
        let graph = DependencyGraph::builtin()?;
        let order = graph.topological_order()?;
        Ok(order
            .into_iter()
            .enumerate()
            .map(|(i, entity)| {
                let spec = spec_for(entity);
                PlanStep {
                    position: i + 1,
                    entity: entity.to_string(),
                    collection: spec.collection.to_string(),
                    source_table: spec.source_table.map(str::to_string),
                    depends_on: graph
                        .dependencies(entity)
                        .iter()
                        .map(EntityType::to_string)
                        .collect(),
                }
            })
            .collect())
    }

    /// Run the migration into the destination.
    pub async fn run(self) -> Result<MigrationResult> {
        let result = self.execute(self.sink.as_ref(), false).await;
        self.close().await;
        result
    }

    /// Run every transformer into an in-memory sink.
    ///
    /// The destination is never cleared or written; the reported counts are
    /// what a real run would produce.
    pub async fn dry_run(self) -> Result<MigrationResult> {
        let sink = MemorySink::new();
        let result = self.execute(&sink, true).await;
        self.close().await;
        result
    }

    async fn execute(&self, sink: &dyn DocumentSink, dry_run: bool) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(
            "Starting migration run: {} ({} -> {}{})",
            run_id,
            self.source.db_type(),
            sink.db_type(),
            if dry_run { ", dry run" } else { "" }
        );

        // Phase 1: plan. A malformed declaration or a missing table fails here,
        // before any write.
        info!("Phase 1: Computing load order");
        let loader = Loader::new(self.config.migration.get_insert_batch_size())?;
        self.check_source_tables().await?;

        // Phase 2: clear destination collections
        info!("Phase 2: Clearing {} collections", RELATIONSHIPS.len());
        for spec in RELATIONSHIPS {
            let removed = sink.clear_collection(spec.collection).await?;
            if removed > 0 {
                info!("{}: removed {} documents", spec.collection, removed);
            }
        }

        // Phase 3: load
        info!("Phase 3: Loading {} entity types", loader.order().len());
        let mut ctx = RemapContext::new();
        let reports = loader
            .run(self.source.as_ref(), sink, &mut ctx)
            .await
            .inspect_err(|e| error!("Migration {} failed: {}", run_id, e))?;

        // Phase 4: summary
        info!("Phase 4: Collecting summary");
        let mut collections = Vec::with_capacity(reports.len());
        let mut skipped_rows = Vec::new();
        for report in reports {
            let EntityReport {
                entity,
                collection,
                source_rows,
                documents_inserted,
                skipped,
                duration_ms,
            } = report;
            let final_count = sink.count(&collection).await?;
            info!("  {}: {} documents", collection, final_count);
            collections.push(CollectionSummary {
                entity: entity.to_string(),
                collection,
                source_rows,
                documents_inserted,
                final_count,
                skipped: skipped.len(),
                duration_ms,
            });
            skipped_rows.extend(skipped.into_iter().map(SkippedRowSummary::from));
        }

        let documents_inserted = collections.iter().map(|c| c.documents_inserted).sum();
        let status = if skipped_rows.is_empty() {
            "completed"
        } else {
            warn!("{} source rows were skipped", skipped_rows.len());
            "completed_with_skips"
        };

        let result = MigrationResult {
            run_id,
            status: status.to_string(),
            dry_run,
            duration_seconds: timer.elapsed().as_secs_f64(),
            started_at,
            completed_at: Utc::now(),
            collections,
            documents_inserted,
            skipped_rows,
        };

        info!(
            "Migration {}: {} documents in {} collections in {:.1}s",
            result.status,
            result.documents_inserted,
            result.collections.len(),
            result.duration_seconds
        );

        Ok(result)
    }

    /// Fail before any write if a declared table is missing from the source.
    ///
    /// Names must match exactly, since reads use the declared name.
    async fn check_source_tables(&self) -> Result<()> {
        let available = self.source.list_tables().await?;
        for spec in RELATIONSHIPS {
            for table in spec.tables() {
                if !available.iter().any(|t| t == table) {
                    return Err(MigrateError::source(table, "table does not exist"));
                }
            }
        }
        debug!("All declared source tables present");
        Ok(())
    }

    /// Compare source row counts with destination document counts.
    pub async fn validate(self) -> Result<Vec<ValidationEntry>> {
        let result = self.validate_counts().await;
        self.close().await;
        result
    }

    async fn validate_counts(&self) -> Result<Vec<ValidationEntry>> {
        let mut entries = Vec::with_capacity(RELATIONSHIPS.len());

        for spec in RELATIONSHIPS {
            // The lookup bundle always folds into a single document.
            let source_rows = match spec.source_table {
                Some(table) => self.source.row_count(table).await?,
                None => 1,
            };
            let documents = self.sink.count(spec.collection).await?;
            let matches = source_rows == documents;

            if matches {
                info!("{}: {} documents (match)", spec.collection, documents);
            } else {
                warn!(
                    "{}: source={} documents={} (MISMATCH)",
                    spec.collection, source_rows, documents
                );
            }
            entries.push(ValidationEntry {
                entity: spec.entity.to_string(),
                collection: spec.collection.to_string(),
                source_rows,
                documents,
                matches,
            });
        }

        Ok(entries)
    }

    /// Open each endpoint independently and report which ones answered.
    ///
    /// Unlike [`connect`](Self::connect), an unreachable endpoint is part of
    /// the result rather than an error. Endpoints that do open are closed
    /// again before returning.
    pub async fn check_endpoints(config: &Config) -> HealthCheckResult {
        let source_endpoint = config.source.endpoint();
        let target_endpoint = config.target.endpoint();
        let (source, target) = tokio::join!(
            probe(
                &source_endpoint,
                MysqlReader::new(&config.source, 1),
                HEALTH_CHECK_TIMEOUT
            ),
            probe(
                &target_endpoint,
                MongoSink::new(&config.target),
                HEALTH_CHECK_TIMEOUT
            ),
        );

        if let Ok(reader) = &source.0 {
            reader.close().await;
        }
        if let Ok(sink) = &target.0 {
            sink.close().await;
        }

        HealthCheckResult::from_probes(
            ("mysql", source.0.map(drop), source.1),
            ("mongodb", target.0.map(drop), target.1),
        )
    }

    /// Ping both already-open endpoints and measure round-trip latency.
    pub async fn health_check(self) -> Result<HealthCheckResult> {
        let (source, target) = tokio::join!(
            probe(self.source.db_type(), self.source.ping(), HEALTH_CHECK_TIMEOUT),
            probe(self.sink.db_type(), self.sink.ping(), HEALTH_CHECK_TIMEOUT),
        );
        let result = HealthCheckResult::from_probes(
            (self.source.db_type(), source.0, source.1),
            (self.sink.db_type(), target.0, target.1),
        );

        self.close().await;
        Ok(result)
    }

    async fn close(&self) {
        self.source.close().await;
        self.sink.close().await;
        info!("Closed source and sink connections");
    }
}

/// Endpoint type, outcome and latency of one health probe.
type Probe<'a> = (&'a str, Result<()>, u64);

impl HealthCheckResult {
    fn from_probes(source: Probe<'_>, target: Probe<'_>) -> Self {
        let (source_type, source, source_latency_ms) = source;
        let (target_type, target, target_latency_ms) = target;
        let healthy = source.is_ok() && target.is_ok();
        Self {
            source_type: source_type.to_string(),
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.err().map(|e| e.to_string()),
            target_type: target_type.to_string(),
            target_connected: target.is_ok(),
            target_latency_ms,
            target_error: target.err().map(|e| e.to_string()),
            healthy,
        }
    }
}

/// Await `fut` for at most `limit`, returning its outcome and elapsed time.
async fn probe<T, F>(endpoint: &str, fut: F, limit: Duration) -> (Result<T>, u64)
where
    F: Future<Output = Result<T>>,
{
    let timer = Instant::now();
    let result = match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(MigrateError::connection(
            endpoint,
            format!("no response within {}ms", limit.as_millis()),
        )),
    };
    (result, timer.elapsed().as_millis() as u64)
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
