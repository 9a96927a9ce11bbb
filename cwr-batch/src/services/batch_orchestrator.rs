//! Batch orchestrator
//!
//! Runs one plugin over a working set of records, strictly one record at a
//! time. State machine: `Idle → Running → Idle`.
//!
//! Per record:
//! 1. build the invocation and call the plugin (errors become error rows)
//! 2. auto-save the coordinate when enabled and one was found
//! 3. deliver `coordinate-updated` through the event bridge whenever a
//!    coordinate exists (the `saved` flag reflects step 2)
//! 4. append the row, advance the cursor, report progress on the event bus
//!
//! Stopping is cooperative: `stop()` clears `running` and cancels the run
//! token; the loop observes it before starting the next record, so an
//! in-flight invocation still finishes and its row is appended. A new run is
//! accepted only once the previous loop has finished (`ended_at` set).

use chrono::Utc;
use cwr_common::events::{
    BatchCompleted, BatchProgress, BatchRowAppended, BatchStarted, CoordinateUpdate, EventBus,
    GeoEvent,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::persistence_gateway::{CoordinatePersistence, SaveOutcome};
use super::plugin_invoker::PluginInvoker;
use crate::event_bridge::{DeliveryReport, EventBridge};
use crate::models::{
    is_valid_plugin_name, BatchOptions, BatchRun, InvocationRequest, Record, ResultRow,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("A batch run is already in progress")]
    AlreadyRunning,

    #[error("Plugin name must not be empty")]
    MissingPlugin,

    #[error("Invalid plugin name '{0}'")]
    InvalidPlugin(String),

    #[error("No records to process")]
    EmptyWorkingSet,

    #[error("No result row for record {0}")]
    RowNotFound(i64),

    #[error("Record {0} has no detected coordinate")]
    NothingToSave(i64),
}

pub struct BatchOrchestrator {
    invoker: Arc<PluginInvoker>,
    persistence: Arc<dyn CoordinatePersistence>,
    bridge: Arc<EventBridge>,
    event_bus: EventBus,
    run: Arc<RwLock<BatchRun>>,
    cancel_token: Mutex<CancellationToken>,
}

impl BatchOrchestrator {
    pub fn new(
        invoker: Arc<PluginInvoker>,
        persistence: Arc<dyn CoordinatePersistence>,
        bridge: Arc<EventBridge>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            invoker,
            persistence,
            bridge,
            event_bus,
            run: Arc::new(RwLock::new(BatchRun::default())),
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    /// Run `plugin_name` over `records` and return the finished run
    ///
    /// Rejected with [`BatchError::AlreadyRunning`] while another run is active.
    pub async fn start(
        &self,
        records: Vec<Record>,
        plugin_name: &str,
        options: BatchOptions,
    ) -> Result<BatchRun, BatchError> {
        let (run_id, token) = self.begin(records, plugin_name, options).await?;
        Ok(self.execute(run_id, token).await)
    }

    /// Start a run on a background task and return its id immediately
    pub async fn launch(
        self: &Arc<Self>,
        records: Vec<Record>,
        plugin_name: &str,
        options: BatchOptions,
    ) -> Result<Uuid, BatchError> {
        let (run_id, token) = self.begin(records, plugin_name, options).await?;

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let run = orchestrator.execute(run_id, token).await;
            info!(
                run_id = %run_id,
                processed = run.rows.len(),
                "Background batch task finished"
            );
        });

        Ok(run_id)
    }

    /// Request a cooperative stop; returns false when nothing was running
    pub async fn stop(&self) -> bool {
        self.cancel_token.lock().await.cancel();

        let mut run = self.run.write().await;
        if !run.running {
            return false;
        }
        run.running = false;
        run.stopped = true;
        info!(run_id = %run.run_id, cursor = run.cursor, "Batch stop requested");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.run.read().await.running
    }

    /// Copy of the current (or last) run
    pub async fn snapshot(&self) -> BatchRun {
        self.run.read().await.clone()
    }

    /// Save the coordinate of an existing row (manual save / retry)
    ///
    /// A failed save is reported through the outcome and recorded on the row;
    /// a successful one is delivered with `saved = true`.
    pub async fn save_row(&self, record_id: i64) -> Result<SaveOutcome, BatchError> {
        let candidate = {
            let run = self.run.read().await;
            run.row(record_id)
                .ok_or(BatchError::RowNotFound(record_id))?
                .coordinates
                .clone()
        };
        if !candidate.exists {
            return Err(BatchError::NothingToSave(record_id));
        }

        let outcome = self.persistence.save(record_id, &candidate).await;

        let row = {
            let mut run = self.run.write().await;
            let row = run
                .row_mut(record_id)
                .ok_or(BatchError::RowNotFound(record_id))?;
            row.apply_save(&outcome);
            row.clone()
        };

        if outcome.success {
            info!(record_id, "Coordinate saved manually");
            self.deliver_coordinate(&row);
        }
        Ok(outcome)
    }

    async fn begin(
        &self,
        records: Vec<Record>,
        plugin_name: &str,
        options: BatchOptions,
    ) -> Result<(Uuid, CancellationToken), BatchError> {
        if plugin_name.trim().is_empty() {
            return Err(BatchError::MissingPlugin);
        }
        if !is_valid_plugin_name(plugin_name) {
            return Err(BatchError::InvalidPlugin(plugin_name.to_string()));
        }

        let mut run = self.run.write().await;
        if run.running || run.is_active() {
            return Err(BatchError::AlreadyRunning);
        }

        let next = BatchRun::new(records, plugin_name.to_string(), options);
        if next.total() == 0 {
            return Err(BatchError::EmptyWorkingSet);
        }

        let token = CancellationToken::new();
        *self.cancel_token.lock().await = token.clone();
        *run = next;

        info!(
            run_id = %run.run_id,
            plugin = %run.plugin_name,
            total = run.total(),
            auto_save = run.options.auto_save,
            "Batch run started"
        );
        self.event_bus.emit_lossy(GeoEvent::BatchStarted(BatchStarted {
            run_id: run.run_id,
            plugin_name: run.plugin_name.clone(),
            total: run.total(),
            timestamp: Utc::now(),
        }));

        Ok((run.run_id, token))
    }

    async fn execute(&self, run_id: Uuid, token: CancellationToken) -> BatchRun {
        let (records, plugin_name, options) = {
            let run = self.run.read().await;
            (run.records.clone(), run.plugin_name.clone(), run.options.clone())
        };
        let total = records.len();

        for record in &records {
            if token.is_cancelled() || !self.is_running().await {
                debug!(run_id = %run_id, "Stop observed, no further records");
                break;
            }

            let row = self.process_record(record, &plugin_name, &options).await;

            let mut run = self.run.write().await;
            if run.run_id != run_id {
                warn!(run_id = %run_id, "Run replaced while a record was in flight");
                return run.clone();
            }
            let detected = row.is_detected();
            let is_error = row.is_error;
            let code = row.code.clone();
            let index = run.append_row(row);
            let cursor = run.cursor;
            let percentage = run.percentage();
            drop(run);

            self.event_bus.emit_lossy(GeoEvent::BatchRowAppended(BatchRowAppended {
                run_id,
                index,
                record_id: record.id,
                code,
                detected,
                is_error,
            }));
            self.event_bus.emit_lossy(GeoEvent::BatchProgress(BatchProgress {
                run_id,
                cursor,
                total,
                percentage,
                record_id: record.id,
                timestamp: Utc::now(),
            }));
        }

        let mut run = self.run.write().await;
        if run.run_id == run_id {
            run.finish();
            info!(
                run_id = %run_id,
                processed = run.rows.len(),
                total,
                detected = run.detected_count(),
                errors = run.error_count(),
                stopped = run.stopped,
                "Batch run finished"
            );
            self.event_bus.emit_lossy(GeoEvent::BatchCompleted(BatchCompleted {
                run_id,
                processed: run.rows.len(),
                total,
                detected: run.detected_count(),
                errors: run.error_count(),
                stopped: run.stopped,
                timestamp: Utc::now(),
            }));
        }
        run.clone()
    }

    async fn process_record(&self, record: &Record, plugin_name: &str, options: &BatchOptions) -> ResultRow {
        let request = InvocationRequest::for_record(record, plugin_name, options);
        let result = self.invoker.invoke(&request).await;
        let mut row = ResultRow::from_result(record, result);

        debug!(
            record_id = record.id,
            code = %record.code,
            status = %row.status,
            "Record processed"
        );

        if !row.coordinates.exists {
            return row;
        }

        if options.auto_save {
            let outcome = self.persistence.save(record.id, &row.coordinates).await;
            row.apply_save(&outcome);
        }
        self.deliver_coordinate(&row);
        row
    }

    /// Fan the row's coordinate out; skipped when no decimal pair is known
    fn deliver_coordinate(&self, row: &ResultRow) -> Option<DeliveryReport> {
        let Some(decimal) = row.coordinates.decimal else {
            warn!(
                record_id = row.record_id,
                ddm = row.coordinates.ddm.as_deref().unwrap_or_default(),
                "Coordinate has no decimal pair, not delivered"
            );
            return None;
        };

        let event = GeoEvent::CoordinateUpdated(CoordinateUpdate {
            record_id: row.record_id,
            latitude: decimal.lat,
            longitude: decimal.lon,
            saved: row.saved,
            raw: serde_json::to_value(&row.coordinates).unwrap_or_default(),
        });
        Some(self.bridge.deliver(&event))
    }
}
