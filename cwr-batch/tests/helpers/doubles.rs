//! Scripted plugin transport and recording persistence

use async_trait::async_trait;
use cwr_batch::event_bridge::{ContextTopology, EventBridge};
use cwr_batch::models::CoordinateCandidate;
use cwr_batch::services::{
    BatchOrchestrator, CoordinatePersistence, PluginInvoker, PluginTransport, ResultNormalizer,
    SaveOutcome, TransportError, TransportResponse, TransportTable,
};
use cwr_common::events::EventBus;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Script = Box<dyn Fn(&Value) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// Holds the n-th call (1-based) until released
pub struct Gate {
    pub hold_call: usize,
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    pub fn new(hold_call: usize) -> Arc<Self> {
        Arc::new(Self {
            hold_call,
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

/// Plugin transport answering from a script keyed on the request body
pub struct ScriptedTransport {
    name: &'static str,
    script: Script,
    gate: Option<Arc<Gate>>,
    calls: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Value) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            name: "scripted",
            script: Box::new(script),
            gate: None,
            calls: AtomicUsize::new(0),
            bodies: Mutex::new(Vec::new()),
        }
    }

    /// Answer `payload` for the record ids in `hits`, an empty payload otherwise
    pub fn detecting(hits: &'static [i64], payload: Value) -> Self {
        Self::new(move |body| {
            let record_id = body["recordId"].as_i64().unwrap_or_default();
            if hits.contains(&record_id) {
                Ok(json_response(200, &payload))
            } else {
                Ok(json_response(200, &super::empty_payload()))
            }
        })
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl PluginTransport for ScriptedTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, _url: &str, body: &Value) -> Result<TransportResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.bodies.lock().unwrap().push(body.clone());

        if let Some(gate) = &self.gate {
            if call == gate.hold_call {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }

        (self.script)(body)
    }
}

pub fn json_response(status: u16, payload: &Value) -> TransportResponse {
    TransportResponse {
        status,
        body: payload.to_string(),
    }
}

/// Persistence double recording every save
pub struct RecordingPersistence {
    succeed: AtomicBool,
    saves: Mutex<Vec<(i64, CoordinateCandidate)>>,
}

impl RecordingPersistence {
    pub fn succeeding() -> Self {
        Self {
            succeed: AtomicBool::new(true),
            saves: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        let persistence = Self::succeeding();
        persistence.set_succeed(false);
        persistence
    }

    pub fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    pub fn saves(&self) -> Vec<(i64, CoordinateCandidate)> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl CoordinatePersistence for RecordingPersistence {
    async fn save(&self, record_id: i64, candidate: &CoordinateCandidate) -> SaveOutcome {
        self.saves.lock().unwrap().push((record_id, candidate.clone()));
        if self.succeed.load(Ordering::SeqCst) {
            SaveOutcome::saved()
        } else {
            SaveOutcome::failed("Backend rejected save (500): boom")
        }
    }
}

/// Orchestrator wired to test doubles
pub struct Harness {
    pub orchestrator: Arc<BatchOrchestrator>,
    pub event_bus: EventBus,
    pub topology: Arc<ContextTopology>,
    pub transport: Arc<ScriptedTransport>,
    pub persistence: Arc<RecordingPersistence>,
}

pub fn harness(transport: ScriptedTransport, persistence: RecordingPersistence) -> Harness {
    let transport = Arc::new(transport);
    let persistence = Arc::new(persistence);
    let event_bus = EventBus::new(256);
    let topology = Arc::new(ContextTopology::default());

    let invoker = Arc::new(PluginInvoker::new(
        "http://backend.invalid",
        TransportTable::new(transport.clone()),
        ResultNormalizer::default(),
    ));
    let bridge = Arc::new(EventBridge::new(event_bus.clone(), topology.clone()));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        invoker,
        persistence.clone(),
        bridge,
        event_bus.clone(),
    ));

    Harness {
        orchestrator,
        event_bus,
        topology,
        transport,
        persistence,
    }
}
