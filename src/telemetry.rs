//! Toggle usage telemetry.
//!
//! Usage records are handed to a background thread so that posting them never delays
//! or fails a flag evaluation.
use std::sync::{
    mpsc::{sync_channel, SyncSender, TrySendError},
    Arc,
};

use serde_json::{json, Map, Value};

use crate::{gateway::EvaluationGateway, Error, EvaluationContext, Result, ToggleType};

/// What was resolved for a single toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleUsage {
    /// Toggle key.
    pub key: String,
    /// Resolved value.
    pub value: Value,
    /// Declared type, reported as `"unknown"` when not known.
    pub toggle_type: Option<ToggleType>,
    /// Resolution reason.
    pub reason: Option<String>,
    /// Variant name.
    pub variant: Option<String>,
    /// Evaluation error, if any.
    pub error_message: Option<String>,
}

impl ToggleUsage {
    /// Create a usage record with only key and value set.
    pub fn new(key: impl Into<String>, value: Value) -> ToggleUsage {
        ToggleUsage {
            key: key.into(),
            value,
            toggle_type: None,
            reason: None,
            variant: None,
            error_message: None,
        }
    }

    fn to_wire_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("key".to_owned(), Value::String(self.key.clone()));
        map.insert("value".to_owned(), self.value.clone());
        map.insert(
            "type".to_owned(),
            Value::String(
                self.toggle_type
                    .map_or("unknown", |toggle_type| toggle_type.as_str())
                    .to_owned(),
            ),
        );
        if let Some(reason) = &self.reason {
            map.insert("reason".to_owned(), Value::String(reason.clone()));
        }
        if let Some(variant) = &self.variant {
            map.insert("variant".to_owned(), Value::String(variant.clone()));
        }
        if let Some(error_message) = &self.error_message {
            map.insert("errorMessage".to_owned(), Value::String(error_message.clone()));
        }
        Value::Object(map)
    }
}

/// Body of a telemetry request.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPayload {
    /// Context the toggle was resolved for.
    pub context: EvaluationContext,
    /// The resolved toggle.
    pub toggle: ToggleUsage,
}

impl TelemetryPayload {
    /// Create a payload.
    pub fn new(context: EvaluationContext, toggle: ToggleUsage) -> TelemetryPayload {
        TelemetryPayload { context, toggle }
    }

    /// Render as `{"context": {...}, "data": {"toggle": {...}}}` with camelCase keys.
    pub fn to_wire_value(&self) -> Value {
        json!({
            "context": self.context.to_wire_value(),
            "data": {
                "toggle": self.toggle.to_wire_value()
            }
        })
    }
}

/// A background thread that posts queued usage records.
///
/// Records are queued with [`TelemetryThread::submit`], which never blocks. Failures are logged
/// and discarded.
pub(crate) struct TelemetryThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Dropping the sender closes the queue, which stops the thread once it has drained.
    // Using `sync_channel` here as it makes the sender `Sync`, so the owning client can be shared
    // between threads.
    sender: SyncSender<TelemetryPayload>,
}

impl TelemetryThread {
    /// Maximum number of records waiting to be posted. Further records are dropped.
    pub(crate) const QUEUE_SIZE: usize = 1024;

    pub(crate) fn start(gateway: Arc<EvaluationGateway>) -> std::io::Result<TelemetryThread> {
        let (sender, receiver) = sync_channel::<TelemetryPayload>(Self::QUEUE_SIZE);

        let join_handle = std::thread::Builder::new()
            .name("hyphen-telemetry".to_owned())
            .spawn(move || {
                for payload in receiver {
                    match gateway.post_telemetry(&payload) {
                        Ok(()) => {
                            log::trace!(target: "hyphen", flag_key:display = payload.toggle.key; "posted toggle usage");
                        }
                        Err(err) => {
                            log::warn!(target: "hyphen", flag_key:display = payload.toggle.key; "unable to log toggle usage: {:?}", err);
                        }
                    }
                }
                log::debug!(target: "hyphen", "telemetry queue closed, stopping telemetry thread");
            })?;

        Ok(TelemetryThread {
            join_handle,
            sender,
        })
    }

    /// Queue `payload` for posting.
    pub(crate) fn submit(&self, payload: TelemetryPayload) {
        match self.sender.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(payload)) => {
                log::warn!(target: "hyphen", flag_key:display = payload.toggle.key; "telemetry queue is full, dropping toggle usage");
            }
            Err(TrySendError::Disconnected(payload)) => {
                log::warn!(target: "hyphen", flag_key:display = payload.toggle.key; "telemetry thread is not running, dropping toggle usage");
            }
        }
    }

    /// Close the queue and block until every queued record has been posted.
    pub(crate) fn shutdown(self) -> Result<()> {
        let TelemetryThread {
            join_handle,
            sender,
        } = self;
        drop(sender);

        // Error means that the thread has panicked and there's nothing useful we can do in that
        // case.
        join_handle
            .join()
            .map_err(|_| Error::TelemetryThreadPanicked)
    }
}
