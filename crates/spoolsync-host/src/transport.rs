//! Telemetry transport seam.
//!
//! The printer speaks MQTT over TLS; connection handling lives behind
//! [`TelemetryTransport`] so the daemon only sees JSON documents in and out.

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{HostError, HostResult};

pub fn report_topic(printer_id: &str) -> String {
    format!("device/{printer_id}/report")
}

pub fn request_topic(printer_id: &str) -> String {
    format!("device/{printer_id}/request")
}

pub fn get_version_request() -> Value {
    json!({"info": {"sequence_id": "0", "command": "get_version"}})
}

/// Asks the printer to publish its complete state.
pub fn pushall_request() -> Value {
    json!({"pushing": {"sequence_id": "0", "command": "pushall"}})
}

#[async_trait]
pub trait TelemetryTransport: Send {
    async fn publish(&mut self, topic: &str, payload: &Value) -> HostResult<()>;

    /// Next inbound report; `Ok(None)` once the stream has ended.
    async fn next_message(&mut self) -> HostResult<Option<Value>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: Value,
}

/// Transport backed by in-process channels. Whatever owns the real
/// connection feeds `inbound` and drains `outbound`.
pub struct ChannelTransport {
    inbound: mpsc::Receiver<Value>,
    outbound: mpsc::UnboundedSender<Published>,
}

impl ChannelTransport {
    pub fn new(inbound: mpsc::Receiver<Value>, outbound: mpsc::UnboundedSender<Published>) -> Self {
        Self { inbound, outbound }
    }

    /// Transport plus the peer ends of both channels.
    pub fn pair(
        capacity: usize,
    ) -> (
        Self,
        mpsc::Sender<Value>,
        mpsc::UnboundedReceiver<Published>,
    ) {
        let (in_tx, in_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (Self::new(in_rx, out_tx), in_tx, out_rx)
    }
}

#[async_trait]
impl TelemetryTransport for ChannelTransport {
    async fn publish(&mut self, topic: &str, payload: &Value) -> HostResult<()> {
        debug!(%topic, "publishing request");
        self.outbound
            .send(Published {
                topic: topic.to_string(),
                payload: payload.clone(),
            })
            .map_err(|_| HostError::Transport("outbound channel closed".into()))
    }

    async fn next_message(&mut self) -> HostResult<Option<Value>> {
        Ok(self.inbound.recv().await)
    }
}
