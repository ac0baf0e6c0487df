//! Offline transport that replays a recorded telemetry log.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, warn};

use crate::error::{HostResult, io_error};
use crate::transport::{Published, TelemetryTransport};

/// Reads one JSON document per line. Blank and malformed lines are skipped;
/// published requests are kept for inspection.
pub struct NdjsonReplay<R> {
    lines: Lines<R>,
    line_no: usize,
    published: Vec<Published>,
}

impl NdjsonReplay<BufReader<File>> {
    pub async fn open(path: &Path) -> HostResult<Self> {
        let file = File::open(path).await.map_err(|err| io_error(path, err))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> NdjsonReplay<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            published: Vec::new(),
        }
    }

    pub fn published(&self) -> &[Published] {
        &self.published
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> TelemetryTransport for NdjsonReplay<R> {
    async fn publish(&mut self, topic: &str, payload: &Value) -> HostResult<()> {
        debug!(%topic, "replay: request recorded");
        self.published.push(Published {
            topic: topic.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }

    async fn next_message(&mut self) -> HostResult<Option<Value>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|err| io_error("<replay>", err))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(doc) => return Ok(Some(doc)),
                Err(err) => warn!(line = self.line_no, error = %err, "skipping malformed telemetry line"),
            }
        }
    }
}
