use crate::error::{LipsynthError, Result};
use crate::pipeline::types::{Message, OrderedEvent, StreamFrame};
use async_trait::async_trait;
use std::io::Write;
use tokio::sync::mpsc;

/// Pluggable consumer of ordered pipeline results.
///
/// Receives every event in index order, then the aggregate turn once.
#[async_trait]
pub trait EventSink: Send {
    /// Handle one per-index event.
    async fn handle(&mut self, event: &OrderedEvent) -> Result<()>;

    /// Called after the `done` event with every emitted message.
    async fn finish(&mut self, _messages: &[Message]) -> Result<()> {
        Ok(())
    }

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Collects events in memory. Used by batch-style callers and tests.
#[derive(Debug, Default)]
pub struct CollectorSink {
    events: Vec<OrderedEvent>,
    aggregate: Option<Vec<Message>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[OrderedEvent] {
        &self.events
    }

    pub fn aggregate(&self) -> Option<&[Message]> {
        self.aggregate.as_deref()
    }

    pub fn into_events(self) -> Vec<OrderedEvent> {
        self.events
    }
}

#[async_trait]
impl EventSink for CollectorSink {
    async fn handle(&mut self, event: &OrderedEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    async fn finish(&mut self, messages: &[Message]) -> Result<()> {
        self.aggregate = Some(messages.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Push-channel sink: forwards frames to a tokio mpsc receiver.
pub struct ChannelSink {
    tx: mpsc::Sender<StreamFrame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<StreamFrame>) -> Self {
        Self { tx }
    }

    async fn send(&self, frame: StreamFrame) -> Result<()> {
        self.tx.send(frame).await.map_err(|_| LipsynthError::Sink {
            sink: "channel".to_string(),
            message: "receiver dropped".to_string(),
        })
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn handle(&mut self, event: &OrderedEvent) -> Result<()> {
        self.send(StreamFrame::Event(event.clone())).await
    }

    async fn finish(&mut self, messages: &[Message]) -> Result<()> {
        self.send(StreamFrame::complete(messages.to_vec())).await
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Writes one JSON frame per line, or Server-Sent Events framing.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    sse: bool,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, sse: false }
    }

    /// Switch to `data: <json>\n\n` framing.
    pub fn sse(mut self, enabled: bool) -> Self {
        self.sse = enabled;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_frame(&mut self, frame: &StreamFrame) -> Result<()> {
        let text = if self.sse {
            frame.to_sse()?
        } else {
            format!("{}\n", frame.to_json()?)
        };
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    async fn handle(&mut self, event: &OrderedEvent) -> Result<()> {
        self.write_frame(&StreamFrame::Event(event.clone()))
    }

    async fn finish(&mut self, messages: &[Message]) -> Result<()> {
        self.write_frame(&StreamFrame::complete(messages.to_vec()))
    }

    fn name(&self) -> &'static str {
        if self.sse { "sse" } else { "json-lines" }
    }
}
