//! Event sinks for emitted target counts.
//!
//! The core's obligation ends at producing a `TargetCount`; a sink decides
//! where it goes. Transport protocols are not implemented here.

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::sync::mpsc::Sender;

use crate::debounce::TargetCount;

/// Receiver of emitted counts.
///
/// A failed `emit` is reported to the caller, which logs it and carries on;
/// sinks do not retry.
pub trait EventSink: Send {
    fn name(&self) -> &'static str;

    fn emit(&mut self, counts: &TargetCount) -> Result<()>;
}

/// Logs every event at `info`.
#[derive(Default)]
pub struct LogSink {
    events: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn emit(&mut self, counts: &TargetCount) -> Result<()> {
        self.events += 1;
        log::info!("occupancy event #{}: {}", self.events, counts);
        Ok(())
    }
}

/// Writes one JSON object per line, flushed per event.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn name(&self) -> &'static str {
        "json-lines"
    }

    fn emit(&mut self, counts: &TargetCount) -> Result<()> {
        serde_json::to_writer(&mut self.writer, counts).context("encode target counts")?;
        self.writer.write_all(b"\n").context("write event line")?;
        self.writer.flush().context("flush event line")?;
        Ok(())
    }
}

/// Forwards events to an in-process receiver.
pub struct ChannelSink {
    tx: Sender<TargetCount>,
}

impl ChannelSink {
    pub fn new(tx: Sender<TargetCount>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn emit(&mut self, counts: &TargetCount) -> Result<()> {
        self.tx
            .send(counts.clone())
            .map_err(|_| anyhow!("event receiver disconnected"))
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn emit(&mut self, counts: &TargetCount) -> Result<()> {
        (**self).emit(counts)
    }
}
