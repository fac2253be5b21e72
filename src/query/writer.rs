//! Sinks for per-timestep query results.

use super::{QueryResult, ResultBatch};
use crate::error::{Result, SmcError};
use crate::types::Timestep;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Receives the results of every timestep. Writes block until delivered.
pub trait ResultWriter: Send {
    fn write_all_results(
        &mut self,
        timestep: Option<Timestep>,
        results: &[QueryResult],
    ) -> Result<()>;
}

/// Writes one JSON object per timestep, one per line.
pub struct JsonLinesWriter<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLinesWriter<BufWriter<File>> {
    /// Create (or truncate) a results file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> ResultWriter for JsonLinesWriter<W> {
    fn write_all_results(
        &mut self,
        timestep: Option<Timestep>,
        results: &[QueryResult],
    ) -> Result<()> {
        let batch = ResultBatch {
            timestep,
            results: results.to_vec(),
        };
        serde_json::to_writer(&mut self.out, &batch)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Streams batches to a consumer over a bounded channel.
pub struct ChannelWriter {
    sender: Sender<ResultBatch>,
}

impl ChannelWriter {
    /// Create a writer and the receiving end of its channel.
    pub fn bounded(capacity: usize) -> (Self, Receiver<ResultBatch>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl ResultWriter for ChannelWriter {
    fn write_all_results(
        &mut self,
        timestep: Option<Timestep>,
        results: &[QueryResult],
    ) -> Result<()> {
        let batch = ResultBatch {
            timestep,
            results: results.to_vec(),
        };
        self.sender
            .send(batch)
            .map_err(|_| SmcError::Writer("result receiver disconnected".to_string()))
    }
}

/// Collects batches in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemoryWriter {
    batches: Arc<Mutex<Vec<ResultBatch>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<ResultBatch> {
        self.batches.lock().clone()
    }

    /// The most recent batch written for `timestep`.
    pub fn batch_for(&self, timestep: Option<Timestep>) -> Option<ResultBatch> {
        self.batches
            .lock()
            .iter()
            .rev()
            .find(|b| b.timestep == timestep)
            .cloned()
    }
}

impl ResultWriter for MemoryWriter {
    fn write_all_results(
        &mut self,
        timestep: Option<Timestep>,
        results: &[QueryResult],
    ) -> Result<()> {
        self.batches.lock().push(ResultBatch {
            timestep,
            results: results.to_vec(),
        });
        Ok(())
    }
}

/// Reports results through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl ResultWriter for LogWriter {
    fn write_all_results(
        &mut self,
        timestep: Option<Timestep>,
        results: &[QueryResult],
    ) -> Result<()> {
        for result in results {
            let distribution: Vec<String> = result
                .distribution
                .iter()
                .map(|o| format!("{}: {:.4}", o.value, o.probability))
                .collect();
            info!(
                timestep = ?timestep,
                query = %result.query,
                distribution = %distribution.join(", "),
                "Query result"
            );
        }
        Ok(())
    }
}
