// src/sink.rs
//
// Write-side boundary. The core emits (row, column, value) cell writes; a
// batching writer groups them, pauses between flushes, and retries with
// exponential backoff when the remote staging store signals a rate limit.

use log::{info, warn};
use rand::Rng;
use std::io::Write as IoWrite;
use std::time::Duration;
use thiserror::Error;

/// One cell write request against the staging table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub row: usize,
    pub column: String,
    pub value: String,
}

impl CellWrite {
    pub fn new(row: usize, column: impl Into<String>, value: impl Into<String>) -> Self {
        CellWrite {
            row,
            column: column.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    /// The remote store asked us to slow down; the flush may be retried.
    #[error("rate limited by remote store")]
    RateLimited,

    /// Anything else is not retryable and fails the flush outright.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Destination for cell writes. Implementations are adapters to the staging
/// store (spreadsheet, database table); tests use an in-memory sink.
pub trait ResultSink {
    fn write_cells(
        &mut self,
        batch: &[CellWrite],
    ) -> impl std::future::Future<Output = Result<(), SinkError>> + Send;
}

/// Batches cell writes in front of a [`ResultSink`].
///
/// Flushes at `batch_size` cells, inserts a mandatory pause between
/// consecutive flushes, and retries rate-limited flushes with exponential
/// backoff plus jitter: wait = min(2^retries seconds + jitter, cap).
/// Exhausting `max_retries` is fatal for the flush and propagates; the run
/// must not silently drop data.
pub struct BatchedWriter<S> {
    sink: S,
    pending: Vec<CellWrite>,
    batch_size: usize,
    flush_pause: Duration,
    max_retries: u32,
    backoff_cap: Duration,
    flushes_done: usize,
}

impl<S: ResultSink> BatchedWriter<S> {
    pub fn new(
        sink: S,
        batch_size: usize,
        flush_pause: Duration,
        max_retries: u32,
        backoff_cap: Duration,
    ) -> Self {
        BatchedWriter {
            sink,
            pending: Vec::with_capacity(batch_size),
            batch_size: batch_size.max(1),
            flush_pause,
            max_retries,
            backoff_cap,
            flushes_done: 0,
        }
    }

    /// Queues one write, flushing when the batch cap is reached.
    pub async fn push(&mut self, cell: CellWrite) -> Result<(), SinkError> {
        self.pending.push(cell);
        if self.pending.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flushes everything pending. Safe to call with nothing queued.
    pub async fn flush(&mut self) -> Result<(), SinkError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if self.flushes_done > 0 {
            tokio::time::sleep(self.flush_pause).await;
        }

        let batch = std::mem::take(&mut self.pending);
        let mut retries = 0u32;
        loop {
            match self.sink.write_cells(&batch).await {
                Ok(()) => break,
                Err(SinkError::RateLimited) if retries < self.max_retries => {
                    retries += 1;
                    let wait = backoff_wait(retries, self.backoff_cap);
                    warn!(
                        "Sink rate limited, retry {}/{} after {:.1?}",
                        retries, self.max_retries, wait
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(SinkError::RateLimited) => {
                    return Err(SinkError::Other(anyhow::anyhow!(
                        "sink flush failed after {} rate-limit retries ({} cells lost)",
                        self.max_retries,
                        batch.len()
                    )));
                }
                Err(e) => return Err(e),
            }
        }
        self.flushes_done += 1;
        info!("Flushed {} cells (flush #{})", batch.len(), self.flushes_done);
        Ok(())
    }

    /// Flushes any remainder and hands the sink back.
    pub async fn finish(mut self) -> Result<S, SinkError> {
        self.flush().await?;
        Ok(self.sink)
    }
}

/// Exponential wait with up to one second of uniform jitter, capped.
fn backoff_wait(retries: u32, cap: Duration) -> Duration {
    let base = Duration::from_secs(1u64 << retries.min(16));
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
    (base + jitter).min(cap)
}

/// Collects writes in memory. Used by tests and as a dry-run destination.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub cells: Vec<CellWrite>,
    pub flushes: usize,
}

impl ResultSink for MemorySink {
    async fn write_cells(&mut self, batch: &[CellWrite]) -> Result<(), SinkError> {
        self.cells.extend_from_slice(batch);
        self.flushes += 1;
        Ok(())
    }
}

/// Appends cell writes to a CSV file, one `row,column,value` line per cell.
/// The file stands in for the human-editable staging sheet.
pub struct CsvSink {
    writer: std::io::BufWriter<std::fs::File>,
}

impl CsvSink {
    pub fn create(path: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create result file {}", path))?;
        let mut writer = std::io::BufWriter::new(file);
        writeln!(writer, "row,column,value").context("Failed to write result header")?;
        Ok(CsvSink { writer })
    }
}

impl ResultSink for CsvSink {
    async fn write_cells(&mut self, batch: &[CellWrite]) -> Result<(), SinkError> {
        for cell in batch {
            writeln!(
                self.writer,
                "{},{},{}",
                cell.row,
                escape_csv(&cell.column),
                escape_csv(&cell.value)
            )
            .map_err(|e| SinkError::Other(e.into()))?;
        }
        self.writer
            .flush()
            .map_err(|e| SinkError::Other(e.into()))?;
        Ok(())
    }
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
