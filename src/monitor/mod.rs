//! Event monitor: prints the events of watched sections.
//!
//! - `EventMonitor`: the per-batch handler, writes the report lines
//! - `subscribe`: registers a handler against a batch stream; batches are
//!   queued on a channel and handled in order by a single consumer task
//! - `Subscription::run_for`: the observation window, ended by the timer,
//!   a shutdown signal or the end of the stream

pub mod dispatch;

pub use dispatch::{subscribe, Subscription, WindowOutcome, WindowReport};

use crate::chain::{ChainError, EventRecord};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("event handler failed: {0}")]
    Handler(#[from] std::io::Error),
    #[error("event dispatcher task failed: {0}")]
    Dispatcher(#[from] tokio::task::JoinError),
}

/// Counters shared between the handler and the caller.
#[derive(Debug, Default)]
pub struct MonitorStats {
    batches: AtomicU64,
    events: AtomicU64,
    matched: AtomicU64,
    fields: AtomicU64,
}

/// Point-in-time copy of `MonitorStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub batches: u64,
    pub events: u64,
    pub matched: u64,
    pub fields: u64,
}

impl MonitorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            fields: self.fields.load(Ordering::Relaxed),
        }
    }
}

/// Filters batches by section and writes the report lines to `out`.
pub struct EventMonitor<W> {
    sections: Vec<String>,
    out: W,
    stats: Arc<MonitorStats>,
}

impl<W: Write> EventMonitor<W> {
    pub fn new(sections: Vec<String>, out: W) -> Self {
        Self {
            sections,
            out,
            stats: Arc::new(MonitorStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<MonitorStats> {
        self.stats.clone()
    }

    pub fn is_watched(&self, record: &EventRecord) -> bool {
        self.sections.iter().any(|s| *s == record.section)
    }

    /// Write the report for one batch. Output for a batch does not depend
    /// on earlier batches.
    pub fn handle_batch(&mut self, batch: &[EventRecord]) -> std::io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Received {} events:", batch.len())?;

        self.stats.batches.fetch_add(1, Ordering::Relaxed);
        self.stats.events.fetch_add(batch.len() as u64, Ordering::Relaxed);

        for record in batch {
            if !self.is_watched(record) {
                continue;
            }
            self.write_record(record)?;
        }

        self.out.flush()
    }

    fn write_record(&mut self, record: &EventRecord) -> std::io::Result<()> {
        debug!(
            section = %record.section,
            method = %record.method,
            fields = record.fields.len(),
            "watched event"
        );
        self.stats.matched.fetch_add(1, Ordering::Relaxed);

        writeln!(
            self.out,
            "{}:{}::(phase={})",
            record.section, record.method, record.phase
        )?;

        let types = record.type_names();
        for (index, field) in record.fields.iter().enumerate() {
            writeln!(self.out, "types: [{}]", types.join(", "))?;
            writeln!(self.out, "--[{}] {}:{}", index, field.type_name, field.value)?;
            self.stats.fields.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
