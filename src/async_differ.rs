//! Background row-level differ feeding a bounded channel
//!
//! A worker thread merge-joins two key-ordered row mappings and sends one
//! [`DiffEntry`] per differing key. The consumer pulls entries with
//! [`AsyncDiffer::next`] or [`AsyncDiffer::next_batch`]. Closing the differ
//! stops and joins the worker, even when it is blocked on a full channel.

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{HistDiffError, Result};
use crate::row::{Key, Row, RowCursor, RowMap};
use crate::schema::Schema;
use crate::value::ValueKind;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as KeyOrdering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Classification of a row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    Added,
    Modified,
    Removed,
}

impl DiffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffType::Added => "added",
            DiffType::Modified => "modified",
            DiffType::Removed => "removed",
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One differing key. At least one side is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub key: Key,
    pub older: Option<Row>,
    pub newer: Option<Row>,
}

impl DiffEntry {
    pub fn kind(&self) -> DiffType {
        match (&self.older, &self.newer) {
            (None, _) => DiffType::Added,
            (Some(_), None) => DiffType::Removed,
            (Some(_), Some(_)) => DiffType::Modified,
        }
    }

    /// Split into (older, newer) rows
    pub fn split(self) -> (Option<Row>, Option<Row>) {
        (self.older, self.newer)
    }
}

type Message = Result<DiffEntry>;

/// Sending half held by the worker
struct Sink {
    tx: SyncSender<Message>,
    stop: Arc<AtomicBool>,
    ctx: CancelToken,
    poll_interval: Duration,
}

impl Sink {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst) || self.ctx.is_cancelled()
    }

    /// Send, waiting while the channel is full. Returns false once the
    /// consumer is gone or the session was cancelled.
    fn send(&self, mut message: Message) -> bool {
        loop {
            if self.stopped() {
                return false;
            }
            match self.tx.try_send(message) {
                Ok(()) => return true,
                Err(TrySendError::Full(m)) => {
                    message = m;
                    thread::sleep(self.poll_interval);
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

/// Key column kinds of the reconciled schema.
///
/// Keys read from a historical snapshot may use a narrower kind than the
/// super-schema (an `Int` key later widened to `Float`). Both sides are
/// brought to these kinds before keys are compared, so an unchanged row
/// still matches itself across the widening.
#[derive(Debug, Clone, Default)]
pub struct KeyKinds {
    table: String,
    columns: Vec<(String, ValueKind)>,
}

impl KeyKinds {
    pub fn new(table: impl Into<String>, target: &Schema) -> Self {
        Self {
            table: table.into(),
            columns: target
                .key_columns()
                .map(|c| (c.name.clone(), c.kind))
                .collect(),
        }
    }

    /// Convert each key value into the kind of its key column
    pub fn normalize(&self, key: Key) -> Result<Key> {
        let needs_conversion = key
            .values()
            .iter()
            .zip(&self.columns)
            .any(|(v, (_, kind))| v.kind().is_some_and(|k| k != *kind && k.converts_to(*kind)));
        if !needs_conversion {
            return Ok(key);
        }

        let mut values = key.into_values();
        for (value, (column, kind)) in values.iter_mut().zip(&self.columns) {
            // a reordered key (matched by name) is left as stored
            let Some(from) = value.kind().filter(|k| k != kind && k.converts_to(*kind)) else {
                continue;
            };
            let converted = value
                .convert_to(*kind)
                .ok_or_else(|| HistDiffError::TypeConversion {
                    table: self.table.clone(),
                    column: column.clone(),
                    from,
                    to: *kind,
                    value: Some(value.to_string()),
                })?;
            *value = converted;
        }
        Ok(Key::new(values))
    }
}

fn advance(cursor: &mut RowCursor<'_>, keys: &KeyKinds) -> Result<Option<(Key, Row)>> {
    match cursor.next().transpose()? {
        Some((key, row)) => Ok(Some((keys.normalize(key)?, row))),
        None => Ok(None),
    }
}

/// Merge-join both mappings in key order, sending an entry per differing key
fn diff_maps(older: &dyn RowMap, newer: &dyn RowMap, keys: &KeyKinds, sink: &Sink) -> Result<()> {
    let mut older_cur = older.cursor()?;
    let mut newer_cur = newer.cursor()?;
    let mut old = advance(&mut older_cur, keys)?;
    let mut new = advance(&mut newer_cur, keys)?;
    let mut sent = 0usize;

    loop {
        // long runs of equal rows send nothing, so poll here as well
        if sink.stopped() {
            log::debug!("diff worker stopped after {} entries", sent);
            return Ok(());
        }

        let entry = match (old.take(), new.take()) {
            (None, None) => break,
            (Some((key, row)), None) => {
                old = advance(&mut older_cur, keys)?;
                DiffEntry { key, older: Some(row), newer: None }
            }
            (None, Some((key, row))) => {
                new = advance(&mut newer_cur, keys)?;
                DiffEntry { key, older: None, newer: Some(row) }
            }
            (Some((ok, orow)), Some((nk, nrow))) => match ok.cmp(&nk) {
                KeyOrdering::Less => {
                    new = Some((nk, nrow));
                    old = advance(&mut older_cur, keys)?;
                    DiffEntry { key: ok, older: Some(orow), newer: None }
                }
                KeyOrdering::Greater => {
                    old = Some((ok, orow));
                    new = advance(&mut newer_cur, keys)?;
                    DiffEntry { key: nk, older: None, newer: Some(nrow) }
                }
                KeyOrdering::Equal => {
                    old = advance(&mut older_cur, keys)?;
                    new = advance(&mut newer_cur, keys)?;
                    if orow == nrow {
                        continue;
                    }
                    DiffEntry { key: nk, older: Some(orow), newer: Some(nrow) }
                }
            },
        };

        if !sink.send(Ok(entry)) {
            log::debug!("diff worker stopped after {} entries", sent);
            return Ok(());
        }
        sent += 1;
    }

    log::debug!("diff worker finished with {} entries", sent);
    Ok(())
}

/// Runs one row-level diff on a background thread
pub struct AsyncDiffer {
    receiver: Option<Receiver<Message>>,
    stop: Arc<AtomicBool>,
    ctx: CancelToken,
    poll_interval: Duration,
    worker: Option<JoinHandle<()>>,
}

impl AsyncDiffer {
    /// Spawn the worker diffing `older` against `newer`, comparing keys as stored
    pub fn start(
        older: Arc<dyn RowMap>,
        newer: Arc<dyn RowMap>,
        config: &EngineConfig,
        ctx: CancelToken,
    ) -> Result<Self> {
        Self::start_with_keys(older, newer, KeyKinds::default(), config, ctx)
    }

    /// Spawn the worker, normalizing keys of both sides with `keys` first
    pub fn start_with_keys(
        older: Arc<dyn RowMap>,
        newer: Arc<dyn RowMap>,
        keys: KeyKinds,
        config: &EngineConfig,
        ctx: CancelToken,
    ) -> Result<Self> {
        config.validate()?;

        let (tx, rx) = mpsc::sync_channel(config.channel_capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let sink = Sink {
            tx,
            stop: Arc::clone(&stop),
            ctx: ctx.clone(),
            poll_interval: config.poll_interval(),
        };

        let worker = thread::Builder::new()
            .name("histdiff-differ".to_string())
            .spawn(move || {
                if let Err(e) = diff_maps(older.as_ref(), newer.as_ref(), &keys, &sink) {
                    log::warn!("diff worker failed: {}", e);
                    sink.send(Err(e));
                }
            })?;

        Ok(Self {
            receiver: Some(rx),
            stop,
            ctx,
            poll_interval: config.poll_interval(),
            worker: Some(worker),
        })
    }

    /// Next differing key, or `None` once the diff is exhausted.
    ///
    /// A worker error or a cancelled session closes the differ and is
    /// returned here.
    pub fn next(&mut self) -> Result<Option<DiffEntry>> {
        loop {
            if self.ctx.is_cancelled() {
                self.close()?;
                return Err(HistDiffError::Cancelled);
            }

            let received = match &self.receiver {
                Some(rx) => rx.recv_timeout(self.poll_interval),
                None => return Ok(None),
            };

            match received {
                Ok(Ok(entry)) => return Ok(Some(entry)),
                Ok(Err(e)) => {
                    self.close()?;
                    return Err(e);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.close()?;
                    return Ok(None);
                }
            }
        }
    }

    /// Up to `max` entries. Fewer than `max` means the diff is exhausted.
    pub fn next_batch(&mut self, max: usize) -> Result<Vec<DiffEntry>> {
        let mut batch = Vec::with_capacity(max.min(1024));
        while batch.len() < max {
            match self.next()? {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        Ok(batch)
    }

    pub fn is_closed(&self) -> bool {
        self.worker.is_none() && self.receiver.is_none()
    }

    /// Stop the worker and join it. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        self.receiver.take();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| HistDiffError::store("diff worker thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for AsyncDiffer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close differ: {}", e);
        }
    }
}
