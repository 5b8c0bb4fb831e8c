//! Joined diff rows for one partition

use crate::async_differ::{AsyncDiffer, DiffEntry, DiffType, KeyKinds};
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{HistDiffError, Result};
use crate::partition::DiffPartition;
use crate::row::{MemRowMap, Row, RowMap};
use crate::rowconv::RowConverter;
use crate::schema::{
    from_col_name, to_col_name, Column, Schema, DIFF_COMMIT_DATE_TAG, DIFF_COMMIT_TAG,
};
use crate::store::Table;
use crate::super_schema::ReconciledSchema;
use crate::value::{Value, ValueKind};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::Arc;

pub const DIFF_TYPE_COLUMN: &str = "diff_type";

/// Column layout of diff rows: every super-schema column plus `commit` and
/// `commit_date` as `to_*`, the same again as `from_*`, then `diff_type`
#[derive(Debug, Clone)]
pub struct DiffSchema {
    schema: Schema,
    /// Super-schema tags backing the `to_*` (and, in the same order, `from_*`) columns
    side_tags: Vec<u64>,
}

impl DiffSchema {
    pub fn new(super_schema: &Schema) -> Result<Self> {
        let side = super_schema.with_commit_columns()?;
        let side_tags: Vec<u64> = side.columns().iter().map(|c| c.tag).collect();

        let mut columns = Vec::with_capacity(side.len() * 2 + 1);
        for col in side.columns() {
            columns.push(Column::new(to_col_name(&col.name), columns.len() as u64, col.kind));
        }
        for col in side.columns() {
            columns.push(Column::new(from_col_name(&col.name), columns.len() as u64, col.kind));
        }
        columns.push(Column::new(DIFF_TYPE_COLUMN, columns.len() as u64, ValueKind::String).not_null());

        Ok(Self {
            schema: Schema::new(columns)?,
            side_tags,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.schema.columns().iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    fn join(&self, newer: Option<&Row>, older: Option<&Row>, diff_type: DiffType) -> Vec<Value> {
        let mut values = Vec::with_capacity(self.len());
        for side in [newer, older] {
            for tag in &self.side_tags {
                let value = side.and_then(|r| r.get(*tag)).cloned().unwrap_or(Value::Null);
                values.push(value);
            }
        }
        values.push(Value::String(diff_type.as_str().to_string()));
        values
    }
}

/// One output row of a diff
#[derive(Debug, Clone)]
pub struct DiffRow {
    schema: Arc<DiffSchema>,
    values: Vec<Value>,
    diff_type: DiffType,
}

impl DiffRow {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.schema().index_of(name).map(|i| &self.values[i])
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn diff_type(&self) -> DiffType {
        self.diff_type
    }

    /// Column name to value, in diff schema order
    pub fn to_map(&self) -> IndexMap<&str, &Value> {
        self.schema.column_names().zip(&self.values).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterState {
    Created,
    Iterating,
    Closed,
}

/// Converted side of a partition
struct Side {
    rows: Arc<dyn RowMap>,
    converter: RowConverter,
    label: String,
    date: Option<DateTime<Utc>>,
}

impl Side {
    fn new(
        table_name: &str,
        table: Option<&Arc<Table>>,
        label: &str,
        date: Option<DateTime<Utc>>,
        reconciled: &ReconciledSchema,
        target: &Schema,
    ) -> Result<Self> {
        let (rows, converter) = match table {
            Some(t) => {
                let names = reconciled.name_map_for(t.schema())?;
                (t.rows(), RowConverter::for_schema(table_name, t.schema(), target, &names)?)
            }
            None => (
                Arc::new(MemRowMap::new()) as Arc<dyn RowMap>,
                RowConverter::identity(),
            ),
        };
        Ok(Self {
            rows,
            converter,
            label: label.to_string(),
            date,
        })
    }

    fn convert(&self, row: Option<Row>) -> Result<Option<Row>> {
        row.map(|r| self.converter.convert(&r)).transpose()
    }

    fn stamp(&self, row: &mut Row) {
        row.set(DIFF_COMMIT_TAG, Value::String(self.label.clone()));
        if let Some(date) = self.date {
            row.set(DIFF_COMMIT_DATE_TAG, Value::Timestamp(date));
        }
    }
}

/// Streams the joined diff rows of one partition.
///
/// The background differ starts on the first call to [`DiffRowIter::next`].
/// Calling `next` after [`DiffRowIter::close`] returns
/// [`HistDiffError::IteratorClosed`].
pub struct DiffRowIter {
    state: IterState,
    differ: Option<AsyncDiffer>,
    newer: Side,
    older: Side,
    keys: KeyKinds,
    schema: Arc<DiffSchema>,
    config: EngineConfig,
    ctx: CancelToken,
}

impl DiffRowIter {
    pub fn new(
        table_name: &str,
        partition: &DiffPartition,
        reconciled: &ReconciledSchema,
        target: &Schema,
        schema: Arc<DiffSchema>,
        config: EngineConfig,
        ctx: CancelToken,
    ) -> Result<Self> {
        let newer = Side::new(
            table_name,
            partition.newer.as_ref(),
            &partition.newer_label,
            partition.newer_date,
            reconciled,
            target,
        )?;
        let older = Side::new(
            table_name,
            partition.older.as_ref(),
            &partition.older_label,
            partition.older_date,
            reconciled,
            target,
        )?;

        Ok(Self {
            state: IterState::Created,
            differ: None,
            newer,
            older,
            keys: KeyKinds::new(table_name, target),
            schema,
            config,
            ctx,
        })
    }

    pub fn schema(&self) -> &Arc<DiffSchema> {
        &self.schema
    }

    pub fn is_closed(&self) -> bool {
        self.state == IterState::Closed
    }

    /// Convert both sides into the super-schema and join them. Entries whose
    /// sides only differed by representation (widened kinds) yield `None`.
    fn join(&self, entry: DiffEntry) -> Result<Option<DiffRow>> {
        let diff_type = entry.kind();
        let (older, newer) = entry.split();
        let mut newer = self.newer.convert(newer)?;
        let mut older = self.older.convert(older)?;
        if newer.is_some() && newer == older {
            return Ok(None);
        }

        if let Some(row) = newer.as_mut() {
            self.newer.stamp(row);
        }
        if let Some(row) = older.as_mut() {
            self.older.stamp(row);
        }
        Ok(Some(DiffRow {
            values: self.schema.join(newer.as_ref(), older.as_ref(), diff_type),
            schema: Arc::clone(&self.schema),
            diff_type,
        }))
    }

    pub fn next(&mut self) -> Result<Option<DiffRow>> {
        match self.state {
            IterState::Closed => return Err(HistDiffError::IteratorClosed),
            IterState::Created => {
                self.differ = Some(AsyncDiffer::start_with_keys(
                    Arc::clone(&self.older.rows),
                    Arc::clone(&self.newer.rows),
                    self.keys.clone(),
                    &self.config,
                    self.ctx.clone(),
                )?);
                self.state = IterState::Iterating;
            }
            IterState::Iterating => {}
        }

        loop {
            let Some(differ) = self.differ.as_mut() else {
                return Ok(None);
            };
            let entry = match differ.next() {
                Ok(Some(entry)) => entry,
                Ok(None) => return Ok(None),
                Err(e) => {
                    self.close()?;
                    return Err(e);
                }
            };

            match self.join(entry) {
                Ok(Some(row)) => return Ok(Some(row)),
                Ok(None) => continue,
                Err(e) => {
                    self.close()?;
                    return Err(e);
                }
            }
        }
    }

    /// Up to `max` rows. Fewer than `max` means the partition is exhausted.
    pub fn next_batch(&mut self, max: usize) -> Result<Vec<DiffRow>> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.next()? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Release the background differ. Safe to call at any point, any number of times.
    pub fn close(&mut self) -> Result<()> {
        self.state = IterState::Closed;
        if let Some(mut differ) = self.differ.take() {
            differ.close()?;
        }
        Ok(())
    }
}

impl Drop for DiffRowIter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("failed to close diff row iterator: {}", e);
        }
    }
}
