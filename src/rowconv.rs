//! Conversion of historical rows into the super-schema

use crate::error::{HistDiffError, Result};
use crate::row::Row;
use crate::schema::{schemas_equal, Schema};
use crate::super_schema::NameMap;
use std::collections::BTreeMap;

/// Source tag to destination tag mapping between two schemas
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub table: String,
    pub src: Schema,
    pub dest: Schema,
    pub src_to_dest: BTreeMap<u64, u64>,
}

/// Map every column of `src` onto the `dest` column its name maps to.
///
/// Fails if a mapped column's kind cannot be converted into the destination kind.
pub fn tag_mapping_by_name(
    table: &str,
    src: &Schema,
    dest: &Schema,
    name_map: &NameMap,
) -> Result<FieldMapping> {
    let mut src_to_dest = BTreeMap::new();
    for col in src.columns() {
        let dest_name = name_map.get(&col.name).unwrap_or(&col.name);
        let Some(dest_col) = dest.column_by_name(dest_name) else {
            return Err(HistDiffError::schema_mismatch(format!(
                "column '{}' has no counterpart '{}' in the target schema",
                col.name, dest_name
            )));
        };
        if !col.kind.converts_to(dest_col.kind) {
            return Err(HistDiffError::TypeConversion {
                table: table.to_string(),
                column: dest_col.name.clone(),
                from: col.kind,
                to: dest_col.kind,
                value: None,
            });
        }
        src_to_dest.insert(col.tag, dest_col.tag);
    }

    Ok(FieldMapping {
        table: table.to_string(),
        src: src.clone(),
        dest: dest.clone(),
        src_to_dest,
    })
}

/// Converts rows of one historical schema into the super-schema
#[derive(Debug, Clone)]
pub struct RowConverter {
    /// `None` converts by identity
    mapping: Option<FieldMapping>,
}

impl RowConverter {
    pub fn identity() -> Self {
        Self { mapping: None }
    }

    pub fn new(mapping: FieldMapping) -> Self {
        Self {
            mapping: Some(mapping),
        }
    }

    /// Converter for rows stored under `src`. The empty schema (table absent)
    /// and a schema equal to the target both convert by identity.
    pub fn for_schema(table: &str, src: &Schema, target: &Schema, name_map: &NameMap) -> Result<Self> {
        if schemas_equal(src, &Schema::empty()) || schemas_equal(src, target) {
            return Ok(Self::identity());
        }
        tag_mapping_by_name(table, src, target, name_map).map(Self::new)
    }

    pub fn is_identity(&self) -> bool {
        self.mapping.is_none()
    }

    pub fn convert(&self, row: &Row) -> Result<Row> {
        let Some(mapping) = &self.mapping else {
            return Ok(row.clone());
        };

        let mut out = Row::new();
        for (src_tag, value) in row.iter() {
            let Some(dest_tag) = mapping.src_to_dest.get(&src_tag) else {
                continue;
            };
            let Some(dest_col) = mapping.dest.column_by_tag(*dest_tag) else {
                continue;
            };
            let converted = value
                .convert_to(dest_col.kind)
                .ok_or_else(|| HistDiffError::TypeConversion {
                    table: mapping.table.clone(),
                    column: dest_col.name.clone(),
                    from: value.kind().unwrap_or(dest_col.kind),
                    to: dest_col.kind,
                    value: Some(value.to_string()),
                })?;
            out.set(*dest_tag, converted);
        }
        Ok(out)
    }
}
