//! Sort and distinct descriptors.
//!
//! A [`DescriptorOrdering`] is the stacked transformation pipeline a view
//! applies after computing its raw rows. Steps run in the order they were
//! appended:
//!
//! - a sort step is a stable sort, so a later sort keeps the order produced by
//!   earlier steps among rows it considers equal;
//! - a distinct step keeps, for every duplicated key tuple, the entry that
//!   appears **last** in the current order and drops the earlier ones, leaving
//!   the order of survivors untouched.
//!
//! Applying an ordering is a pure function of the row keys and the table data,
//! and applying it again to its own output changes nothing.

use crate::{error::Result, ColKey, Error, ObjKey, Table, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Sort by one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDescriptor {
    columns: Vec<ColKey>,
    /// One flag per column; empty means all ascending
    ascending: Vec<bool>,
}

impl SortDescriptor {
    pub fn new(columns: Vec<ColKey>, ascending: Vec<bool>) -> Self {
        Self { columns, ascending }
    }

    /// Sort by a single column.
    pub fn by(column: ColKey, ascending: bool) -> Self {
        Self::new(vec![column], vec![ascending])
    }

    pub fn columns(&self) -> &[ColKey] {
        &self.columns
    }

    pub fn is_ascending(&self, i: usize) -> bool {
        self.ascending.get(i).copied().unwrap_or(true)
    }

    fn validate(&self, table: &Table) -> Result<()> {
        if !self.ascending.is_empty() && self.ascending.len() != self.columns.len() {
            return Err(Error::InvalidDescriptor(format!(
                "{} sort columns but {} directions",
                self.columns.len(),
                self.ascending.len()
            )));
        }
        validate_columns(table, &self.columns)
    }

    fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            let ord = x.cmp(y);
            if ord != Ordering::Equal {
                return if self.is_ascending(i) { ord } else { ord.reverse() };
            }
        }
        Ordering::Equal
    }
}

/// Remove rows whose values in the given columns duplicate a later row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinctDescriptor {
    columns: Vec<ColKey>,
}

impl DistinctDescriptor {
    pub fn new(columns: Vec<ColKey>) -> Self {
        Self { columns }
    }

    pub fn by(column: ColKey) -> Self {
        Self::new(vec![column])
    }

    pub fn columns(&self) -> &[ColKey] {
        &self.columns
    }
}

/// One step of a [`DescriptorOrdering`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Descriptor {
    Sort(SortDescriptor),
    Distinct(DistinctDescriptor),
}

impl Descriptor {
    fn columns(&self) -> &[ColKey] {
        match self {
            Descriptor::Sort(d) => d.columns(),
            Descriptor::Distinct(d) => d.columns(),
        }
    }
}

/// An ordered, append-only list of sort and distinct steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorOrdering {
    descriptors: Vec<Descriptor>,
}

/// Context-free form of a [`DescriptorOrdering`] carried inside a handover patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorOrderingPatch {
    pub descriptors: Vec<Descriptor>,
}

impl DescriptorOrdering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_sort(&mut self, sort: SortDescriptor) {
        self.descriptors.push(Descriptor::Sort(sort));
    }

    pub fn append_distinct(&mut self, distinct: DistinctDescriptor) {
        self.descriptors.push(Descriptor::Distinct(distinct));
    }

    /// Builder-style [`append_sort`](Self::append_sort).
    pub fn with_sort(mut self, sort: SortDescriptor) -> Self {
        self.append_sort(sort);
        self
    }

    /// Builder-style [`append_distinct`](Self::append_distinct).
    pub fn with_distinct(mut self, distinct: DistinctDescriptor) -> Self {
        self.append_distinct(distinct);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn will_apply_sort(&self) -> bool {
        self.descriptors
            .iter()
            .any(|d| matches!(d, Descriptor::Sort(s) if !s.columns.is_empty()))
    }

    pub fn will_apply_distinct(&self) -> bool {
        self.descriptors
            .iter()
            .any(|d| matches!(d, Descriptor::Distinct(s) if !s.columns.is_empty()))
    }

    /// Check every step against the table's columns.
    pub fn validate(&self, table: &Table) -> Result<()> {
        for descriptor in &self.descriptors {
            match descriptor {
                Descriptor::Sort(sort) => sort.validate(table)?,
                Descriptor::Distinct(distinct) => validate_columns(table, &distinct.columns)?,
            }
        }
        Ok(())
    }

    /// Apply every step, in append order, to `keys`.
    ///
    /// Keys that no longer resolve read as null in every column.
    pub fn apply(&self, table: &Table, keys: &mut Vec<ObjKey>) -> Result<()> {
        if self.descriptors.is_empty() {
            return Ok(());
        }
        self.validate(table)?;

        for descriptor in &self.descriptors {
            let columns = descriptor.columns();
            if columns.is_empty() {
                continue;
            }
            let mut rows: Vec<(Vec<Value>, ObjKey)> = keys
                .iter()
                .map(|key| (row_tuple(table, *key, columns), *key))
                .collect();

            match descriptor {
                Descriptor::Sort(sort) => {
                    rows.sort_by(|(a, _), (b, _)| sort.compare(a, b));
                }
                Descriptor::Distinct(_) => {
                    let mut seen = BTreeSet::new();
                    let mut kept = Vec::with_capacity(rows.len());
                    for row in rows.into_iter().rev() {
                        if seen.insert(row.0.clone()) {
                            kept.push(row);
                        }
                    }
                    kept.reverse();
                    rows = kept;
                }
            }

            *keys = rows.into_iter().map(|(_, key)| key).collect();
        }
        Ok(())
    }

    pub fn generate_patch(&self) -> DescriptorOrderingPatch {
        DescriptorOrderingPatch {
            descriptors: self.descriptors.clone(),
        }
    }

    /// Rebuild an ordering in another group, re-checking its columns against
    /// the table it will be applied to there.
    pub fn from_patch(patch: DescriptorOrderingPatch, table: &Table) -> Result<Self> {
        let ordering = Self {
            descriptors: patch.descriptors,
        };
        ordering.validate(table).map_err(|e| {
            Error::HandoverResolution(format!("ordering on table '{}': {}", table.name(), e))
        })?;
        Ok(ordering)
    }
}

fn validate_columns(table: &Table, columns: &[ColKey]) -> Result<()> {
    for col in columns {
        let spec = table.column_spec(*col)?;
        if spec.data_type.is_link() {
            return Err(Error::InvalidDescriptor(format!(
                "cannot order by link column '{}'",
                spec.name
            )));
        }
    }
    Ok(())
}

fn row_tuple(table: &Table, key: ObjKey, columns: &[ColKey]) -> Vec<Value> {
    match table.object(key) {
        Some(object) => columns.iter().map(|c| object.get(*c).clone()).collect(),
        None => vec![Value::Null; columns.len()],
    }
}
