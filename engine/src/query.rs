//! Queries - filtered row selection over a table.
//!
//! A [`Query`] is a conjunction of column conditions, optionally restricted to
//! the rows of another view or the elements of a link list. Restricted queries
//! enumerate candidates in the restriction's order; unrestricted ones walk the
//! table in storage order.

use crate::handover::{HandoverPatch, PayloadMode};
use crate::{
    error::Result, ColKey, Error, Group, LinkList, LinkListPatch, ObjKey, Object, Table, TableKey,
    Value, View,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison applied by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

/// `column <op> value` for one row.
///
/// Equality is null-aware: `Equal` against null matches null cells. Ordering
/// operators never match a null on either side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub column: ColKey,
    pub op: Operator,
    pub value: Value,
}

impl Condition {
    fn matches(&self, object: &Object) -> bool {
        let cell = object.get(self.column);
        match self.op {
            Operator::Equal => cell.matches(&self.value),
            Operator::NotEqual => !cell.matches(&self.value),
            op => {
                if cell.is_null()
                    || self.value.is_null()
                    || cell.data_type() != self.value.data_type()
                {
                    return false;
                }
                let ord = cell.cmp(&self.value);
                match op {
                    Operator::Greater => ord == Ordering::Greater,
                    Operator::GreaterEqual => ord != Ordering::Less,
                    Operator::Less => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                }
            }
        }
    }

    fn validate(&self, table: &Table) -> Result<()> {
        let spec = table.column_spec(self.column)?;
        match self.value.data_type() {
            Some(t) if t != spec.data_type => {
                Err(Error::type_mismatch(&spec.name, spec.data_type, t))
            }
            _ => Ok(()),
        }
    }
}

/// What a query's candidate rows are drawn from, when not the whole table.
#[derive(Debug, Clone, PartialEq)]
pub enum Restriction {
    View(Box<View>),
    LinkList(LinkList),
}

/// Context-free form of a [`Restriction`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "patch", rename_all = "camelCase")]
pub enum RestrictionPatch {
    View(Box<HandoverPatch>),
    LinkList(LinkListPatch),
}

/// A filter over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: TableKey,
    conditions: Vec<Condition>,
    restriction: Option<Restriction>,
}

/// Context-free form of a [`Query`] carried inside a handover patch.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPatch {
    pub table: TableKey,
    pub conditions: Vec<Condition>,
    pub restriction: Option<RestrictionPatch>,
}

impl Query {
    /// A query matching every row of `table`.
    pub fn new(table: TableKey) -> Self {
        Self {
            table,
            conditions: Vec::new(),
            restriction: None,
        }
    }

    pub fn table(&self) -> TableKey {
        self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn restriction(&self) -> Option<&Restriction> {
        self.restriction.as_ref()
    }

    pub(crate) fn restricting_view_mut(&mut self) -> Option<&mut View> {
        match &mut self.restriction {
            Some(Restriction::View(view)) => Some(view),
            _ => None,
        }
    }

    /// Add a condition.
    pub fn with_condition(mut self, column: ColKey, op: Operator, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            column,
            op,
            value: value.into(),
        });
        self
    }

    pub fn equal(self, column: ColKey, value: impl Into<Value>) -> Self {
        self.with_condition(column, Operator::Equal, value)
    }

    pub fn not_equal(self, column: ColKey, value: impl Into<Value>) -> Self {
        self.with_condition(column, Operator::NotEqual, value)
    }

    pub fn greater(self, column: ColKey, value: impl Into<Value>) -> Self {
        self.with_condition(column, Operator::Greater, value)
    }

    pub fn greater_equal(self, column: ColKey, value: impl Into<Value>) -> Self {
        self.with_condition(column, Operator::GreaterEqual, value)
    }

    pub fn less(self, column: ColKey, value: impl Into<Value>) -> Self {
        self.with_condition(column, Operator::Less, value)
    }

    pub fn less_equal(self, column: ColKey, value: impl Into<Value>) -> Self {
        self.with_condition(column, Operator::LessEqual, value)
    }

    pub fn is_null(self, column: ColKey) -> Self {
        self.with_condition(column, Operator::Equal, Value::Null)
    }

    pub fn is_not_null(self, column: ColKey) -> Self {
        self.with_condition(column, Operator::NotEqual, Value::Null)
    }

    /// Only consider the rows of `view`, in the view's order.
    pub fn restrict_to_view(mut self, view: View) -> Result<Self> {
        if view.table_key() != self.table {
            return Err(Error::RestrictionMismatch {
                query: self.table,
                restriction: view.table_key(),
            });
        }
        self.restriction = Some(Restriction::View(Box::new(view)));
        Ok(self)
    }

    /// Only consider the elements of `list`, in list order.
    pub fn restrict_to_link_list(mut self, list: LinkList) -> Result<Self> {
        if list.target_table() != self.table {
            return Err(Error::RestrictionMismatch {
                query: self.table,
                restriction: list.target_table(),
            });
        }
        self.restriction = Some(Restriction::LinkList(list));
        Ok(self)
    }

    /// Whether results come out in table storage order.
    pub fn produces_results_in_table_order(&self) -> bool {
        self.restriction.is_none()
    }

    /// Run the query.
    ///
    /// `start..end` selects positions in the candidate sequence (the table, or
    /// the restriction) and `limit` caps the number of matches. A restricting
    /// view is read as it is; syncing it is the caller's business.
    pub fn populate(
        &self,
        group: &Group,
        start: usize,
        end: Option<usize>,
        limit: Option<usize>,
    ) -> Result<Vec<ObjKey>> {
        let table = group.get_table(self.table)?;
        for condition in &self.conditions {
            condition.validate(table)?;
        }

        let candidates: Vec<ObjKey> = match &self.restriction {
            None => table.keys().collect(),
            Some(Restriction::View(view)) => view.keys().to_vec(),
            Some(Restriction::LinkList(list)) => list.keys(group),
        };

        let end = end.unwrap_or(candidates.len()).min(candidates.len());
        let limit = limit.unwrap_or(usize::MAX);
        let mut result = Vec::new();
        if start >= end {
            return Ok(result);
        }

        for key in &candidates[start..end] {
            if result.len() >= limit {
                break;
            }
            // detached entries of a restricting view never match
            let Some(object) = table.object(*key) else {
                continue;
            };
            if self.conditions.iter().all(|c| c.matches(object)) {
                result.push(*key);
            }
        }
        Ok(result)
    }

    /// Run the query over the whole candidate sequence and wrap the result in a view.
    pub fn find_all(self, group: &Group) -> Result<View> {
        View::from_query(group, self, 0, None, None)
    }

    /// Export the query. A restricting view is exported with `mode`.
    pub fn generate_patch(&self, group: &Group, mode: PayloadMode) -> Result<QueryPatch> {
        let restriction = match &self.restriction {
            None => None,
            Some(Restriction::View(view)) => Some(RestrictionPatch::View(Box::new(
                view.export_for_handover(group, mode)?,
            ))),
            Some(Restriction::LinkList(list)) => {
                Some(RestrictionPatch::LinkList(list.generate_patch()))
            }
        };
        Ok(QueryPatch {
            table: self.table,
            conditions: self.conditions.clone(),
            restriction,
        })
    }

    /// Rebuild a query in another group.
    pub fn from_patch(patch: QueryPatch, group: &Group) -> Result<Self> {
        let table = group.get_table(patch.table).map_err(|e| {
            Error::HandoverResolution(format!("query table {}: {}", patch.table, e))
        })?;
        for condition in &patch.conditions {
            condition.validate(table).map_err(|e| {
                Error::HandoverResolution(format!("query condition on '{}': {}", table.name(), e))
            })?;
        }

        let restriction = match patch.restriction {
            None => None,
            Some(RestrictionPatch::View(view)) => {
                Some(Restriction::View(Box::new(View::import_patch(*view, group)?)))
            }
            Some(RestrictionPatch::LinkList(list)) => {
                Some(Restriction::LinkList(LinkList::from_patch(list, group)?))
            }
        };
        Ok(Self {
            table: patch.table,
            conditions: patch.conditions,
            restriction,
        })
    }
}
