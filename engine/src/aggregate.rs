//! Aggregation over a view's attached rows.
//!
//! Numeric aggregates share one fold parameterized by [`Aggregatable`]. Null
//! cells and detached entries never contribute. Timestamps get their own
//! null-aware extremum search, driven by an [`Earlier`] or [`Later`] comparator.

use crate::{error::Result, ColKey, DataType, Group, ObjKey, Timestamp, Value, View};
use std::cmp::Ordering;
use std::fmt::Debug;

/// A column element type that can be summed and compared.
pub trait Aggregatable: Copy + PartialEq + Debug {
    /// Accumulator type of `sum`.
    type Sum: Copy + Default + Debug;

    const DATA_TYPE: DataType;

    fn from_value(value: &Value) -> Option<Self>;
    fn accumulate(sum: Self::Sum, value: Self) -> Self::Sum;
    fn sum_to_f64(sum: Self::Sum) -> f64;
    fn compare(&self, other: &Self) -> Ordering;
}

impl Aggregatable for i64 {
    type Sum = i64;
    const DATA_TYPE: DataType = DataType::Int;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn accumulate(sum: i64, value: i64) -> i64 {
        sum.wrapping_add(value)
    }

    fn sum_to_f64(sum: i64) -> f64 {
        sum as f64
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl Aggregatable for f32 {
    type Sum = f64;
    const DATA_TYPE: DataType = DataType::Float;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn accumulate(sum: f64, value: f32) -> f64 {
        sum + value as f64
    }

    fn sum_to_f64(sum: f64) -> f64 {
        sum
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl Aggregatable for f64 {
    type Sum = f64;
    const DATA_TYPE: DataType = DataType::Double;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    fn accumulate(sum: f64, value: f64) -> f64 {
        sum + value
    }

    fn sum_to_f64(sum: f64) -> f64 {
        sum
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

/// Mean of the non-null values and how many there were.
///
/// `value` is 0 when `count` is 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Average {
    pub value: f64,
    pub count: usize,
}

/// Everything one pass over a column produces.
#[derive(Debug, Clone, Copy)]
pub struct Fold<T: Aggregatable> {
    pub sum: T::Sum,
    pub count: usize,
    pub min: Option<(T, ObjKey)>,
    pub max: Option<(T, ObjKey)>,
}

impl<T: Aggregatable> Fold<T> {
    fn average(&self) -> Average {
        let value = match self.count {
            0 => 0.0,
            n => T::sum_to_f64(self.sum) / n as f64,
        };
        Average {
            value,
            count: self.count,
        }
    }
}

/// Picks one timestamp over another.
pub trait TimestampOrder {
    fn prefer(candidate: &Timestamp, current: &Timestamp) -> bool;
}

/// Prefers the earlier timestamp.
pub struct Earlier;

/// Prefers the later timestamp.
pub struct Later;

impl TimestampOrder for Earlier {
    fn prefer(candidate: &Timestamp, current: &Timestamp) -> bool {
        candidate < current
    }
}

impl TimestampOrder for Later {
    fn prefer(candidate: &Timestamp, current: &Timestamp) -> bool {
        candidate > current
    }
}

impl View {
    /// Fold `column` over the attached rows. Ties keep the first row.
    pub fn fold<T: Aggregatable>(&self, group: &Group, column: ColKey) -> Result<Fold<T>> {
        let reader = self.column_reader(group, column, T::DATA_TYPE)?;
        let mut fold = Fold {
            sum: T::Sum::default(),
            count: 0,
            min: None,
            max: None,
        };

        for key in self.keys() {
            let Some(value) = reader.read(*key).and_then(T::from_value) else {
                continue;
            };
            fold.sum = T::accumulate(fold.sum, value);
            fold.count += 1;
            if fold.min.map_or(true, |(m, _)| value.compare(&m) == Ordering::Less) {
                fold.min = Some((value, *key));
            }
            if fold.max.map_or(true, |(m, _)| value.compare(&m) == Ordering::Greater) {
                fold.max = Some((value, *key));
            }
        }
        Ok(fold)
    }

    fn count_matching<T: Aggregatable>(
        &self,
        group: &Group,
        column: ColKey,
        target: T,
    ) -> Result<usize> {
        let reader = self.column_reader(group, column, T::DATA_TYPE)?;
        Ok(self
            .keys()
            .iter()
            .filter_map(|key| reader.read(*key).and_then(T::from_value))
            .filter(|v| *v == target)
            .count())
    }

    // Int

    pub fn sum_int(&self, group: &Group, column: ColKey) -> Result<i64> {
        Ok(self.fold::<i64>(group, column)?.sum)
    }

    pub fn minimum_int(&self, group: &Group, column: ColKey) -> Result<Option<(i64, ObjKey)>> {
        Ok(self.fold::<i64>(group, column)?.min)
    }

    pub fn maximum_int(&self, group: &Group, column: ColKey) -> Result<Option<(i64, ObjKey)>> {
        Ok(self.fold::<i64>(group, column)?.max)
    }

    pub fn average_int(&self, group: &Group, column: ColKey) -> Result<Average> {
        Ok(self.fold::<i64>(group, column)?.average())
    }

    pub fn count_int(&self, group: &Group, column: ColKey, target: i64) -> Result<usize> {
        self.count_matching(group, column, target)
    }

    // Float

    pub fn sum_float(&self, group: &Group, column: ColKey) -> Result<f64> {
        Ok(self.fold::<f32>(group, column)?.sum)
    }

    pub fn minimum_float(&self, group: &Group, column: ColKey) -> Result<Option<(f32, ObjKey)>> {
        Ok(self.fold::<f32>(group, column)?.min)
    }

    pub fn maximum_float(&self, group: &Group, column: ColKey) -> Result<Option<(f32, ObjKey)>> {
        Ok(self.fold::<f32>(group, column)?.max)
    }

    pub fn average_float(&self, group: &Group, column: ColKey) -> Result<Average> {
        Ok(self.fold::<f32>(group, column)?.average())
    }

    pub fn count_float(&self, group: &Group, column: ColKey, target: f32) -> Result<usize> {
        self.count_matching(group, column, target)
    }

    // Double

    pub fn sum_double(&self, group: &Group, column: ColKey) -> Result<f64> {
        Ok(self.fold::<f64>(group, column)?.sum)
    }

    pub fn minimum_double(&self, group: &Group, column: ColKey) -> Result<Option<(f64, ObjKey)>> {
        Ok(self.fold::<f64>(group, column)?.min)
    }

    pub fn maximum_double(&self, group: &Group, column: ColKey) -> Result<Option<(f64, ObjKey)>> {
        Ok(self.fold::<f64>(group, column)?.max)
    }

    pub fn average_double(&self, group: &Group, column: ColKey) -> Result<Average> {
        Ok(self.fold::<f64>(group, column)?.average())
    }

    pub fn count_double(&self, group: &Group, column: ColKey, target: f64) -> Result<usize> {
        self.count_matching(group, column, target)
    }

    // Timestamp

    fn timestamp_extreme<C: TimestampOrder>(
        &self,
        group: &Group,
        column: ColKey,
    ) -> Result<Option<(Timestamp, ObjKey)>> {
        let reader = self.column_reader(group, column, DataType::Timestamp)?;
        let mut best: Option<(Timestamp, ObjKey)> = None;
        for key in self.keys() {
            if let Some(Value::Timestamp(ts)) = reader.read(*key) {
                if best.map_or(true, |(current, _)| C::prefer(ts, &current)) {
                    best = Some((*ts, *key));
                }
            }
        }
        Ok(best)
    }

    pub fn minimum_timestamp(
        &self,
        group: &Group,
        column: ColKey,
    ) -> Result<Option<(Timestamp, ObjKey)>> {
        self.timestamp_extreme::<Earlier>(group, column)
    }

    pub fn maximum_timestamp(
        &self,
        group: &Group,
        column: ColKey,
    ) -> Result<Option<(Timestamp, ObjKey)>> {
        self.timestamp_extreme::<Later>(group, column)
    }

    /// Rows whose timestamp equals `target`; `None` counts null cells.
    pub fn count_timestamp(
        &self,
        group: &Group,
        column: ColKey,
        target: Option<Timestamp>,
    ) -> Result<usize> {
        let reader = self.column_reader(group, column, DataType::Timestamp)?;
        Ok(self
            .keys()
            .iter()
            .filter_map(|key| reader.read(*key))
            .filter(|cell| match (cell, target) {
                (Value::Null, None) => true,
                (Value::Timestamp(ts), Some(target)) => *ts == target,
                _ => false,
            })
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnSpec, Error, TableKey, TableSchema};

    fn readings(
        rows: &[(Option<i64>, f32, f64, Option<Timestamp>)],
    ) -> (Group, TableKey, Vec<ObjKey>) {
        let mut group = Group::new();
        let table = group
            .add_table(TableSchema::new(
                "readings",
                vec![
                    ColumnSpec::nullable("count", DataType::Int),
                    ColumnSpec::required("level", DataType::Float),
                    ColumnSpec::required("total", DataType::Double),
                    ColumnSpec::nullable("seen", DataType::Timestamp),
                ],
            ))
            .unwrap();
        let keys = rows
            .iter()
            .map(|(count, level, total, seen)| {
                group
                    .create_object_with(
                        table,
                        vec![
                            Value::from(*count),
                            Value::Float(*level),
                            Value::Double(*total),
                            Value::from(*seen),
                        ],
                    )
                    .unwrap()
            })
            .collect();
        (group, table, keys)
    }

    #[test]
    fn average_skips_nulls() {
        let (group, table, _) = readings(&[
            (Some(1), 0.0, 0.0, None),
            (None, 0.0, 0.0, None),
            (Some(3), 0.0, 0.0, None),
        ]);
        let view = View::from_table(&group, table).unwrap();

        let avg = view.average_int(&group, ColKey(0)).unwrap();
        assert_eq!(avg, Average { value: 2.0, count: 2 });
        assert_eq!(view.sum_int(&group, ColKey(0)).unwrap(), 4);
    }

    #[test]
    fn empty_aggregates() {
        let (group, table, _) = readings(&[]);
        let view = View::from_table(&group, table).unwrap();

        assert_eq!(view.sum_double(&group, ColKey(2)).unwrap(), 0.0);
        assert_eq!(
            view.average_float(&group, ColKey(1)).unwrap(),
            Average { value: 0.0, count: 0 }
        );
        assert_eq!(view.maximum_int(&group, ColKey(0)).unwrap(), None);
        assert_eq!(view.minimum_timestamp(&group, ColKey(3)).unwrap(), None);
    }

    #[test]
    fn extremes_keep_first_row_on_ties() {
        let (group, table, keys) = readings(&[
            (Some(5), 1.5, 2.0, None),
            (Some(9), 0.5, 2.0, None),
            (Some(9), 0.5, 1.0, None),
        ]);
        let view = View::from_table(&group, table).unwrap();

        assert_eq!(view.maximum_int(&group, ColKey(0)).unwrap(), Some((9, keys[1])));
        assert_eq!(view.minimum_int(&group, ColKey(0)).unwrap(), Some((5, keys[0])));
        assert_eq!(view.minimum_float(&group, ColKey(1)).unwrap(), Some((0.5, keys[1])));
        assert_eq!(view.maximum_float(&group, ColKey(1)).unwrap(), Some((1.5, keys[0])));
        assert_eq!(view.maximum_double(&group, ColKey(2)).unwrap(), Some((2.0, keys[0])));
        assert_eq!(view.minimum_double(&group, ColKey(2)).unwrap(), Some((1.0, keys[2])));
        assert_eq!(view.sum_float(&group, ColKey(1)).unwrap(), 2.5);
        assert_eq!(view.average_double(&group, ColKey(2)).unwrap().value, 5.0 / 3.0);
    }

    #[test]
    fn counts() {
        let (group, table, _) = readings(&[
            (Some(2), 0.5, 1.0, Some(Timestamp::new(5, 0))),
            (None, 0.5, 3.0, None),
            (Some(2), 0.75, 1.0, Some(Timestamp::new(5, 0))),
        ]);
        let view = View::from_table(&group, table).unwrap();

        assert_eq!(view.count_int(&group, ColKey(0), 2).unwrap(), 2);
        assert_eq!(view.count_float(&group, ColKey(1), 0.5).unwrap(), 2);
        assert_eq!(view.count_double(&group, ColKey(2), 3.0).unwrap(), 1);
        assert_eq!(
            view.count_timestamp(&group, ColKey(3), Some(Timestamp::new(5, 0)))
                .unwrap(),
            2
        );
        assert_eq!(view.count_timestamp(&group, ColKey(3), None).unwrap(), 1);
    }

    #[test]
    fn counts_compare_floats_numerically() {
        let (group, table, _) = readings(&[
            (None, -0.0, -0.0, None),
            (None, f32::NAN, f64::NAN, None),
            (None, 0.0, 0.0, None),
        ]);
        let view = View::from_table(&group, table).unwrap();

        assert_eq!(view.count_float(&group, ColKey(1), 0.0).unwrap(), 2);
        assert_eq!(view.count_double(&group, ColKey(2), 0.0).unwrap(), 2);
        assert_eq!(view.count_double(&group, ColKey(2), f64::NAN).unwrap(), 0);
    }

    #[test]
    fn null_timestamp_target_counts_only_live_nulls() {
        let (mut group, table, keys) = readings(&[
            (None, 0.0, 0.0, None),
            (None, 0.0, 0.0, Some(Timestamp::new(0, 0))),
            (None, 0.0, 0.0, None),
        ]);
        let view = View::from_table(&group, table).unwrap();
        group.remove_object(table, keys[2]).unwrap();

        assert_eq!(view.count_timestamp(&group, ColKey(3), None).unwrap(), 1);
        assert_eq!(
            view.count_timestamp(&group, ColKey(3), Some(Timestamp::new(0, 0)))
                .unwrap(),
            1
        );
    }

    #[test]
    fn timestamp_extremes_skip_nulls() {
        let early = Timestamp::new(-3, 500);
        let late = Timestamp::new(40, 0);
        let (group, table, keys) = readings(&[
            (None, 0.0, 0.0, None),
            (None, 0.0, 0.0, Some(late)),
            (None, 0.0, 0.0, Some(early)),
            (None, 0.0, 0.0, Some(late)),
        ]);
        let view = View::from_table(&group, table).unwrap();

        assert_eq!(
            view.minimum_timestamp(&group, ColKey(3)).unwrap(),
            Some((early, keys[2]))
        );
        assert_eq!(
            view.maximum_timestamp(&group, ColKey(3)).unwrap(),
            Some((late, keys[1]))
        );
    }

    #[test]
    fn detached_rows_do_not_contribute() {
        let (mut group, table, keys) = readings(&[
            (Some(10), 0.0, 0.0, None),
            (Some(20), 0.0, 0.0, None),
        ]);
        let view = View::from_table(&group, table).unwrap();
        group.remove_object(table, keys[1]).unwrap();

        assert_eq!(view.sum_int(&group, ColKey(0)).unwrap(), 10);
        assert_eq!(view.maximum_int(&group, ColKey(0)).unwrap(), Some((10, keys[0])));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let (group, table, _) = readings(&[(Some(1), 0.0, 0.0, None)]);
        let view = View::from_table(&group, table).unwrap();

        assert!(matches!(
            view.sum_double(&group, ColKey(0)),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            view.maximum_timestamp(&group, ColKey(1)),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
