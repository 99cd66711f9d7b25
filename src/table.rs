//! Timestamp-indexed tabular data
//!
//! `DataTable` is the unit of exchange between the feature applicators and
//! their collaborators: an ordered row index of UTC timestamps plus ordered,
//! named numeric columns in which every cell may be missing.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// A single named column; `None` marks a missing value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Row-indexed (by timestamp), named-column table with possible missing values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable", into = "RawTable")]
pub struct DataTable {
    index: Vec<DateTime<Utc>>,
    columns: Vec<Column>,
}

/// Unchecked wire form, validated on the way in
#[derive(Serialize, Deserialize)]
struct RawTable {
    index: Vec<DateTime<Utc>>,
    #[serde(default)]
    columns: Vec<Column>,
}

impl TryFrom<RawTable> for DataTable {
    type Error = FeatureError;

    fn try_from(raw: RawTable) -> Result<Self> {
        let mut table = DataTable::new(raw.index);
        for column in raw.columns {
            table.insert_column(column.name, column.values)?;
        }
        Ok(table)
    }
}

impl From<DataTable> for RawTable {
    fn from(table: DataTable) -> Self {
        Self {
            index: table.index,
            columns: table.columns,
        }
    }
}

fn normalize(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect()
}

impl DataTable {
    /// Create a table with the given row index and no columns
    pub fn new(index: Vec<DateTime<Utc>>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    /// Builder variant of [`DataTable::insert_column`]
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.position(name).map(|i| self.columns[i].values.as_slice())
    }

    /// Value at `row` of column `name`; `None` when missing or out of range
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name).and_then(|values| values.get(row).copied().flatten())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn check_len(&self, name: &str, values: &[Option<f64>]) -> Result<()> {
        if values.len() != self.index.len() {
            return Err(FeatureError::LengthMismatch {
                column: name.to_string(),
                expected: self.index.len(),
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Append a new column. NaN values are stored as missing.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(FeatureError::DuplicateColumn(name));
        }
        self.check_len(&name, &values)?;
        self.columns.push(Column {
            name,
            values: normalize(values),
        });
        Ok(())
    }

    /// Set every row of `name` to `value`, creating the column if needed
    pub fn fill_column(&mut self, name: impl Into<String>, value: Option<f64>) {
        let values = vec![value.filter(|x| !x.is_nan()); self.index.len()];
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.columns[i].values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    /// Set `target` to missing on every row where `predicate` holds for the
    /// value of `mask_column`. Returns the number of rows touched.
    pub fn null_where<F>(&mut self, target: &str, mask_column: &str, predicate: F) -> Result<usize>
    where
        F: Fn(Option<f64>) -> bool,
    {
        let mask: Vec<bool> = self
            .column(mask_column)
            .ok_or_else(|| FeatureError::UnknownColumn(mask_column.to_string()))?
            .iter()
            .map(|v| predicate(*v))
            .collect();
        let i = self
            .position(target)
            .ok_or_else(|| FeatureError::UnknownColumn(target.to_string()))?;

        let mut touched = 0;
        for (value, hit) in self.columns[i].values.iter_mut().zip(mask) {
            if hit {
                *value = None;
                touched += 1;
            }
        }
        Ok(touched)
    }

    /// Keep only the columns listed in `names`, reordered to match. Names
    /// without a column are ignored. Returns the number of columns dropped.
    pub fn retain_columns(&mut self, names: &[String]) -> usize {
        let before = self.columns.len();
        let mut remaining = std::mem::take(&mut self.columns);
        for name in names.iter().unique() {
            if let Some(i) = remaining.iter().position(|c| &c.name == name) {
                self.columns.push(remaining.swap_remove(i));
            }
        }
        before - self.columns.len()
    }

    /// Row-wise concatenation. The result carries the union of all columns in
    /// first-seen order; rows from a table lacking a column are missing there.
    /// Rows are not merged by index, so a timestamp may repeat.
    pub fn concat<I>(tables: I) -> DataTable
    where
        I: IntoIterator<Item = DataTable>,
    {
        let tables: Vec<DataTable> = tables.into_iter().collect();
        let names: Vec<String> = tables
            .iter()
            .flat_map(|t| t.columns.iter().map(|c| c.name.clone()))
            .unique()
            .collect();

        let total = tables.iter().map(DataTable::len).sum();
        let mut index = Vec::with_capacity(total);
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::with_capacity(total),
            })
            .collect();

        for table in &tables {
            index.extend_from_slice(&table.index);
            for column in columns.iter_mut() {
                match table.column(&column.name) {
                    Some(values) => column.values.extend_from_slice(values),
                    None => column
                        .values
                        .extend(std::iter::repeat(None).take(table.len())),
                }
            }
        }

        DataTable { index, columns }
    }

    /// Stable ascending sort of the rows by their timestamp
    pub fn sort_by_index(&mut self) {
        let mut order: Vec<usize> = (0..self.index.len()).collect();
        order.sort_by_key(|&i| self.index[i]);
        if order.iter().enumerate().all(|(pos, &i)| pos == i) {
            return;
        }

        self.index = order.iter().map(|&i| self.index[i]).collect();
        for column in self.columns.iter_mut() {
            column.values = order.iter().map(|&i| column.values[i]).collect();
        }
    }

    pub fn is_sorted_by_index(&self) -> bool {
        self.index.windows(2).all(|w| w[0] <= w[1])
    }
}
