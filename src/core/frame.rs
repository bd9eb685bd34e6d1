//! Date-indexed table used to reconcile independently updated series.

use crate::core::series::Series;
use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// How the dates of a joined series combine with the frame's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Keep only dates present on both sides
    Inner,
    /// Keep the union of dates, leaving gaps as missing values
    Outer,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

/// A borrowed view of one frame row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub date: NaiveDate,
    columns: &'a [String],
    values: &'a [Option<f64>],
}

impl Row<'_> {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i).copied().flatten())
    }
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_series(name: &str, series: &Series) -> Self {
        Frame {
            columns: vec![name.to_string()],
            rows: series.iter().map(|(d, v)| (d, vec![Some(v)])).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next_back().copied()
    }

    pub fn last(&self) -> Option<Row<'_>> {
        self.rows.iter().next_back().map(|(d, v)| self.row(*d, v))
    }

    pub fn first(&self) -> Option<Row<'_>> {
        self.rows.iter().next().map(|(d, v)| self.row(*d, v))
    }

    pub fn rows(&self) -> impl DoubleEndedIterator<Item = Row<'_>> + '_ {
        self.rows.iter().map(|(d, v)| self.row(*d, v))
    }

    /// Rows ordered from the most recent date backwards.
    pub fn rows_desc(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.rows().rev()
    }

    fn row<'a>(&'a self, date: NaiveDate, values: &'a [Option<f64>]) -> Row<'a> {
        Row {
            date,
            columns: &self.columns,
            values,
        }
    }

    /// Adds `series` as a new column named `name`.
    pub fn join(mut self, name: &str, series: &Series, kind: JoinKind) -> Self {
        if self.columns.is_empty() {
            return Frame::from_series(name, series);
        }

        let width = self.columns.len();
        match kind {
            JoinKind::Inner => {
                self.rows.retain(|date, _| series.get(date).is_some());
                for (date, values) in self.rows.iter_mut() {
                    values.push(series.get(date));
                }
            }
            JoinKind::Outer => {
                for (date, values) in self.rows.iter_mut() {
                    values.push(series.get(date));
                }
                for (date, value) in series.iter() {
                    self.rows.entry(date).or_insert_with(|| {
                        let mut values = vec![None; width];
                        values.push(Some(value));
                        values
                    });
                }
            }
        }
        self.columns.push(name.to_string());
        self
    }

    /// Carries the last known value of each column over later gaps.
    pub fn forward_fill(mut self) -> Self {
        let mut last: Vec<Option<f64>> = vec![None; self.columns.len()];
        for values in self.rows.values_mut() {
            for (value, previous) in values.iter_mut().zip(last.iter_mut()) {
                if value.is_some() {
                    *previous = *value;
                } else {
                    *value = *previous;
                }
            }
        }
        self
    }

    /// Removes rows that still have a missing value in any column.
    pub fn drop_incomplete(mut self) -> Self {
        self.rows.retain(|_, values| values.iter().all(Option::is_some));
        self
    }

    pub fn since(mut self, start: NaiveDate) -> Self {
        self.rows = self.rows.split_off(&start);
        self
    }

    /// Rows dated within `start..=end`. An inverted range yields no rows.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            return Frame {
                columns: self.columns.clone(),
                rows: BTreeMap::new(),
            };
        }
        Frame {
            columns: self.columns.clone(),
            rows: self
                .rows
                .range(start..=end)
                .map(|(d, v)| (*d, v.clone()))
                .collect(),
        }
    }

    /// Keeps the last observation of each calendar month, indexed by the
    /// month's final day.
    pub fn monthly_last(&self) -> Self {
        let mut rows = BTreeMap::new();
        for (date, values) in &self.rows {
            rows.insert(month_end(*date), values.clone());
        }
        Frame {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Appends a column computed from each row.
    pub fn derive(mut self, name: &str, f: impl Fn(&Row<'_>) -> Option<f64>) -> Self {
        let derived: Vec<Option<f64>> = self.rows().map(|row| f(&row)).collect();
        for (values, value) in self.rows.values_mut().zip(derived) {
            values.push(value);
        }
        self.columns.push(name.to_string());
        self
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create snapshot: {}", path.display()))?;

        let mut header = vec!["data".to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for (date, values) in &self.rows {
            let mut record = vec![date.format("%Y-%m-%d").to_string()];
            record.extend(
                values
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }
        writer.flush()?;
        debug!(path = %path.display(), rows = self.rows.len(), "Wrote snapshot");
        Ok(())
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open snapshot: {}", path.display()))?;

        let headers = reader.headers()?.clone();
        let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut rows = BTreeMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Invalid snapshot row {}", line + 1))?;
            let date_str = record
                .get(0)
                .ok_or_else(|| anyhow!("Missing date in snapshot row {}", line + 1))?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{date_str}' in snapshot"))?;

            let values = (1..=columns.len())
                .map(|i| record.get(i).and_then(|v| v.trim().parse::<f64>().ok()))
                .collect();
            rows.insert(date, values);
        }

        debug!(path = %path.display(), rows = rows.len(), "Read snapshot");
        Ok(Frame { columns, rows })
    }
}

fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}
