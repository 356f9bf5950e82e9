//! Named-column numeric tables

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Feature table: one row per product, one named column per feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    /// Column names, in column order
    pub columns: Vec<String>,
    /// Row identifiers (product ids)
    pub row_ids: Vec<String>,
    /// Values (n_rows x n_columns)
    pub values: Array2<f64>,
}

impl FeatureTable {
    /// Build a table from named columns of equal length
    pub fn from_columns(row_ids: Vec<String>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let n_rows = row_ids.len();
        let n_columns = columns.len();

        for (name, values) in &columns {
            if values.len() != n_rows {
                return Err(PipelineError::invariant(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    values.len(),
                    n_rows
                )));
            }
        }

        let values = Array2::from_shape_fn((n_rows, n_columns), |(i, j)| columns[j].1[i]);
        let columns = columns.into_iter().map(|(name, _)| name).collect();

        Ok(Self {
            columns,
            row_ids,
            values,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|j| self.values.column(j))
    }

    /// Keep only the named columns, in the order given
    pub fn select_columns(&self, names: &[String]) -> Result<FeatureTable> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name).ok_or_else(|| {
                    PipelineError::configuration(format!("unknown column '{}'", name))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        Ok(FeatureTable {
            columns: names.to_vec(),
            row_ids: self.row_ids.clone(),
            values: self.values.select(Axis(1), &indices),
        })
    }

    /// Create a subset of the table by row indices
    pub fn subset_rows(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable {
            columns: self.columns.clone(),
            row_ids: indices.iter().map(|&i| self.row_ids[i].clone()).collect(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Save to CSV, optionally with a trailing label column
    pub fn save_csv(&self, path: &Path, labels: Option<&Array1<f64>>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["ProductID".to_string()];
        header.extend(self.columns.iter().cloned());
        if labels.is_some() {
            header.push("Awesome?".to_string());
        }
        writer.write_record(&header)?;

        for (i, row) in self.values.rows().into_iter().enumerate() {
            let mut record = vec![self.row_ids[i].clone()];
            record.extend(row.iter().map(|v| v.to_string()));
            if let Some(labels) = labels {
                record.push(labels[i].to_string());
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load a table written by [`FeatureTable::save_csv`]. A trailing
    /// `Awesome?` column is returned separately as labels.
    pub fn load_csv(path: &Path) -> Result<(FeatureTable, Option<Array1<f64>>)> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();

        if headers.first().map(String::as_str) != Some("ProductID") {
            return Err(PipelineError::configuration(format!(
                "{} does not start with a ProductID column",
                path.display()
            )));
        }

        let has_labels = headers.last().map(String::as_str) == Some("Awesome?");
        let end = if has_labels { headers.len() - 1 } else { headers.len() };
        let columns: Vec<String> = headers[1..end].to_vec();

        let mut row_ids = Vec::new();
        let mut flat = Vec::new();
        let mut labels = Vec::new();

        for (line, result) in reader.records().enumerate() {
            let record = result?;
            row_ids.push(record.get(0).unwrap_or_default().to_string());
            for j in 1..end {
                flat.push(parse_cell(record.get(j), line, &headers[j])?);
            }
            if has_labels {
                labels.push(parse_cell(record.get(end), line, "Awesome?")?);
            }
        }

        let values = Array2::from_shape_vec((row_ids.len(), columns.len()), flat).map_err(|e| {
            PipelineError::invariant(format!("ragged table in {}: {}", path.display(), e))
        })?;

        let labels = has_labels.then(|| Array1::from_vec(labels));

        Ok((
            FeatureTable {
                columns,
                row_ids,
                values,
            },
            labels,
        ))
    }
}

fn parse_cell(cell: Option<&str>, line: usize, column: &str) -> Result<f64> {
    cell.unwrap_or_default().trim().parse::<f64>().map_err(|_| {
        PipelineError::invariant(format!(
            "row {}: column '{}' is not numeric",
            line + 1,
            column
        ))
    })
}
