//! CSV output writer

use super::{open_output, status_label, OutputWriter, Row};
use crate::error::{OutputError, Result};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

const FIXED_COLUMNS: [&str; 4] = ["key", "status", "endpoint", "error"];

/// CSV output writer.
///
/// Object values are spread into one column per top-level field; anything
/// else lands in a single `value` column.
pub struct CsvWriter {
    writer: csv::Writer<Box<dyn Write + Send>>,
    /// Value columns, in first-seen order
    columns: Vec<String>,
    header_written: bool,
    /// Rows held back until the columns are known
    buffer: Vec<Row>,
    max_buffer: usize,
}

impl CsvWriter {
    pub fn new(path: Option<&Path>) -> Result<Self> {
        Ok(Self::from_writer(open_output(path)?))
    }

    pub fn from_writer(output: Box<dyn Write + Send>) -> Self {
        Self {
            writer: csv::Writer::from_writer(output),
            columns: Vec::new(),
            header_written: false,
            buffer: Vec::new(),
            max_buffer: 100,
        }
    }

    fn value_columns(value: &Value) -> Vec<String> {
        match value {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => vec!["value".to_string()],
        }
    }

    fn collect_columns(&mut self, item: &Row) {
        for col in Self::value_columns(&item.value) {
            if !self.columns.contains(&col) {
                self.columns.push(col);
            }
        }
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
        header.extend(self.columns.iter().cloned());

        self.writer
            .write_record(&header)
            .map_err(|e| OutputError::CsvWrite(e.to_string()))?;
        self.header_written = true;
        Ok(())
    }

    fn write_row(&mut self, item: &Row) -> Result<()> {
        let mut row = vec![
            item.key.clone(),
            status_label(item).to_string(),
            item.endpoint.clone().unwrap_or_default(),
            item.error.clone().unwrap_or_default(),
        ];

        for col in &self.columns {
            let cell = match &item.value {
                Value::Object(map) => map.get(col).map(Self::value_to_string).unwrap_or_default(),
                other if col == "value" => Self::value_to_string(other),
                _ => String::new(),
            };
            row.push(cell);
        }

        self.writer
            .write_record(&row)
            .map_err(|e| OutputError::CsvWrite(e.to_string()))?;
        Ok(())
    }

    /// Strings unquoted, everything else as compact JSON
    fn value_to_string(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn flush_buffer(&mut self) -> Result<()> {
        self.write_header()?;
        let buffer = std::mem::take(&mut self.buffer);
        for item in &buffer {
            self.write_row(item)?;
        }
        Ok(())
    }
}

impl OutputWriter for CsvWriter {
    fn write_items(&mut self, items: &[Row]) -> Result<()> {
        for item in items {
            if !self.header_written {
                self.collect_columns(item);
                self.buffer.push(item.clone());
                if self.buffer.len() >= self.max_buffer {
                    self.flush_buffer()?;
                }
            } else {
                let new_cols: Vec<String> = Self::value_columns(&item.value)
                    .into_iter()
                    .filter(|c| !self.columns.contains(c))
                    .collect();
                if !new_cols.is_empty() {
                    tracing::warn!("New columns found after header written: {:?}", new_cols);
                }
                self.write_row(item)?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if !self.header_written {
            self.flush_buffer()?;
        }
        self.writer
            .flush()
            .map_err(|e| OutputError::CsvWrite(e.to_string()))?;
        Ok(())
    }
}
