//! Batch result writers

mod csv;

pub use self::csv::CsvWriter;

use crate::batch::ResolvedItem;
use crate::error::{OutputError, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Row type written by every writer
pub type Row = ResolvedItem<String, Value>;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(OutputError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Writes resolved batch rows
pub trait OutputWriter {
    fn write_items(&mut self, items: &[Row]) -> Result<()>;

    /// Flush everything; must be called once after the last write
    fn finalize(&mut self) -> Result<()>;
}

/// Writer for `format`, to `path` or stdout
pub fn create_writer(format: OutputFormat, path: Option<&Path>) -> Result<Box<dyn OutputWriter>> {
    Ok(match format {
        OutputFormat::Json => Box::new(JsonWriter::new(path)?),
        OutputFormat::Csv => Box::new(CsvWriter::new(path)?),
    })
}

pub(crate) fn open_output(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    Ok(match path {
        Some(p) => {
            let file = File::create(p)
                .map_err(|e| OutputError::FileCreate(format!("{}: {}", p.display(), e)))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

pub(crate) fn status_label(item: &Row) -> &'static str {
    if item.degraded {
        "degraded"
    } else {
        "ok"
    }
}

/// Pretty JSON array, written on finalize
pub struct JsonWriter {
    output: Box<dyn Write + Send>,
    rows: Vec<Value>,
}

impl JsonWriter {
    pub fn new(path: Option<&Path>) -> Result<Self> {
        Ok(Self::from_writer(open_output(path)?))
    }

    pub fn from_writer(output: Box<dyn Write + Send>) -> Self {
        Self {
            output,
            rows: Vec::new(),
        }
    }
}

impl OutputWriter for JsonWriter {
    fn write_items(&mut self, items: &[Row]) -> Result<()> {
        for item in items {
            let mut row = serde_json::to_value(item)
                .map_err(|e| OutputError::JsonWrite(e.to_string()))?;
            if let Value::Object(map) = &mut row {
                map.insert("status".into(), Value::from(status_label(item)));
            }
            self.rows.push(row);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.output, &self.rows)
            .map_err(|e| OutputError::JsonWrite(e.to_string()))?;
        writeln!(self.output).map_err(|e| OutputError::JsonWrite(e.to_string()))?;
        self.output
            .flush()
            .map_err(|e| OutputError::JsonWrite(e.to_string()))?;
        Ok(())
    }
}
