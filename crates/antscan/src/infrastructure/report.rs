//! Streaming output of device records.
//!
//! The text formats are line-oriented and written as records arrive:
//!
//! | Format  | Header          | One line per record                         |
//! |---------|-----------------|---------------------------------------------|
//! | `table` | column titles   | values padded to fixed column widths        |
//! | `csv`   | column titles   | RFC 4180 row via the `csv` crate            |
//! | `json`  | none            | one JSON object (JSON Lines)                |
//!
//! Each text record is flushed immediately so a long scan shows progress in
//! a terminal and a pipe consumer sees rows without waiting for the end.
//!
//! `xlsx` is a zip container and cannot be streamed.  Rows are kept in
//! memory and the workbook (one `Devices` sheet, bold header row) is written
//! by [`RecordWriter::finish`].

use std::io::{self, Write};

use antscan_core::{DeviceRecord, RECORD_COLUMNS};
use clap::ValueEnum;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use thiserror::Error;

/// Minimum width of each table column, in [`RECORD_COLUMNS`] order.
const TABLE_WIDTHS: [usize; 9] = [15, 14, 10, 10, 13, 14, 32, 20, 8];

const XLSX_SHEET_NAME: &str = "Devices";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("CSV output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XLSX output failed: {0}")]
    Xlsx(#[from] XlsxError),
}

/// How records are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
    Xlsx,
}

impl OutputFormat {
    /// Whether the format is binary and unfit for a terminal.
    pub fn is_binary(self) -> bool {
        self == OutputFormat::Xlsx
    }
}

enum Output<W: Write> {
    Table(W),
    Csv(csv::Writer<W>),
    Json(W),
    Xlsx { out: W, rows: Vec<[String; 9]> },
}

/// Writes records to `W` in one [`OutputFormat`].
pub struct RecordWriter<W: Write> {
    output: Output<W>,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    /// Creates the writer and emits the header, if the format has one.
    pub fn new(format: OutputFormat, mut out: W) -> Result<Self, ReportError> {
        let output = match format {
            OutputFormat::Table => {
                writeln!(out, "{}", table_line(&RECORD_COLUMNS))?;
                out.flush()?;
                Output::Table(out)
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(out);
                writer.write_record(RECORD_COLUMNS)?;
                writer.flush()?;
                Output::Csv(writer)
            }
            OutputFormat::Json => Output::Json(out),
            OutputFormat::Xlsx => Output::Xlsx {
                out,
                rows: Vec::new(),
            },
        };
        Ok(Self { output, written: 0 })
    }

    pub fn write_record(&mut self, record: &DeviceRecord) -> Result<(), ReportError> {
        match &mut self.output {
            Output::Table(out) => {
                writeln!(out, "{}", table_line(&record.values()))?;
                out.flush()?;
            }
            Output::Csv(writer) => {
                writer.write_record(record.values())?;
                writer.flush()?;
            }
            Output::Json(out) => {
                serde_json::to_writer(&mut *out, record)?;
                out.write_all(b"\n")?;
                out.flush()?;
            }
            Output::Xlsx { rows, .. } => rows.push(record.values()),
        }
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(self) -> Result<W, ReportError> {
        match self.output {
            Output::Table(mut out) | Output::Json(mut out) => {
                out.flush()?;
                Ok(out)
            }
            Output::Csv(writer) => writer.into_inner().map_err(|e| ReportError::Io(e.into_error())),
            Output::Xlsx { mut out, rows } => {
                out.write_all(&xlsx_workbook(&rows)?)?;
                out.flush()?;
                Ok(out)
            }
        }
    }
}

/// Builds the workbook bytes: header in row 0, one row per record after it.
fn xlsx_workbook(rows: &[[String; 9]]) -> Result<Vec<u8>, ReportError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(XLSX_SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, title) in (0u16..).zip(RECORD_COLUMNS) {
        sheet.write_string_with_format(0, col, title, &bold)?;
    }
    for (row, values) in (1u32..).zip(rows) {
        for (col, value) in (0u16..).zip(values) {
            sheet.write_string(row, col, value.as_str())?;
        }
    }

    let mut workbook = Workbook::new();
    workbook.push_worksheet(sheet);
    Ok(workbook.save_to_buffer()?)
}

fn table_line<S: AsRef<str>>(cells: &[S]) -> String {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(TABLE_WIDTHS).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(&format!("{:<width$}", cell.as_ref()));
    }
    line.truncate(line.trim_end().len());
    line
}
