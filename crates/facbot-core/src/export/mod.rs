//! Spreadsheet and CSV export of accumulated line items.

use chrono::Local;
use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, warn};

use crate::error::ExportError;
use crate::invoice::LineItemRow;
use crate::models::config::ExportConfig;

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Serialized file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Office Open XML workbook.
    Xlsx,
    /// Comma-separated values.
    Csv,
}

impl ExportFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    /// MIME type for download offers.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv",
        }
    }
}

/// A serialized export ready to be offered for download.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    /// File format of `bytes`.
    pub format: ExportFormat,
    /// Suggested file name.
    pub file_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Number of data rows written.
    pub rows: usize,
}

/// Outcome of [`ExportService::export`].
#[derive(Debug)]
pub struct ExportResult {
    /// The file produced, xlsx or the CSV fallback.
    pub artifact: ExportArtifact,
    /// Why the spreadsheet was not produced, when CSV was used instead.
    pub spreadsheet_error: Option<ExportError>,
}

/// Serializes line items to xlsx, falling back to CSV.
#[derive(Debug, Clone)]
pub struct ExportService {
    sheet_name: String,
    file_stem: String,
    timestamped: bool,
}

impl ExportService {
    /// Create a service with default settings.
    pub fn new() -> Self {
        Self::from_config(&ExportConfig::default())
    }

    /// Create a service from the export configuration section.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            sheet_name: config.sheet_name.clone(),
            file_stem: config.file_stem.clone(),
            timestamped: config.timestamped,
        }
    }

    /// Union of the rows' columns, ordered by first appearance.
    pub fn columns(rows: &[LineItemRow]) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in rows {
            for column in row.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }
        columns
    }

    /// Serialize rows as a single-sheet workbook.
    pub fn to_spreadsheet(&self, rows: &[LineItemRow]) -> Result<Vec<u8>> {
        let columns = Self::columns(rows);
        let header_format = Format::new().set_bold();

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.sheet_name)?;

        for (col, name) in columns.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, name, &header_format)?;
        }

        for (index, row) in rows.iter().enumerate() {
            let excel_row = index as u32 + 1;
            for (col, name) in columns.iter().enumerate() {
                if let Some(value) = row.get(name) {
                    sheet.write_string(excel_row, col as u16, value)?;
                }
            }
        }

        let bytes = workbook.save_to_buffer()?;
        debug!("Wrote {} rows x {} columns to xlsx", rows.len(), columns.len());
        Ok(bytes)
    }

    /// Serialize rows as CSV with a header line.
    pub fn to_csv(&self, rows: &[LineItemRow]) -> Result<Vec<u8>> {
        let columns = Self::columns(rows);
        let mut wtr = csv::Writer::from_writer(vec![]);

        wtr.write_record(&columns)?;
        for row in rows {
            wtr.write_record(columns.iter().map(|name| row.get(name).unwrap_or("")))?;
        }

        let bytes = wtr
            .into_inner()
            .map_err(|e| ExportError::Csv(e.to_string()))?;
        debug!("Wrote {} rows x {} columns to CSV", rows.len(), columns.len());
        Ok(bytes)
    }

    /// Produce an xlsx file, or a CSV file if the workbook cannot be written.
    ///
    /// Fails only when there are no rows or both formats fail; the error is
    /// then the CSV one.
    pub fn export(&self, rows: &[LineItemRow]) -> Result<ExportResult> {
        if rows.is_empty() {
            return Err(ExportError::NoRows);
        }

        match self.to_spreadsheet(rows) {
            Ok(bytes) => Ok(ExportResult {
                artifact: self.artifact(ExportFormat::Xlsx, bytes, rows.len()),
                spreadsheet_error: None,
            }),
            Err(spreadsheet_error) => {
                warn!("Spreadsheet export failed, trying CSV: {}", spreadsheet_error);
                let bytes = self.to_csv(rows)?;
                Ok(ExportResult {
                    artifact: self.artifact(ExportFormat::Csv, bytes, rows.len()),
                    spreadsheet_error: Some(spreadsheet_error),
                })
            }
        }
    }

    /// File name for an export in the given format.
    pub fn file_name(&self, format: ExportFormat) -> String {
        if self.timestamped {
            let timestamp = Local::now().format("%Y%m%d-%H%M%S");
            format!("{}_{}.{}", self.file_stem, timestamp, format.extension())
        } else {
            format!("{}.{}", self.file_stem, format.extension())
        }
    }

    fn artifact(&self, format: ExportFormat, bytes: Vec<u8>, rows: usize) -> ExportArtifact {
        ExportArtifact {
            format,
            file_name: self.file_name(format),
            bytes,
            rows,
        }
    }
}

impl Default for ExportService {
    fn default() -> Self {
        Self::new()
    }
}
