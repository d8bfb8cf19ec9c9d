//! Workbook persistence: CSV sheets in, CSV sheets plus a JSON changelog out.
//!
//! Responsibilities:
//! - Load the three sheets with schema checks (required columns, typed cells).
//! - Preserve unknown config columns verbatim across a load/save round trip.
//! - Write the mutated sheets back and emit the review bundle (mutated
//!   bindings, freshly synthesized configs, suppliers, changelog).
//!
//! The supplier sheet is reference data: it is read on load and copied into
//! the export bundle, but never rewritten in place.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::audit::{ChangeLog, LogEntry};
use crate::table::{Binding, BindingTable, ConfigRow, ConfigTable, Supplier, SupplierTable};

pub const SUPPLIER_SHEET: &str = "supplier.csv";
pub const BINDINGS_SHEET: &str = "model_suppliers.csv";
pub const CONFIGS_SHEET: &str = "model_configs.csv";
pub const CHANGELOG_FILE: &str = "changelog.json";

/// Failures while reading or writing the workbook. In-memory tables and the
/// session log stay valid when one of these surfaces, so the operation can
/// be retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{file}: missing required column '{column}'")]
    MissingColumn { file: String, column: String },
    #[error("{file}: row {row}: {message}")]
    BadCell {
        file: String,
        row: usize,
        message: String,
    },
}

/// Where the three sheets live. Built from one directory, with per-sheet
/// overrides poked in by the caller when needed.
#[derive(Debug, Clone)]
pub struct WorkbookPaths {
    pub suppliers: PathBuf,
    pub bindings: PathBuf,
    pub configs: PathBuf,
}

impl WorkbookPaths {
    pub fn in_dir(dir: &Path) -> Self {
        WorkbookPaths {
            suppliers: dir.join(SUPPLIER_SHEET),
            bindings: dir.join(BINDINGS_SHEET),
            configs: dir.join(CONFIGS_SHEET),
        }
    }
}

/// The three sheets as loaded from disk.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub suppliers: SupplierTable,
    pub bindings: BindingTable,
    pub configs: ConfigTable,
}

pub fn load_workbook(paths: &WorkbookPaths) -> Result<Workbook, StoreError> {
    let suppliers = load_suppliers(&paths.suppliers)?;
    let bindings = load_bindings(&paths.bindings)?;
    let configs = load_configs(&paths.configs)?;
    tracing::debug!(
        "loaded {} supplier(s), {} binding(s), {} config row(s)",
        suppliers.rows.len(),
        bindings.rows.len(),
        configs.rows.len()
    );
    Ok(Workbook {
        suppliers,
        bindings,
        configs,
    })
}

/// Write the two mutated sheets back to their load paths.
pub fn save_workbook(
    paths: &WorkbookPaths,
    bindings: &BindingTable,
    configs: &ConfigTable,
) -> Result<(), StoreError> {
    write_bindings(&paths.bindings, bindings)?;
    write_configs(&paths.configs, &configs.columns, &configs.rows)?;
    tracing::debug!(
        "saved {} and {}",
        paths.bindings.display(),
        paths.configs.display()
    );
    Ok(())
}

/// Write the review bundle: the mutated bindings sheet in full, only the
/// freshly synthesized config rows, the untouched supplier sheet, and the
/// session changelog as JSON.
pub fn export_bundle(
    dir: &Path,
    suppliers: &SupplierTable,
    bindings: &BindingTable,
    config_columns: &[String],
    new_configs: &[ConfigRow],
    log: &ChangeLog,
    session: &str,
) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir)?;
    write_suppliers(&dir.join(SUPPLIER_SHEET), suppliers)?;
    write_bindings(&dir.join(BINDINGS_SHEET), bindings)?;
    write_configs(&dir.join(CONFIGS_SHEET), config_columns, new_configs)?;

    #[derive(Serialize)]
    struct ChangelogDoc<'a> {
        session: &'a str,
        entries: &'a [LogEntry],
    }
    let doc = ChangelogDoc {
        session,
        entries: log.entries(),
    };
    std::fs::write(
        dir.join(CHANGELOG_FILE),
        serde_json::to_string_pretty(&doc)?,
    )?;
    tracing::debug!("export bundle written to {}", dir.display());
    Ok(())
}

fn require_columns(
    path: &Path,
    headers: &csv::StringRecord,
    required: &[&str],
) -> Result<(), StoreError> {
    for col in required {
        if !headers.iter().any(|h| h == *col) {
            return Err(StoreError::MissingColumn {
                file: path.display().to_string(),
                column: (*col).to_string(),
            });
        }
    }
    Ok(())
}

fn sheet_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, StoreError> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

fn load_suppliers(path: &Path) -> Result<SupplierTable, StoreError> {
    let mut rdr = sheet_reader(path)?;
    require_columns(path, rdr.headers()?, &["id", "supplier_name"])?;
    let mut rows = Vec::new();
    for rec in rdr.deserialize::<Supplier>() {
        rows.push(rec?);
    }
    Ok(SupplierTable { rows })
}

fn load_bindings(path: &Path) -> Result<BindingTable, StoreError> {
    let mut rdr = sheet_reader(path)?;
    require_columns(
        path,
        rdr.headers()?,
        &["id", "parent_model", "supplier_id", "model"],
    )?;
    let mut rows = Vec::new();
    for rec in rdr.deserialize::<Binding>() {
        rows.push(rec?);
    }
    Ok(BindingTable { rows })
}

fn load_configs(path: &Path) -> Result<ConfigTable, StoreError> {
    let mut rdr = sheet_reader(path)?;
    let headers = rdr.headers()?.clone();
    require_columns(path, &headers, &["id", "model", "parent_model", "supplier_id"])?;
    let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec?;
        // +2 for 1-indexed rows and the header line
        rows.push(parse_config_row(path, idx + 2, &headers, &rec)?);
    }
    Ok(ConfigTable { columns, rows })
}

fn parse_config_row(
    path: &Path,
    row: usize,
    headers: &csv::StringRecord,
    rec: &csv::StringRecord,
) -> Result<ConfigRow, StoreError> {
    let mut out = ConfigRow::default();
    for (col, cell) in headers.iter().zip(rec.iter()) {
        match col {
            "id" => out.id = parse_int(path, row, col, cell)?,
            "model" => out.model = cell.to_string(),
            "parent_model" => out.parent_model = cell.to_string(),
            "supplier_id" => out.supplier_id = parse_int(path, row, col, cell)?,
            "context_length" => {
                out.context_length = if cell.is_empty() {
                    None
                } else {
                    Some(parse_int(path, row, col, cell)?)
                };
            }
            other => {
                out.extra.insert(other.to_string(), cell.to_string());
            }
        }
    }
    Ok(out)
}

fn parse_int(path: &Path, row: usize, col: &str, cell: &str) -> Result<i64, StoreError> {
    cell.parse().map_err(|_| StoreError::BadCell {
        file: path.display().to_string(),
        row,
        message: format!("invalid integer '{}' in column '{}'", cell, col),
    })
}

fn write_suppliers(path: &Path, table: &SupplierTable) -> Result<(), StoreError> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(["id", "supplier_name"])?;
    for row in &table.rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_bindings(path: &Path, table: &BindingTable) -> Result<(), StoreError> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(["id", "parent_model", "supplier_id", "model"])?;
    for row in &table.rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_configs(path: &Path, columns: &[String], rows: &[ConfigRow]) -> Result<(), StoreError> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(columns)?;
    for row in rows {
        let rec: Vec<String> = columns.iter().map(|c| row.cell(c)).collect();
        wtr.write_record(&rec)?;
    }
    wtr.flush()?;
    Ok(())
}
