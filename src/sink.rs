// 💾 Sink Writer - Flat tables and year-sheet workbooks
// CSV via csv, Excel via rust_xlsxwriter, append reads back with calamine

use crate::config::{OutputFormat, SinkConfig, SinkMode};
use crate::error::PlaybillError;
use crate::normalize::{bucket, summarize, FlatRow, YearBuckets, FLAT_COLUMNS, SUMMARY_COLUMNS};
use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sheet name of a flat Excel table created from scratch
pub const FLAT_SHEET_NAME: &str = "Sheet1";

/// Most characters one Excel cell holds
pub const MAX_CELL_CHARS: usize = 32_767;

/// Sheet name of the per-year overview
pub const SUMMARY_SHEET_NAME: &str = "Summary";

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub destination: PathBuf,
    /// False when there was nothing to write and the destination was left alone
    pub written: bool,
    pub rows_written: usize,
    /// Rows already present in an appended table
    pub existing_rows: usize,
    pub sheets: Vec<String>,
}

impl WriteOutcome {
    fn nothing_written(destination: &Path) -> Self {
        WriteOutcome {
            destination: destination.to_path_buf(),
            written: false,
            rows_written: 0,
            existing_rows: 0,
            sheets: Vec::new(),
        }
    }

    pub fn total_rows(&self) -> usize {
        self.existing_rows + self.rows_written
    }
}

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Write rows according to the sink configuration
///
/// Flat mode keeps input order; year-sheet mode buckets the rows first.
pub fn write(rows: &[FlatRow], config: &SinkConfig) -> Result<WriteOutcome> {
    config.validate()?;

    match config.mode {
        SinkMode::Flat => write_flat(rows, &config.destination, config.format, config.append),
        SinkMode::YearSheets => {
            let buckets = bucket(rows.iter().cloned());
            write_year_workbook(&buckets, &config.destination)
        }
    }
}

/// Single table, optionally appended to an existing one with the same columns
pub fn write_flat(
    rows: &[FlatRow],
    destination: &Path,
    format: OutputFormat,
    append: bool,
) -> Result<WriteOutcome> {
    if rows.is_empty() {
        info!(destination = %destination.display(), "No data to save");
        return Ok(WriteOutcome::nothing_written(destination));
    }

    let append = append && destination.exists();
    match format {
        OutputFormat::Csv => write_flat_csv(rows, destination, append),
        OutputFormat::Excel => write_flat_excel(rows, destination, append),
    }
}

// ============================================================================
// SCHEMA CHECK
// ============================================================================

fn check_flat_header(destination: &Path, header: &[String]) -> Result<()> {
    let mut found: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();
    while found.last().map_or(false, |h| h.is_empty()) {
        found.pop();
    }

    if found.iter().map(String::as_str).eq(FLAT_COLUMNS.iter().copied()) {
        return Ok(());
    }

    Err(PlaybillError::SchemaConflict {
        path: destination.to_path_buf(),
        expected: FLAT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        found,
    }
    .into())
}

// ============================================================================
// CSV
// ============================================================================

/// Header and data-row count of an existing CSV table; `None` for an empty file
fn read_csv_table(path: &Path) -> Result<Option<(Vec<String>, usize)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open existing table: {}", path.display()))?;

    let header: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(String::from)
        .collect();

    let mut count = 0;
    for record in reader.records() {
        record.with_context(|| format!("Failed to read {}", path.display()))?;
        count += 1;
    }

    if header.is_empty() && count == 0 {
        return Ok(None);
    }
    Ok(Some((header, count)))
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(bytes.last().map_or(true, |b| *b == b'\n'))
}

fn write_flat_csv(rows: &[FlatRow], destination: &Path, append: bool) -> Result<WriteOutcome> {
    let existing = if append { read_csv_table(destination)? } else { None };

    let existing_rows = match &existing {
        Some((header, count)) => {
            check_flat_header(destination, header)?;
            *count
        }
        None => 0,
    };

    let mut writer = if existing.is_some() {
        let needs_newline = !ends_with_newline(destination)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(destination)
            .with_context(|| format!("Failed to open {} for append", destination.display()))?;
        if needs_newline {
            file.write_all(b"\n")?;
        }
        csv::WriterBuilder::new().has_headers(false).from_writer(file)
    } else {
        let file = fs::File::create(destination)
            .with_context(|| format!("Failed to create {}", destination.display()))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(FLAT_COLUMNS)?;
        writer
    };

    for row in rows {
        writer.write_record(row.cells())?;
    }
    writer.flush()?;

    let action = if existing.is_some() { "appended to" } else { "saved to" };
    info!(destination = %destination.display(), rows = rows.len(), "Data {} CSV", action);

    Ok(WriteOutcome {
        destination: destination.to_path_buf(),
        written: true,
        rows_written: rows.len(),
        existing_rows,
        sheets: Vec::new(),
    })
}

// ============================================================================
// EXCEL
// ============================================================================

/// Existing flat workbook: the table sheet first, any other sheets as found
struct ExistingWorkbook {
    name: String,
    header: Vec<String>,
    rows: Vec<Vec<Data>>,
    others: Vec<(String, Range<Data>)>,
}

fn read_existing_workbook(path: &Path) -> Result<ExistingWorkbook> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open existing workbook: {}", path.display()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet '{}' of {}", name, path.display()))?;
        sheets.push((name, range));
    }

    let mut sheets = sheets.into_iter();
    let (name, table) = sheets
        .next()
        .ok_or_else(|| anyhow!("Workbook has no sheets: {}", path.display()))?;

    let mut rows = table.rows().map(|cells| cells.to_vec());
    let header = rows
        .next()
        .unwrap_or_default()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let rows = rows.collect();

    Ok(ExistingWorkbook {
        name,
        header,
        rows,
        others: sheets.collect(),
    })
}

fn header_format() -> Format {
    Format::new().set_bold()
}

fn row_index(index: usize) -> Result<u32> {
    u32::try_from(index).context("Row index exceeds worksheet limits")
}

/// Text cut down to what one Excel cell can hold
fn fit_cell(value: &str) -> Cow<'_, str> {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(
                chars = value.chars().count(),
                limit = MAX_CELL_CHARS,
                "Cell text truncated to Excel limit"
            );
            Cow::Owned(value[..cut].to_string())
        }
        None => Cow::Borrowed(value),
    }
}

/// Number formats for date cells carried over from an existing workbook
struct DateFormats {
    date: Format,
    datetime: Format,
}

impl DateFormats {
    fn new() -> Self {
        DateFormats {
            date: Format::new().set_num_format("yyyy-mm-dd"),
            datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
        }
    }
}

/// Rewrite one cell read back by calamine with its original type
fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Data,
    dates: &DateFormats,
) -> Result<()> {
    match cell {
        Data::Empty => {}
        Data::String(text) => {
            sheet.write_string(row, col, &*fit_cell(text))?;
        }
        Data::Float(value) => {
            sheet.write_number(row, col, *value)?;
        }
        Data::Int(value) => {
            sheet.write_number(row, col, *value as f64)?;
        }
        Data::Bool(value) => {
            sheet.write_boolean(row, col, *value)?;
        }
        Data::DateTime(value) => {
            let serial = value.as_f64();
            let format = if serial.fract() == 0.0 { &dates.date } else { &dates.datetime };
            sheet.write_number_with_format(row, col, serial, format)?;
        }
        Data::DateTimeIso(text) | Data::DurationIso(text) => {
            sheet.write_string(row, col, text.as_str())?;
        }
        Data::Error(_) => {
            sheet.write_string(row, col, cell.to_string())?;
        }
    }
    Ok(())
}

/// Header in row 0, then one row per record
fn write_table<'a, I>(sheet: &mut Worksheet, columns: &[&str], records: I) -> Result<usize>
where
    I: IntoIterator<Item = Vec<&'a str>>,
{
    write_header(sheet, columns)?;

    let mut written = 0;
    for (i, record) in records.into_iter().enumerate() {
        write_text_row(sheet, row_index(i + 1)?, &record)?;
        written += 1;
    }

    sheet.autofit();
    Ok(written)
}

fn write_header(sheet: &mut Worksheet, columns: &[&str]) -> Result<()> {
    let bold = header_format();
    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }
    Ok(())
}

fn write_text_row(sheet: &mut Worksheet, row: u32, record: &[&str]) -> Result<()> {
    for (col, value) in record.iter().enumerate() {
        sheet.write_string(row, col as u16, &*fit_cell(value))?;
    }
    Ok(())
}

fn write_flat_excel(rows: &[FlatRow], destination: &Path, append: bool) -> Result<WriteOutcome> {
    let existing = if append {
        let workbook = read_existing_workbook(destination)?;
        check_flat_header(destination, &workbook.header)?;
        Some(workbook)
    } else {
        None
    };

    let sheet_name = existing
        .as_ref()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| FLAT_SHEET_NAME.to_string());
    let existing_rows = existing.as_ref().map_or(0, |s| s.rows.len());
    let dates = DateFormats::new();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name.as_str())?;
    write_header(sheet, &FLAT_COLUMNS)?;

    // Existing rows keep their cell types; new rows go after them
    let old_rows = existing.iter().flat_map(|s| s.rows.iter());
    for (i, cells) in old_rows.enumerate() {
        let row = row_index(i + 1)?;
        for (col, cell) in cells.iter().take(FLAT_COLUMNS.len()).enumerate() {
            write_cell(sheet, row, col as u16, cell, &dates)?;
        }
    }
    for (i, record) in rows.iter().enumerate() {
        write_text_row(sheet, row_index(existing_rows + i + 1)?, &record.cells())?;
    }
    sheet.autofit();

    let mut sheets = vec![sheet_name];

    // Other sheets are copied across untouched
    for (name, range) in existing.iter().flat_map(|s| s.others.iter()) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name.as_str())?;
        let (first_row, first_col) = range.start().unwrap_or((0, 0));
        for (row, col, cell) in range.used_cells() {
            let row = first_row + row_index(row)?;
            let col = u16::try_from(first_col as usize + col)
                .context("Column index exceeds worksheet limits")?;
            write_cell(sheet, row, col, cell, &dates)?;
        }
        debug!(sheet = %name, "Sheet carried over");
        sheets.push(name.clone());
    }

    workbook
        .save(destination)
        .with_context(|| format!("Failed to save workbook: {}", destination.display()))?;

    let action = if existing.is_some() { "appended to" } else { "saved to" };
    info!(destination = %destination.display(), rows = rows.len(), "Data {} Excel", action);

    Ok(WriteOutcome {
        destination: destination.to_path_buf(),
        written: true,
        rows_written: rows.len(),
        existing_rows,
        sheets,
    })
}

/// One `Year_<label>` sheet per bucket plus `Summary`
pub fn write_year_workbook(buckets: &YearBuckets, destination: &Path) -> Result<WriteOutcome> {
    let summary = summarize(buckets);
    if summary.is_empty() {
        info!(destination = %destination.display(), "No data to save to Excel");
        return Ok(WriteOutcome::nothing_written(destination));
    }

    let mut workbook = Workbook::new();
    let mut sheets = Vec::new();
    let mut total = 0;

    for (year, rows) in buckets.iter().filter(|(_, rows)| !rows.is_empty()) {
        let name = year.sheet_name();
        let sheet = workbook.add_worksheet();
        sheet.set_name(name.as_str())?;
        let written = write_table(sheet, &FLAT_COLUMNS, rows.iter().map(|r| r.cells().to_vec()))?;

        debug!(sheet = %name, rows = written, "Sheet written");
        total += written;
        sheets.push(name);
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name(SUMMARY_SHEET_NAME)?;
    let bold = header_format();
    for (col, name) in SUMMARY_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }
    for (i, record) in summary.iter().enumerate() {
        let row = row_index(i + 1)?;
        sheet.write_string(row, 0, record.year.to_string())?;
        sheet.write_number(row, 1, record.row_count as f64)?;
        sheet.write_number(row, 2, record.show_count as f64)?;
    }
    sheet.autofit();
    sheets.push(SUMMARY_SHEET_NAME.to_string());

    workbook
        .save(destination)
        .with_context(|| format!("Failed to save workbook: {}", destination.display()))?;

    info!(
        destination = %destination.display(),
        rows = total,
        sheets = sheets.len(),
        "Data saved to Excel by year"
    );

    Ok(WriteOutcome {
        destination: destination.to_path_buf(),
        written: true,
        rows_written: total,
        existing_rows: 0,
        sheets,
    })
}

/// Read back every sheet of a workbook as string rows (header included)
pub fn read_workbook(path: &Path) -> Result<Vec<(String, Vec<Vec<String>>)>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet '{}'", name))?;
        let rows = range
            .rows()
            .map(|cells| cells.iter().map(|c| c.to_string()).collect())
            .collect();
        sheets.push((name, rows));
    }
    Ok(sheets)
}

// ============================================================================
// TESTS
// ============================================================================
