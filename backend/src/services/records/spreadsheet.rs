//! Spreadsheet import: turns an uploaded CSV export or Excel workbook into freshly
//! issued records.
//!
//! The header row names the columns; matching is case-insensitive and unknown
//! columns are ignored. Missing values fall back to empty strings, except the
//! student name (`"Unknown"`) and the three dates (today).
//!
//! Workbook cells keep their type: a numeric cell in a date column is a serial day
//! number. CSV cells are all text, so a bare number there is only taken as a serial
//! day when it is large enough to be one.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use common::model::record::{generate_record_id, NewRecord, Record};
use regex::Regex;
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

pub const UNKNOWN_NAME: &str = "Unknown";

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Smallest text value read as a serial day (1927-05-18). Below it a bare number
/// in a CSV cell is more likely a year or a typo than a date.
const MIN_TEXT_SERIAL: f64 = 10_000.0;
/// Serial 2958465 is 9999-12-31.
const MAX_SERIAL: f64 = 2_958_466.0;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("the spreadsheet is empty")]
    Empty,
    #[error("the spreadsheet is not valid UTF-8 text")]
    NotUtf8,
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("malformed row: {0}")]
    Csv(#[from] csv::Error),
    #[error("unreadable workbook: {0}")]
    Workbook(#[from] calamine::Error),
}

/// How the uploaded bytes are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    /// `.xlsx` or legacy `.xls`; only the first sheet is read.
    Workbook,
}

impl SheetFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".csv") {
            Some(SheetFormat::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Some(SheetFormat::Workbook)
        } else {
            None
        }
    }
}

/// Values an import run stamps onto every record.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub id_prefix: String,
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

impl ImportOptions {
    pub fn new(id_prefix: impl Into<String>) -> Self {
        ImportOptions {
            id_prefix: id_prefix.into(),
            today: chrono::Local::now().date_naive(),
            now: Utc::now(),
        }
    }
}

#[derive(Clone, Copy)]
enum Column {
    StudentName,
    Email,
    MobileNumber,
    Address,
    BatchNumber,
    CourseName,
    CourseStartDate,
    CourseEndDate,
    CertificateIssueDate,
}

impl Column {
    fn from_title(title: &str) -> Option<Self> {
        match title.to_lowercase().as_str() {
            "student name" => Some(Column::StudentName),
            "email" => Some(Column::Email),
            "mobile number" => Some(Column::MobileNumber),
            "address" => Some(Column::Address),
            "batch number" => Some(Column::BatchNumber),
            "course name" => Some(Column::CourseName),
            "course start date" => Some(Column::CourseStartDate),
            "course end date" => Some(Column::CourseEndDate),
            "certificate issue date" => Some(Column::CertificateIssueDate),
            _ => None,
        }
    }
}

/// One data cell, keeping whether the source typed it as a number.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                Cell::Text(normalize_cell(s))
            }
            Data::Bool(b) => Cell::Text(b.to_string()),
            _ => Cell::Text(String::new()),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, Cell::Text(s) if s.is_empty())
    }

    /// Text value; whole numbers print without a fractional part, so a mobile
    /// number typed as a number reads back as its digits.
    fn text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }

    fn date(&self, today: NaiveDate) -> String {
        match self {
            Cell::Text(s) => parse_date(s, today),
            Cell::Number(n) => serial_date(*n).unwrap_or(today).to_string(),
        }
    }
}

/// Header titles plus data rows, whatever the source format.
struct Sheet {
    titles: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Trims, strips one pair of outer quotes and normalizes non-breaking spaces.
fn normalize_cell(cell: &str) -> String {
    let s = cell.trim();
    let s = s
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(s);
    s.replace('\u{00A0}', " ").trim().to_string()
}

/// Picks the most frequent of `,` `;` tab `|` in the header line.
///
/// A header without any of them is a single column; `,` is used then, and also
/// when two candidates are equally frequent.
fn detect_delimiter(header_line: &str) -> u8 {
    let mut best = (b',', 0);
    let mut tied = false;
    for d in [b',', b';', b'\t', b'|'] {
        let count = header_line.matches(d as char).count();
        if count > best.1 {
            best = (d, count);
            tied = false;
        } else if count > 0 && count == best.1 {
            tied = true;
        }
    }
    if tied { b',' } else { best.0 }
}

/// Every title must be letters, marks, spaces, hyphens or underscores.
///
/// Blank titles are rejected in CSV headers; workbooks often carry empty header
/// cells above unused columns, so `allow_blank` skips them there.
fn validate_header_cells(titles: &[String], allow_blank: bool) -> Result<(), ImportError> {
    let header_re = Regex::new(r"^[\p{L}\p{M}\s\-_]+$")
        .map_err(|e| ImportError::InvalidHeader(e.to_string()))?;
    for title in titles {
        if title.is_empty() {
            if allow_blank {
                continue;
            }
            return Err(ImportError::InvalidHeader(
                "header cells must not be empty".to_string(),
            ));
        }
        if !header_re.is_match(title) {
            return Err(ImportError::InvalidHeader(format!(
                "'{}' must contain only letters, spaces, '-' or '_'",
                title
            )));
        }
    }
    if titles.iter().all(String::is_empty) {
        return Err(ImportError::Empty);
    }
    Ok(())
}

/// The date of spreadsheet serial day `serial` (days since 1899-12-30).
pub fn serial_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..MAX_SERIAL).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_signed(Duration::days(serial.floor() as i64)))
}

/// Reads an all-digit `YYYY` (as January 1st) or `YYYYMMDD` value.
fn compact_date(value: &str) -> Option<NaiveDate> {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match value.len() {
        4 => NaiveDate::from_ymd_opt(value.parse().ok()?, 1, 1),
        8 => NaiveDate::from_ymd_opt(
            value[0..4].parse().ok()?,
            value[4..6].parse().ok()?,
            value[6..8].parse().ok()?,
        ),
        _ => None,
    }
}

/// Normalizes a text date cell to `YYYY-MM-DD`, defaulting to `today`.
///
/// A bare year reads as January 1st and eight digits as `YYYYMMDD`. Other numbers
/// of at least 10000 are serial day numbers, the way unformatted date cells export.
pub fn parse_date(value: &str, today: NaiveDate) -> String {
    let value = value.trim();
    if value.is_empty() {
        return today.to_string();
    }

    if let Some(date) = compact_date(value) {
        return date.to_string();
    }

    if let Ok(serial) = value.parse::<f64>() {
        return Some(serial)
            .filter(|s| *s >= MIN_TEXT_SERIAL)
            .and_then(serial_date)
            .unwrap_or(today)
            .to_string();
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return instant.date_naive().to_string();
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .unwrap_or(today)
        .to_string()
}

fn read_csv(bytes: &[u8]) -> Result<Sheet, ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ImportError::NotUtf8)?;
    let text = text.trim_start_matches('\u{FEFF}');
    let header_line = text.lines().next().unwrap_or_default();
    if header_line.trim().is_empty() {
        return Err(ImportError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(header_line))
        .flexible(true)
        .from_reader(text.as_bytes());

    let titles: Vec<String> = reader.headers()?.iter().map(normalize_cell).collect();
    validate_header_cells(&titles, false)?;

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        rows.push(row.iter().map(|c| Cell::Text(normalize_cell(c))).collect());
    }
    Ok(Sheet { titles, rows })
}

fn read_workbook(bytes: &[u8]) -> Result<Sheet, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook.worksheet_range_at(0).ok_or(ImportError::Empty)??;

    let mut rows = range.rows();
    let titles: Vec<String> = rows
        .next()
        .ok_or(ImportError::Empty)?
        .iter()
        .map(|data| Cell::from_data(data).text())
        .collect();
    validate_header_cells(&titles, true)?;

    let rows = rows
        .map(|row| row.iter().map(Cell::from_data).collect())
        .collect();
    Ok(Sheet { titles, rows })
}

/// Parses an uploaded spreadsheet into records with fresh identifiers.
pub fn parse_spreadsheet(
    bytes: &[u8],
    format: SheetFormat,
    options: &ImportOptions,
) -> Result<Vec<Record>, ImportError> {
    let sheet = match format {
        SheetFormat::Csv => read_csv(bytes)?,
        SheetFormat::Workbook => read_workbook(bytes)?,
    };

    let columns: HashMap<usize, Column> = sheet
        .titles
        .iter()
        .enumerate()
        .filter_map(|(idx, title)| Column::from_title(title).map(|c| (idx, c)))
        .collect();

    let mut records = Vec::new();
    for cells in &sheet.rows {
        if cells.iter().all(Cell::is_blank) {
            continue;
        }

        let mut dates: [Option<&Cell>; 3] = [None; 3];
        let mut new_record = NewRecord::default();
        for (idx, cell) in cells.iter().enumerate() {
            let Some(column) = columns.get(&idx) else {
                continue;
            };
            match column {
                Column::StudentName => new_record.student_name = cell.text(),
                Column::Email => new_record.email = cell.text(),
                Column::MobileNumber => new_record.mobile_number = cell.text(),
                Column::Address => new_record.address = cell.text(),
                Column::BatchNumber => new_record.batch_number = cell.text(),
                Column::CourseName => new_record.course_name = cell.text(),
                Column::CourseStartDate => dates[0] = Some(cell),
                Column::CourseEndDate => dates[1] = Some(cell),
                Column::CertificateIssueDate => dates[2] = Some(cell),
            }
        }

        if new_record.student_name.is_empty() {
            new_record.student_name = UNKNOWN_NAME.to_string();
        }
        let [start, end, issued] = dates.map(|d| match d {
            Some(cell) => cell.date(options.today),
            None => options.today.to_string(),
        });
        new_record.course_start_date = start;
        new_record.course_end_date = end;
        new_record.certificate_issue_date = issued;

        let id = generate_record_id(&options.id_prefix, options.now.year());
        records.push(Record::issue(new_record, id, options.now));
    }

    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_xlsxwriter::Workbook;

    fn options() -> ImportOptions {
        ImportOptions {
            id_prefix: "ICES".to_string(),
            today: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            now: Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn parse_csv(text: &[u8]) -> Result<Vec<Record>, ImportError> {
        parse_spreadsheet(text, SheetFormat::Csv, &options())
    }

    const FULL_HEADER: &str = "Student Name,Email,Mobile Number,Address,Batch Number,Course Name,Course Start Date,Course End Date,Certificate Issue Date";

    #[test]
    fn parses_full_rows() {
        let csv = format!(
            "{}\nSakshi Raghav,sakshi@email.com,+91 98765 43210,\"New Delhi, India\",BATCH-2024-Q1,Java Programming Certification,2024-01-15,2024-03-15,2024-03-20\n",
            FULL_HEADER
        );
        let records = parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!(r.id.starts_with("ICES-2024-"));
        assert_eq!(r.student_name, "Sakshi Raghav");
        assert_eq!(r.address, "New Delhi, India");
        assert_eq!(r.course_start_date, "2024-01-15");
        assert_eq!(r.course_end_date, "2024-03-15");
        assert_eq!(r.certificate_issue_date, "2024-03-20");
        assert!(r.is_valid);
        assert_eq!(r.created_at, "2024-06-01T09:30:00.000Z");
    }

    #[test]
    fn missing_values_get_defaults() {
        let records = parse_csv(b"Email;Course Name\n;Rust Basics\n").unwrap();

        let r = &records[0];
        assert_eq!(r.student_name, UNKNOWN_NAME);
        assert_eq!(r.email, "");
        assert_eq!(r.course_name, "Rust Basics");
        assert_eq!(r.course_start_date, "2024-06-01");
        assert_eq!(r.certificate_issue_date, "2024-06-01");
    }

    #[test]
    fn header_matching_ignores_case_and_unknown_columns() {
        let csv = "student name\tNotes\tcourse END date\nZoë Nuñez\tanything\t03/15/2024\n";
        let records = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(records[0].student_name, "Zoë Nuñez");
        assert_eq!(records[0].course_end_date, "2024-03-15");
    }

    #[test]
    fn each_row_gets_its_own_identifier_and_blank_rows_are_skipped() {
        let records = parse_csv(b"Student Name\nA\n\n,\nB\nC\n").unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.student_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn delimiter_defaults_to_comma_without_a_clear_winner() {
        assert_eq!(detect_delimiter("Student Name"), b',');
        assert_eq!(detect_delimiter("Student Name;Email|Address"), b',');
        assert_eq!(detect_delimiter("Student Name;Email;Address"), b';');
        assert_eq!(detect_delimiter("Student Name|Email"), b'|');
        assert_eq!(detect_delimiter("a,b;c;d"), b';');
    }

    #[test]
    fn rejects_empty_input_and_bad_headers() {
        assert!(matches!(parse_csv(b""), Err(ImportError::Empty)));
        assert!(matches!(
            parse_csv(b"Student Name,,Email\nA,,b\n"),
            Err(ImportError::InvalidHeader(_))
        ));
        assert!(matches!(
            parse_csv(b"Student Name,Score 1\nA,3\n"),
            Err(ImportError::InvalidHeader(_))
        ));
        assert!(matches!(
            parse_csv(&[0xff, 0xfe, 0x00]),
            Err(ImportError::NotUtf8)
        ));
    }

    #[test]
    fn date_cells_are_normalized() {
        let today = today();
        assert_eq!(parse_date("2024-01-15", today), "2024-01-15");
        assert_eq!(parse_date("2024/01/15", today), "2024-01-15");
        assert_eq!(parse_date("01/15/2024", today), "2024-01-15");
        assert_eq!(parse_date("January 15, 2024", today), "2024-01-15");
        assert_eq!(parse_date("15 Jan 2024", today), "2024-01-15");
        assert_eq!(parse_date("2024-01-15T10:00:00Z", today), "2024-01-15");
        assert_eq!(parse_date("45306", today), "2024-01-15");
        assert_eq!(parse_date("", today), "2024-06-01");
        assert_eq!(parse_date("someday", today), "2024-06-01");
    }

    #[test]
    fn bare_numbers_in_text_cells() {
        let today = today();
        assert_eq!(parse_date("2024", today), "2024-01-01");
        assert_eq!(parse_date("20240115", today), "2024-01-15");
        assert_eq!(parse_date("20241345", today), "2024-06-01");
        // Too small to be a plausible serial day.
        assert_eq!(parse_date("365", today), "2024-06-01");
        assert_eq!(parse_date("99999999999", today), "2024-06-01");
    }

    #[test]
    fn serial_days_map_from_the_1899_epoch() {
        assert_eq!(serial_date(1.0), NaiveDate::from_ymd_opt(1899, 12, 31));
        assert_eq!(serial_date(45306.75), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(serial_date(0.0), None);
        assert_eq!(serial_date(3_000_000.0), None);
    }

    #[test]
    fn format_is_chosen_by_extension() {
        assert_eq!(SheetFormat::from_filename("students.CSV"), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::from_filename("students.xlsx"), Some(SheetFormat::Workbook));
        assert_eq!(SheetFormat::from_filename("legacy.xls"), Some(SheetFormat::Workbook));
        assert_eq!(SheetFormat::from_filename("students.txt"), None);
    }

    /// A workbook with a typed serial date, a text date and a numeric phone number.
    pub(crate) fn sample_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let header = [
            "Student Name",
            "Mobile Number",
            "Course Name",
            "Course Start Date",
            "Course End Date",
        ];
        for (col, title) in header.iter().enumerate() {
            sheet.write_string(0, col as u16, *title).unwrap();
        }
        sheet.write_string(1, 0, "Sakshi Raghav").unwrap();
        sheet.write_number(1, 1, 9876543210.0).unwrap();
        sheet.write_string(1, 2, "Java Programming Certification").unwrap();
        sheet.write_number(1, 3, 45306.0).unwrap();
        sheet.write_string(1, 4, "2024-03-15").unwrap();
        sheet.write_string(2, 0, "Arjun Mehta").unwrap();
        sheet.write_number(2, 3, 2024.0).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn reads_the_first_sheet_of_a_workbook() {
        let records =
            parse_spreadsheet(&sample_workbook(), SheetFormat::Workbook, &options()).unwrap();

        assert_eq!(records.len(), 2);
        let r = &records[0];
        assert_eq!(r.student_name, "Sakshi Raghav");
        assert_eq!(r.mobile_number, "9876543210");
        assert_eq!(r.course_name, "Java Programming Certification");
        assert_eq!(r.course_start_date, "2024-01-15");
        assert_eq!(r.course_end_date, "2024-03-15");
        assert_eq!(r.certificate_issue_date, "2024-06-01");

        // A typed number is always a serial day, however small.
        assert_eq!(records[1].course_start_date, "1905-07-16");
        assert_eq!(records[1].mobile_number, "");
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        assert!(matches!(
            parse_spreadsheet(b"Student Name\nA\n", SheetFormat::Workbook, &options()),
            Err(ImportError::Workbook(_))
        ));
    }
}
