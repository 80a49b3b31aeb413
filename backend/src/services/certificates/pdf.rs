use crate::services::certificates::qr;
use chrono::NaiveDate;
use common::model::record::Record;
use genpdf::elements::{Break, Image as PdfImage, LinearLayout, Paragraph};
use genpdf::style::{Style, StyledString};
use genpdf::{Alignment, Document, Element};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

const ORGANIZATION: &str = "ICES";
const ORGANIZATION_LONG: &str = "Institute of Continuing Education";
const SIGNATORY: &str = "Dr. Director Name";
const SIGNATORY_TITLE: &str = "Director, ICES";
const QR_DPI: f64 = 300.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("font loading failed: {0}")]
    Font(genpdf::error::Error),
    #[error("PDF rendering failed: {0}")]
    Pdf(#[from] genpdf::error::Error),
    #[error("temporary file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Formats a `YYYY-MM-DD` date as `January 15, 2024`; other input is printed as is.
pub fn long_date(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}

/// Load the font family, preferring Arial and falling back to LiberationSans.
fn load_font(
    fonts_dir: &Path,
) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>, RenderError> {
    if let Ok(family) = genpdf::fonts::from_files(fonts_dir, "Arial", None) {
        return Ok(family);
    }
    genpdf::fonts::from_files(fonts_dir, "LiberationSans", None).map_err(RenderError::Font)
}

fn configure_document(fonts_dir: &Path, record: &Record) -> Result<Document, RenderError> {
    let mut doc = Document::new(load_font(fonts_dir)?);
    doc.set_title(format!("Certificate - {}", record.student_name));
    doc.set_font_size(11);
    doc.set_line_spacing(1.25);

    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(20);
    doc.set_page_decorator(decorator);
    Ok(doc)
}

fn centered(text: impl Into<String>, style: Style) -> impl Element {
    Paragraph::new(StyledString::new(text.into(), style)).aligned(Alignment::Center)
}

/// One "label: value" line of the details block.
fn detail_line(label: &str, value: &str) -> Paragraph {
    let mut p = Paragraph::new("");
    p.push(StyledString::new(format!("{}: ", label), Style::new().italic()));
    p.push(StyledString::new(value.to_string(), Style::new().bold()));
    p
}

/// Writes the QR PNG to a temporary file and embeds it; genpdf reads images from disk.
///
/// The file must outlive `doc.render`, so it is handed back to the caller.
fn push_qr_image(doc: &mut Document, verify_url: &str) -> Result<Option<NamedTempFile>, RenderError> {
    let png = qr::render_png(verify_url, qr::PRINT_SIZE);
    if png.is_empty() {
        return Ok(None);
    }

    let mut tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
    tmp.as_file_mut().write_all(&png)?;
    tmp.as_file_mut().flush()?;

    let mut img = PdfImage::from_path(tmp.path())?.with_alignment(Alignment::Center);
    img.set_dpi(QR_DPI);
    doc.push(img);
    Ok(Some(tmp))
}

/// Renders the printable certificate for `record` as PDF bytes.
///
/// `verify_url` is the link encoded in the QR code; the bare identifier link is
/// printed underneath it for readers who type it in.
pub fn render_certificate(
    record: &Record,
    verify_url: &str,
    bare_url: &str,
    fonts_dir: &Path,
) -> Result<Vec<u8>, RenderError> {
    let mut doc = configure_document(fonts_dir, record)?;

    let mut header = LinearLayout::vertical();
    header.push(centered(ORGANIZATION, Style::new().bold().with_font_size(20)));
    header.push(centered(ORGANIZATION_LONG.to_uppercase(), Style::new().with_font_size(9)));
    doc.push(header);
    doc.push(Break::new(2));

    doc.push(centered("CERTIFICATE", Style::new().bold().with_font_size(32)));
    doc.push(centered("OF COURSE COMPLETION", Style::new().with_font_size(13)));
    doc.push(Break::new(2));

    doc.push(centered("THIS IS TO CERTIFY THAT", Style::new().with_font_size(10)));
    doc.push(Break::new(1));
    doc.push(centered(
        record.student_name.clone(),
        Style::new().bold().with_font_size(26),
    ));
    doc.push(Break::new(1));

    let mut description = Paragraph::new("has successfully completed an intensive ");
    description.push(StyledString::new(record.course_name.clone(), Style::new().bold()));
    description.push(" program conducted from ");
    description.push(StyledString::new(long_date(&record.course_start_date), Style::new().bold()));
    description.push(" to ");
    description.push(StyledString::new(long_date(&record.course_end_date), Style::new().bold()));
    description.push(".");
    doc.push(description.aligned(Alignment::Center));
    doc.push(Break::new(1));
    doc.push(centered(
        "We acknowledge the dedication, discipline, and performance demonstrated throughout the course.",
        Style::new().italic(),
    ));
    doc.push(Break::new(2));

    let mut details = LinearLayout::vertical();
    details.push(detail_line("Batch Number", &record.batch_number));
    details.push(detail_line("Issue Date", &long_date(&record.certificate_issue_date)));
    details.push(detail_line("Certificate ID", &record.id));
    doc.push(details);
    doc.push(Break::new(2));

    doc.push(Paragraph::new(StyledString::new(
        "Authorized Signature",
        Style::new().italic(),
    )));
    doc.push(Paragraph::new(StyledString::new(SIGNATORY, Style::new().bold())));
    doc.push(Paragraph::new(SIGNATORY_TITLE));
    doc.push(Break::new(1));

    // Keep the temporary image alive until rendering finishes.
    let _qr_file = push_qr_image(&mut doc, verify_url)?;
    doc.push(centered("Scan to verify", Style::new().with_font_size(8)));
    doc.push(centered(
        format!("Verify at: {}", bare_url),
        Style::new().with_font_size(8),
    ));

    let mut out = Vec::new();
    doc.render(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_date_formats_iso_dates() {
        assert_eq!(long_date("2024-01-15"), "January 15, 2024");
        assert_eq!(long_date("2024-03-05"), "March 5, 2024");
        assert_eq!(long_date("soon"), "soon");
    }

    #[test]
    fn missing_fonts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let record = crate::store::tests::record("ICES-2024-001", "Sakshi Raghav");
        let result = render_certificate(
            &record,
            "https://certs.example.org/verify/ICES-2024-001",
            "https://certs.example.org/verify/ICES-2024-001",
            dir.path(),
        );
        assert!(matches!(result, Err(RenderError::Font(_))));
    }
}
