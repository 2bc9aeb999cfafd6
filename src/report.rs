use std::fmt::Write;

use base64::Engine as _;
use chrono::NaiveDate;
use tracing::warn;

use crate::display::{self, DisplayRow, RecordView};
use crate::images::ImageStore;
use crate::misreport;
use crate::models::{RankedSchool, SubmissionRecord};

fn priority_label(priority: Option<u8>) -> String {
    priority.map_or_else(|| "-".to_string(), |p| p.to_string())
}

fn gap_text(view: &RecordView<'_>) -> String {
    view.gap_minutes
        .map(|minutes| format!("{minutes:.2} min"))
        .unwrap_or_default()
}

/// Film slots as entered, with misreported films passed through `emphasise`.
fn film_display(view: &RecordView<'_>, emphasise: impl Fn(&str) -> String) -> String {
    view.record
        .films
        .iter()
        .map(|slot| {
            let raw = slot.as_deref().unwrap_or("None");
            let film = misreport::parse_film(slot.as_deref());
            if film != 0 && view.misreport.is_misreported(film) {
                emphasise(raw)
            } else {
                raw.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn class_sections(records: &[SubmissionRecord]) -> String {
    records
        .iter()
        .map(SubmissionRecord::class_section)
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_school_section(
    output: &mut String,
    school: &RankedSchool,
    records: &[SubmissionRecord],
    images: &impl ImageStore,
) {
    let _ = writeln!(
        output,
        "## School {} | {} (priority {})",
        school.school_id,
        school.school_name,
        priority_label(school.priority)
    );

    if records.is_empty() {
        let _ = writeln!(output, "No data found for the selected criteria.");
        let _ = writeln!(output);
        return;
    }

    let _ = writeln!(output, "Classes: {}", class_sections(records));
    let _ = writeln!(output);

    for (number, row) in display::display_rows(records, images).into_iter().enumerate() {
        let number = number + 1;
        match row {
            DisplayRow::Shown(view) => {
                let mark = |flag: bool| if flag { " (!)" } else { "" };
                let _ = writeln!(
                    output,
                    "{number}. [{}] {} {}{} | Class {} | Films {} | Uploaded by {}{} | {:.2} KB | {}",
                    view.color.label(),
                    view.record.timestamp.format("%H:%M:%S"),
                    gap_text(&view),
                    mark(view.gap_warning),
                    view.record.class_section(),
                    film_display(&view, |film| format!("**{film}**")),
                    view.record.uploaded_by,
                    mark(view.uploader_warning),
                    view.size_kib,
                    view.misreport.summary()
                );
            }
            DisplayRow::MissingImage(record) => {
                let _ = writeln!(output, "{number}. Image not found: {}", record.class_pic);
            }
        }
    }
    let _ = writeln!(output);
}

/// Markdown review of every school on `date`, most suspicious first.
pub fn build_report(
    date: NaiveDate,
    schools: &[(RankedSchool, &[SubmissionRecord])],
    images: &impl ImageStore,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Kant Daily Report");
    let _ = writeln!(output, "Submissions on {date}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Review Order");

    if schools.is_empty() {
        let _ = writeln!(output, "No school data found for the selected date.");
        return output;
    }

    for (position, (school, records)) in schools.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {} ({}) priority {} across {} records",
            position + 1,
            school.school_name,
            school.school_id,
            priority_label(school.priority),
            records.len()
        );
    }
    let _ = writeln!(output);

    for (school, records) in schools {
        write_school_section(&mut output, school, records, images);
    }

    output
}

/// Plain-text view of the school at the operator's current position.
pub fn build_review(
    date: NaiveDate,
    position: &str,
    school: &RankedSchool,
    records: &[SubmissionRecord],
    images: &impl ImageStore,
) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "School ID: {} | School: {}    {}    {}",
        school.school_id, school.school_name, position, date
    );
    let _ = writeln!(output);
    write_school_section(&mut output, school, records, images);
    output
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Self-contained HTML page with inline photos, bordered by color class.
pub fn build_review_html(
    date: NaiveDate,
    position: &str,
    school: &RankedSchool,
    records: &[SubmissionRecord],
    images: &impl ImageStore,
) -> String {
    const WARN: &str = "color: red;";
    let mut output = String::new();

    let _ = writeln!(output, "<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
    let _ = writeln!(output, "<title>Kant Daily Report {date}</title></head><body>");
    let _ = writeln!(
        output,
        "<h5>School ID: {} | School: {} &nbsp; <b>{}</b> &nbsp; <i>{}</i></h5>",
        school.school_id,
        escape_html(&school.school_name),
        position,
        date
    );
    let _ = writeln!(
        output,
        "<div style=\"display: grid; grid-template-columns: repeat(4, 310px); gap: 8px;\">"
    );

    for row in display::display_rows(records, images) {
        let view = match row {
            DisplayRow::Shown(view) => view,
            DisplayRow::MissingImage(record) => {
                let _ = writeln!(
                    output,
                    "<p style=\"{WARN}\">Image not found: {}</p>",
                    escape_html(&record.class_pic)
                );
                continue;
            }
        };

        let encoded = match images.read_image_bytes(view.record.class_pic.trim()) {
            Ok(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
            Err(err) => {
                warn!(path = %view.record.class_pic, "failed to read image: {err}");
                String::new()
            }
        };

        let _ = writeln!(
            output,
            "<div><div style=\"border: 5px solid {}; border-radius: 8px; display: inline-block;\">\
             <img src=\"data:image/jpeg;base64,{encoded}\" width=\"300\" height=\"200\" \
             style=\"object-fit: cover; border-radius: 4px; display: block\"></div>",
            view.color.css()
        );
        let _ = writeln!(
            output,
            "<div style=\"width: 300px; display: flex; justify-content: space-between;\">\
             <span>{}</span><b style=\"{}\">{}</b></div>",
            view.record.timestamp.format("%H:%M:%S"),
            if view.gap_warning { WARN } else { "" },
            view.gap_minutes.map(|m| format!("{m:.2}")).unwrap_or_default()
        );
        let _ = writeln!(
            output,
            "<p><b>Class:</b> {} &nbsp; {}</p>",
            escape_html(&view.record.class_section()),
            film_display(&view, |film| format!(
                "<span style=\"{WARN}\"><b>{}</b></span>",
                escape_html(film)
            ))
        );
        let _ = writeln!(
            output,
            "<p><b>Uploaded By:</b> <span style=\"{}\">{}</span></p>",
            if view.uploader_warning { WARN } else { "" },
            escape_html(&view.record.uploaded_by)
        );
        let _ = writeln!(output, "<p>{}</p></div>", escape_html(&view.misreport.summary()));
    }

    let _ = writeln!(output, "</div></body></html>");
    output
}
