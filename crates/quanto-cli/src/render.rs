//! Terminal and file renderings of a batch report.

use console::{Alignment, measure_text_width, pad_str, style};

use quanto_core::present::COLUMNS;
use quanto_core::{BatchReport, DocumentFailure, LineItemRow, ReceiptRecord};

/// Widest a single cell may grow before it is truncated.
const MAX_CELL_WIDTH: usize = 40;

/// Render rows as an aligned plain-text table.
pub fn format_table(rows: &[LineItemRow]) -> String {
    let cells: Vec<[String; 5]> = rows
        .iter()
        .map(|row| row.cells().map(|c| single_line(&c)))
        .collect();

    let mut widths = COLUMNS.map(measure_text_width);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(measure_text_width(cell).min(MAX_CELL_WIDTH));
        }
    }

    let mut output = String::new();
    push_row(&mut output, &COLUMNS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&rule.join("-+-"));
    output.push('\n');

    if cells.is_empty() {
        output.push_str("(no line items)\n");
    }
    for row in &cells {
        push_row(&mut output, row, &widths);
    }

    output
}

fn push_row(output: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, width))| {
            // item_value is the only numeric column
            let align = if i == 1 { Alignment::Right } else { Alignment::Left };
            pad_str(cell, *width, align, Some("…")).into_owned()
        })
        .collect();
    output.push_str(padded.join(" | ").trim_end());
    output.push('\n');
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render rows as CSV with a header line.
pub fn format_csv(rows: &[LineItemRow]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(COLUMNS)?;
    for row in rows {
        wtr.write_record(row.cells())?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

/// Render the raw records as pretty-printed JSON.
pub fn format_json<'a, I>(records: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = &'a ReceiptRecord>,
{
    let records: Vec<&ReceiptRecord> = records.into_iter().collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Describe failed documents, one per line.
pub fn format_failures(failures: &[DocumentFailure]) -> String {
    let mut output = String::new();
    for failure in failures {
        output.push_str(&format!(
            "  - #{} {}: {}{}\n",
            failure.position,
            failure.name,
            failure.error,
            if failure.retryable { " (try again later)" } else { "" }
        ));
    }
    output
}

/// One-line outcome of a batch.
pub fn format_summary(report: &BatchReport) -> String {
    let mut summary = format!(
        "{} Analyzed {} documents in {}ms\n   {} successful, {} failed",
        style("✓").green(),
        report.submitted,
        report.elapsed_ms,
        style(report.receipts.len()).green(),
        style(report.failures.len()).red()
    );
    if report.aborted {
        summary.push_str(&format!(
            "\n{} Batch aborted at the first failure; completed results were discarded",
            style("!").yellow()
        ));
    }
    summary
}

/// Consistency issues for each receipt that has any.
pub fn format_issues(report: &BatchReport) -> String {
    let mut output = String::new();
    for receipt in &report.receipts {
        let issues = receipt.record.validate();
        if issues.is_empty() {
            continue;
        }
        output.push_str(&format!("  #{} {}:\n", receipt.position, receipt.name));
        for issue in issues {
            output.push_str(&format!("    - {}\n", issue));
        }
    }
    output
}
