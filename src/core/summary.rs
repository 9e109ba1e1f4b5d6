//! Purpose: Read report-level totals out of the summary section.
//! Exports: `SummaryValues`, `scan_page`, `merge`.
//! Role: Finds the `[26] TOTAL SEMANAS` and `[11] ... ALTO RIESGO` blocks,
//! whose values sit on the same line or a few lines below.
//! Invariants: The `[26]` value must exceed 100 when read from a later line,
//! so the flag number itself is never mistaken for the total.

use serde::Serialize;
use tracing::info;

use crate::core::lines::fold;
use crate::core::values::{numeric_from_line, summary_numeric};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryValues {
    pub weeks_total_report: Option<f64>,
    pub weeks_high_risk: Option<f64>,
}

/// Later pages win: the final summary section repeats the running totals.
pub fn merge(into: &mut SummaryValues, from: SummaryValues) {
    if from.weeks_total_report.is_some() {
        into.weeks_total_report = from.weeks_total_report;
    }
    if from.weeks_high_risk.is_some() {
        into.weeks_high_risk = from.weeks_high_risk;
    }
}

pub fn scan_page(lines: &[String]) -> SummaryValues {
    let mut summary = SummaryValues::default();

    for (index, line) in lines.iter().enumerate() {
        let folded = fold(line);

        if folded.contains("[26]") && folded.contains("total semanas") {
            if let Some(value) = summary_numeric(line).filter(|value| *value != 26.0) {
                summary.weeks_total_report = Some(value);
                info!(value, "found total weeks on flag line");
            } else {
                for next in lines.iter().skip(index + 1).take(4) {
                    if let Some(value) =
                        summary_numeric(next).filter(|value| *value != 26.0 && *value > 100.0)
                    {
                        summary.weeks_total_report = Some(value);
                        info!(value, "found total weeks below flag line");
                        break;
                    }
                }
            }
        } else if folded.contains("total semanas") && summary.weeks_total_report.is_none() {
            if let Some(value) = summary_numeric(line).filter(|value| *value > 100.0) {
                summary.weeks_total_report = Some(value);
                info!(value, "found total weeks on unflagged line");
            }
        } else if folded.contains("[11]")
            && folded.contains("semanas cotizadas con tarifa de alto riesgo")
        {
            if let Some(value) = numeric_from_line(line).filter(|value| *value != 11.0) {
                summary.weeks_high_risk = Some(value);
            } else {
                for next in lines.iter().skip(index + 1).take(2) {
                    if let Some(value) = numeric_from_line(next).filter(|value| *value != 11.0) {
                        summary.weeks_high_risk = Some(value);
                        break;
                    }
                }
            }
        }
    }

    summary
}
