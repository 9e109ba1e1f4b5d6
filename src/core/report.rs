//! Purpose: Run every extractor over one document and bundle the results.
//! Exports: `ParseReport`, `extract_report`, `extract_path`, `extract_bytes`.
//! Role: The response shape of the HTTP endpoint and the CLI output.
//! Invariants: The report always carries exactly the three documented fields;
//! empty tables serialize as `[]`, absent totals as `null`.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::core::error::Error;
use crate::core::payments::{self, PaymentRecord};
use crate::core::pdf::{self, PdfText};
use crate::core::summary::SummaryValues;
use crate::core::weeks::{self, WeekRecord};

#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    pub weeks_data: Vec<WeekRecord>,
    pub summary_values: SummaryValues,
    pub payments_data: Vec<PaymentRecord>,
}

pub fn extract_report(pdf: &PdfText) -> ParseReport {
    let (weeks_data, summary_values) = weeks::extract(pdf);
    let payments_data = payments::extract(pdf);
    info!(
        weeks = weeks_data.len(),
        payments = payments_data.len(),
        "extraction complete"
    );
    ParseReport {
        weeks_data,
        summary_values,
        payments_data,
    }
}

pub fn extract_path(path: &Path) -> Result<ParseReport, Error> {
    Ok(extract_report(&pdf::load_path(path)?))
}

pub fn extract_bytes(bytes: &[u8]) -> Result<ParseReport, Error> {
    Ok(extract_report(&pdf::load_bytes(bytes)?))
}
