//! Purpose: Extract the "Detalle de pagos efectuados a partir de 1995" table.
//! Exports: `PaymentRecord`, `extract`, `missing_periods`, `MissingPeriods`.
//! Role: Finds payment pages by keyword or title, recovers rows anchored on
//! the YYYYMM period token, and reports gaps in the contribution timeline.
//! Invariants: A recovered row always carries an id, a name, and a period;
//! IBC and day counts are best-effort.
//! Invariants: Day counts are only taken from integer tokens in 1..=31 that
//! appear after the period column.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::core::lines::{count_keywords, fold, merge_currency, tokens};
use crate::core::pdf::{PageText, PdfText};
use crate::core::values::{clean_days, clean_ibc, is_date, normalize_period};

/// One reported payment period for one employer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRecord {
    pub cont_id: String,
    pub cont_name: String,
    pub cont_period: Option<String>,
    pub cont_reported_ibc: Option<f64>,
    pub cont_reported_days: Option<i64>,
    pub cont_contributed_days: Option<i64>,
}

const PAYMENT_KEYWORDS: [&str; 9] = [
    "pago",
    "ibc",
    "dias",
    "periodo",
    "fecha",
    "detalle",
    "posterior",
    "efectuados",
    "referencia",
];

const KEYWORD_MATCH_THRESHOLD: usize = 4;

const TITLE_INDICATORS: [&str; 3] = ["detalle de pagos", "pagos efectuados", "posterior a 1995"];

const TOTAL_ROW_INDICATORS: [&str; 5] = ["total", "suma", "resumen", "subtotal", "gran total"];

const HEADER_ROW_INDICATORS: [&str; 9] = [
    "identificacion aportante",
    "identificacion empleador",
    "nombre o razon",
    "periodo",
    "fecha de pago",
    "ibc reportado",
    "dias rep",
    "dias cot",
    "observacion",
];

// Numbered header flags [34]..[46] mark repeated header fragments.
static HEADER_FLAG_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(3[4-9]|4[0-6])\]").expect("flag pattern"));

static CURRENCY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?\d{1,3}(?:\.\d{3})+(?:,\d+)?$").expect("currency pattern"));

fn is_payments_page(page: &PageText) -> bool {
    let folded = page.folded();
    if TITLE_INDICATORS
        .iter()
        .any(|title| folded.contains(title))
    {
        return true;
    }
    count_keywords(&folded, &PAYMENT_KEYWORDS) >= KEYWORD_MATCH_THRESHOLD
}

fn is_data_row(line: &str) -> bool {
    let folded = fold(line);
    let trimmed = folded.trim_start();
    if TOTAL_ROW_INDICATORS
        .iter()
        .any(|indicator| trimmed.starts_with(indicator))
    {
        return false;
    }
    if HEADER_FLAG_RANGE.is_match(trimmed) {
        return false;
    }
    let header_hits = HEADER_ROW_INDICATORS
        .iter()
        .filter(|indicator| trimmed.contains(*indicator))
        .count();
    if header_hits >= 2 || trimmed.starts_with("identificacion") {
        return false;
    }
    let Some(first) = trimmed.split_whitespace().next() else {
        return false;
    };
    first.len() >= 2
}

fn is_contributor_id(token: &str) -> bool {
    let stripped: String = token
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '.'))
        .collect();
    stripped.len() >= 6 && stripped.chars().all(|ch| ch.is_ascii_digit())
}

fn is_currency_token(token: &str) -> bool {
    token.contains('$') || CURRENCY_TOKEN.is_match(token)
}

fn is_period_token(token: &str) -> Option<String> {
    if token.len() == 6 && token.chars().all(|ch| ch.is_ascii_digit()) {
        return normalize_period(token);
    }
    None
}

/// Recover a row from one text line. The period token is the anchor: id and
/// name sit before it, the payment details after it.
fn parse_row(line: &str) -> Option<PaymentRecord> {
    let cells = merge_currency(tokens(line));
    if cells.len() < 3 {
        return None;
    }
    if !is_contributor_id(&cells[0]) {
        return None;
    }

    let (period_index, period) = cells
        .iter()
        .enumerate()
        .skip(1)
        .find_map(|(index, cell)| is_period_token(cell).map(|period| (index, period)))?;

    // Tokens between id and period are the name, except the short RA code
    // that sits right before the period column.
    let mut name_cells: Vec<&str> = cells[1..period_index]
        .iter()
        .filter(|cell| cell.chars().any(|ch| ch.is_alphabetic()))
        .map(String::as_str)
        .collect();
    if let Some(last) = name_cells.last() {
        if last.len() <= 2 {
            name_cells.pop();
        }
    }
    if name_cells.is_empty() {
        return None;
    }

    let details = &cells[period_index + 1..];
    let ibc = details
        .iter()
        .find(|cell| is_currency_token(cell))
        .and_then(|cell| clean_ibc(cell));

    let mut reported_days = None;
    let mut contributed_days = None;
    for cell in details {
        if is_date(cell) || is_currency_token(cell) {
            continue;
        }
        if let Some(days) = cell
            .parse::<i64>()
            .ok()
            .filter(|days| (1..=31).contains(days))
        {
            if reported_days.is_none() {
                reported_days = clean_days(cell);
            } else if contributed_days.is_none() {
                contributed_days = clean_days(cell);
                break;
            }
        }
    }

    Some(PaymentRecord {
        cont_id: cells[0].clone(),
        cont_name: name_cells.join(" "),
        cont_period: Some(period),
        cont_reported_ibc: ibc,
        cont_reported_days: reported_days,
        cont_contributed_days: contributed_days,
    })
}

pub fn extract(pdf: &PdfText) -> Vec<PaymentRecord> {
    let mut rows = Vec::new();
    for page in &pdf.pages {
        if !is_payments_page(page) {
            continue;
        }
        let before = rows.len();
        for line in &page.lines {
            if !is_data_row(line) {
                continue;
            }
            if let Some(record) = parse_row(line) {
                rows.push(record);
            }
        }
        info!(
            page = page.number,
            rows = rows.len() - before,
            "processed payments page"
        );
    }
    info!(rows = rows.len(), "extracted payments table");
    rows
}

/// Gaps in the payment timeline between the first and last observed period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingPeriods {
    pub missing_periods: Vec<String>,
    pub start_period: String,
    pub end_period: String,
    pub n_missing: usize,
}

/// Returns `None` when no payment carries a parseable period.
pub fn missing_periods(payments: &[PaymentRecord]) -> Option<MissingPeriods> {
    let observed: BTreeSet<(i32, u32)> = payments
        .iter()
        .filter_map(|payment| payment.cont_period.as_deref())
        .filter_map(parse_period)
        .collect();
    let first = *observed.first()?;
    let last = *observed.last()?;

    let mut missing = Vec::new();
    let mut current = first;
    while current <= last {
        if !observed.contains(&current) {
            missing.push(format_period(current));
        }
        current = next_month(current);
    }

    Some(MissingPeriods {
        n_missing: missing.len(),
        missing_periods: missing,
        start_period: format_period(first),
        end_period: format_period(last),
    })
}

fn parse_period(period: &str) -> Option<(i32, u32)> {
    let (year, month) = period.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    // Validate through the calendar rather than a bare range check.
    chrono::NaiveDate::from_ymd_opt(year, month, 1)?;
    Some((year, month))
}

fn format_period((year, month): (i32, u32)) -> String {
    format!("{year:04}-{month:02}")
}

fn next_month((year, month): (i32, u32)) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}
