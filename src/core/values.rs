//! Purpose: Clean raw report cell text into typed values.
//! Exports: date/period normalizers and Colombian-format numeric cleaners.
//! Role: Faithful port of the report's value conventions: dots are thousand
//! separators, commas are decimal separators, `--`/`N/A` mean absent.
//! Invariants: Cleaners return `None` for placeholders instead of erroring.
//! Invariants: Salary and IBC values round to two decimals.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::warn;

static DATE_DMY_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})").expect("date pattern"));
static DATE_DMY_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})").expect("date pattern"));
static DATE_YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})").expect("date pattern"));
static PERIOD_YYYYMM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})").expect("period pattern"));
static HEADER_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[\d+\]\s*$").expect("flag pattern"));

// Numeric shapes seen in the summary section, from most to least specific.
static COL_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}(?:\.\d{3})*,\d{2}").expect("numeric pattern"));
static COL_4PLUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4,},\d{2}").expect("numeric pattern"));
static COL_SIMPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+,\d{2}").expect("numeric pattern"));
static COL_NODEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}(?:\.\d{3})*").expect("numeric pattern"));
static COL_4PLUS_NODEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4,}").expect("numeric pattern"));
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("numeric pattern"));

fn is_placeholder(value: &str, zero_is_empty: bool) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "--" || trimmed == "N/A" || (zero_is_empty && trimmed == "0")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn parse_date(value: &str) -> Option<(i32, u32, u32)> {
    let value = value.trim();
    let patterns: [(&Regex, bool); 3] = [
        (&DATE_DMY_SLASH, false),
        (&DATE_DMY_DASH, false),
        (&DATE_YMD, true),
    ];
    for (pattern, year_first) in patterns {
        let Some(caps) = pattern.captures(value) else {
            continue;
        };
        let (year, month, day) = if year_first {
            (&caps[1], &caps[2], &caps[3])
        } else {
            (&caps[3], &caps[2], &caps[1])
        };
        let (Ok(year), Ok(month), Ok(day)) = (
            year.parse::<i32>(),
            month.parse::<u32>(),
            day.parse::<u32>(),
        ) else {
            continue;
        };
        if NaiveDate::from_ymd_opt(year, month, day).is_some() {
            return Some((year, month, day));
        }
    }
    None
}

/// True when `value` carries a calendar-valid date in a recognized format.
/// Never logs: row recovery probes every cell with this while locating the
/// date-anchor columns.
pub fn is_date(value: &str) -> bool {
    !is_placeholder(value, false) && parse_date(value).is_some()
}

/// Normalize `DD/MM/YYYY`, `DD-MM-YYYY`, or `YYYY-MM-DD` to `YYYY-MM-DD`.
/// Dates that do not exist on the calendar are rejected with a warning; only
/// cells already identified as date columns should be cleaned through this.
pub fn normalize_date(value: &str) -> Option<String> {
    if is_placeholder(value, false) {
        return None;
    }
    match parse_date(value) {
        Some((year, month, day)) => Some(format!("{year:04}-{month:02}-{day:02}")),
        None => {
            warn!(value, "could not parse date");
            None
        }
    }
}

/// Clean a salary cell (`$1.235.000,50` -> `1235000.50`).
pub fn clean_salary(value: &str) -> Option<f64> {
    if is_placeholder(value, true) {
        return None;
    }
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|ch| *ch != '$' && !ch.is_whitespace())
        .collect();
    let normalized = disambiguate_separators(&cleaned, 2);
    match normalized.parse::<f64>() {
        Ok(parsed) => Some(round2(parsed)),
        Err(_) => {
            warn!(value, cleaned = %normalized, "could not parse salary");
            None
        }
    }
}

/// Clean a general numeric cell (`1.234,56` -> `1234.56`, `1,5` -> `1.5`).
pub fn clean_numeric(value: &str) -> Option<f64> {
    if is_placeholder(value, true) {
        return None;
    }
    let cleaned: String = value.trim().chars().filter(|ch| *ch != ' ').collect();

    let normalized = if cleaned.contains(',') && cleaned.contains('.') {
        combine_thousands_and_decimal(&cleaned)
    } else if cleaned.contains(',') {
        let parts: Vec<&str> = cleaned.split(',').collect();
        if parts.len() == 2 && parts[1].len() <= 3 {
            format!("{}.{}", parts[0], parts[1])
        } else {
            cleaned.replace(',', "")
        }
    } else if cleaned.contains('.') {
        let parts: Vec<&str> = cleaned.split('.').collect();
        if parts.len() == 2 && parts[1].len() > 3 {
            format!("{}{}", parts[0], parts[1])
        } else {
            cleaned.clone()
        }
    } else {
        cleaned.clone()
    };

    match normalized.parse::<f64>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(value, cleaned = %normalized, "could not parse numeric value");
            None
        }
    }
}

/// Normalize a `YYYYMM` period to `YYYY-MM`.
pub fn normalize_period(value: &str) -> Option<String> {
    if is_placeholder(value, false) {
        return None;
    }
    let value = value.trim();
    if let Some(caps) = PERIOD_YYYYMM.captures(value) {
        let month: u32 = caps[2].parse().ok()?;
        if (1..=12).contains(&month) {
            return Some(format!("{}-{}", &caps[1], &caps[2]));
        }
    }
    warn!(value, "could not parse period");
    None
}

/// Clean an IBC cell (`$ 471.800` -> `471800.00`): dots are always thousand
/// separators here, the table carries no decimals.
pub fn clean_ibc(value: &str) -> Option<f64> {
    if is_placeholder(value, true) {
        return None;
    }
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|ch| *ch != '$' && *ch != ',' && *ch != '.' && !ch.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(parsed) => Some(round2(parsed)),
        Err(_) => {
            warn!(value, cleaned = %cleaned, "could not parse IBC value");
            None
        }
    }
}

pub fn clean_days(value: &str) -> Option<i64> {
    if is_placeholder(value, true) {
        return None;
    }
    match value.trim().parse::<i64>() {
        Ok(days) => Some(days),
        Err(_) => {
            warn!(value, "could not parse days value");
            None
        }
    }
}

/// Extract the rightmost numeric value from a summary line where commas are
/// plain decimal separators (`1193,00` -> `1193.0`). Header-flag lines and
/// flag-sized matches are skipped.
pub fn summary_numeric(line: &str) -> Option<f64> {
    if HEADER_FLAG.is_match(line) {
        return None;
    }
    for pattern in [&*COL_SIMPLE, &*DIGITS] {
        let Some(found) = pattern.find_iter(line).last() else {
            continue;
        };
        let value = found.as_str();
        if value.len() <= 2 && value.chars().all(|ch| ch.is_ascii_digit()) {
            continue;
        }
        let Ok(parsed) = value.replace(',', ".").parse::<f64>() else {
            continue;
        };
        if parsed < 0.01 {
            continue;
        }
        return Some(parsed);
    }
    None
}

/// Extract the rightmost Colombian-format numeric value from a line,
/// trying the most specific shape first (`1.184,29`, `1193,00`, `1.184`, ...).
pub fn numeric_from_line(line: &str) -> Option<f64> {
    if HEADER_FLAG.is_match(line) {
        return None;
    }
    let patterns = [
        &*COL_FULL,
        &*COL_4PLUS,
        &*COL_SIMPLE,
        &*COL_NODEC,
        &*COL_4PLUS_NODEC,
        &*DIGITS,
    ];
    for pattern in patterns {
        let Some(found) = pattern.find_iter(line).last() else {
            continue;
        };
        let value = found.as_str();
        if value.len() <= 2 && value.chars().all(|ch| ch.is_ascii_digit()) {
            continue;
        }
        let normalized = if value.contains(',') && value.contains('.') {
            combine_thousands_and_decimal(value)
        } else if value.contains(',') {
            let parts: Vec<&str> = value.split(',').collect();
            if parts.len() == 2 && parts[1].len() <= 2 {
                value.replace(',', ".")
            } else {
                value.replace(',', "")
            }
        } else if value.contains('.') {
            let parts: Vec<&str> = value.split('.').collect();
            if parts.len() == 2 && parts[1].len() <= 2 {
                value.to_string()
            } else {
                value.replace('.', "")
            }
        } else {
            value.to_string()
        };
        let Ok(parsed) = normalized.parse::<f64>() else {
            continue;
        };
        if parsed < 0.01 {
            continue;
        }
        return Some(parsed);
    }
    None
}

// `1.234.567,89` -> `1234567.89`; commas in the decimal part are assumed
// singular. Values with a second comma fall through to a parse failure.
fn combine_thousands_and_decimal(value: &str) -> String {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() == 2 {
        format!("{}.{}", parts[0].replace('.', ""), parts[1])
    } else {
        value.to_string()
    }
}

fn disambiguate_separators(cleaned: &str, max_decimal_digits: usize) -> String {
    if cleaned.contains(',') && cleaned.contains('.') {
        combine_thousands_and_decimal(cleaned)
    } else if cleaned.contains(',') {
        let parts: Vec<&str> = cleaned.split(',').collect();
        if parts.len() == 2 && parts[1].len() <= max_decimal_digits {
            format!("{}.{}", parts[0], parts[1])
        } else {
            cleaned.replace(',', "")
        }
    } else if cleaned.contains('.') {
        let parts: Vec<&str> = cleaned.split('.').collect();
        if parts.len() == 2 && parts[1].len() <= max_decimal_digits {
            cleaned.to_string()
        } else {
            cleaned.replace('.', "")
        }
    } else {
        cleaned.to_string()
    }
}
