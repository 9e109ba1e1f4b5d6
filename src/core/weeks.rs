//! Purpose: Extract the "Relación de semanas cotizadas" table.
//! Exports: `WeekRecord`, `extract`.
//! Role: Walks pages, finds the contribution table by its headers, recovers
//! rows from text lines, and collects summary totals along the way.
//! Invariants: A page belongs to the table when at least 6 of the 9 expected
//! headers match; the table ends at the first headerless page after rows were
//! found.
//! Invariants: Rows are anchored on the Desde/Hasta date pair; lines without
//! two dates are never rows.

use serde::Serialize;
use tracing::info;

use crate::core::lines::{count_keywords, fold, merge_currency, tokens};
use crate::core::pdf::{PageText, PdfText};
use crate::core::summary::{self, SummaryValues};
use crate::core::values::{clean_numeric, clean_salary, is_date, normalize_date};

/// One contribution period, one employer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekRecord {
    pub cont_id: Option<String>,
    pub cont_name: Option<String>,
    pub cont_from: Option<String>,
    pub cont_to: Option<String>,
    pub cont_last_salary: Option<f64>,
    pub cont_weeks: Option<f64>,
    pub cont_deduction_weeks: Option<f64>,
    pub sim_weeks: Option<f64>,
    pub net_weeks: Option<f64>,
}

// Folded forms of the 9 expected column headers.
const EXPECTED_HEADERS: [&str; 9] = [
    "identificacion aportante",
    "nombre o razon social",
    "desde",
    "hasta",
    "ultimo salario",
    "semanas",
    "licencias",
    "simultaneos",
    "total",
];

const HEADER_MATCH_THRESHOLD: usize = 6;

const TOTAL_ROW_INDICATORS: [&str; 5] = ["total", "suma", "resumen", "subtotal", "gran total"];

const HEADER_ROW_INDICATORS: [&str; 4] = [
    "[1] identificacion",
    "identificacion aportante",
    "identificacion",
    "nombre o razon",
];

fn has_headers(page: &PageText) -> bool {
    count_keywords(&page.folded(), &EXPECTED_HEADERS) >= HEADER_MATCH_THRESHOLD
}

fn is_data_row(line: &str) -> bool {
    let folded = fold(line);
    let trimmed = folded.trim_start();
    if TOTAL_ROW_INDICATORS
        .iter()
        .chain(HEADER_ROW_INDICATORS.iter())
        .any(|indicator| trimmed.starts_with(indicator))
    {
        return false;
    }
    let Some(first) = trimmed.split_whitespace().next() else {
        return false;
    };
    first.len() >= 2
}

/// Recover a row from one text line. The id leads, the Desde/Hasta pair
/// anchors the middle, and the numeric columns trail; the name is whatever
/// sits between the id and the first date.
fn parse_row(line: &str) -> Option<WeekRecord> {
    let cells = merge_currency(tokens(line));
    if cells.len() < 4 {
        return None;
    }

    let date_positions: Vec<usize> = cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| is_date(cell))
        .map(|(index, _)| index)
        .collect();
    let [from_index, to_index] = date_positions[..] else {
        return None;
    };
    if from_index == 0 || to_index != from_index + 1 {
        return None;
    }

    let name = cells[1..from_index].join(" ");
    let trailing = &cells[to_index + 1..];

    // Right to left: total, simultaneous, deductions, weeks; anything left
    // of those four is the last-salary column.
    let numeric_at = |offset: usize| {
        trailing
            .len()
            .checked_sub(offset)
            .map(|index| clean_numeric(&trailing[index]))
            .unwrap_or(None)
    };
    let salary = if trailing.len() > 4 {
        clean_salary(&trailing[0])
    } else {
        None
    };

    Some(WeekRecord {
        cont_id: Some(cells[0].clone()),
        cont_name: (!name.is_empty()).then_some(name),
        cont_from: normalize_date(&cells[from_index]),
        cont_to: normalize_date(&cells[to_index]),
        cont_last_salary: salary,
        cont_weeks: numeric_at(4),
        cont_deduction_weeks: numeric_at(3),
        sim_weeks: numeric_at(2),
        net_weeks: numeric_at(1),
    })
}

/// Extract the weeks table plus the summary totals in one pass, preserving
/// the original page flow: summary values may appear before, inside, or
/// after the table pages.
pub fn extract(pdf: &PdfText) -> (Vec<WeekRecord>, SummaryValues) {
    let mut rows = Vec::new();
    let mut totals = SummaryValues::default();
    let mut table_found = false;

    for page in &pdf.pages {
        if !has_headers(page) {
            summary::merge(&mut totals, summary::scan_page(&page.lines));
            if table_found {
                info!(page = page.number, "table ended, summary collected");
                break;
            }
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
            "processed weeks table page"
        );
        table_found = true;
        summary::merge(&mut totals, summary::scan_page(&page.lines));
    }

    info!(rows = rows.len(), "extracted weeks table");
    (rows, totals)
}

#[cfg(test)]
mod tests {
    use super::{WeekRecord, extract, is_data_row, parse_row};
    use crate::core::pdf::{PageText, PdfText};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn page(number: u32, lines: &[&str]) -> PageText {
        PageText {
            number,
            lines: lines.iter().map(|line| line.to_string()).collect(),
        }
    }

    const HEADER_LINE: &str = "[1] Identificacion aportante [2] Nombre o razon Social [3] Desde \
         [4] Hasta [5] Ultimo salario [6] Semanas [7] Licencias (Lic.) \
         [8] Simultaneos (Sim.) [9] Total";

    #[test]
    fn parses_a_full_row() {
        let record = parse_row(
            "890326878 Fabrica De Calzado S A 01/02/1980 30/09/1985 $ 45.000 295,71 0,00 0,00 295,71",
        )
        .expect("row");
        assert_eq!(
            record,
            WeekRecord {
                cont_id: Some("890326878".to_string()),
                cont_name: Some("Fabrica De Calzado S A".to_string()),
                cont_from: Some("1980-02-01".to_string()),
                cont_to: Some("1985-09-30".to_string()),
                cont_last_salary: Some(45_000.0),
                cont_weeks: Some(295.71),
                cont_deduction_weeks: Some(0.0),
                sim_weeks: Some(0.0),
                net_weeks: Some(295.71),
            }
        );
    }

    #[test]
    fn parses_a_row_without_salary() {
        let record =
            parse_row("17134806 Empresa Textil 01/10/1985 31/12/1994 482,86 2,00 0,00 480,86")
                .expect("row");
        assert_eq!(record.cont_last_salary, None);
        assert_eq!(record.cont_weeks, Some(482.86));
        assert_eq!(record.cont_deduction_weeks, Some(2.0));
        assert_eq!(record.net_weeks, Some(480.86));
    }

    #[test]
    fn lines_without_two_dates_are_not_rows() {
        assert_eq!(parse_row("RELACION DE SEMANAS COTIZADAS"), None);
        assert_eq!(parse_row(HEADER_LINE), None);
        assert_eq!(parse_row("890326878 Empresa 01/02/1980 algo"), None);
    }

    #[test]
    fn total_and_header_lines_are_rejected() {
        assert!(!is_data_row("Total semanas cotizadas 778,57"));
        assert!(!is_data_row("[1] Identificacion aportante"));
        assert!(!is_data_row("Resumen de semanas"));
        assert!(is_data_row(
            "890326878 Fabrica De Calzado 01/02/1980 30/09/1985 295,71"
        ));
    }

    #[test]
    fn extract_walks_table_and_summary_pages() {
        let pdf = PdfText {
            pages: vec![
                page(1, &["REPORTE DE SEMANAS COTIZADAS EN PENSIONES"]),
                page(
                    2,
                    &[
                        HEADER_LINE,
                        "890326878 Fabrica De Calzado S A 01/02/1980 30/09/1985 $ 45.000 295,71 0,00 0,00 295,71",
                        "17134806 Empresa Nacional De Textiles 01/10/1985 31/12/1994 $ 120.500 482,86 2,00 0,00 480,86",
                    ],
                ),
                page(
                    3,
                    &["RESUMEN DE SEMANAS COTIZADAS", "[26] TOTAL SEMANAS", "778,57"],
                ),
                page(4, &["UNRELATED TRAILING PAGE"]),
            ],
        };
        let (rows, totals) = extract(&pdf);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cont_id.as_deref(), Some("890326878"));
        assert_eq!(rows[1].net_weeks, Some(480.86));
        assert_eq!(totals.weeks_total_report, Some(778.57));
    }

    #[test]
    fn valid_rows_emit_no_date_warnings() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let record = parse_row(
                "890326878 Fabrica De Calzado S A 01/02/1980 30/09/1985 $ 45.000 295,71 0,00 0,00 295,71",
            )
            .expect("row");
            assert_eq!(record.cont_from.as_deref(), Some("1980-02-01"));
        });
        let logs = String::from_utf8(capture.0.lock().expect("capture lock").clone()).expect("utf8");
        assert!(
            !logs.contains("could not parse date"),
            "anchor probing logged date warnings: {logs}"
        );
    }

    #[test]
    fn table_ends_at_first_headerless_page_after_rows() {
        let pdf = PdfText {
            pages: vec![
                page(
                    1,
                    &[
                        HEADER_LINE,
                        "890326878 Fabrica De Calzado 01/02/1980 30/09/1985 $ 45.000 295,71 0,00 0,00 295,71",
                    ],
                ),
                page(2, &["TOTAL SEMANAS COTIZADAS 778,57"]),
                page(
                    3,
                    &[
                        HEADER_LINE,
                        "17134806 Empresa Textil 01/10/1985 31/12/1994 482,86 2,00 0,00 480,86",
                    ],
                ),
            ],
        };
        let (rows, totals) = extract(&pdf);
        assert_eq!(rows.len(), 1);
        assert_eq!(totals.weeks_total_report, Some(778.57));
    }

    #[test]
    fn summary_before_table_is_still_collected() {
        let pdf = PdfText {
            pages: vec![
                page(1, &["[26] TOTAL SEMANAS", "1184,29"]),
                page(
                    2,
                    &[
                        HEADER_LINE,
                        "890326878 Fabrica De Calzado 01/02/1980 30/09/1985 $ 45.000 295,71 0,00 0,00 295,71",
                    ],
                ),
            ],
        };
        let (rows, totals) = extract(&pdf);
        assert_eq!(rows.len(), 1);
        assert_eq!(totals.weeks_total_report, Some(1184.29));
    }
}
