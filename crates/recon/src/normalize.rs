//! Text, number and date canonicalisation.
//!
//! Everything here is total: bad input degrades to an empty string, zero or
//! `None`, never to an error.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use stockrecon_io::cell::excel_serial_to_datetime;
use stockrecon_io::Cell;

/// How many date strings locale detection looks at.
const LOCALE_SAMPLE: usize = 200;

/// Numeric date columns whose median falls in this range are Excel serials
/// (roughly 1954 to 2064).
const SERIAL_RANGE: std::ops::RangeInclusive<f64> = 20_000.0..=60_000.0;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[/-](\d{1,2})[/-](\d{1,2})(?:[ T].*)?$").unwrap());
static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/.-](\d{1,2})[/.-](\d{2}|\d{4})(?:[ T].*)?$").unwrap());

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Displayed text, trimmed. Empty cells give the empty string.
pub fn normalize_cell_text(cell: &Cell) -> String {
    cell.display().trim().to_string()
}

/// Matching key for header labels: whitespace runs (incl. newlines, NBSP)
/// collapsed to one space, trimmed, lowercased.
pub fn normalize_label(label: &str) -> String {
    label
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Reference codes use a decimal comma: `12.5` becomes `12,5`.
///
/// Only a point with a digit on both sides is rewritten, so the function is
/// idempotent and leaves `A.B` or `12.` alone.
pub fn normalize_reference(cell: &Cell) -> String {
    normalize_reference_text(&normalize_cell_text(cell))
}

pub fn normalize_reference_text(text: &str) -> String {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let between_digits = c == '.'
            && i > 0
            && chars[i - 1].is_numeric()
            && chars.get(i + 1).map(|n| n.is_numeric()).unwrap_or(false);
        out.push(if between_digits { ',' } else { c });
    }
    out
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Quantity of a cell; anything unparsable counts as zero.
pub fn coerce_quantity(cell: &Cell) -> f64 {
    let value = match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => parse_quantity_text(s).unwrap_or(0.0),
        Cell::Empty | Cell::Bool(_) | Cell::DateTime(_) => 0.0,
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Strip regular and non-breaking spaces, read a decimal comma as a point.
pub fn parse_quantity_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\t'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round half away from zero at two decimals.
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid "-0" in output
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateLocale {
    Us,
    Eu,
    Iso,
    Unknown,
}

/// How a unit reads ambiguous `A/B/Y` dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// `A` is the month; swapped if that gives no valid date.
    #[default]
    MonthFirst,
    /// `A` is the day; swapped if that gives no valid date.
    DayFirst,
    /// Decide per column with [`detect_date_locale`].
    Detect,
}

/// Vote between US and EU readings over up to 200 samples.
///
/// A sample with `A > 12` can only be day-first (EU); `B > 12` only month-first (US).
/// ISO strings count separately and win only when they make up half the sample.
/// No decisive signal defaults to EU.
pub fn detect_date_locale<S: AsRef<str>>(samples: &[S]) -> DateLocale {
    let mut us = 0usize;
    let mut eu = 0usize;
    let mut iso = 0usize;
    let mut seen = 0usize;

    for sample in samples.iter().map(|s| s.as_ref().trim()).filter(|s| !s.is_empty()).take(LOCALE_SAMPLE) {
        seen += 1;
        if ISO_DATE.is_match(sample) {
            iso += 1;
            continue;
        }
        if let Some(caps) = SLASH_DATE.captures(sample) {
            let a: u32 = caps[1].parse().unwrap_or(0);
            let b: u32 = caps[2].parse().unwrap_or(0);
            if a > 12 && b <= 12 {
                eu += 1;
            } else if b > 12 && a <= 12 {
                us += 1;
            }
        }
    }

    if seen == 0 {
        DateLocale::Unknown
    } else if us > eu {
        DateLocale::Us
    } else if eu > us {
        DateLocale::Eu
    } else if iso * 2 >= seen {
        DateLocale::Iso
    } else {
        DateLocale::Eu
    }
}

/// Parse one date string. ISO shapes are unambiguous; `A/B/Y` follows `order`
/// and falls back to the swapped reading when the preferred one is invalid.
pub fn parse_date_text(text: &str, order: DateOrder) -> Option<NaiveDate> {
    let text = text.trim();
    if let Some(caps) = ISO_DATE.captures(text) {
        let y: i32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        let d: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    let caps = SLASH_DATE.captures(text)?;
    let a: u32 = caps[1].parse().ok()?;
    let b: u32 = caps[2].parse().ok()?;
    let mut y: i32 = caps[3].parse().ok()?;
    if caps[3].len() == 2 {
        y += 2000;
    }

    let (month, day) = match order {
        DateOrder::DayFirst => (b, a),
        DateOrder::MonthFirst | DateOrder::Detect => (a, b),
    };
    NaiveDate::from_ymd_opt(y, month, day).or_else(|| NaiveDate::from_ymd_opt(y, day, month))
}

/// Strict reading used after locale detection: no swapping.
fn parse_date_text_strict(text: &str, day_first: bool) -> Option<NaiveDate> {
    let text = text.trim();
    if ISO_DATE.is_match(text) {
        return parse_date_text(text, DateOrder::MonthFirst);
    }
    let caps = SLASH_DATE.captures(text)?;
    let a: u32 = caps[1].parse().ok()?;
    let b: u32 = caps[2].parse().ok()?;
    let mut y: i32 = caps[3].parse().ok()?;
    if caps[3].len() == 2 {
        y += 2000;
    }
    if day_first {
        NaiveDate::from_ymd_opt(y, b, a)
    } else {
        NaiveDate::from_ymd_opt(y, a, b)
    }
}

/// Parse a whole date column. Unparsable entries are `None`.
///
/// Date cells are taken as-is. Numbers are Excel serials when the column's
/// numeric median looks like one, otherwise they are not dates.
pub fn parse_date_column(cells: &[&Cell], order: DateOrder) -> Vec<Option<NaiveDate>> {
    let serials = numbers_look_like_serials(cells);

    let detected_day_first = if order == DateOrder::Detect {
        let samples: Vec<String> = cells
            .iter()
            .filter_map(|c| match c {
                Cell::Text(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        let locale = detect_date_locale(&samples);
        log::debug!("detected date locale {:?} from {} text values", locale, samples.len());
        Some(!matches!(locale, DateLocale::Us | DateLocale::Iso))
    } else {
        None
    };

    cells
        .iter()
        .map(|cell| match cell {
            Cell::DateTime(dt) => Some(dt.date()),
            Cell::Number(n) if serials => excel_serial_to_datetime(*n).map(|dt| dt.date()),
            Cell::Text(s) => match detected_day_first {
                Some(day_first) => parse_date_text_strict(s, day_first),
                None => parse_date_text(s, order),
            },
            _ => None,
        })
        .collect()
}

fn numbers_look_like_serials(cells: &[&Cell]) -> bool {
    let mut numbers: Vec<f64> = cells.iter().filter_map(|c| c.as_number()).collect();
    if numbers.is_empty() {
        return false;
    }
    numbers.sort_by(|a, b| a.total_cmp(b));
    let mid = numbers.len() / 2;
    let median = if numbers.len() % 2 == 0 {
        (numbers[mid - 1] + numbers[mid]) / 2.0
    } else {
        numbers[mid]
    };
    SERIAL_RANGE.contains(&median)
}

/// Which dated rows a unit keeps for target (year, month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateWindow {
    /// Everything up to and including the target month.
    #[default]
    Cumulative,
    /// Only the target month (opening balance + this month = closing balance).
    SingleMonth,
    /// No date filtering at all.
    Disabled,
}

impl DateWindow {
    pub fn keeps(&self, date: Option<NaiveDate>, year: i32, month: u32) -> bool {
        match self {
            Self::Disabled => true,
            Self::Cumulative => match date {
                Some(d) => d.year() < year || (d.year() == year && d.month() <= month),
                None => false,
            },
            Self::SingleMonth => match date {
                Some(d) => d.year() == year && d.month() == month,
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cell_text_is_trimmed() {
        assert_eq!(normalize_cell_text(&Cell::text("  A 1 ")), "A 1");
        assert_eq!(normalize_cell_text(&Cell::Empty), "");
        assert_eq!(normalize_cell_text(&Cell::Number(42.0)), "42");
    }

    #[test]
    fn labels_collapse_whitespace_and_case() {
        assert_eq!(normalize_label(" référence "), "référence");
        assert_eq!(normalize_label("Référence\nFournisseur"), "référence fournisseur");
        assert_eq!(normalize_label("STOCK\u{a0} PV"), "stock pv");
    }

    #[test]
    fn reference_decimal_point_becomes_comma() {
        assert_eq!(normalize_reference(&Cell::text(" 12.5 ")), "12,5");
        assert_eq!(normalize_reference(&Cell::Number(12.5)), "12,5");
        assert_eq!(normalize_reference(&Cell::Number(100.0)), "100");
        assert_eq!(normalize_reference(&Cell::text("1.2.3")), "1,2,3");
        assert_eq!(normalize_reference(&Cell::text("A.B")), "A.B");
        assert_eq!(normalize_reference(&Cell::text("12.")), "12.");
    }

    #[test]
    fn reference_normalisation_is_idempotent() {
        for raw in ["12.5", "1.2.3", "A-1.0x", " 7,5 ", "..1..2..", "٣.٤", ""] {
            let once = normalize_reference_text(raw);
            assert_eq!(normalize_reference_text(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn quantities_coerce_with_zero_fallback() {
        assert_eq!(coerce_quantity(&Cell::text("1 234,5")), 1234.5);
        assert_eq!(coerce_quantity(&Cell::text("1\u{a0}000")), 1000.0);
        assert_eq!(coerce_quantity(&Cell::text("12.5")), 12.5);
        assert_eq!(coerce_quantity(&Cell::text("abc")), 0.0);
        assert_eq!(coerce_quantity(&Cell::Empty), 0.0);
        assert_eq!(coerce_quantity(&Cell::Number(-3.0)), -3.0);
        assert_eq!(coerce_quantity(&Cell::text("inf")), 0.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round2(1.005 * 1000.0 / 1000.0), round2(1.005));
        assert_eq!(round2(2.345), 2.35);
        assert_eq!(round2(-0.001), 0.0);
        assert_eq!(round2(10.0 / 3.0), 3.33);
    }

    #[test]
    fn locale_day_over_twelve_means_eu() {
        assert_eq!(detect_date_locale(&["13/01/2025", "14/01/2025"]), DateLocale::Eu);
    }

    #[test]
    fn locale_month_position_over_twelve_means_us() {
        assert_eq!(detect_date_locale(&["01/13/2025"]), DateLocale::Us);
    }

    #[test]
    fn locale_ties_and_iso() {
        assert_eq!(detect_date_locale(&["01/02/2025"]), DateLocale::Eu);
        assert_eq!(detect_date_locale(&["13/01/2025", "01/13/2025"]), DateLocale::Eu);
        assert_eq!(detect_date_locale(&["2025-01-03", "2025-02-04"]), DateLocale::Iso);
        assert_eq!(detect_date_locale::<&str>(&[]), DateLocale::Unknown);
    }

    #[test]
    fn fixed_order_parsing_swaps_when_invalid() {
        assert_eq!(parse_date_text("03/04/2025", DateOrder::MonthFirst), Some(ymd(2025, 3, 4)));
        assert_eq!(parse_date_text("03/04/2025", DateOrder::DayFirst), Some(ymd(2025, 4, 3)));
        assert_eq!(parse_date_text("13/01/2025", DateOrder::MonthFirst), Some(ymd(2025, 1, 13)));
        assert_eq!(parse_date_text("2025-02-28 00:00:00", DateOrder::DayFirst), Some(ymd(2025, 2, 28)));
        assert_eq!(parse_date_text("05.06.25", DateOrder::DayFirst), Some(ymd(2025, 6, 5)));
        assert_eq!(parse_date_text("not a date", DateOrder::DayFirst), None);
        assert_eq!(parse_date_text("31/31/2025", DateOrder::DayFirst), None);
    }

    #[test]
    fn detected_column_parsing() {
        let cells = [Cell::text("02/01/2025"), Cell::text("13/01/2025"), Cell::text("junk")];
        let refs: Vec<&Cell> = cells.iter().collect();
        let parsed = parse_date_column(&refs, DateOrder::Detect);
        assert_eq!(parsed, vec![Some(ymd(2025, 1, 2)), Some(ymd(2025, 1, 13)), None]);

        let us = [Cell::text("01/02/2025"), Cell::text("01/13/2025")];
        let refs: Vec<&Cell> = us.iter().collect();
        let parsed = parse_date_column(&refs, DateOrder::Detect);
        assert_eq!(parsed, vec![Some(ymd(2025, 1, 2)), Some(ymd(2025, 1, 13))]);
    }

    #[test]
    fn numeric_serials_only_when_median_fits() {
        let cells = [Cell::Number(45672.0), Cell::Number(45700.0), Cell::Number(3.0)];
        let refs: Vec<&Cell> = cells.iter().collect();
        let parsed = parse_date_column(&refs, DateOrder::DayFirst);
        assert_eq!(parsed[0], Some(ymd(2025, 1, 15)));

        let small = [Cell::Number(3.0), Cell::Number(4.0)];
        let refs: Vec<&Cell> = small.iter().collect();
        assert_eq!(parse_date_column(&refs, DateOrder::DayFirst), vec![None, None]);
    }

    #[test]
    fn windows() {
        let w = DateWindow::Cumulative;
        assert!(w.keeps(Some(ymd(2024, 12, 31)), 2025, 3));
        assert!(w.keeps(Some(ymd(2025, 3, 31)), 2025, 3));
        assert!(!w.keeps(Some(ymd(2025, 4, 1)), 2025, 3));
        assert!(!w.keeps(None, 2025, 3));

        let s = DateWindow::SingleMonth;
        assert!(s.keeps(Some(ymd(2025, 3, 1)), 2025, 3));
        assert!(!s.keeps(Some(ymd(2025, 2, 28)), 2025, 3));
        assert!(!s.keeps(Some(ymd(2024, 3, 1)), 2025, 3));

        assert!(DateWindow::Disabled.keeps(None, 2025, 3));
    }
}
