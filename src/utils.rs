use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;

/// Upper-cases, folds Portuguese diacritics and collapses whitespace so that
/// "  Receita  Líquida" and "RECEITA LIQUIDA" compare equal.
pub fn normalize_description(text: &str) -> String {
    let folded: String = text
        .trim()
        .to_uppercase()
        .chars()
        .map(fold_diacritic)
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_diacritic(c: char) -> char {
    match c {
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ç' => 'C',
        other => other,
    }
}

/// A period string resolved to a calendar position, when it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodKey {
    Year(i32),
    /// First day of the month
    Month(NaiveDate),
    Day(NaiveDate),
    Unparsed(String),
}

impl PeriodKey {
    pub fn start_date(&self) -> Option<NaiveDate> {
        match self {
            PeriodKey::Year(year) => NaiveDate::from_ymd_opt(*year, 1, 1),
            PeriodKey::Month(date) | PeriodKey::Day(date) => Some(*date),
            PeriodKey::Unparsed(_) => None,
        }
    }
}

/// Parses "YYYY", "YYYY-MM", "YYYY-MM-DD" or "MM/YYYY".
pub fn parse_period(period: &str) -> PeriodKey {
    let trimmed = period.trim();

    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(year) = trimmed.parse::<i32>() {
            return PeriodKey::Year(year);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return PeriodKey::Day(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d") {
        return PeriodKey::Month(date);
    }

    if let Some((month, year)) = trimmed.split_once('/') {
        if let (Ok(month), Ok(year)) = (month.trim().parse::<u32>(), year.trim().parse::<i32>()) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                return PeriodKey::Month(date);
            }
        }
    }

    PeriodKey::Unparsed(trimmed.to_string())
}

/// Chronological ordering for period labels. Parsed periods come first,
/// unparseable ones follow in lexicographic order.
pub fn compare_periods(a: &str, b: &str) -> Ordering {
    let key_a = parse_period(a).start_date();
    let key_b = parse_period(b).start_date();

    match (key_a, key_b) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// True when `outer` spans `inner`: a year covers its months and days, a
/// month covers its days. Every period covers itself.
pub fn period_covers(outer: &str, inner: &str) -> bool {
    if outer.trim() == inner.trim() {
        return true;
    }

    match (parse_period(outer), parse_period(inner)) {
        (PeriodKey::Year(year), PeriodKey::Month(date) | PeriodKey::Day(date)) => {
            date.year() == year
        }
        (PeriodKey::Month(month), PeriodKey::Day(day)) => {
            month.year() == day.year() && month.month() == day.month()
        }
        (a, b) => a == b,
    }
}

/// Label of the period following `last`, in the same notation.
pub fn next_period_label(last: &str) -> String {
    let trimmed = last.trim();
    match parse_period(trimmed) {
        PeriodKey::Year(year) => (year + 1).to_string(),
        PeriodKey::Month(date) => {
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            if trimmed.contains('/') {
                format!("{:02}/{:04}", month, year)
            } else {
                format!("{:04}-{:02}", year, month)
            }
        }
        PeriodKey::Day(_) | PeriodKey::Unparsed(_) => "next period".to_string(),
    }
}

/// Parses an amount cell. Accepts plain decimals, pt-BR notation with a
/// comma decimal separator, an optional "R$" prefix and accounting-style
/// parenthesized negatives. Blank cells are `None`.
pub fn parse_amount(raw: &str) -> std::result::Result<Option<f64>, String> {
    let mut text = raw.trim().replace("R$", "");
    text.retain(|c| !c.is_whitespace());

    if text.is_empty() {
        return Ok(None);
    }

    let mut negative = false;
    if text.starts_with('(') && text.ends_with(')') {
        negative = true;
        text = text[1..text.len() - 1].to_string();
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest.to_string();
    }
    if text.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }

    let last_dot = text.rfind('.');
    let last_comma = text.rfind(',');
    let canonical = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (None, Some(_)) => text.replace(',', "."),
        (Some(_), None) if text.matches('.').count() > 1 => text.replace('.', ""),
        _ => text.clone(),
    };

    let value = canonical
        .parse::<f64>()
        .map_err(|_| format!("Invalid amount '{}'", raw.trim()))?;
    if !value.is_finite() {
        return Err(format!("Non-finite amount '{}'", raw.trim()));
    }

    Ok(Some(if negative { -value } else { value }))
}

/// Renders a monetary amount in Brazilian notation, e.g. "R$ 1.234,56".
pub fn format_brl(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (idx, digit) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}R$ {},{}", sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description("  Receita  Líquida "), "RECEITA LIQUIDA");
        assert_eq!(normalize_description("Prejuízo do Exercício"), "PREJUIZO DO EXERCICIO");
        assert_eq!(normalize_description("(- ) Impostos"), "(- ) IMPOSTOS");
    }

    #[test]
    fn test_parse_period_variants() {
        assert_eq!(parse_period("2024"), PeriodKey::Year(2024));
        assert_eq!(
            parse_period("2024-03"),
            PeriodKey::Month(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(
            parse_period("03/2024"),
            PeriodKey::Month(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(
            parse_period("2024-03-31"),
            PeriodKey::Day(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())
        );
        assert_eq!(parse_period("1T24"), PeriodKey::Unparsed("1T24".to_string()));
    }

    #[test]
    fn test_compare_periods_is_chronological() {
        let mut periods = vec!["12/2023", "2024-02", "2023", "Q1", "2024-01"];
        periods.sort_by(|a, b| compare_periods(a, b));
        assert_eq!(periods, vec!["2023", "12/2023", "2024-01", "2024-02", "Q1"]);
    }

    #[test]
    fn test_period_covers() {
        assert!(period_covers("2024", "2024"));
        assert!(period_covers("2024", "2024-12-31"));
        assert!(period_covers("2024", "03/2024"));
        assert!(period_covers("2024-12", "2024-12-31"));
        assert!(period_covers("2024-03", "03/2024"));
        assert!(!period_covers("2024-12-31", "2024"));
        assert!(!period_covers("2023", "2024-01-01"));
        assert!(!period_covers("Q1", "Q2"));
    }

    #[test]
    fn test_next_period_label() {
        assert_eq!(next_period_label("2024"), "2025");
        assert_eq!(next_period_label("2024-12"), "2025-01");
        assert_eq!(next_period_label("11/2024"), "12/2024");
        assert_eq!(next_period_label("Q4"), "next period");
    }

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("1234.56").unwrap(), Some(1234.56));
        assert_eq!(parse_amount("-10").unwrap(), Some(-10.0));
        assert_eq!(parse_amount("1.234,56").unwrap(), Some(1234.56));
        assert_eq!(parse_amount("R$ 1.234.567,89").unwrap(), Some(1_234_567.89));
        assert_eq!(parse_amount("(1.234,56)").unwrap(), Some(-1234.56));
        assert_eq!(parse_amount("1,234.56").unwrap(), Some(1234.56));
        assert_eq!(parse_amount("1.234.567").unwrap(), Some(1_234_567.0));
        assert_eq!(parse_amount("").unwrap(), None);
        assert_eq!(parse_amount("NaN").unwrap(), None);
        assert_eq!(parse_amount("-nan").unwrap(), None);
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("inf").is_err());
        assert!(parse_amount("-Infinity").is_err());
    }

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(1234.56), "R$ 1.234,56");
        assert_eq!(format_brl(-1_500_000.0), "-R$ 1.500.000,00");
        assert_eq!(format_brl(0.0), "R$ 0,00");
        assert_eq!(format_brl(999.999), "R$ 1.000,00");
    }
}
