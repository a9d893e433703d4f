//! Amount parsing that tolerates both regional decimal conventions.

/// Parses an amount such as `"1 000 000,50 руб."` or `"1,234.56"`.
///
/// Everything except digits, spaces, `,`, `.` and a leading minus is dropped.
/// With both separators present the dot is the decimal point and commas
/// group thousands. A lone comma is the decimal point; several commas group
/// thousands. Several dots without a comma group thousands as well.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let negative = trimmed.starts_with('-') || trimmed.starts_with('\u{2212}');

    let kept: String = trimmed
        .chars()
        .map(|c| if c == '\u{00a0}' || c == '\u{202f}' { ' ' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == ' ' || *c == ',' || *c == '.')
        .collect();
    let mut cleaned = kept.trim().trim_end_matches('.').trim().to_string();
    if cleaned.is_empty() {
        return None;
    }

    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();
    if commas > 0 && dots > 0 {
        cleaned = cleaned.replace(',', "");
    } else if commas == 1 {
        cleaned = cleaned.replace(',', ".");
    } else if commas > 1 {
        cleaned = cleaned.replace(',', "");
    } else if dots > 1 {
        cleaned = cleaned.replace('.', "");
    }
    cleaned.retain(|c| c != ' ');

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_numbers() {
        assert_eq!(parse_amount("1000000"), Some(1_000_000.0));
        assert_eq!(parse_amount("500000"), Some(500_000.0));
    }

    #[test]
    fn test_space_grouping_and_comma_decimal() {
        assert_eq!(parse_amount("1 000 000,50"), Some(1_000_000.5));
        assert_eq!(parse_amount("12\u{00a0}345,00 руб."), Some(12_345.0));
    }

    #[test]
    fn test_both_separators_dot_is_decimal() {
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("1,234,567.5"), Some(1_234_567.5));
    }

    #[test]
    fn test_multiple_commas_group_thousands() {
        assert_eq!(parse_amount("1,234,567"), Some(1_234_567.0));
    }

    #[test]
    fn test_trailing_dot_and_currency() {
        assert_eq!(parse_amount("1500 руб."), Some(1500.0));
        assert_eq!(parse_amount("₽ 2 500."), Some(2500.0));
    }

    #[test]
    fn test_negative_and_garbage() {
        assert_eq!(parse_amount("-300"), Some(-300.0));
        assert_eq!(parse_amount("сумма"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount(",."), None);
    }
}
