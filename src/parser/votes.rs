/// Convert a human-readable count ("1.2K", "3M", "42") into an integer.
///
/// Fractions are truncated, never rounded. Anything unreadable counts as 0.
pub fn parse_vote_count(text: &str) -> u64 {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let (number, multiplier) = match cleaned.chars().last() {
        Some('K') | Some('k') => (&cleaned[..cleaned.len() - 1], 1_000u64),
        Some('M') | Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000u64),
        _ => (cleaned.as_str(), 1u64),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole.saturating_mul(multiplier);
    }

    scale_decimal(number, multiplier).unwrap_or(0)
}

/// `"1.25"` times a power of ten, truncated, in integer arithmetic only
fn scale_decimal(number: &str, multiplier: u64) -> Option<u64> {
    let (whole, fraction) = number.split_once('.')?;
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut value = whole.saturating_mul(multiplier);
    let mut place = multiplier;
    for digit in fraction.bytes() {
        place /= 10;
        if place == 0 {
            break;
        }
        value = value.saturating_add(u64::from(digit - b'0') * place);
    }
    Some(value)
}

/// First whitespace-separated token as a count: `"1,234 Reviews"` ⇒ 1234
pub fn parse_leading_count(text: &str) -> Option<u64> {
    text.split_whitespace()
        .next()
        .and_then(|token| token.replace(',', "").parse().ok())
}

/// Last whitespace-separated token as a count: `"1-50 of 3,456"` ⇒ 3456
pub fn parse_trailing_count(text: &str) -> Option<u64> {
    text.split_whitespace()
        .last()
        .and_then(|token| token.replace(',', "").parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_suffixes() {
        assert_eq!(parse_vote_count("1.2K"), 1200);
        assert_eq!(parse_vote_count("3M"), 3_000_000);
        assert_eq!(parse_vote_count("42"), 42);
    }

    #[test]
    fn test_vote_truncates() {
        assert_eq!(parse_vote_count("1.2345K"), 1234);
        assert_eq!(parse_vote_count("2.5"), 2);
        assert_eq!(parse_vote_count("0.0019M"), 1900);
        assert_eq!(parse_vote_count("1.2999999K"), 1299);
        assert_eq!(parse_vote_count(".5K"), 500);
    }

    #[test]
    fn test_vote_unreadable_is_zero() {
        assert_eq!(parse_vote_count(""), 0);
        assert_eq!(parse_vote_count("K"), 0);
        assert_eq!(parse_vote_count("helpful"), 0);
        assert_eq!(parse_vote_count("-3"), 0);
        assert_eq!(parse_vote_count("1.2.3K"), 0);
        assert_eq!(parse_vote_count("."), 0);
    }

    #[test]
    fn test_vote_with_separators() {
        assert_eq!(parse_vote_count(" 1,204 "), 1204);
    }

    #[test]
    fn test_leading_count() {
        assert_eq!(parse_leading_count("1,234 Reviews"), Some(1234));
        assert_eq!(parse_leading_count("17"), Some(17));
        assert_eq!(parse_leading_count("Reviews"), None);
        assert_eq!(parse_leading_count(""), None);
    }

    #[test]
    fn test_trailing_count() {
        assert_eq!(parse_trailing_count("1-50 of 3,456"), Some(3456));
        assert_eq!(parse_trailing_count("of many"), None);
    }
}
