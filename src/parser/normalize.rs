use chrono::{Datelike, NaiveDate};

/// Four-digit-year layouts seen in vendor exports, tried in order
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%Y%m%d",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Parses a vendor date, accepting the layouts in `DATE_FORMATS` and
/// two-digit years (`03/15/25`).
pub fn parse_vendor_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .find(|date| date.year() >= 1900)
        .or_else(|| NaiveDate::parse_from_str(raw, "%m/%d/%y").ok())
}

/// Turns `"HUFFMAN, ASHLEY"` into `"Ashley Huffman"`. Mixed-case names are
/// kept as written apart from whitespace.
pub fn normalize_person_name(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let reordered = match collapsed.split_once(',') {
        Some((last, first)) if !last.trim().is_empty() && !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => collapsed,
    };

    let has_upper = reordered.chars().any(char::is_uppercase);
    let has_lower = reordered.chars().any(char::is_lowercase);
    if has_upper != has_lower {
        title_case(&reordered)
    } else {
        reordered
    }
}

fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut capitalize = true;
    for c in name.chars() {
        if capitalize {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        capitalize = matches!(c, ' ' | '-' | '\'' | '.');
    }
    out
}

pub fn normalize_team_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Converts innings pitched in box-score notation to outs: the digit after
/// the dot counts thirds, so `"6.2"` is 20 outs.
pub fn innings_to_outs(raw: &str) -> Result<u32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }

    let (whole, thirds) = raw.split_once('.').unwrap_or((raw, ""));
    let whole: u32 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| format!("'{}' is not a valid innings pitched value", raw))?
    };
    let thirds = match thirds {
        "" | "0" => 0,
        "1" => 1,
        "2" => 2,
        _ => return Err(format!("'{}' has an invalid fraction of an inning", raw)),
    };

    whole
        .checked_mul(3)
        .and_then(|outs| outs.checked_add(thirds))
        .ok_or_else(|| format!("'{}' is out of range", raw))
}

/// Y/N style flag; anything unrecognized is false
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_uppercase().as_str(),
        "Y" | "YES" | "T" | "TRUE" | "1"
    )
}

/// Decision markers such as `win="1"` or `save="Smith"`; blank, zero or
/// explicit no values are unset
pub fn parse_marker(raw: &str) -> bool {
    let raw = raw.trim();
    !(raw.is_empty()
        || raw == "0"
        || raw.eq_ignore_ascii_case("N")
        || raw.eq_ignore_ascii_case("NO")
        || raw.eq_ignore_ascii_case("FALSE"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("3/15/2025")]
    #[case("03/15/2025")]
    #[case("03/15/25")]
    #[case("2025-03-15")]
    #[case("20250315")]
    #[case("March 15, 2025")]
    #[case("Mar 15, 2025")]
    #[case(" 3/15/2025 ")]
    fn accepts_vendor_date_layouts(#[case] raw: &str) {
        assert_eq!(
            parse_vendor_date(raw),
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
    }

    #[rstest]
    #[case("")]
    #[case("next tuesday")]
    #[case("13/45/2025")]
    fn rejects_unusable_dates(#[case] raw: &str) {
        assert_eq!(parse_vendor_date(raw), None);
    }

    #[rstest]
    #[case("HUFFMAN, ASHLEY", "Ashley Huffman")]
    #[case("huffman, ashley", "Ashley Huffman")]
    #[case("A. Huffman", "A. Huffman")]
    #[case("A.  HUFFMAN", "A. Huffman")]
    #[case("O'NEIL-SMITH", "O'Neil-Smith")]
    #[case("McDonald, Ray", "Ray McDonald")]
    #[case("  ", "")]
    fn normalizes_person_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_person_name(raw), expected);
    }

    #[rstest]
    #[case("", 0)]
    #[case("7", 21)]
    #[case("4.1", 13)]
    #[case("6.2", 20)]
    #[case("0.1", 1)]
    #[case(".2", 2)]
    #[case("5.0", 15)]
    fn converts_innings_to_outs(#[case] raw: &str, #[case] outs: u32) {
        assert_eq!(innings_to_outs(raw), Ok(outs));
    }

    #[rstest]
    #[case("4.3")]
    #[case("4.33")]
    #[case("four")]
    #[case("-1")]
    fn rejects_invalid_innings(#[case] raw: &str) {
        assert!(innings_to_outs(raw).is_err());
    }

    #[test]
    fn flags_and_markers() {
        assert!(parse_flag("Y"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("N"));
        assert!(!parse_flag(""));
        assert!(parse_marker("1"));
        assert!(parse_marker("Jones"));
        assert!(!parse_marker("0"));
        assert!(!parse_marker(" "));
        assert_eq!(normalize_team_code(" stats1 "), "STATS1");
    }
}
