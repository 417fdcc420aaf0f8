//! Date helper functions

use chrono::{DateTime, FixedOffset, Locale};
use chrono_tz::Tz;

/// Parse a publication timestamp
///
/// The content API sends `2021-03-25T19:25:28+0000` (no colon in the
/// offset); RFC 3339 is accepted as well.
pub fn parse_publication_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}

/// Format a publication timestamp for display
///
/// Returns `None` for unpublished (missing) or unparseable dates.
///
/// # Examples
/// ```ignore
/// format_publication_date(Some("2021-03-25T19:25:28+0000"), "%d %b %Y", UTC, "pt_BR")
/// // -> Some("25 mar 2021")
/// ```
pub fn format_publication_date(
    value: Option<&str>,
    format: &str,
    tz: Tz,
    locale: &str,
) -> Option<String> {
    let raw = value?;
    let date = match parse_publication_date(raw) {
        Some(date) => date.with_timezone(&tz),
        None => {
            tracing::warn!("Unparseable publication date {:?}", raw);
            return None;
        }
    };
    let locale = Locale::try_from(locale).unwrap_or(Locale::POSIX);
    Some(date.format_localized(format, locale).to_string())
}

/// Machine readable form for `<time datetime=..>`
pub fn date_xml(value: Option<&str>) -> Option<String> {
    parse_publication_date(value?).map(|d| d.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_format() {
        let date = parse_publication_date("2021-03-25T19:25:28+0000").unwrap();
        assert_eq!(date.to_rfc3339(), "2021-03-25T19:25:28+00:00");
        assert!(parse_publication_date("2021-03-25T19:25:28Z").is_some());
        assert!(parse_publication_date("yesterday").is_none());
    }

    #[test]
    fn test_format_publication_date() {
        let shown = format_publication_date(
            Some("2021-03-25T19:25:28+0000"),
            "%d %b %Y",
            chrono_tz::UTC,
            "en_US",
        );
        assert_eq!(shown.as_deref(), Some("25 Mar 2021"));

        let shown = format_publication_date(
            Some("2021-03-25T19:25:28+0000"),
            "%d %b %Y",
            chrono_tz::UTC,
            "pt_BR",
        );
        assert_eq!(shown.as_deref(), Some("25 mar 2021"));
    }

    #[test]
    fn test_timezone_shifts_day() {
        let shown = format_publication_date(
            Some("2021-03-26T01:00:00+0000"),
            "%Y-%m-%d",
            chrono_tz::America::Sao_Paulo,
            "en_US",
        );
        assert_eq!(shown.as_deref(), Some("2021-03-25"));
    }

    #[test]
    fn test_missing_date() {
        assert!(format_publication_date(None, "%d %b %Y", chrono_tz::UTC, "en_US").is_none());
        assert!(date_xml(None).is_none());
    }
}
