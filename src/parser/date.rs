use chrono::NaiveDate;

use crate::error::DateFormatError;

const UK_MARKER: &str = "Вакансія опублікована";
const EN_MARKER: &str = "Job posted on";

/// Ukrainian month names in the genitive case, as they follow a day number.
const UK_MONTHS: &[(&str, &str)] = &[
    ("січня", "01"),
    ("лютого", "02"),
    ("березня", "03"),
    ("квітня", "04"),
    ("травня", "05"),
    ("червня", "06"),
    ("липня", "07"),
    ("серпня", "08"),
    ("вересня", "09"),
    ("жовтня", "10"),
    ("листопада", "11"),
    ("грудня", "12"),
];

/// Parse a "posted on" blurb in Ukrainian or English into a calendar date.
///
/// The Ukrainian marker is checked first.
pub fn parse_date_posted(raw: &str) -> Result<NaiveDate, DateFormatError> {
    if let Some(rest) = after_marker(raw, UK_MARKER) {
        return parse_ukrainian(rest);
    }
    if let Some(rest) = after_marker(raw, EN_MARKER) {
        return parse_english(rest);
    }
    Err(DateFormatError::MissingMarker(raw.trim().to_string()))
}

/// Text following `marker`, cut at the first line break.
fn after_marker<'a>(raw: &'a str, marker: &str) -> Option<&'a str> {
    let start = raw.find(marker)? + marker.len();
    let rest = &raw[start..];
    let end = [rest.find("<br"), rest.find('\n')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// First three whitespace-separated tokens: day, month, year.
fn date_tokens(rest: &str) -> Result<(&str, &str, &str), DateFormatError> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(d), Some(m), Some(y)) => Ok((d, m, y.trim_end_matches(['.', ',']))),
        _ => Err(DateFormatError::Invalid(rest.to_string())),
    }
}

fn parse_ukrainian(rest: &str) -> Result<NaiveDate, DateFormatError> {
    let (day, month, year) = date_tokens(rest)?;
    let month = month.to_lowercase();
    let number = UK_MONTHS
        .iter()
        .find(|(name, _)| *name == month)
        .map(|(_, n)| *n)
        .ok_or_else(|| DateFormatError::UnknownMonth(month.clone()))?;
    let text = format!("{} {} {}", day, number, year);
    NaiveDate::parse_from_str(&text, "%d %m %Y").map_err(|_| DateFormatError::Invalid(text))
}

fn parse_english(rest: &str) -> Result<NaiveDate, DateFormatError> {
    let (day, month, year) = date_tokens(rest)?;
    let text = format!("{} {} {}", day, month, year);
    NaiveDate::parse_from_str(&text, "%d %B %Y").map_err(|_| {
        if month.chars().all(|c| c.is_alphabetic()) && !is_english_month(month) {
            DateFormatError::UnknownMonth(month.to_string())
        } else {
            DateFormatError::Invalid(text.clone())
        }
    })
}

fn is_english_month(token: &str) -> bool {
    const MONTHS: &[&str] = &[
        "january", "february", "march", "april", "may", "june", "july", "august",
        "september", "october", "november", "december",
    ];
    MONTHS.contains(&token.to_lowercase().as_str())
}

// ── Tests ──
