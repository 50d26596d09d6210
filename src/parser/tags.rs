use std::collections::BTreeSet;

/// Lowercase variant → canonical tag name.
const SYNONYMS: &[(&str, &str)] = &[
    ("postgresql", "postgres"),
    ("fastapi", "fast api"),
    ("python3", "python"),
    ("react.js", "react"),
    ("aws services", "aws"),
    ("javascript", "js"),
];

fn canonical(tag: &str) -> &str {
    SYNONYMS
        .iter()
        .find(|(variant, _)| *variant == tag)
        .map(|(_, canon)| *canon)
        .unwrap_or(tag)
}

/// Trim, lowercase, collapse aliases; returns a sorted unique list.
pub fn normalize<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| canonical(&t).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ── Tests ──
