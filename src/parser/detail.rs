use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use url::Url;

use super::date::parse_date_posted;
use super::document::{collapse_whitespace, Document};
use super::tags::normalize;
use super::vocabulary::Vocabulary;
use super::JobPosting;
use crate::config::Selectors;
use crate::error::{DateFormatError, ExtractionError};

pub const ENGLISH_NOT_SPECIFIED: &str = "Not Specified";

static EXPERIENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\D)(\d{1,2})\+?\s*(?:years?|рік|роки|років)(?:[^\p{L}]|$)").unwrap()
});

const ENGLISH_MARKERS: &[&str] = &["Англійська", "English"];

/// Parse a fetched detail page and extract one posting.
pub fn extract_html(
    body: &str,
    url: Url,
    selectors: &Selectors,
    vocabulary: &Vocabulary,
) -> Result<JobPosting, ExtractionError> {
    let doc = Document::parse(body, url);
    extract(&doc, selectors, vocabulary)
}

pub fn extract(
    doc: &Document,
    selectors: &Selectors,
    vocabulary: &Vocabulary,
) -> Result<JobPosting, ExtractionError> {
    let title = required_text(doc, &selectors.title, "title")?;
    let company = required_text(doc, &selectors.company, "company")?;
    let date_posted = find_date(doc, selectors)?;

    let qualifications: Vec<String> = doc
        .texts(&selectors.qualifications)
        .iter()
        .map(|t| collapse_whitespace(t))
        .collect();

    let description = doc.all_text(&selectors.description);
    let technologies = normalize(vocabulary.find_in(&description));

    Ok(JobPosting {
        title,
        company,
        url: doc.url().to_string(),
        date_posted,
        experience_years: experience_years(&qualifications),
        english_level: english_level(&qualifications),
        technologies,
    })
}

fn required_text(
    doc: &Document,
    selector: &scraper::Selector,
    field: &'static str,
) -> Result<String, ExtractionError> {
    doc.own_text(selector)
        .map(|t| collapse_whitespace(&t))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ExtractionError::MissingField {
            field,
            url: doc.url().to_string(),
        })
}

/// First node carrying a date marker wins; nodes without one are skipped.
fn find_date(doc: &Document, selectors: &Selectors) -> Result<NaiveDate, ExtractionError> {
    let candidates = doc.text_lines(&selectors.date_posted);
    let mut failure: Option<DateFormatError> = None;

    for raw in &candidates {
        match parse_date_posted(raw) {
            Ok(date) => return Ok(date),
            Err(e @ DateFormatError::MissingMarker(_)) => {
                failure.get_or_insert(e);
            }
            Err(e) => {
                return Err(ExtractionError::Date {
                    url: doc.url().to_string(),
                    source: e,
                })
            }
        }
    }

    match failure {
        Some(source) => Err(ExtractionError::Date {
            url: doc.url().to_string(),
            source,
        }),
        None => Err(ExtractionError::MissingField {
            field: "date_posted",
            url: doc.url().to_string(),
        }),
    }
}

fn experience_years(items: &[String]) -> u32 {
    items
        .iter()
        .find_map(|item| EXPERIENCE_RE.captures(item))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// First marker item with a non-empty value after its colon.
fn english_level(items: &[String]) -> String {
    items
        .iter()
        .filter(|item| ENGLISH_MARKERS.iter().any(|m| item.contains(m)))
        .find_map(|item| {
            let (_, level) = item.split_once(':')?;
            let level = level.trim();
            (!level.is_empty()).then(|| level.to_string())
        })
        .unwrap_or_else(|| ENGLISH_NOT_SPECIFIED.to_string())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SelectorConfig, Settings};

    fn run(fixture: &str) -> Result<JobPosting, ExtractionError> {
        let body = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        let url = Url::parse("https://djinni.co/jobs/612345-senior-python-developer/").unwrap();
        let selectors = SelectorConfig::default().compile().unwrap();
        let vocabulary = Vocabulary::new(Settings::default().vocabulary);
        extract_html(&body, url, &selectors, &vocabulary)
    }

    #[test]
    fn ukrainian_detail_page() {
        let job = run("detail_uk").unwrap();
        assert_eq!(job.title, "Senior Python Developer");
        assert_eq!(job.company, "Acme Software");
        assert_eq!(job.url, "https://djinni.co/jobs/612345-senior-python-developer/");
        assert_eq!(job.date_posted.to_string(), "2024-03-15");
        assert_eq!(job.experience_years, 5);
        assert_eq!(job.english_level, "Upper-Intermediate");
        assert_eq!(
            job.technologies,
            vec!["aws", "celery", "django", "docker", "postgres", "python", "redis"]
        );
    }

    #[test]
    fn english_detail_page() {
        let job = run("detail_en").unwrap();
        assert_eq!(job.title, "Middle Python Engineer (Data Platform)");
        assert_eq!(job.company, "Northwind Labs");
        assert_eq!(job.date_posted.to_string(), "2024-03-15");
        assert_eq!(job.experience_years, 3);
        assert_eq!(job.english_level, "Intermediate");
        assert_eq!(
            job.technologies,
            vec!["airflow", "fast api", "js", "kafka", "python", "react", "sql"]
        );
    }

    #[test]
    fn defaults_when_qualifications_absent() {
        let job = run("detail_minimal").unwrap();
        assert_eq!(job.experience_years, 0);
        assert_eq!(job.english_level, ENGLISH_NOT_SPECIFIED);
        assert!(job.technologies.is_empty());
    }

    #[test]
    fn missing_title_names_field() {
        let err = run("detail_no_title").unwrap_err();
        assert_eq!(err.field(), "title");
        assert!(err.to_string().contains("612345"));
    }

    #[test]
    fn bad_date_is_extraction_error() {
        let err = run("detail_bad_date").unwrap_err();
        assert_eq!(err.field(), "date_posted");
        assert!(matches!(
            err,
            ExtractionError::Date { source: DateFormatError::UnknownMonth(_), .. }
        ));
    }

    #[test]
    fn experience_plural_forms() {
        let items = |s: &str| vec![s.to_string()];
        assert_eq!(experience_years(&items("1 рік досвіду")), 1);
        assert_eq!(experience_years(&items("Досвід: 2 роки")), 2);
        assert_eq!(experience_years(&items("5 років досвіду")), 5);
        assert_eq!(experience_years(&items("3+ years of experience")), 3);
        assert_eq!(experience_years(&items("1 year of experience")), 1);
        assert_eq!(experience_years(&items("Без досвіду")), 0);
        assert_eq!(experience_years(&items("Office in 2 yearsville")), 0);
        assert_eq!(experience_years(&items("Company with 100 years history")), 0);
        assert_eq!(experience_years(&items("Досвід від 4 років")), 4);
    }

    #[test]
    fn english_level_after_colon() {
        let items = vec!["Remote".to_string(), "Англійська: B2 ".to_string()];
        assert_eq!(english_level(&items), "B2");
        let items = vec!["English:".to_string()];
        assert_eq!(english_level(&items), ENGLISH_NOT_SPECIFIED);
    }

    #[test]
    fn english_level_skips_marker_items_without_value() {
        let items = vec!["English-speaking clients".to_string(), "Англійська: B2".to_string()];
        assert_eq!(english_level(&items), "B2");
    }

    #[test]
    fn date_with_non_breaking_spaces() {
        let body = r#"<html><body>
            <h1>Python Developer</h1>
            <a class="job-details--title" href="/jobs/?company=acme">Acme</a>
            <p class="text-muted">Вакансія опублікована 15&nbsp;березня&nbsp;2024<br>3 перегляди</p>
        </body></html>"#;
        let url = Url::parse("https://djinni.co/jobs/612345-python-developer/").unwrap();
        let selectors = SelectorConfig::default().compile().unwrap();
        let vocabulary = Vocabulary::new(["Python"]);
        let job = extract_html(body, url, &selectors, &vocabulary).unwrap();
        assert_eq!(job.date_posted.to_string(), "2024-03-15");
    }
}
