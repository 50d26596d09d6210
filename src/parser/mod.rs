pub mod date;
pub mod detail;
pub mod document;
pub mod listing;
pub mod tags;
pub mod vocabulary;

use chrono::NaiveDate;
use serde::Serialize;

/// One job posting as extracted from a djinni.co detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub url: String,
    pub date_posted: NaiveDate,
    /// 0 when the posting does not state a requirement.
    pub experience_years: u32,
    pub english_level: String,
    /// Sorted, unique, canonical names.
    pub technologies: Vec<String>,
}
