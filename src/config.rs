use std::path::PathBuf;
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

const SETTINGS_FILE: &str = "djinni";
const ENV_PREFIX: &str = "DJINNI";

/// Technology names recognized in job descriptions unless overridden.
const DEFAULT_VOCABULARY: &[&str] = &[
    "Python", "Python3", "Django", "DRF", "Flask", "FastAPI", "aiohttp", "asyncio",
    "Celery", "SQLAlchemy", "Alembic", "Pydantic", "Pandas", "NumPy", "Scrapy",
    "Selenium", "Pytest", "PostgreSQL", "Postgres", "MySQL", "SQLite", "MongoDB",
    "Redis", "Elasticsearch", "RabbitMQ", "Kafka", "Docker", "Kubernetes", "Terraform",
    "AWS", "AWS services", "GCP", "Azure", "Linux", "Git", "CI/CD", "REST", "GraphQL",
    "gRPC", "SQL", "NoSQL", "Airflow", "Spark", "ML", "LLM", "JavaScript", "TypeScript",
    "React", "React.js", "Vue", "Node.js", "Go", "Java", "C++", "Rust",
];

/// CSS selectors for djinni.co listing and detail pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub listing_item: String,
    pub listing_link: String,
    pub next_page: String,
    pub title: String,
    pub company: String,
    pub date_posted: String,
    pub qualifications: String,
    pub description: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_item: ".job-list-item".to_string(),
            listing_link: "a.job-list-item__link".to_string(),
            next_page: "li.page-item:last-child a.page-link".to_string(),
            title: "h1".to_string(),
            company: ".job-details--title".to_string(),
            date_posted: ".text-muted".to_string(),
            qualifications: ".job-additional-info--item-text".to_string(),
            description: ".job-post-description, .job-additional-info--item-text".to_string(),
        }
    }
}

/// Compiled form of [`SelectorConfig`], built once per run.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub listing_item: Selector,
    pub listing_link: Selector,
    pub next_page: Selector,
    pub title: Selector,
    pub company: Selector,
    pub date_posted: Selector,
    pub qualifications: Selector,
    pub description: Selector,
}

impl SelectorConfig {
    pub fn compile(&self) -> Result<Selectors, ConfigError> {
        Ok(Selectors {
            listing_item: compile("listing_item", &self.listing_item)?,
            listing_link: compile("listing_link", &self.listing_link)?,
            next_page: compile("next_page", &self.next_page)?,
            title: compile("title", &self.title)?,
            company: compile("company", &self.company)?,
            date_posted: compile("date_posted", &self.date_posted)?,
            qualifications: compile("qualifications", &self.qualifications)?,
            description: compile("description", &self.description)?,
        })
    }
}

fn compile(name: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        name,
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub base_listing_url: String,
    pub detail_concurrency: usize,
    pub max_listing_pages: Option<usize>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub vocabulary: Vec<String>,
    pub selectors: SelectorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/djinni.sqlite"),
            base_listing_url: "https://djinni.co/jobs/".to_string(),
            detail_concurrency: 10,
            max_listing_pages: None,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            base_backoff_ms: 2000,
            vocabulary: DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl Settings {
    /// Load `djinni.toml` (optional) and `DJINNI_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(
            config::File::with_name(SETTINGS_FILE).required(false),
            config::Environment::with_prefix(ENV_PREFIX),
        )
    }

    fn load_from<S>(file: S, env: config::Environment) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("vocabulary"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_listing_url)
            .map_err(|_| ConfigError::BaseUrl(self.base_listing_url.clone()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Tests ──
