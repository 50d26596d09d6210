use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::crawler::{JobSink, SaveOutcome};
use crate::error::PersistError;
use crate::parser::JobPosting;

pub fn connect(path: &Path) -> Result<Connection, PersistError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), PersistError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id               INTEGER PRIMARY KEY,
            url              TEXT NOT NULL,
            title            TEXT NOT NULL,
            company          TEXT NOT NULL,
            date_posted      TEXT NOT NULL,
            experience_years INTEGER NOT NULL DEFAULT 0,
            english_level    TEXT NOT NULL,
            scraped_at       TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(url, title, company)
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company);
        CREATE INDEX IF NOT EXISTS idx_jobs_date ON jobs(date_posted);

        CREATE TABLE IF NOT EXISTS technologies (
            id   INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS job_technologies (
            job_id        INTEGER NOT NULL REFERENCES jobs(id),
            technology_id INTEGER NOT NULL REFERENCES technologies(id),
            UNIQUE(job_id, technology_id)
        );
        CREATE INDEX IF NOT EXISTS idx_jt_technology ON job_technologies(technology_id);
        ",
    )?;
    Ok(())
}

// ── Sink ──

/// SQLite-backed sink. One transaction per posting.
pub struct JobStore {
    conn: Connection,
}

impl JobStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn save(&self, job: &JobPosting) -> Result<SaveOutcome, PersistError> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO jobs
             (url, title, company, date_posted, experience_years, english_level)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.url,
                job.title,
                job.company,
                job.date_posted.format("%Y-%m-%d").to_string(),
                job.experience_years,
                job.english_level,
            ],
        )?;
        if inserted == 0 {
            return Ok(SaveOutcome::Duplicate);
        }
        let job_id = tx.last_insert_rowid();

        {
            let mut tech_stmt = tx.prepare("INSERT OR IGNORE INTO technologies (name) VALUES (?1)")?;
            let mut id_stmt = tx.prepare("SELECT id FROM technologies WHERE name = ?1")?;
            let mut link_stmt = tx.prepare(
                "INSERT OR IGNORE INTO job_technologies (job_id, technology_id) VALUES (?1, ?2)",
            )?;
            for tech in &job.technologies {
                tech_stmt.execute(params![tech])?;
                let tech_id: i64 = id_stmt.query_row(params![tech], |r| r.get(0))?;
                link_stmt.execute(params![job_id, tech_id])?;
            }
        }

        tx.commit()?;
        Ok(SaveOutcome::Inserted)
    }
}

impl JobSink for JobStore {
    fn accept(&mut self, job: &JobPosting) -> Result<SaveOutcome, PersistError> {
        self.save(job)
    }
}

// ── Stats ──

pub struct Stats {
    pub jobs: usize,
    pub companies: usize,
    pub technologies: usize,
    pub links: usize,
    pub latest: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats, PersistError> {
    let jobs: usize = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
    let companies: usize =
        conn.query_row("SELECT COUNT(DISTINCT company) FROM jobs", [], |r| r.get(0))?;
    let technologies: usize =
        conn.query_row("SELECT COUNT(*) FROM technologies", [], |r| r.get(0))?;
    let links: usize = conn.query_row("SELECT COUNT(*) FROM job_technologies", [], |r| r.get(0))?;
    let latest: Option<String> = conn
        .query_row("SELECT MAX(date_posted) FROM jobs", [], |r| r.get(0))
        .optional()?
        .flatten();
    Ok(Stats {
        jobs,
        companies,
        technologies,
        links,
        latest,
    })
}

// ── Report ──

/// Experience bucket label, as the dashboard grouped postings.
const LEVEL_CASE: &str = "CASE
        WHEN j.experience_years IN (0, 1) THEN 'Junior'
        WHEN j.experience_years IN (2, 3) THEN 'Middle'
        WHEN j.experience_years >= 5 THEN 'Senior'
        ELSE 'Other'
    END";

pub struct TechCountRow {
    pub level: String,
    pub technology: String,
    pub count: usize,
}

/// Technology mentions per experience level, most frequent first.
pub fn technology_counts(conn: &Connection, per_level: usize) -> Result<Vec<TechCountRow>, PersistError> {
    let sql = format!(
        "SELECT level, name, cnt FROM (
             SELECT level, name, cnt,
                    ROW_NUMBER() OVER (PARTITION BY level ORDER BY cnt DESC, name) AS pos
             FROM (
                 SELECT {level} AS level, t.name AS name, COUNT(*) AS cnt
                 FROM jobs j
                 JOIN job_technologies jt ON jt.job_id = j.id
                 JOIN technologies t ON t.id = jt.technology_id
                 GROUP BY level, t.name
             )
         )
         WHERE pos <= ?1
         ORDER BY CASE level WHEN 'Junior' THEN 0 WHEN 'Middle' THEN 1 WHEN 'Senior' THEN 2 ELSE 3 END,
                  cnt DESC, name",
        level = LEVEL_CASE
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![per_level as i64], |row| {
            Ok(TechCountRow {
                level: row.get(0)?,
                technology: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Postings per stated experience requirement.
pub fn experience_distribution(conn: &Connection) -> Result<Vec<(u32, usize)>, PersistError> {
    let mut stmt = conn.prepare(
        "SELECT experience_years, COUNT(*) FROM jobs
         GROUP BY experience_years ORDER BY experience_years",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Postings per English level, most common first.
pub fn english_distribution(conn: &Connection) -> Result<Vec<(String, usize)>, PersistError> {
    let mut stmt = conn.prepare(
        "SELECT english_level, COUNT(*) AS cnt FROM jobs
         GROUP BY english_level ORDER BY cnt DESC, english_level",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct CompanyRow {
    pub company: String,
    pub vacancies: usize,
    pub first_posted: String,
    pub last_posted: String,
}

/// Companies with at least `min_vacancies` postings.
pub fn active_companies(
    conn: &Connection,
    min_vacancies: usize,
    limit: usize,
) -> Result<Vec<CompanyRow>, PersistError> {
    let mut stmt = conn.prepare(
        "SELECT company, COUNT(*) AS cnt, MIN(date_posted), MAX(date_posted)
         FROM jobs
         GROUP BY company
         HAVING cnt >= ?1
         ORDER BY cnt DESC, company
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![min_vacancies as i64, limit as i64], |row| {
            Ok(CompanyRow {
                company: row.get(0)?,
                vacancies: row.get(1)?,
                first_posted: row.get(2)?,
                last_posted: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Tests ──
