use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Selectors, Settings};
use crate::error::PersistError;
use crate::fetch::PageFetcher;
use crate::parser::vocabulary::Vocabulary;
use crate::parser::{detail, listing, JobPosting};

const CHANNEL_CAPACITY: usize = 64;

// ── Frontier ──

/// Pending listing pages for one keyword. A URL is queued at most once.
pub struct Frontier {
    queue: VecDeque<Url>,
    seen: HashSet<String>,
}

impl Frontier {
    pub fn new(seed: Url) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
        };
        frontier.push(seed);
        frontier
    }

    /// Queue `url` unless it was queued or visited before.
    pub fn push(&mut self, url: Url) -> bool {
        if !self.seen.insert(key(&url)) {
            return false;
        }
        self.queue.push_back(url);
        true
    }

    /// Record a URL reached by redirect so it is never queued later.
    pub fn mark_visited(&mut self, url: &Url) {
        self.seen.insert(key(url));
    }

    pub fn pop(&mut self) -> Option<Url> {
        self.queue.pop_front()
    }
}

fn key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

// ── Summary ──

/// Counts reported once a crawl finishes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub listing_pages: usize,
    pub listing_pages_skipped: usize,
    pub detail_pages_skipped: usize,
    pub extraction_failures: usize,
    pub records: usize,
}

impl CrawlSummary {
    pub fn merge(&mut self, other: &CrawlSummary) {
        self.listing_pages += other.listing_pages;
        self.listing_pages_skipped += other.listing_pages_skipped;
        self.detail_pages_skipped += other.detail_pages_skipped;
        self.extraction_failures += other.extraction_failures;
        self.records += other.records;
    }

    pub fn pages_skipped(&self) -> usize {
        self.listing_pages_skipped + self.detail_pages_skipped + self.extraction_failures
    }

    fn record(&mut self, outcome: Result<DetailOutcome, JoinError>) {
        match outcome {
            Ok(DetailOutcome::Produced) => self.records += 1,
            Ok(DetailOutcome::FetchFailed) => self.detail_pages_skipped += 1,
            Ok(DetailOutcome::ExtractionFailed) => self.extraction_failures += 1,
            Ok(DetailOutcome::Cancelled) => {}
            Err(e) => {
                warn!("Detail task panicked: {}", e);
                self.detail_pages_skipped += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailOutcome {
    Produced,
    FetchFailed,
    ExtractionFailed,
    Cancelled,
}

// ── Crawler ──

pub struct CrawlOptions {
    pub detail_concurrency: usize,
    pub max_listing_pages: Option<usize>,
}

impl From<&Settings> for CrawlOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            detail_concurrency: settings.detail_concurrency.max(1),
            max_listing_pages: settings.max_listing_pages,
        }
    }
}

/// Walks listing pages per keyword and emits a record per detail page.
pub struct Crawler<F> {
    fetcher: F,
    selectors: Selectors,
    vocabulary: Vocabulary,
    base_url: Url,
    detail_permits: Semaphore,
    max_listing_pages: Option<usize>,
    cancel: CancellationToken,
}

impl<F: PageFetcher + 'static> Crawler<F> {
    pub fn new(
        fetcher: F,
        selectors: Selectors,
        vocabulary: Vocabulary,
        base_url: Url,
        options: CrawlOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            selectors,
            vocabulary,
            base_url,
            detail_permits: Semaphore::new(options.detail_concurrency.max(1)),
            max_listing_pages: options.max_listing_pages,
            cancel,
        }
    }

    /// `{base}?primary_keyword={keyword}`
    pub fn seed_url(&self, keyword: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("primary_keyword", keyword);
        url
    }

    /// Crawl every keyword concurrently.
    ///
    /// Records arrive on the returned channel as soon as each detail page is
    /// extracted; the channel closes when all traversals finish. The handle
    /// resolves to the combined summary.
    pub fn run(
        self: Arc<Self>,
        keywords: Vec<String>,
    ) -> (mpsc::Receiver<JobPosting>, JoinHandle<CrawlSummary>) {
        let (tx, rx) = mpsc::channel::<JobPosting>(CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            let mut traversals = JoinSet::new();
            for keyword in keywords {
                let crawler = Arc::clone(&self);
                let tx = tx.clone();
                traversals.spawn(async move { crawler.crawl_keyword(keyword, tx).await });
            }
            // Channel closes once every traversal drops its sender.
            drop(tx);

            let mut summary = CrawlSummary::default();
            while let Some(result) = traversals.join_next().await {
                match result {
                    Ok(s) => summary.merge(&s),
                    Err(e) => warn!("Keyword traversal panicked: {}", e),
                }
            }
            summary
        });

        (rx, handle)
    }

    async fn crawl_keyword(
        self: Arc<Self>,
        keyword: String,
        tx: mpsc::Sender<JobPosting>,
    ) -> CrawlSummary {
        let mut summary = CrawlSummary::default();
        let mut frontier = Frontier::new(self.seed_url(&keyword));
        let mut seen_details: HashSet<Url> = HashSet::new();
        let mut details: JoinSet<DetailOutcome> = JoinSet::new();

        info!(keyword = %keyword, "Starting traversal");

        while let Some(url) = frontier.pop() {
            if self
                .max_listing_pages
                .is_some_and(|max| summary.listing_pages >= max)
            {
                info!(keyword = %keyword, "Listing page limit reached");
                break;
            }

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.fetcher.fetch(&url) => result,
            };
            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    warn!(keyword = %keyword, "Skipping listing page: {}", e);
                    summary.listing_pages_skipped += 1;
                    continue;
                }
            };
            summary.listing_pages += 1;
            frontier.mark_visited(&page.url);

            let listing = listing::parse(&page.body, page.url, &self.selectors);
            if listing.detail_urls.is_empty() {
                warn!(keyword = %keyword, url = %url, "No listing items on page");
            }
            debug!(
                keyword = %keyword,
                url = %url,
                items = listing.detail_urls.len(),
                has_next = listing.next_page.is_some(),
                "Parsed listing page"
            );

            for detail_url in listing.detail_urls {
                if seen_details.insert(detail_url.clone()) {
                    let crawler = Arc::clone(&self);
                    details.spawn(crawler.crawl_detail(detail_url, tx.clone()));
                }
            }

            if let Some(next) = listing.next_page {
                if !frontier.push(next.clone()) {
                    debug!(keyword = %keyword, next = %next, "Next page already visited");
                }
            }

            while let Some(done) = details.try_join_next() {
                summary.record(done);
            }
        }

        while let Some(done) = details.join_next().await {
            summary.record(done);
        }

        info!(
            keyword = %keyword,
            pages = summary.listing_pages,
            records = summary.records,
            skipped = summary.pages_skipped(),
            "Traversal finished"
        );
        summary
    }

    async fn crawl_detail(self: Arc<Self>, url: Url, tx: mpsc::Sender<JobPosting>) -> DetailOutcome {
        let work = async {
            let Ok(_permit) = self.detail_permits.acquire().await else {
                return DetailOutcome::Cancelled;
            };

            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Skipping detail page: {}", e);
                    return DetailOutcome::FetchFailed;
                }
            };

            match detail::extract_html(&page.body, page.url, &self.selectors, &self.vocabulary) {
                Ok(job) => {
                    if tx.send(job).await.is_err() {
                        return DetailOutcome::Cancelled;
                    }
                    DetailOutcome::Produced
                }
                Err(e) => {
                    warn!(url = %url, field = e.field(), "Skipping posting: {}", e);
                    DetailOutcome::ExtractionFailed
                }
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => DetailOutcome::Cancelled,
            outcome = work => outcome,
        }
    }
}

// ── Sinks ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Duplicate,
}

/// Destination for extracted postings.
pub trait JobSink {
    fn accept(&mut self, job: &JobPosting) -> Result<SaveOutcome, PersistError>;
}

/// Writes each posting as one JSON line; used for dry runs.
pub struct JsonLines<W: Write> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> JobSink for JsonLines<W> {
    fn accept(&mut self, job: &JobPosting) -> Result<SaveOutcome, PersistError> {
        serde_json::to_writer(&mut self.out, job).map_err(std::io::Error::from)?;
        self.out.write_all(b"\n")?;
        Ok(SaveOutcome::Inserted)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SinkStats {
    pub saved: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Feed every received posting to `sink`. Sink errors are logged, not fatal.
pub async fn drain<S: JobSink>(
    rx: &mut mpsc::Receiver<JobPosting>,
    sink: &mut S,
    pb: &ProgressBar,
) -> SinkStats {
    let mut stats = SinkStats::default();

    while let Some(job) = rx.recv().await {
        match sink.accept(&job) {
            Ok(SaveOutcome::Inserted) => stats.saved += 1,
            Ok(SaveOutcome::Duplicate) => stats.duplicates += 1,
            Err(e) => {
                warn!(url = %job.url, "Failed to save posting: {}", e);
                stats.failed += 1;
            }
        }
        pb.set_message(format!(
            "{} saved, {} duplicates, {} failed",
            stats.saved, stats.duplicates, stats.failed
        ));
        pb.tick();
    }

    stats
}

// ── Tests ──
