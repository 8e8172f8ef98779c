use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Percentage of `part` in `total`, 0 when there is nothing to divide.
pub fn ratio_percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Statistics collected while streaming the dump into the intermediate files
#[derive(Default)]
pub struct ExtractionStats {
    pub pages_seen: AtomicU64,
    pub pages_discarded: AtomicU64,
    pub pages_malformed: AtomicU64,
    pub articles_written: AtomicU64,
    pub redirects_written: AtomicU64,
    pub redirects_missing_target: AtomicU64,
    pub redirects_missing_text: AtomicU64,
    pub links_written: AtomicU64,
}

impl ExtractionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pages_seen(&self, count: u64) {
        self.pages_seen.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_pages_discarded(&self, count: u64) {
        self.pages_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_pages_malformed(&self, count: u64) {
        self.pages_malformed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_articles(&self) {
        self.articles_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects(&self) {
        self.redirects_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects_missing_target(&self) {
        self.redirects_missing_target.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects_missing_text(&self) {
        self.redirects_missing_text.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_links(&self, count: u64) {
        self.links_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn pages_seen(&self) -> u64 {
        self.pages_seen.load(Ordering::Relaxed)
    }

    pub fn pages_discarded(&self) -> u64 {
        self.pages_discarded.load(Ordering::Relaxed)
    }

    pub fn pages_malformed(&self) -> u64 {
        self.pages_malformed.load(Ordering::Relaxed)
    }

    pub fn articles(&self) -> u64 {
        self.articles_written.load(Ordering::Relaxed)
    }

    pub fn redirects(&self) -> u64 {
        self.redirects_written.load(Ordering::Relaxed)
    }

    pub fn redirects_missing_target(&self) -> u64 {
        self.redirects_missing_target.load(Ordering::Relaxed)
    }

    pub fn redirects_missing_text(&self) -> u64 {
        self.redirects_missing_text.load(Ordering::Relaxed)
    }

    pub fn links(&self) -> u64 {
        self.links_written.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ExtractionSummary {
        ExtractionSummary {
            pages_seen: self.pages_seen(),
            pages_discarded: self.pages_discarded(),
            pages_malformed: self.pages_malformed(),
            articles: self.articles(),
            redirects: self.redirects(),
            redirects_missing_target: self.redirects_missing_target(),
            redirects_missing_text: self.redirects_missing_text(),
            links: self.links(),
        }
    }
}

/// Statistics for the index, redirect and link resolution passes
#[derive(Default)]
pub struct ResolutionStats {
    pub pages_indexed: AtomicU64,
    pub page_lines_malformed: AtomicU64,
    pub duplicate_titles: AtomicU64,
    pub case_collisions: AtomicU64,
    pub redirects_resolved: AtomicU64,
    pub redirects_skipped: AtomicU64,
    pub redirect_lines_malformed: AtomicU64,
    pub links_direct: AtomicU64,
    pub links_via_redirect: AtomicU64,
    pub links_unresolved: AtomicU64,
    pub link_lines_malformed: AtomicU64,
}

impl ResolutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pages_indexed(&self, count: u64) {
        self.pages_indexed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_page_lines_malformed(&self, count: u64) {
        self.page_lines_malformed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_duplicate_titles(&self, count: u64) {
        self.duplicate_titles.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_case_collisions(&self, count: u64) {
        self.case_collisions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_redirects_resolved(&self) {
        self.redirects_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirects_skipped(&self) {
        self.redirects_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirect_lines_malformed(&self) {
        self.redirect_lines_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_links_direct(&self) {
        self.links_direct.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_links_via_redirect(&self) {
        self.links_via_redirect.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_links_unresolved(&self) {
        self.links_unresolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_link_lines_malformed(&self) {
        self.link_lines_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages_indexed(&self) -> u64 {
        self.pages_indexed.load(Ordering::Relaxed)
    }

    pub fn page_lines_malformed(&self) -> u64 {
        self.page_lines_malformed.load(Ordering::Relaxed)
    }

    pub fn duplicate_titles(&self) -> u64 {
        self.duplicate_titles.load(Ordering::Relaxed)
    }

    pub fn case_collisions(&self) -> u64 {
        self.case_collisions.load(Ordering::Relaxed)
    }

    pub fn redirects_resolved(&self) -> u64 {
        self.redirects_resolved.load(Ordering::Relaxed)
    }

    pub fn redirects_skipped(&self) -> u64 {
        self.redirects_skipped.load(Ordering::Relaxed)
    }

    pub fn redirect_lines_malformed(&self) -> u64 {
        self.redirect_lines_malformed.load(Ordering::Relaxed)
    }

    pub fn links_direct(&self) -> u64 {
        self.links_direct.load(Ordering::Relaxed)
    }

    pub fn links_via_redirect(&self) -> u64 {
        self.links_via_redirect.load(Ordering::Relaxed)
    }

    pub fn links_resolved(&self) -> u64 {
        self.links_direct() + self.links_via_redirect()
    }

    pub fn links_unresolved(&self) -> u64 {
        self.links_unresolved.load(Ordering::Relaxed)
    }

    pub fn link_lines_malformed(&self) -> u64 {
        self.link_lines_malformed.load(Ordering::Relaxed)
    }

    /// Share of parsed redirects that could not be resolved, in percent.
    pub fn redirect_skip_ratio(&self) -> f64 {
        let skipped = self.redirects_skipped();
        ratio_percent(skipped, self.redirects_resolved() + skipped)
    }

    /// Share of parsed links that could not be resolved, in percent.
    pub fn link_unresolved_ratio(&self) -> f64 {
        let unresolved = self.links_unresolved();
        ratio_percent(unresolved, self.links_resolved() + unresolved)
    }

    pub fn snapshot(&self) -> ResolutionSummary {
        ResolutionSummary {
            pages_indexed: self.pages_indexed(),
            page_lines_malformed: self.page_lines_malformed(),
            duplicate_titles: self.duplicate_titles(),
            case_collisions: self.case_collisions(),
            redirects_resolved: self.redirects_resolved(),
            redirects_skipped: self.redirects_skipped(),
            redirect_skip_percent: self.redirect_skip_ratio(),
            redirect_lines_malformed: self.redirect_lines_malformed(),
            links_direct: self.links_direct(),
            links_via_redirect: self.links_via_redirect(),
            links_unresolved: self.links_unresolved(),
            link_unresolved_percent: self.link_unresolved_ratio(),
            link_lines_malformed: self.link_lines_malformed(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ExtractionSummary {
    pub pages_seen: u64,
    pub pages_discarded: u64,
    pub pages_malformed: u64,
    pub articles: u64,
    pub redirects: u64,
    pub redirects_missing_target: u64,
    pub redirects_missing_text: u64,
    pub links: u64,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ResolutionSummary {
    pub pages_indexed: u64,
    pub page_lines_malformed: u64,
    pub duplicate_titles: u64,
    pub case_collisions: u64,
    pub redirects_resolved: u64,
    pub redirects_skipped: u64,
    pub redirect_skip_percent: f64,
    pub redirect_lines_malformed: u64,
    pub links_direct: u64,
    pub links_via_redirect: u64,
    pub links_unresolved: u64,
    pub link_unresolved_percent: f64,
    pub link_lines_malformed: u64,
}

/// Everything written to `summary.json`; a pass that didn't run is `None`.
#[derive(Serialize, Debug, Clone, Default)]
pub struct RunSummary {
    pub extraction: Option<ExtractionSummary>,
    pub resolution: Option<ResolutionSummary>,
}
