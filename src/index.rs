use crate::config::EXPECTED_PAGES;
use crate::models::parse_page_line;
use crate::stats::ResolutionStats;
use crate::stream::{for_each_line, open_stream};
use anyhow::{bail, Result};
use rustc_hash::FxHashMap;
use std::fs;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info, warn};

/// How the index treats a title or id that appears twice in the pages stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Last write wins; duplicates are counted.
    #[default]
    Lenient,
    /// A repeated title or id aborts the build.
    Strict,
}

/// Read-only lookup structure over all article pages.
///
/// The canonical title set is the key set of `title_to_id`.
pub struct PageIndex {
    title_to_id: FxHashMap<String, u32>,
    id_to_title: FxHashMap<u32, String>,
    upper_to_title: FxHashMap<String, String>,
}

impl PageIndex {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            title_to_id: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            id_to_title: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            upper_to_title: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Builds the index from the pages stream (`<id><|><title>` per line).
    pub fn build(path: &Path, policy: DuplicatePolicy, stats: &ResolutionStats) -> Result<Self> {
        info!(path = ?path, ?policy, "Building page index");

        // Pages lines are longer than 16 bytes on average, so this only over-reserves.
        let file_len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let capacity = ((file_len / 16) as usize).min(EXPECTED_PAGES);
        let index = Self::read(open_stream(path)?, capacity, policy, stats)?;

        info!(
            pages = index.len(),
            malformed = stats.page_lines_malformed(),
            duplicates = stats.duplicate_titles(),
            case_collisions = stats.case_collisions(),
            "Page index built"
        );
        Ok(index)
    }

    pub fn from_reader<R: BufRead>(
        reader: R,
        policy: DuplicatePolicy,
        stats: &ResolutionStats,
    ) -> Result<Self> {
        Self::read(reader, 0, policy, stats)
    }

    fn read<R: BufRead>(
        reader: R,
        capacity: usize,
        policy: DuplicatePolicy,
        stats: &ResolutionStats,
    ) -> Result<Self> {
        let mut index = Self::with_capacity(capacity);

        for_each_line(reader, "pages", |line| {
            let Some((id, title)) = parse_page_line(line) else {
                warn!(line, "Malformed pages line, skipping");
                stats.add_page_lines_malformed(1);
                return Ok(());
            };
            index.insert(id, title, policy, stats)
        })?;

        stats.add_pages_indexed(index.len() as u64);
        Ok(index)
    }

    fn insert(
        &mut self,
        id: u32,
        title: &str,
        policy: DuplicatePolicy,
        stats: &ResolutionStats,
    ) -> Result<()> {
        let duplicate_title = self.title_to_id.get(title).copied();
        let duplicate_id = self.id_to_title.get(&id).cloned();

        if duplicate_title.is_some() || duplicate_id.is_some() {
            if policy == DuplicatePolicy::Strict {
                bail!(
                    "Duplicate page in index: id {} title {:?} (existing id {:?}, existing title {:?})",
                    id,
                    title,
                    duplicate_title,
                    duplicate_id
                );
            }
            debug!(id, title, ?duplicate_title, ?duplicate_id, "Duplicate page, last write wins");
            stats.add_duplicate_titles(1);
        }

        // Drop the stale half of a replaced mapping so both directions stay consistent.
        if let Some(old_title) = duplicate_id.filter(|t| t != title) {
            self.title_to_id.remove(&old_title);
            let old_upper = old_title.to_uppercase();
            if self.upper_to_title.get(&old_upper) == Some(&old_title) {
                self.upper_to_title.remove(&old_upper);
            }
        }
        if let Some(old_id) = duplicate_title.filter(|&old| old != id) {
            self.id_to_title.remove(&old_id);
        }

        let upper = title.to_uppercase();
        if let Some(previous) = self.upper_to_title.get(&upper) {
            if previous != title {
                debug!(title, previous = previous.as_str(), "Case-insensitive title collision");
                stats.add_case_collisions(1);
            }
        }

        self.upper_to_title.insert(upper, title.to_string());
        self.title_to_id.insert(title.to_string(), id);
        self.id_to_title.insert(id, title.to_string());
        Ok(())
    }

    /// Builds an index directly from `(id, title)` pairs, last write wins.
    pub fn from_pages<'a, I>(pages: I) -> Self
    where
        I: IntoIterator<Item = (u32, &'a str)>,
    {
        let stats = ResolutionStats::new();
        let mut index = Self::with_capacity(0);
        for (id, title) in pages {
            // Lenient inserts never fail.
            let _ = index.insert(id, title, DuplicatePolicy::Lenient, &stats);
        }
        index
    }

    pub fn contains(&self, title: &str) -> bool {
        self.title_to_id.contains_key(title)
    }

    pub fn id_of(&self, title: &str) -> Option<u32> {
        self.title_to_id.get(title).copied()
    }

    pub fn title_of(&self, id: u32) -> Option<&str> {
        self.id_to_title.get(&id).map(String::as_str)
    }

    /// Canonical title whose upper-cased form equals `title` upper-cased.
    pub fn canonical_case_insensitive(&self, title: &str) -> Option<&str> {
        self.upper_to_title
            .get(&title.to_uppercase())
            .map(String::as_str)
    }

    /// Case-insensitive match, retried with underscores read as spaces.
    pub fn match_title(&self, normalized: &str) -> Option<&str> {
        self.canonical_case_insensitive(normalized).or_else(|| {
            if normalized.contains('_') {
                self.canonical_case_insensitive(&normalized.replace('_', " "))
            } else {
                None
            }
        })
    }

    pub fn len(&self) -> usize {
        self.title_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.title_to_id.is_empty()
    }

    /// All `(id, title)` pairs ordered by id.
    pub fn pages_by_id(&self) -> Vec<(u32, &str)> {
        let mut pages: Vec<(u32, &str)> = self
            .title_to_id
            .iter()
            .map(|(title, &id)| (id, title.as_str()))
            .collect();
        pages.sort_unstable_by_key(|&(id, _)| id);
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build(input: &str, policy: DuplicatePolicy) -> (Result<PageIndex>, ResolutionStats) {
        let stats = ResolutionStats::new();
        let index = PageIndex::from_reader(Cursor::new(input.to_string()), policy, &stats);
        (index, stats)
    }

    #[test]
    fn builds_bidirectional_maps() {
        let (index, stats) = build("1<|>Dog\n2<|>Cat\n", DuplicatePolicy::Lenient);
        let index = index.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.id_of("Dog"), Some(1));
        assert_eq!(index.title_of(2), Some("Cat"));
        assert!(index.contains("Cat"));
        assert!(!index.contains("cat"));
        assert_eq!(stats.pages_indexed(), 2);
    }

    #[test]
    fn case_insensitive_lookup() {
        let index = PageIndex::from_pages([(1, "Dog"), (2, "New York City")]);
        assert_eq!(index.canonical_case_insensitive("dog"), Some("Dog"));
        assert_eq!(index.canonical_case_insensitive("DOG"), Some("Dog"));
        assert_eq!(index.canonical_case_insensitive("new york city"), Some("New York City"));
        assert_eq!(index.canonical_case_insensitive("Wolf"), None);
    }

    #[test]
    fn match_title_retries_with_spaces() {
        let index = PageIndex::from_pages([(1, "New York City")]);
        assert_eq!(index.match_title("new_york_city"), Some("New York City"));
        assert_eq!(index.match_title("new_york"), None);
    }

    #[test]
    fn malformed_lines_are_skipped_and_counted() {
        let (index, stats) = build(
            "1<|>Dog\nnot a line\nx<|>Bad id\n\n2<|>Cat\n",
            DuplicatePolicy::Lenient,
        );
        let index = index.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(stats.page_lines_malformed(), 3);
    }

    #[test]
    fn title_keeps_embedded_delimiter() {
        let index = PageIndex::from_pages([(1, "A<|>B")]);
        assert_eq!(index.id_of("A<|>B"), Some(1));

        let (index, _) = build("3<|>A<|>B\n", DuplicatePolicy::Lenient);
        assert_eq!(index.unwrap().id_of("A<|>B"), Some(3));
    }

    #[test]
    fn lenient_duplicates_last_write_wins() {
        let (index, stats) = build("1<|>Dog\n5<|>Dog\n", DuplicatePolicy::Lenient);
        let index = index.unwrap();
        assert_eq!(index.id_of("Dog"), Some(5));
        assert_eq!(stats.duplicate_titles(), 1);
    }

    #[test]
    fn lenient_reassigned_id_drops_old_title() {
        let (index, _) = build("1<|>Dog\n1<|>Hound\n", DuplicatePolicy::Lenient);
        let index = index.unwrap();
        assert_eq!(index.title_of(1), Some("Hound"));
        assert_eq!(index.id_of("Dog"), None);
        assert_eq!(index.id_of("Hound"), Some(1));
    }

    #[test]
    fn lenient_moved_title_drops_old_id() {
        let (index, _) = build("1<|>Dog\n5<|>Dog\n", DuplicatePolicy::Lenient);
        let index = index.unwrap();
        assert_eq!(index.title_of(1), None);
        assert_eq!(index.title_of(5), Some("Dog"));
    }

    #[test]
    fn strict_duplicate_title_fails() {
        let (index, _) = build("1<|>Dog\n5<|>Dog\n", DuplicatePolicy::Strict);
        assert!(index.is_err());
    }

    #[test]
    fn strict_duplicate_id_fails() {
        let (index, _) = build("1<|>Dog\n1<|>Cat\n", DuplicatePolicy::Strict);
        assert!(index.is_err());
    }

    #[test]
    fn case_collisions_are_counted_not_fatal() {
        let (index, stats) = build("1<|>Red\n2<|>RED\n", DuplicatePolicy::Strict);
        let index = index.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(stats.case_collisions(), 1);
        // last write wins for the case-insensitive key
        assert_eq!(index.canonical_case_insensitive("red"), Some("RED"));
    }

    #[test]
    fn pages_by_id_is_sorted() {
        let index = PageIndex::from_pages([(9, "C"), (1, "A"), (4, "B")]);
        assert_eq!(index.pages_by_id(), vec![(1, "A"), (4, "B"), (9, "C")]);
    }
}
