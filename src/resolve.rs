use crate::config::{
    EDGES_FILE, EXPECTED_REDIRECTS, FIELD_DELIMITER, NODES_FILE, PAGES_FILE, RAW_LINKS_FILE,
    RAW_REDIRECTS_FILE, REDIRECTS_FILE, RESOLVE_BATCH_SIZE,
};
use crate::index::{DuplicatePolicy, PageIndex};
use crate::models::{Edge, LinkRecord, RedirectRecord};
use crate::normalize::normalize;
use crate::stats::ResolutionStats;
use crate::stream::{create_output, for_each_line, open_stream};
use anyhow::{Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct ResolveConfig {
    pub output_dir: PathBuf,
    pub policy: DuplicatePolicy,
    /// Only exact titles and redirect keys resolve links; no case-insensitive fallback
    pub exact_links: bool,
}

/// Resolves a raw redirect target to a canonical title, or `None` if nothing matches.
pub fn resolve_redirect_target<'i>(raw_target: &str, index: &'i PageIndex) -> Option<&'i str> {
    index.match_title(&normalize(raw_target))
}

/// Redirect source title to canonical target title. Built once, read-only afterwards.
#[derive(Debug, Default)]
pub struct RedirectMap {
    map: FxHashMap<String, String>,
}

impl RedirectMap {
    /// Builds the map from the raw redirects stream (`<source><|><raw target>` per line).
    pub fn build(path: &Path, index: &PageIndex, stats: &ResolutionStats) -> Result<Self> {
        info!(path = ?path, "Resolving redirects");
        let map = Self::from_reader(open_stream(path)?, index, stats)?;

        info!(
            resolved = stats.redirects_resolved(),
            skipped = stats.redirects_skipped(),
            skip_percent = stats.redirect_skip_ratio(),
            malformed = stats.redirect_lines_malformed(),
            "Redirects resolved"
        );
        Ok(map)
    }

    pub fn from_reader<R: BufRead>(
        reader: R,
        index: &PageIndex,
        stats: &ResolutionStats,
    ) -> Result<Self> {
        let mut map = FxHashMap::with_capacity_and_hasher(
            EXPECTED_REDIRECTS.min(index.len().saturating_mul(2)),
            Default::default(),
        );

        for_each_line(reader, "redirects", |line| {
            let Some(record) = RedirectRecord::parse(line) else {
                warn!(line, "Malformed redirects line, skipping");
                stats.inc_redirect_lines_malformed();
                return Ok(());
            };

            match resolve_redirect_target(&record.raw_target, index) {
                Some(target) => {
                    map.insert(record.source_title, target.to_string());
                    stats.inc_redirects_resolved();
                }
                None => {
                    warn!(
                        source = %record.source_title,
                        target = %record.raw_target,
                        "Redirect target not found, skipping"
                    );
                    stats.inc_redirects_skipped();
                }
            }
            Ok(())
        })?;

        Ok(Self { map })
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            map: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.map.get(source).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Writes `<source><|><target>` lines sorted by source title.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut entries: Vec<_> = self.map.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

        for (source, target) in entries {
            writer.write_all(source.as_bytes())?;
            writer.write_all(FIELD_DELIMITER.as_bytes())?;
            writer.write_all(target.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// How a link target was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Direct(u32),
    ViaRedirect(u32),
    Unresolved,
}

impl Resolution {
    pub fn id(self) -> Option<u32> {
        match self {
            Resolution::Direct(id) | Resolution::ViaRedirect(id) => Some(id),
            Resolution::Unresolved => None,
        }
    }
}

/// Resolves raw link targets to page ids, following at most one redirect.
#[derive(Clone, Copy)]
pub struct LinkResolver<'a> {
    index: &'a PageIndex,
    redirects: &'a RedirectMap,
    case_fallback: bool,
}

impl<'a> LinkResolver<'a> {
    pub fn new(index: &'a PageIndex, redirects: &'a RedirectMap) -> Self {
        Self {
            index,
            redirects,
            case_fallback: true,
        }
    }

    /// Turns the final case-insensitive title match on or off.
    pub fn with_case_fallback(mut self, enabled: bool) -> Self {
        self.case_fallback = enabled;
        self
    }

    /// Exact title, then one redirect hop, then (unless disabled) a case-insensitive match.
    ///
    /// Redirect targets in the map are canonical titles, so a redirect pointing at another
    /// redirect never made it into the map and chains are never followed.
    pub fn resolve(&self, raw_target: &str) -> Resolution {
        let title = normalize(raw_target);

        if let Some(id) = self.index.id_of(&title) {
            return Resolution::Direct(id);
        }

        if let Some(target) = self.redirects.get(&title) {
            return match self.index.id_of(target) {
                Some(id) => Resolution::ViaRedirect(id),
                None => Resolution::Unresolved,
            };
        }

        if !self.case_fallback {
            return Resolution::Unresolved;
        }

        self.index
            .match_title(&title)
            .and_then(|canonical| self.index.id_of(canonical))
            .map_or(Resolution::Unresolved, Resolution::Direct)
    }

    pub fn resolve_id(&self, raw_target: &str) -> Option<u32> {
        self.resolve(raw_target).id()
    }
}

fn resolve_line(line: &str, resolver: &LinkResolver<'_>, stats: &ResolutionStats) -> Option<Edge> {
    let Some(record) = LinkRecord::parse(line) else {
        warn!(line, "Malformed links line, skipping");
        stats.inc_link_lines_malformed();
        return None;
    };

    match resolver.resolve(&record.raw_target) {
        Resolution::Direct(target) => {
            stats.inc_links_direct();
            Some(Edge {
                source: record.source_page_id,
                target,
            })
        }
        Resolution::ViaRedirect(target) => {
            stats.inc_links_via_redirect();
            Some(Edge {
                source: record.source_page_id,
                target,
            })
        }
        Resolution::Unresolved => {
            debug!(
                source = record.source_page_id,
                target = %record.raw_target,
                "Unresolved link"
            );
            stats.inc_links_unresolved();
            None
        }
    }
}

/// Resolves every line of the links stream, writing edges in input order.
///
/// Lines are resolved in parallel batches against the read-only index; the writer stays on
/// the calling thread. Returns the number of edges written.
pub fn resolve_links<R, W>(
    reader: R,
    resolver: &LinkResolver<'_>,
    stats: &ResolutionStats,
    edges: &mut csv::Writer<W>,
) -> Result<u64>
where
    R: BufRead,
    W: Write,
{
    let mut batch: Vec<String> = Vec::with_capacity(RESOLVE_BATCH_SIZE);
    let mut written = 0u64;

    let mut flush_batch = |batch: &mut Vec<String>| -> Result<()> {
        let resolved: Vec<Option<Edge>> = batch
            .par_iter()
            .map(|line| resolve_line(line, resolver, stats))
            .collect();

        let mut source = itoa::Buffer::new();
        let mut target = itoa::Buffer::new();
        for edge in resolved.into_iter().flatten() {
            edges
                .write_record([source.format(edge.source), target.format(edge.target)])
                .context("Failed to write edge")?;
            written += 1;
        }
        batch.clear();
        Ok(())
    };

    for_each_line(reader, "links", |line| {
        batch.push(line.to_string());
        if batch.len() >= RESOLVE_BATCH_SIZE {
            flush_batch(&mut batch)?;
        }
        Ok(())
    })?;
    flush_batch(&mut batch)?;

    edges.flush().context("Failed to flush edges")?;
    Ok(written)
}

/// Writes `nodes.csv` (`id,title`) for every indexed page.
pub fn write_nodes<W: Write>(index: &PageIndex, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["id", "title"])?;

    let mut id_buf = itoa::Buffer::new();
    for (id, title) in index.pages_by_id() {
        csv.write_record([id_buf.format(id), title])?;
    }
    csv.flush()?;
    Ok(())
}

/// Runs the index, redirect and link passes over the intermediate files in `output_dir`.
pub fn run_resolution(config: &ResolveConfig) -> Result<ResolutionStats> {
    let dir = config.output_dir.as_path();
    let stats = ResolutionStats::new();

    let index = PageIndex::build(&dir.join(PAGES_FILE), config.policy, &stats)?;
    write_nodes(&index, create_output(&dir.join(NODES_FILE))?)
        .context("Failed to write nodes")?;

    let redirects = RedirectMap::build(&dir.join(RAW_REDIRECTS_FILE), &index, &stats)?;
    redirects
        .write_to(create_output(&dir.join(REDIRECTS_FILE))?)
        .context("Failed to write resolved redirects")?;

    info!("Resolving links");
    let resolver =
        LinkResolver::new(&index, &redirects).with_case_fallback(!config.exact_links);
    let mut edges = csv::Writer::from_writer(create_output(&dir.join(EDGES_FILE))?);
    edges.write_record(["source_id", "target_id"])?;

    let written = resolve_links(
        open_stream(&dir.join(RAW_LINKS_FILE))?,
        &resolver,
        &stats,
        &mut edges,
    )?;

    info!(
        edges = written,
        direct = stats.links_direct(),
        via_redirect = stats.links_via_redirect(),
        unresolved = stats.links_unresolved(),
        unresolved_percent = stats.link_unresolved_ratio(),
        malformed = stats.link_lines_malformed(),
        "Links resolved"
    );

    Ok(stats)
}

/// True when all three intermediate streams exist in `dir`.
pub fn streams_present(dir: &Path) -> bool {
    [PAGES_FILE, RAW_REDIRECTS_FILE, RAW_LINKS_FILE]
        .iter()
        .all(|name| fs::metadata(dir.join(name)).is_ok_and(|m| m.is_file()))
}
