use crate::config::{
    CHANNEL_CAPACITY, FIELD_DELIMITER, PAGES_FILE, PROGRESS_INTERVAL, RAW_LINKS_FILE,
    RAW_REDIRECTS_FILE, WRITER_BUFFER_SIZE,
};
use crate::content::{extract_link_targets, extract_redirect_target};
use crate::models::{single_line, PageRecord};
use crate::parser::WikiReader;
use crate::stats::ExtractionStats;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info, warn};

pub struct ExtractConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub channel_capacity: usize,
    /// Stop after this many namespace-0 pages (for testing)
    pub limit: Option<u64>,
}

impl ExtractConfig {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            channel_capacity: CHANNEL_CAPACITY,
            limit: None,
        }
    }
}

/// What travels from the dump reader to the record processor.
#[derive(Debug)]
pub enum Message {
    Page(PageRecord),
    /// Sent once after the last page; the processor drains up to here and stops.
    Stop,
}

/// Writes the pages, raw redirects and raw links streams.
///
/// Owns all three writers for the whole run, so every stream has a single writer.
pub struct RecordProcessor<'s, W: Write> {
    pages: W,
    redirects: W,
    links: W,
    stats: &'s ExtractionStats,
    ids: itoa::Buffer,
}

impl<'s, W: Write> RecordProcessor<'s, W> {
    pub fn new(pages: W, redirects: W, links: W, stats: &'s ExtractionStats) -> Self {
        Self {
            pages,
            redirects,
            links,
            stats,
            ids: itoa::Buffer::new(),
        }
    }

    pub fn process(&mut self, page: PageRecord) -> Result<()> {
        if page.is_redirect {
            self.process_redirect(&page)
        } else {
            self.process_article(&page)
        }
    }

    fn process_redirect(&mut self, page: &PageRecord) -> Result<()> {
        let Some(text) = page.text.as_deref() else {
            warn!(title = %page.title, "Redirect page has no text, ignoring");
            self.stats.inc_redirects_missing_text();
            return Ok(());
        };

        let Some(target) = extract_redirect_target(text) else {
            warn!(title = %page.title, "Redirect page is missing a redirect, ignoring");
            self.stats.inc_redirects_missing_target();
            return Ok(());
        };

        write_line(
            &mut self.redirects,
            &single_line(&page.title),
            &single_line(target),
        )
        .context("Failed to write redirects stream")?;
        self.stats.inc_redirects();
        Ok(())
    }

    fn process_article(&mut self, page: &PageRecord) -> Result<()> {
        let id = self.ids.format(page.id);

        write_line(&mut self.pages, id, &single_line(&page.title))
            .context("Failed to write pages stream")?;
        self.stats.inc_articles();

        let Some(text) = page.text.as_deref() else {
            return Ok(());
        };

        let mut count = 0u64;
        for target in extract_link_targets(text) {
            write_line(&mut self.links, id, &single_line(target))
                .context("Failed to write links stream")?;
            count += 1;
        }
        self.stats.add_links(count);
        Ok(())
    }

    /// Flushes all streams; must be called before the writers are dropped.
    pub fn finish(mut self) -> Result<()> {
        self.pages.flush().context("Failed to flush pages stream")?;
        self.redirects
            .flush()
            .context("Failed to flush redirects stream")?;
        self.links.flush().context("Failed to flush links stream")?;
        Ok(())
    }
}

fn write_line<W: Write>(w: &mut W, key: &str, value: &str) -> std::io::Result<()> {
    w.write_all(key.as_bytes())?;
    w.write_all(FIELD_DELIMITER.as_bytes())?;
    w.write_all(value.as_bytes())?;
    w.write_all(b"\n")
}

fn create_stream(dir: &Path, name: &str) -> Result<BufWriter<File>> {
    let path = dir.join(name);
    let file =
        File::create(&path).with_context(|| format!("Failed to create stream file: {:?}", path))?;
    Ok(BufWriter::with_capacity(WRITER_BUFFER_SIZE, file))
}

/// Reads pages and sends them down the channel, ending with [`Message::Stop`].
fn produce(
    mut reader: WikiReader,
    tx: &Sender<Message>,
    limit: Option<u64>,
    stats: &ExtractionStats,
) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    let mut sent = 0u64;
    let mut outcome = Ok(());

    loop {
        // Checked before pulling, so the reader never parses past the limit.
        if limit.is_some_and(|l| sent >= l) {
            debug!(limit = sent, "Page limit reached");
            break;
        }

        let page = match reader.next() {
            Some(Ok(page)) => page,
            Some(Err(e)) => {
                outcome = Err(e);
                break;
            }
            None => break,
        };

        if tx.send(Message::Page(page)).is_err() {
            outcome = Err(anyhow!("Record processor stopped before the dump was read"));
            break;
        }

        sent += 1;
        if sent % PROGRESS_INTERVAL == 0 {
            pb.set_message(format!("{} pages", sent));
            pb.tick();
        }
    }

    let counts = reader.counts();
    stats.add_pages_seen(counts.pages_seen);
    stats.add_pages_discarded(counts.discarded_namespace);
    stats.add_pages_malformed(counts.malformed);

    // Sent on the error path too, so the processor flushes what it already has.
    let _ = tx.send(Message::Stop);
    pb.finish_and_clear();

    info!(pages = sent, "Dump reader finished");
    outcome
}

/// Drains the channel into the processor until the sentinel arrives.
fn consume<W: Write>(rx: &Receiver<Message>, mut processor: RecordProcessor<'_, W>) -> Result<()> {
    loop {
        match rx.recv() {
            Ok(Message::Page(page)) => processor.process(page)?,
            Ok(Message::Stop) => {
                info!("Record processor stopping");
                break;
            }
            Err(_) => {
                warn!("Record channel closed without a stop message");
                break;
            }
        }
    }
    processor.finish()
}

/// Streams the dump through a bounded channel into the three intermediate files.
///
/// The dump reader and the record processor run on their own threads; `send` blocks when
/// the channel is full, so a slow processor throttles the reader instead of growing memory.
pub fn run_extraction(config: &ExtractConfig) -> Result<ExtractionStats> {
    let reader = WikiReader::open(&config.input)?;
    let stats = ExtractionStats::new();

    let processor = RecordProcessor::new(
        create_stream(&config.output_dir, PAGES_FILE)?,
        create_stream(&config.output_dir, RAW_REDIRECTS_FILE)?,
        create_stream(&config.output_dir, RAW_LINKS_FILE)?,
        &stats,
    );

    let capacity = config.channel_capacity.max(1);
    let (tx, rx) = bounded::<Message>(capacity);
    info!(capacity, input = ?config.input, "Starting extraction");

    let (produced, consumed) = thread::scope(|s| -> Result<_> {
        let stats = &stats;
        let limit = config.limit;

        let producer = thread::Builder::new()
            .name("dump-reader".into())
            .spawn_scoped(s, move || produce(reader, &tx, limit, stats))
            .context("Failed to spawn dump reader thread")?;

        let consumer = thread::Builder::new()
            .name("record-processor".into())
            .spawn_scoped(s, move || consume(&rx, processor))
            .context("Failed to spawn record processor thread")?;

        let consumed = consumer
            .join()
            .map_err(|_| anyhow!("Record processor thread panicked"))?;
        let produced = producer
            .join()
            .map_err(|_| anyhow!("Dump reader thread panicked"))?;
        Ok((produced, consumed))
    })?;

    // A processor failure is the root cause of any reader send failure.
    consumed?;
    produced?;

    info!(
        pages_seen = stats.pages_seen(),
        articles = stats.articles(),
        redirects = stats.redirects(),
        links = stats.links(),
        discarded = stats.pages_discarded(),
        malformed = stats.pages_malformed(),
        "Extraction complete"
    );

    let broken = stats.redirects_missing_target() + stats.redirects_missing_text();
    if broken > 0 {
        info!(
            skipped = broken,
            "Redirect pages without a parsable target were skipped"
        );
    }

    Ok(stats)
}
