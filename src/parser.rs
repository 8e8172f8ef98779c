use crate::config::TARGET_NAMESPACE;
use crate::models::PageRecord;
use anyhow::{bail, Context, Result};
use bzip2::read::MultiBzDecoder;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

const READ_BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Page,
    Title,
    Ns,
    Id,
    Redirect,
    Revision,
    Text,
    Other,
}

impl Tag {
    fn from_local_name(name: &[u8]) -> Self {
        match name {
            b"page" => Tag::Page,
            b"title" => Tag::Title,
            b"ns" => Tag::Ns,
            b"id" => Tag::Id,
            b"redirect" => Tag::Redirect,
            b"revision" => Tag::Revision,
            b"text" => Tag::Text,
            _ => Tag::Other,
        }
    }
}

/// Which field of the current page the next text event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Ns,
    Id,
    Text,
}

/// Per-page scratch state, reset after every `</page>`.
#[derive(Default)]
struct PageBuilder {
    title: String,
    ns: String,
    id: String,
    is_redirect: bool,
    text: String,
    seen_title: bool,
    seen_id: bool,
}

impl PageBuilder {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Ns => &mut self.ns,
            Field::Id => &mut self.id,
            Field::Text => &mut self.text,
        }
    }

    fn is_target_namespace(&self) -> Option<bool> {
        self.ns
            .trim()
            .parse::<i32>()
            .ok()
            .map(|ns| ns == TARGET_NAMESPACE)
    }
}

/// Counts of pages the reader saw but did not yield.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReaderCounts {
    pub pages_seen: u64,
    pub discarded_namespace: u64,
    pub malformed: u64,
}

/// Streaming reader over a MediaWiki XML export, yielding namespace-0 pages.
///
/// Only one page's fields are held at a time. Pages outside the target namespace are
/// dropped without buffering their text, and pages whose id doesn't parse are skipped
/// with a warning. XML or I/O errors end the stream with an `Err`.
pub struct WikiReader {
    reader: Reader<Box<dyn BufRead + Send>>,
    buf: Vec<u8>,
    path: Vec<Tag>,
    page: PageBuilder,
    capture: Option<Field>,
    counts: ReaderCounts,
    finished: bool,
}

impl WikiReader {
    /// Opens a dump; `.bz2` files are decoded as (possibly multistream) bzip2.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open wiki dump: {:?}", path))?;

        let is_bz2 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"));

        let source: Box<dyn BufRead + Send> = if is_bz2 {
            Box::new(BufReader::with_capacity(
                READ_BUFFER_SIZE,
                MultiBzDecoder::new(file),
            ))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file))
        };

        Ok(Self::from_reader(source))
    }

    pub fn from_reader(source: Box<dyn BufRead + Send>) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::with_capacity(64 * 1024),
            path: Vec::with_capacity(16),
            page: PageBuilder::default(),
            capture: None,
            counts: ReaderCounts::default(),
            finished: false,
        }
    }

    pub fn counts(&self) -> ReaderCounts {
        self.counts
    }

    /// Decides what an opening tag means given its ancestors; returns the field to capture.
    fn start_element(path: &[Tag], page: &mut PageBuilder, tag: Tag) -> Option<Field> {
        let under_page = path.ends_with(&[Tag::Page]);
        match tag {
            Tag::Page => {
                *page = PageBuilder::default();
                None
            }
            Tag::Title if under_page => {
                page.seen_title = true;
                Some(Field::Title)
            }
            Tag::Ns if under_page => Some(Field::Ns),
            Tag::Id if under_page => {
                page.seen_id = true;
                Some(Field::Id)
            }
            Tag::Redirect if under_page => {
                page.is_redirect = true;
                None
            }
            // `ns` precedes `revision`, so text of foreign pages is never buffered.
            Tag::Text
                if path.ends_with(&[Tag::Page, Tag::Revision])
                    && page.is_target_namespace() != Some(false) =>
            {
                Some(Field::Text)
            }
            _ => None,
        }
    }

    /// Turns the finished `<page>` into a record, or `None` if it is skipped.
    fn finish_page(page: PageBuilder, counts: &mut ReaderCounts) -> Option<PageRecord> {
        counts.pages_seen += 1;

        match page.is_target_namespace() {
            Some(true) => {}
            Some(false) => {
                counts.discarded_namespace += 1;
                return None;
            }
            None => {
                warn!(title = %page.title, ns = %page.ns, "Page has no valid namespace, skipping");
                counts.malformed += 1;
                return None;
            }
        }

        if !page.seen_title || !page.seen_id {
            warn!(title = %page.title, "Page is missing its title or id, skipping");
            counts.malformed += 1;
            return None;
        }

        let id = match page.id.trim().parse::<u32>() {
            Ok(id) => id,
            Err(e) => {
                warn!(title = %page.title, id = %page.id, error = %e, "Invalid page id, skipping");
                counts.malformed += 1;
                return None;
            }
        };

        Some(PageRecord {
            id,
            title: page.title,
            is_redirect: page.is_redirect,
            text: (!page.text.is_empty()).then_some(page.text),
        })
    }

    fn next_page(&mut self) -> Result<Option<PageRecord>> {
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| {
                    format!(
                        "Malformed XML near byte {}",
                        self.reader.buffer_position()
                    )
                })?;

            match event {
                Event::Start(ref e) => {
                    let tag = Tag::from_local_name(e.local_name().as_ref());
                    self.capture = Self::start_element(&self.path, &mut self.page, tag);
                    self.path.push(tag);
                }
                Event::Empty(ref e) => {
                    let tag = Tag::from_local_name(e.local_name().as_ref());
                    Self::start_element(&self.path, &mut self.page, tag);
                    self.capture = None;
                }
                Event::Text(ref e) => {
                    if let Some(field) = self.capture {
                        let text = e.unescape().context("Invalid text content")?;
                        self.page.field_mut(field).push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if let Some(field) = self.capture {
                        let raw = e.into_inner();
                        self.page
                            .field_mut(field)
                            .push_str(&String::from_utf8_lossy(&raw));
                    }
                }
                Event::End(_) => {
                    self.capture = None;
                    if self.path.pop() == Some(Tag::Page) {
                        let page = std::mem::take(&mut self.page);
                        if let Some(record) = Self::finish_page(page, &mut self.counts) {
                            return Ok(Some(record));
                        }
                    }
                }
                Event::Eof => {
                    if !self.path.is_empty() {
                        bail!(
                            "Dump ended inside an open element after {} pages",
                            self.counts.pages_seen
                        );
                    }
                    debug!(pages = self.counts.pages_seen, "Reached end of dump");
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl Iterator for WikiReader {
    type Item = Result<PageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_page() {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(xml: &str) -> (Vec<PageRecord>, ReaderCounts) {
        let source: Box<dyn BufRead + Send> = Box::new(Cursor::new(xml.as_bytes().to_vec()));
        let mut reader = WikiReader::from_reader(source);
        let pages = reader.by_ref().map(|p| p.unwrap()).collect();
        (pages, reader.counts())
    }

    fn page(ns: &str, id: &str, title: &str, extra: &str, text: &str) -> String {
        format!(
            "<page><title>{title}</title><ns>{ns}</ns><id>{id}</id>{extra}\
             <revision><id>999</id><contributor><id>7</id></contributor>\
             <text xml:space=\"preserve\">{text}</text></revision></page>"
        )
    }

    fn dump(pages: &[String]) -> String {
        format!(
            "<mediawiki xmlns=\"http://www.mediawiki.org/xml/export-0.11/\">\
             <siteinfo><namespaces><namespace key=\"0\" /></namespaces></siteinfo>{}</mediawiki>",
            pages.concat()
        )
    }

    #[test]
    fn reads_article_fields() {
        let xml = dump(&[page("0", "1", "Dog", "", "See [[Cat]].")]);
        let (pages, counts) = read_all(&xml);
        assert_eq!(
            pages,
            vec![PageRecord {
                id: 1,
                title: "Dog".to_string(),
                is_redirect: false,
                text: Some("See [[Cat]].".to_string()),
            }]
        );
        assert_eq!(counts.pages_seen, 1);
    }

    #[test]
    fn uses_page_id_not_revision_or_contributor_id() {
        let xml = dump(&[page("0", "42", "Dog", "", "x")]);
        let (pages, _) = read_all(&xml);
        assert_eq!(pages[0].id, 42);
    }

    #[test]
    fn detects_redirect_marker() {
        let xml = dump(&[page(
            "0",
            "2",
            "Canine",
            "<redirect title=\"Dog\" />",
            "#REDIRECT [[Dog]]",
        )]);
        let (pages, _) = read_all(&xml);
        assert!(pages[0].is_redirect);
        assert_eq!(pages[0].text.as_deref(), Some("#REDIRECT [[Dog]]"));
    }

    #[test]
    fn discards_other_namespaces() {
        let xml = dump(&[
            page("6", "3", "File:X.png", "", "[[Dog]]"),
            page("0", "1", "Dog", "", ""),
            page("14", "4", "Category:Dogs", "", "[[Dog]]"),
        ]);
        let (pages, counts) = read_all(&xml);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Dog");
        assert_eq!(counts.discarded_namespace, 2);
        assert_eq!(counts.pages_seen, 3);
    }

    #[test]
    fn bad_id_skips_only_that_page() {
        let xml = dump(&[
            page("0", "abc", "Broken", "", "[[Dog]]"),
            page("0", "1", "Dog", "", ""),
        ]);
        let (pages, counts) = read_all(&xml);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, 1);
        assert_eq!(counts.malformed, 1);
    }

    #[test]
    fn missing_or_empty_text_is_none() {
        let xml = dump(&[
            page("0", "1", "Empty", "", ""),
            "<page><title>NoRev</title><ns>0</ns><id>2</id></page>".to_string(),
            "<page><title>Deleted</title><ns>0</ns><id>3</id><revision><text deleted=\"deleted\" /></revision></page>".to_string(),
        ]);
        let (pages, _) = read_all(&xml);
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.text.is_none()));
    }

    #[test]
    fn unescapes_entities_in_title_and_text() {
        let xml = dump(&[page("0", "1", "AT&amp;T", "", "a &lt;b&gt; [[C&amp;D]]")]);
        let (pages, _) = read_all(&xml);
        assert_eq!(pages[0].title, "AT&T");
        assert_eq!(pages[0].text.as_deref(), Some("a <b> [[C&D]]"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let source: Box<dyn BufRead + Send> =
            Box::new(Cursor::new(b"<mediawiki><page><title>A</titel></page>".to_vec()));
        let mut reader = WikiReader::from_reader(source);
        assert!(matches!(reader.next(), Some(Err(_))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn truncated_dump_is_an_error() {
        let xml = dump(&[page("0", "1", "Dog", "", "x")]);
        let truncated = &xml[..xml.len() - "</mediawiki>".len()];
        let source: Box<dyn BufRead + Send> = Box::new(Cursor::new(truncated.as_bytes().to_vec()));
        let mut reader = WikiReader::from_reader(source);
        assert_eq!(reader.next().unwrap().unwrap().title, "Dog");
        assert!(matches!(reader.next(), Some(Err(_))));
    }

    #[test]
    fn open_missing_file_fails() {
        assert!(WikiReader::open("/nonexistent/dump.xml.bz2").is_err());
    }
}
