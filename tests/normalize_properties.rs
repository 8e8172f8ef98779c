//! Property tests for normalization, namespace filtering and redirect resolution.

use ariadne::index::PageIndex;
use ariadne::normalize::normalize;
use ariadne::parser::WikiReader;
use ariadne::resolve::{LinkResolver, RedirectMap, Resolution};
use ariadne::stats::ResolutionStats;
use proptest::prelude::*;
use std::io::{BufRead, Cursor};

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn raw_target() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<String>(),
        "[ :a-zA-Z_#|%&;0-9]{0,40}",
        "[A-Za-z ]{1,12}(#[A-Za-z]{0,8})?(\\|[A-Za-z ]{0,8})?",
        "(%[0-9A-F]{2}|&(amp|nbsp|lt|#65|#x41);|[a-z ])*",
    ]
}

proptest! {
    #[test]
    fn normalize_is_idempotent(raw in raw_target()) {
        let once = normalize(&raw);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalized_form_has_collapsed_whitespace(raw in raw_target()) {
        let out = normalize(&raw);
        prop_assert!(!out.starts_with(' ') && !out.ends_with(' '));
        prop_assert!(!out.contains("  "));
    }

    #[test]
    fn foreign_namespaces_emit_nothing(
        ns in prop_oneof![1i32..=15, 100i32..=2600, -2i32..=-1],
        title in "[A-Za-z ]{1,20}",
        text in "[A-Za-z \\[\\]#:|]{0,80}",
    ) {
        let xml = format!(
            "<mediawiki><page><title>{}</title><ns>{}</ns><id>1</id>\
             <revision><text>{}</text></revision></page></mediawiki>",
            escape_xml(&title),
            ns,
            escape_xml(&text)
        );
        let source: Box<dyn BufRead + Send> = Box::new(Cursor::new(xml.into_bytes()));
        let mut reader = WikiReader::from_reader(source);
        prop_assert_eq!(reader.by_ref().count(), 0);
        prop_assert_eq!(reader.counts().discarded_namespace, 1);
    }

    #[test]
    fn redirect_resolution_is_monotonic(
        titles in proptest::collection::btree_set("[A-Z][a-z]{0,6}( [A-Za-z]{1,6})?", 1..8),
        target in "[A-Za-z_ ]{1,14}",
    ) {
        let pages: Vec<(u32, &str)> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| (i as u32 + 1, t.as_str()))
            .collect();
        let index = PageIndex::from_pages(pages.iter().copied());

        let stats = ResolutionStats::new();
        let line = format!("Source page<|>{}\n", target);
        let redirects = RedirectMap::from_reader(Cursor::new(line), &index, &stats).unwrap();

        let normalized = normalize(&target);
        let upper = normalized.to_uppercase();
        let spaced = normalized.replace('_', " ").to_uppercase();
        let matches = titles
            .iter()
            .any(|t| t.to_uppercase() == upper || t.to_uppercase() == spaced);

        prop_assert_eq!(redirects.get("Source page").is_some(), matches);
        if let Some(mapped) = redirects.get("Source page") {
            prop_assert!(index.contains(mapped));
        }
    }

    #[test]
    fn resolved_links_point_at_indexed_pages(
        titles in proptest::collection::btree_set("[A-Z][a-z]{0,6}", 1..8),
        raw in raw_target(),
    ) {
        let pages: Vec<(u32, &str)> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| (i as u32 + 1, t.as_str()))
            .collect();
        let index = PageIndex::from_pages(pages.iter().copied());
        let redirects = RedirectMap::default();
        let resolver = LinkResolver::new(&index, &redirects);

        match resolver.resolve(&raw) {
            Resolution::Direct(id) => prop_assert!(index.title_of(id).is_some()),
            Resolution::ViaRedirect(_) => prop_assert!(false, "no redirects were indexed"),
            Resolution::Unresolved => {}
        }
    }
}
