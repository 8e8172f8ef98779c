//! Canonicalization of raw wikitext link and redirect targets.

use percent_encoding::percent_decode_str;
use quick_xml::escape::unescape;
use std::borrow::Cow;

/// Longest entity reference we try to resolve, e.g. `&CounterClockwiseContourIntegral;`
const MAX_ENTITY_LEN: usize = 40;

/// Reduces a raw target such as `dog#Section|Canines` to a candidate title (`dog`).
///
/// Runs the reduction until the result stops changing, so decoded text that reveals
/// another anchor, alias or escape is handled and `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    // Every round that changes more than whitespace shrinks the char count, so this terminates.
    let mut current = normalize_once(raw);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let target = raw.trim();
    let target = target.split('#').next().unwrap_or_default();
    let target = target.split('|').next().unwrap_or_default();
    let target = target.trim_matches(':');

    let decoded = percent_decode_str(target).decode_utf8_lossy();
    let decoded = decode_entities(&decoded);

    collapse_whitespace(&decoded)
}

/// Best-effort HTML entity decoding; references that don't resolve are kept verbatim.
fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let semi = tail
            .char_indices()
            .take(MAX_ENTITY_LEN)
            .find(|&(_, c)| c == ';')
            .map(|(i, _)| i);

        match semi.and_then(|end| resolve_reference(&tail[..=end]).map(|r| (end, r))) {
            Some((end, resolved)) => {
                out.push_str(&resolved);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    Cow::Owned(out)
}

fn resolve_reference(reference: &str) -> Option<String> {
    unescape(reference).ok().map(Cow::into_owned)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_anchor_and_alias() {
        assert_eq!(normalize("dog#Section|Canines"), "dog");
        assert_eq!(normalize("Cat|kitty"), "Cat");
        assert_eq!(normalize("#Local section"), "");
    }

    #[test]
    fn strips_colons() {
        assert_eq!(normalize(":Dog"), "Dog");
        assert_eq!(normalize("::Dog:"), "Dog");
    }

    #[test]
    fn percent_decodes() {
        assert_eq!(normalize("C%2B%2B"), "C++");
        assert_eq!(normalize("Caf%C3%A9"), "Café");
    }

    #[test]
    fn malformed_percent_passes_through() {
        assert_eq!(normalize("100%"), "100%");
        assert_eq!(normalize("50%zz off"), "50%zz off");
    }

    #[test]
    fn invalid_utf8_percent_is_lossy() {
        assert_eq!(normalize("A%FFB"), "A\u{FFFD}B");
    }

    #[test]
    fn html_entities_decoded() {
        assert_eq!(normalize("AT&amp;T"), "AT&T");
        assert_eq!(normalize("Caf&eacute;"), "Café");
        assert_eq!(normalize("a&nbsp;b"), "a b");
    }

    #[test]
    fn anchor_cut_runs_before_entity_decoding() {
        // a literal numeric reference contains '#', so only the leading '&' survives
        assert_eq!(normalize("&#65;&#x42;C"), "&");
    }

    #[test]
    fn percent_encoded_numeric_references_decoded() {
        assert_eq!(normalize("%26%2365;%26%23x42;C"), "ABC");
        assert_eq!(normalize("AT%26amp;T"), "AT&T");
    }

    #[test]
    fn malformed_entities_pass_through() {
        assert_eq!(normalize("AT&T"), "AT&T");
        assert_eq!(normalize("Tom & Jerry"), "Tom & Jerry");
        assert_eq!(normalize("&bogus; stays"), "&bogus; stays");
        assert_eq!(normalize("AT&T &amp; co"), "AT&T & co");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  New   York \t City "), "New York City");
    }

    #[test]
    fn decoded_anchor_is_stripped() {
        // %23 is '#', only visible after decoding
        assert_eq!(normalize("Dog%23History"), "Dog");
    }

    #[test]
    fn double_encoding_reaches_fixed_point() {
        let once = normalize("%2541");
        assert_eq!(once, "A");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }
}
