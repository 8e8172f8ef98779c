use once_cell::sync::Lazy;
use regex::Regex;

/// `#REDIRECT [[Target]]`; the target may itself contain single-bracket groups.
static REDIRECT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)#REDIRECT:?\s*\[\[([^\]\n]+(?:\[[^\]\n]*\][^\]\n]*)*)\]\]").unwrap()
});

pub static LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^|\]\n]+)(?:\|[^\]]+)?\]\]").unwrap());

/// Link targets in these namespaces are not article links.
static EXCLUDED_NAMESPACE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:File|Image|Category|Template|Wikipedia|Help|Portal|Special|Media|User|Talk|Commons)(?: talk)?:").unwrap()
});

/// Returns the raw target of a redirect page, if the text carries a redirect directive.
pub fn extract_redirect_target(text: &str) -> Option<&str> {
    REDIRECT_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn is_excluded_target(target: &str) -> bool {
    EXCLUDED_NAMESPACE_REGEX.is_match(target)
}

/// Returns every article link target in document order, duplicates included.
///
/// A candidate in an excluded namespace is rejected at its start position only; scanning
/// resumes one character later so links nested in e.g. a file caption are still found.
pub fn extract_link_targets(text: &str) -> LinkTargets<'_> {
    LinkTargets { text, pos: 0 }
}

/// Iterator returned by [`extract_link_targets`].
pub struct LinkTargets<'t> {
    text: &'t str,
    pos: usize,
}

impl<'t> Iterator for LinkTargets<'t> {
    type Item = &'t str;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos <= self.text.len() {
            let caps = LINK_REGEX.captures_at(self.text, self.pos)?;
            let whole = caps.get(0)?;
            let target = caps.get(1)?.as_str();

            if is_excluded_target(target) {
                // Matches start with '[', so +1 stays on a char boundary.
                self.pos = whole.start() + 1;
                continue;
            }

            self.pos = whole.end();
            return Some(target);
        }
        None
    }
}
