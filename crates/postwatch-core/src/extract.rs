//! Latest-post detection over unstructured page content.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Handle, PostId};

fn any_status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/status(?:es)?/([0-9]+)").expect("valid regex"))
}

fn handle_status_re(handle: &Handle) -> Option<Regex> {
    let pattern = format!(
        r"(?i)/{}/status(?:es)?/([0-9]+)",
        regex::escape(handle.as_str())
    );
    Regex::new(&pattern).ok()
}

/// Largest post id captured by `re` in `text`. Unparseable captures are skipped.
fn max_id(re: &Regex, text: &str) -> Option<PostId> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| PostId::parse(m.as_str()))
        .max()
}

/// Return the newest post id referenced in `text`.
///
/// With a handle, links to that account's posts are preferred; any other
/// `/status/<id>` reference is only considered when the account has none on the page
/// (promoted or quoted posts would otherwise win). Once the account's links match,
/// only they decide, even if none of their ids parse.
pub fn latest_post_id(text: &str, handle: Option<&Handle>) -> Option<PostId> {
    if let Some(re) = handle.and_then(handle_status_re) {
        if re.is_match(text) {
            return max_id(&re, text);
        }
    }
    max_id(any_status_re(), text)
}
