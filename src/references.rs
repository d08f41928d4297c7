//! Finds Plane issue references in pull request text.
//!
//! Two kinds of references are recognized:
//!
//! - Links to an issue on the configured Plane instance, such as
//!   `https://plane.example.com/aoc/browse/WEB-39/`.
//! - Bare identifiers such as `WEB-39` appearing as a whole token, meaning
//!   neither neighbor is an ASCII letter or digit. `WEB-39_notes` and
//!   `(WEB-39)` count, `xWEB-39` and `WEB-39a` do not.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;

static BARE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]+-[0-9]+").unwrap());

/// A short, human readable issue identifier like `WEB-102`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    pub fn new(id: impl Into<String>) -> Self {
        IssueId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceExtractor {
    link_re: Regex,
}

impl ReferenceExtractor {
    /// Builds an extractor for links of the form `<base_url>/<workspace>/browse/<ID>/`.
    ///
    /// Both values are matched literally.
    pub fn new(base_url: &str, workspace: &str) -> anyhow::Result<Self> {
        let pattern = format!(
            r"{}/{}/browse/([A-Z]+-[0-9]+)(?:/|\b)",
            regex::escape(base_url.trim_end_matches('/')),
            regex::escape(workspace),
        );
        let link_re = Regex::new(&pattern)
            .with_context(|| format!("invalid issue link pattern {pattern:?}"))?;
        Ok(ReferenceExtractor { link_re })
    }

    /// Returns every issue identifier referenced in `text`.
    pub fn extract(&self, text: &str) -> BTreeSet<IssueId> {
        let linked = self
            .link_re
            .captures_iter(text)
            .map(|caps| IssueId::new(&caps[1]));
        let bare = BARE_ID_RE
            .find_iter(text)
            .filter(|m| is_whole_token(text, m.start(), m.end()))
            .map(|m| IssueId::new(m.as_str()));
        linked.chain(bare).collect()
    }
}

fn is_whole_token(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_alphanumeric())
        && !after.is_some_and(|c| c.is_ascii_alphanumeric())
}
