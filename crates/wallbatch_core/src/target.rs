use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Separators tried in priority order; the first one present in the input wins.
const SEPARATORS: [char; 5] = [',', ';', '\n', ' ', '|'];

static URL_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("static regex"));

// The tail after `_<postId>` keeps query strings such as `?reply=5` but never
// a separator, so extracted targets survive being joined and re-extracted.
static WALL_POST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://vk\.com/wall(-?\d+)_(\d+)[^\s,;|]*").expect("static regex")
});

static COMMUNITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://vk\.com/([A-Za-z0-9_.]+)[^\s,;|]*").expect("static regex")
});

/// What a batch operation acts upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// `https://vk.com/wall<ownerId>_<postId>`, owner id optionally negative.
    WallPost,
    /// `https://vk.com/<screen_name>` of a public page or group.
    Community,
}

impl TargetKind {
    fn find(self, candidate: &str) -> Option<String> {
        match self {
            TargetKind::WallPost => WALL_POST.find(candidate).map(|m| m.as_str().to_string()),
            TargetKind::Community => COMMUNITY
                .find(candidate)
                .map(|m| m.as_str().to_string())
                .filter(|url| !WALL_POST.is_match(url)),
        }
    }
}

/// One validated target identifier. Only constructed by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extracts wall-post targets from free-form text.
pub fn extract_targets(raw: &str) -> Vec<Target> {
    extract_targets_for(TargetKind::WallPost, raw)
}

/// Extracts targets of `kind` from free-form text.
///
/// Deterministic and free of side effects: invalid candidates are dropped
/// silently, duplicates keep their first position.
pub fn extract_targets_for(kind: TargetKind, raw: &str) -> Vec<Target> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    split_candidates(raw)
        .into_iter()
        .filter_map(|candidate| kind.find(candidate))
        .filter(|target| seen.insert(target.clone()))
        .map(Target)
        .collect()
}

/// Renders targets back into text accepted by [`extract_targets_for`].
pub fn render_targets(targets: &[Target]) -> String {
    targets
        .iter()
        .map(Target::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_candidates(raw: &str) -> Vec<&str> {
    let split = SEPARATORS
        .iter()
        .find(|sep| raw.contains(**sep))
        .map(|sep| {
            raw.split(*sep)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if split.is_empty() {
        URL_LIKE.find_iter(raw).map(|m| m.as_str()).collect()
    } else {
        split
    }
}
