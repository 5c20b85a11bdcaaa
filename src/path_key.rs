//! Path identity for documents and tree nodes.
//!
//! A `PathKey` keeps the path exactly as it was received (for display and
//! for handing back to the backend) and compares by a normalized form:
//! separators unified, repeated and trailing separators dropped, case folded.
//! Every map, set and prefix test in the crate goes through this type so the
//! same file is always the same key regardless of how the string was spelled.

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Both separator styles are accepted on input.
const SEPARATORS: [char; 2] = ['/', '\\'];

/// Display name used for documents without a backing file.
pub const UNTITLED_NAME: &str = "Untitled";

/// Prefix of placeholder keys for unsaved scratch documents.
const UNTITLED_PREFIX: &str = "untitled-";

// ─────────────────────────────────────────────────────────────────────────────
// PathKey
// ─────────────────────────────────────────────────────────────────────────────

/// A filesystem path with separator- and case-insensitive identity.
#[derive(Clone)]
pub struct PathKey {
    /// Trimmed input, shown to the user and passed to the backend
    raw: String,
    /// Comparison form: `/` separators, no trailing separator, lowercase
    key: String,
}

impl PathKey {
    /// Parse a path, returning `None` when it is empty or whitespace.
    pub fn parse(input: &str) -> Option<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return None;
        }
        Some(Self::build(raw.to_string()))
    }

    /// Build a key from a filesystem path.
    pub fn from_path(path: &Path) -> Option<Self> {
        Self::parse(&path.to_string_lossy())
    }

    /// Placeholder key for a scratch document, e.g. `untitled-1700000000000`.
    ///
    /// `attempt` disambiguates keys minted within the same millisecond.
    pub fn untitled(stamp_millis: u128, attempt: u32) -> Self {
        let raw = if attempt == 0 {
            format!("{}{}", UNTITLED_PREFIX, stamp_millis)
        } else {
            format!("{}{}-{}", UNTITLED_PREFIX, stamp_millis, attempt)
        };
        Self::build(raw)
    }

    fn build(raw: String) -> Self {
        let key = unify(&raw).to_lowercase();
        Self { raw, key }
    }

    /// The path as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The path as a `Path`, for filesystem access.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.raw)
    }

    /// The normalized comparison form.
    pub fn normalized(&self) -> &str {
        &self.key
    }

    /// Number of segments in the path.
    pub fn depth(&self) -> usize {
        self.key.split('/').filter(|s| !s.is_empty()).count()
    }

    /// The separator this path is written with.
    ///
    /// Backslash only when the path uses backslashes exclusively.
    pub fn separator(&self) -> char {
        if self.raw.contains('\\') && !self.raw.contains('/') {
            '\\'
        } else {
            '/'
        }
    }

    /// The parent directory, if the path has one.
    ///
    /// A separator at index 0 (e.g. `/notes`) yields `None`: the tree root is
    /// the highest ancestor a reveal walk ever needs.
    pub fn parent(&self) -> Option<PathKey> {
        let trimmed = self.raw.trim_end_matches(SEPARATORS);
        let last = trimmed.rfind(SEPARATORS)?;
        if last == 0 {
            return None;
        }
        let parent = trimmed[..last].trim_end_matches(SEPARATORS);
        PathKey::parse(parent)
    }

    /// The final path segment, used as the tab and tree label.
    pub fn file_name(&self) -> &str {
        let trimmed = self.raw.trim_end_matches(SEPARATORS);
        match trimmed.rfind(SEPARATORS) {
            Some(index) if index + 1 < trimmed.len() => &trimmed[index + 1..],
            _ if trimmed.is_empty() => &self.raw,
            _ => trimmed,
        }
    }

    /// Whether this is a scratch-document placeholder key.
    pub fn is_untitled(&self) -> bool {
        self.key.starts_with(UNTITLED_PREFIX) && !self.key.contains('/')
    }

    /// Whether this path equals `dir` or lies somewhere beneath it.
    pub fn is_same_or_within(&self, dir: &PathKey) -> bool {
        if self.key == dir.key {
            return true;
        }
        if dir.key == "/" {
            return self.key.starts_with('/');
        }
        self.key.len() > dir.key.len()
            && self.key.starts_with(&dir.key)
            && self.key.as_bytes()[dir.key.len()] == b'/'
    }

    /// Whether this path lies strictly beneath `dir`.
    pub fn is_within(&self, dir: &PathKey) -> bool {
        self != dir && self.is_same_or_within(dir)
    }

    /// Child path `self/name`, written with this path's separator.
    pub fn join(&self, name: &str) -> PathKey {
        let base = self.raw.trim_end_matches(SEPARATORS);
        Self::build(format!("{}{}{}", base, self.separator(), name.trim()))
    }

    /// Sibling path with the final segment replaced by `name`.
    pub fn with_file_name(&self, name: &str) -> PathKey {
        match self.parent() {
            Some(parent) => parent.join(name),
            None => {
                let trimmed = self.raw.trim_end_matches(SEPARATORS);
                match trimmed.rfind(SEPARATORS) {
                    Some(index) => {
                        Self::build(format!("{}{}", &trimmed[..=index], name.trim()))
                    }
                    None => Self::build(name.trim().to_string()),
                }
            }
        }
    }

    /// Move this path from under `old` to under `new`.
    ///
    /// Returns `None` when the path is neither `old` nor beneath it. The
    /// result is written entirely with `new`'s separator so a rewritten
    /// batch never mixes styles.
    pub fn rebase(&self, old: &PathKey, new: &PathKey) -> Option<PathKey> {
        if !self.is_same_or_within(old) {
            return None;
        }
        if self == old {
            return Some(new.clone());
        }

        let sep = new.separator();
        let unified_self = unify(&self.raw);
        let remainder: Vec<&str> = unified_self
            .split('/')
            .filter(|s| !s.is_empty())
            .skip(old.depth())
            .collect();

        let unified_new = unify(&new.raw);
        let leading = unified_new.starts_with('/');
        let mut segments: Vec<&str> = unified_new.split('/').filter(|s| !s.is_empty()).collect();
        segments.extend(remainder);

        let mut raw = String::new();
        if leading {
            raw.push(sep);
        }
        raw.push_str(&segments.join(&sep.to_string()));
        Some(Self::build(raw))
    }
}

/// Unify separators to `/`, collapse runs and drop trailing separators.
fn unify(raw: &str) -> String {
    let leading = raw.starts_with(SEPARATORS);
    let segments: Vec<&str> = raw.split(SEPARATORS).filter(|s| !s.is_empty()).collect();
    match (leading, segments.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", segments.join("/")),
        (false, _) => segments.join("/"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait implementations
// ─────────────────────────────────────────────────────────────────────────────

impl PartialEq for PathKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PathKey {}

impl Hash for PathKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathKey({:?})", self.raw)
    }
}

impl Serialize for PathKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for PathKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PathKey::parse(&raw).ok_or_else(|| de::Error::custom("path must not be empty"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn key(s: &str) -> PathKey {
        PathKey::parse(s).unwrap()
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(PathKey::parse("").is_none());
        assert!(PathKey::parse("   ").is_none());
        assert_eq!(key("  /notes/a.md ").as_str(), "/notes/a.md");
    }

    #[test]
    fn test_equality_ignores_separator_case_and_trailing() {
        assert_eq!(key("C:\\Notes\\Daily"), key("c:/notes/daily/"));
        assert_eq!(key("/notes//a.md"), key("/notes/a.md"));
        assert_ne!(key("/notes/a.md"), key("/notes/b.md"));
        assert_eq!(key("/").normalized(), "/");
    }

    #[test]
    fn test_display_keeps_original_spelling() {
        let k = key("C:\\Notes\\Daily.md");
        assert_eq!(k.to_string(), "C:\\Notes\\Daily.md");
        assert_eq!(k.normalized(), "c:/notes/daily.md");
    }

    #[test]
    fn test_hash_lookup_across_spellings() {
        let mut map = HashMap::new();
        map.insert(key("/Notes/A.md"), 1);
        assert_eq!(map.get(&key("\\notes\\a.md")), Some(&1));
    }

    #[test]
    fn test_parent_chain() {
        let k = key("/root/a/b/c.md");
        let b = k.parent().unwrap();
        assert_eq!(b.as_str(), "/root/a/b");
        assert_eq!(b.parent().unwrap().as_str(), "/root/a");
        assert_eq!(key("/root/a").parent().unwrap().as_str(), "/root");
        assert!(key("/root").parent().is_none());
        assert!(key("readme.md").parent().is_none());
        assert_eq!(key("C:\\notes\\x.md").parent().unwrap().as_str(), "C:\\notes");
        assert_eq!(key("/root/a/").parent().unwrap().as_str(), "/root");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(key("/notes/todo.md").file_name(), "todo.md");
        assert_eq!(key("C:\\notes\\todo.md").file_name(), "todo.md");
        assert_eq!(key("/notes/sub/").file_name(), "sub");
        assert_eq!(key("todo.md").file_name(), "todo.md");
    }

    #[test]
    fn test_within() {
        let dir = key("/notes/A");
        assert!(key("/notes/a/x.md").is_same_or_within(&dir));
        assert!(key("/notes/A").is_same_or_within(&dir));
        assert!(!key("/notes/A").is_within(&dir));
        assert!(!key("/notes/AB/x.md").is_same_or_within(&dir));
        assert!(key("\\notes\\a\\sub\\y.md").is_within(&dir));
        assert!(key("/anything").is_within(&key("/")));
    }

    #[test]
    fn test_rebase_directory_prefix() {
        let old = key("/notes/A");
        let new = key("/notes/B");
        assert_eq!(
            key("/notes/A/sub/y.md").rebase(&old, &new).unwrap().as_str(),
            "/notes/B/sub/y.md"
        );
        assert_eq!(key("/notes/a").rebase(&old, &new).unwrap().as_str(), "/notes/B");
        assert!(key("/notes/C/z.md").rebase(&old, &new).is_none());
    }

    #[test]
    fn test_rebase_uses_single_separator() {
        let old = key("C:\\notes\\a");
        let new = key("C:\\notes\\b");
        let moved = key("c:/notes/a/sub/y.md").rebase(&old, &new).unwrap();
        assert_eq!(moved.as_str(), "C:\\notes\\b\\sub\\y.md");
    }

    #[test]
    fn test_join_and_with_file_name() {
        assert_eq!(key("/notes").join("new.md").as_str(), "/notes/new.md");
        assert_eq!(key("C:\\notes").join("new.md").as_str(), "C:\\notes\\new.md");
        assert_eq!(key("/").join("top.md").as_str(), "/top.md");
        assert_eq!(
            key("/notes/old.md").with_file_name("new.md").as_str(),
            "/notes/new.md"
        );
        assert_eq!(key("/old.md").with_file_name("new.md").as_str(), "/new.md");
    }

    #[test]
    fn test_untitled_keys() {
        let a = PathKey::untitled(123, 0);
        let b = PathKey::untitled(123, 1);
        assert_eq!(a.as_str(), "untitled-123");
        assert_eq!(b.as_str(), "untitled-123-1");
        assert!(a.is_untitled());
        assert!(!key("/notes/untitled-1.md").is_untitled());
        assert!(a.parent().is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let k = key("/notes/a.md");
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, "\"/notes/a.md\"");
        let back: PathKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, k);
        assert!(serde_json::from_str::<PathKey>("\"  \"").is_err());
    }
}
