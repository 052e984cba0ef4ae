//! Boot-information store.
//!
//! Two layers:
//! - a frozen layer built from the boot-information file (plus `checksum`),
//!   replaced wholesale on every forced change and never mutated in place
//! - a mutable overlay for runtime additions
//!
//! Frozen keys can only be changed or removed with a [`ForceOverride`] token.

mod parse;

pub use parse::{md5_hex, parse_boxinfo, with_checksum, ChecksumStatus, ParsedBoxInfo, CHECKSUM_PREFIX};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bc_common::Value;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::registry::CapabilityRegistry;

/// Key holding the checksum verdict.
pub const CHECKSUM_KEY: &str = "checksum";

/// Key holding the model identifier.
pub const MODEL_KEY: &str = "machine";

/// Model identifier used when the store has none.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Frozen layer snapshot.
pub type FrozenLayer = Arc<BTreeMap<String, Value>>;

/// Layer a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Frozen,
    Overlay,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Frozen => write!(f, "frozen"),
            Source::Overlay => write!(f, "overlay"),
        }
    }
}

/// Permission to change or remove frozen entries.
#[derive(Debug)]
pub struct ForceOverride {
    _private: (),
}

impl ForceOverride {
    pub fn grant() -> Self {
        Self { _private: () }
    }
}

/// Rejected mutation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Change,
    Delete,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Change => write!(f, "changed"),
            Mutation::Delete => write!(f, "deleted"),
        }
    }
}

/// Store mutation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoxInfoError {
    #[error("item '{key}' is immutable and can not be {mutation}")]
    ImmutableViolation { key: String, mutation: Mutation },

    #[error("item '{0}' not found")]
    NotFound(String),
}

impl From<BoxInfoError> for bc_common::Error {
    fn from(err: BoxInfoError) -> Self {
        match err {
            BoxInfoError::ImmutableViolation { key, .. } => bc_common::Error::Immutable(key),
            BoxInfoError::NotFound(key) => bc_common::Error::NotFound(key),
        }
    }
}

/// One entry as reported by [`BoxInfo::entries`].
#[derive(Debug, Clone, Serialize)]
pub struct Entry<'a> {
    pub key: &'a str,
    pub value: &'a Value,
    pub source: Source,
}

/// The boot-information store.
#[derive(Debug, Clone)]
pub struct BoxInfo {
    frozen: FrozenLayer,
    overlay: BTreeMap<String, Value>,
    checksum: ChecksumStatus,
    path: Option<PathBuf>,
}

impl Default for BoxInfo {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoxInfo {
    /// A store with no file behind it: only `checksum = None`.
    pub fn empty() -> Self {
        Self::from_parsed(ParsedBoxInfo {
            entries: BTreeMap::new(),
            checksum: ChecksumStatus::Missing,
        })
    }

    /// Load from a file. A missing or unreadable file is reported and yields [`BoxInfo::empty`].
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "boot information file is not available; the system is unlikely to boot or operate correctly"
                );
                return Self::empty();
            }
        };

        let mut store = Self::from_text(&String::from_utf8_lossy(&bytes));
        store.path = Some(path.to_path_buf());

        match &store.checksum {
            ChecksumStatus::Verified => {
                info!(path = %path.display(), entries = store.frozen.len() - 1, "boot information loaded")
            }
            ChecksumStatus::Mismatch { expected, computed } => warn!(
                path = %path.display(),
                expected = %expected,
                computed = %computed,
                "boot information loaded, but checksum failed"
            ),
            ChecksumStatus::Missing => warn!(
                path = %path.display(),
                "boot information loaded, but it has no checksum line"
            ),
        }
        store
    }

    /// Build from boot-info text.
    pub fn from_text(text: &str) -> Self {
        Self::from_parsed(parse_boxinfo(text))
    }

    pub fn from_parsed(parsed: ParsedBoxInfo) -> Self {
        let mut frozen = parsed.entries;
        frozen.insert(CHECKSUM_KEY.to_string(), parsed.checksum.as_value());
        Self {
            frozen: Arc::new(frozen),
            overlay: BTreeMap::new(),
            checksum: parsed.checksum,
            path: None,
        }
    }

    pub fn checksum(&self) -> &ChecksumStatus {
        &self.checksum
    }

    /// File the store was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up a key in the frozen layer, then the overlay.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frozen.get(name).or_else(|| self.overlay.get(name))
    }

    /// Full lookup: frozen layer, overlay, capability registry, then `default`.
    pub fn get_item(
        &self,
        name: &str,
        fallback: Option<&CapabilityRegistry>,
        default: Value,
    ) -> Value {
        self.get(name)
            .or_else(|| fallback.and_then(|registry| registry.get(name)))
            .cloned()
            .unwrap_or(default)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Truthiness of a key; absent keys are false.
    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).is_some_and(Value::is_truthy)
    }

    /// The model identifier, or [`UNKNOWN_MODEL`].
    pub fn model(&self) -> String {
        match self.get(MODEL_KEY) {
            Some(Value::Str(s)) => s.clone(),
            Some(Value::None) | None => UNKNOWN_MODEL.to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn source_of(&self, name: &str) -> Option<Source> {
        if self.frozen.contains_key(name) {
            Some(Source::Frozen)
        } else if self.overlay.contains_key(name) {
            Some(Source::Overlay)
        } else {
            None
        }
    }

    /// Set a value in `target`.
    ///
    /// Frozen keys need `force`. Writing a frozen key into the overlay moves it
    /// there, so later reads see the new value.
    pub fn set_item(
        &mut self,
        name: &str,
        value: Value,
        target: Source,
        force: Option<&ForceOverride>,
    ) -> Result<(), BoxInfoError> {
        let frozen = self.frozen.contains_key(name);
        if frozen && force.is_none() {
            warn!(key = name, "item is immutable and can not be changed");
            return Err(BoxInfoError::ImmutableViolation {
                key: name.to_string(),
                mutation: Mutation::Change,
            });
        }

        debug!(key = name, value = %value, layer = %target, forced = force.is_some(), "set item");
        match target {
            Source::Frozen => {
                self.overlay.remove(name);
                self.replace_frozen(|layer| {
                    layer.insert(name.to_string(), value);
                });
            }
            Source::Overlay => {
                if frozen {
                    self.replace_frozen(|layer| {
                        layer.remove(name);
                    });
                }
                self.overlay.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Remove a key, returning its value.
    ///
    /// Frozen keys need `force`; overlay keys are removed unconditionally.
    pub fn delete_item(
        &mut self,
        name: &str,
        force: Option<&ForceOverride>,
    ) -> Result<Value, BoxInfoError> {
        if let Some(current) = self.frozen.get(name).cloned() {
            if force.is_none() {
                warn!(key = name, "item is immutable and can not be deleted");
                return Err(BoxInfoError::ImmutableViolation {
                    key: name.to_string(),
                    mutation: Mutation::Delete,
                });
            }
            debug!(key = name, "delete frozen item");
            self.replace_frozen(|layer| {
                layer.remove(name);
            });
            return Ok(current);
        }

        self.overlay
            .remove(name)
            .ok_or_else(|| BoxInfoError::NotFound(name.to_string()))
    }

    /// Sorted frozen-layer keys.
    pub fn frozen_keys(&self) -> Vec<String> {
        self.frozen.keys().cloned().collect()
    }

    /// Sorted union of frozen and overlay keys.
    pub fn keys(&self) -> Vec<String> {
        self.frozen
            .keys()
            .chain(self.overlay.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Current frozen layer. The snapshot never changes after it is handed out.
    pub fn frozen_snapshot(&self) -> FrozenLayer {
        Arc::clone(&self.frozen)
    }

    /// All entries sorted by key, with their layer.
    pub fn entries(&self) -> Vec<Entry<'_>> {
        let mut entries: Vec<Entry<'_>> = self
            .frozen
            .iter()
            .map(|(key, value)| Entry {
                key,
                value,
                source: Source::Frozen,
            })
            .chain(self.overlay.iter().map(|(key, value)| Entry {
                key,
                value,
                source: Source::Overlay,
            }))
            .collect();
        entries.sort_by(|a, b| a.key.cmp(b.key));
        entries
    }

    fn replace_frozen<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut BTreeMap<String, Value>),
    {
        let mut next = (*self.frozen).clone();
        edit(&mut next);
        self.frozen = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> BoxInfo {
        BoxInfo::from_text(&with_checksum("machine=testbox\nbrand=Test\nrctype=21\n"))
    }

    #[test]
    fn test_empty_store_has_unknown_checksum() {
        let store = BoxInfo::empty();
        assert_eq!(store.get(CHECKSUM_KEY), Some(&Value::None));
        assert_eq!(store.frozen_keys(), vec![CHECKSUM_KEY.to_string()]);
        assert_eq!(store.model(), UNKNOWN_MODEL);
    }

    #[test]
    fn test_frozen_key_rejects_unforced_change() {
        let mut store = store();
        let err = store
            .set_item("machine", Value::from("other"), Source::Overlay, None)
            .unwrap_err();
        assert_eq!(
            err,
            BoxInfoError::ImmutableViolation {
                key: "machine".to_string(),
                mutation: Mutation::Change,
            }
        );
        assert_eq!(store.model(), "testbox");
        assert_eq!(err.to_string(), "item 'machine' is immutable and can not be changed");
    }

    #[test]
    fn test_forced_change_into_either_layer() {
        let force = ForceOverride::grant();

        let mut store = store();
        store
            .set_item("machine", Value::from("a"), Source::Frozen, Some(&force))
            .unwrap();
        assert_eq!(store.model(), "a");
        assert_eq!(store.source_of("machine"), Some(Source::Frozen));

        let mut store = self::store();
        store
            .set_item("machine", Value::from("b"), Source::Overlay, Some(&force))
            .unwrap();
        assert_eq!(store.model(), "b");
        assert_eq!(store.source_of("machine"), Some(Source::Overlay));
        assert!(!store.frozen_keys().contains(&"machine".to_string()));
    }

    #[test]
    fn test_overlay_is_freely_mutable() {
        let mut store = store();
        store.set_item("skin", Value::from("x"), Source::Overlay, None).unwrap();
        store.set_item("skin", Value::from("y"), Source::Overlay, None).unwrap();
        assert_eq!(store.get_str("skin"), Some("y"));
        assert_eq!(store.delete_item("skin", None), Ok(Value::from("y")));
        assert_eq!(
            store.delete_item("skin", None),
            Err(BoxInfoError::NotFound("skin".to_string()))
        );
    }

    #[test]
    fn test_promote_to_frozen() {
        let mut store = store();
        store.set_item("skin", Value::from("x"), Source::Overlay, None).unwrap();
        store.set_item("skin", Value::from("z"), Source::Frozen, None).unwrap();
        assert_eq!(store.source_of("skin"), Some(Source::Frozen));
        assert!(store
            .set_item("skin", Value::from("w"), Source::Overlay, None)
            .is_err());
    }

    #[test]
    fn test_delete_frozen_requires_force() {
        let mut store = store();
        assert!(matches!(
            store.delete_item("brand", None),
            Err(BoxInfoError::ImmutableViolation {
                mutation: Mutation::Delete,
                ..
            })
        ));
        assert_eq!(store.get_str("brand"), Some("Test"));

        let force = ForceOverride::grant();
        assert_eq!(store.delete_item("brand", Some(&force)), Ok(Value::from("Test")));
        assert_eq!(store.get("brand"), None);
    }

    #[test]
    fn test_snapshots_are_never_mutated() {
        let mut store = store();
        let before = store.frozen_snapshot();
        let force = ForceOverride::grant();
        store
            .set_item("machine", Value::from("new"), Source::Frozen, Some(&force))
            .unwrap();
        assert_eq!(before.get("machine"), Some(&Value::from("testbox")));
        assert_eq!(store.frozen_snapshot().get("machine"), Some(&Value::from("new")));
    }

    #[test]
    fn test_get_item_precedence() {
        let mut store = store();
        let mut registry = CapabilityRegistry::new();
        registry.set("Fan", true);
        registry.set("brand", "registry");
        store.set_item("extra", Value::Int(1), Source::Overlay, None).unwrap();

        assert_eq!(store.get_item("brand", Some(&registry), Value::None), Value::from("Test"));
        assert_eq!(store.get_item("extra", Some(&registry), Value::None), Value::Int(1));
        assert_eq!(store.get_item("Fan", Some(&registry), Value::None), Value::Bool(true));
        assert_eq!(store.get_item("Fan", None, Value::Int(7)), Value::Int(7));
        assert_eq!(
            store.get_item("nope", Some(&registry), Value::from("d")),
            Value::from("d")
        );
    }

    #[test]
    fn test_key_listings_sorted() {
        let mut store = store();
        store.set_item("aaa", Value::Int(1), Source::Overlay, None).unwrap();
        assert_eq!(
            store.frozen_keys(),
            vec!["brand", "checksum", "machine", "rctype"]
        );
        assert_eq!(
            store.keys(),
            vec!["aaa", "brand", "checksum", "machine", "rctype"]
        );
        let entries = store.entries();
        assert_eq!(entries[0].key, "aaa");
        assert_eq!(entries[0].source, Source::Overlay);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = BoxInfo::load(&dir.path().join("enigma.info"));
        assert_eq!(store.checksum(), &ChecksumStatus::Missing);
        assert!(store.path().is_none());
        assert_eq!(store.frozen_keys(), vec!["checksum"]);
    }
}
