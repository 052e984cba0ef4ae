//! Test utilities for bc-core.
//!
//! - [`StubProbe`]: an in-memory pseudo-device tree
//! - static collaborators with canned answers
//! - fixture helpers for boot-info files

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::boxinfo::with_checksum;
use crate::collaborators::{DvbServices, ModuleCatalog, MultibootProvider};
use crate::probe::{EntryKind, FsProbe};

#[derive(Debug, Clone, PartialEq, Eq)]
enum StubEntry {
    File(String),
    Dir,
}

/// In-memory [`FsProbe`]. Parent directories of added entries exist implicitly.
#[derive(Debug, Clone, Default)]
pub struct StubProbe {
    entries: BTreeMap<String, StubEntry>,
}

impl StubProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.entries
            .insert(path.to_string(), StubEntry::File(content.to_string()));
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.entries.insert(path.to_string(), StubEntry::Dir);
        self
    }

    fn has_children(&self, path: &str) -> bool {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.entries.keys().any(|k| k.starts_with(&prefix))
    }

    fn kind_of(&self, path: &str) -> Option<EntryKind> {
        match self.entries.get(path) {
            Some(StubEntry::File(_)) => Some(EntryKind::File),
            Some(StubEntry::Dir) => Some(EntryKind::Dir),
            None if self.has_children(path) => Some(EntryKind::Dir),
            None => None,
        }
    }
}

impl FsProbe for StubProbe {
    fn exists_as(&self, path: &str, kind: EntryKind) -> bool {
        match self.kind_of(path) {
            Some(found) => kind == EntryKind::Any || kind == found,
            None => false,
        }
    }

    fn is_readable(&self, path: &str) -> bool {
        self.kind_of(path).is_some()
    }

    fn contains(&self, path: &str, needle: &str) -> bool {
        matches!(self.entries.get(path), Some(StubEntry::File(content)) if content.contains(needle))
    }

    fn is_present(&self, path: &str) -> bool {
        match self.entries.get(path) {
            Some(StubEntry::File(_)) => true,
            _ => self.has_children(path),
        }
    }

    fn list_dir(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .entries
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Module catalog with fixed contents per category.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    modules: BTreeMap<String, Vec<String>>,
}

impl StaticCatalog {
    pub fn with(mut self, category: &str, names: &[&str]) -> Self {
        self.modules.insert(
            category.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        self
    }
}

impl ModuleCatalog for StaticCatalog {
    fn installed(&self, _probe: &dyn FsProbe, category: &str) -> Vec<String> {
        self.modules.get(category).cloned().unwrap_or_default()
    }
}

/// Multiboot provider with fixed answers.
#[derive(Debug, Clone, Default)]
pub struct StaticMultiboot {
    device: Option<String>,
    slots: Vec<u32>,
}

impl StaticMultiboot {
    pub fn new(device: Option<&str>, slots: Vec<u32>) -> Self {
        Self {
            device: device.map(str::to_string),
            slots,
        }
    }
}

impl MultibootProvider for StaticMultiboot {
    fn startup_device(&self) -> Option<String> {
        self.device.clone()
    }

    fn slots(&self) -> Vec<u32> {
        self.slots.clone()
    }
}

/// DVB services with fixed answers.
#[derive(Debug, Clone)]
pub struct StaticDvb {
    pub ci_slots: usize,
    pub frontend_input_power: bool,
    pub output_12v: bool,
    pub debug_level: i64,
}

impl Default for StaticDvb {
    fn default() -> Self {
        Self {
            ci_slots: 0,
            frontend_input_power: false,
            output_12v: false,
            debug_level: crate::collaborators::DEFAULT_DEBUG_LEVEL,
        }
    }
}

impl StaticDvb {
    pub fn with_ci_slots(mut self, slots: usize) -> Self {
        self.ci_slots = slots;
        self
    }

    pub fn with_debug_level(mut self, level: i64) -> Self {
        self.debug_level = level;
        self
    }
}

impl DvbServices for StaticDvb {
    fn ci_slot_count(&self, _probe: &dyn FsProbe) -> usize {
        self.ci_slots
    }

    fn can_measure_frontend_input_power(&self) -> bool {
        self.frontend_input_power
    }

    fn has_12v_output(&self) -> bool {
        self.output_12v
    }

    fn debug_level(&self) -> i64 {
        self.debug_level
    }
}

/// Write `body` plus a correct checksum line to `<root>/usr/lib/enigma.info`.
pub fn write_boxinfo(root: &Path, body: &str) -> PathBuf {
    let path = root.join("usr/lib/enigma.info");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create boxinfo dir");
    }
    fs::write(&path, with_checksum(body)).expect("write boxinfo");
    path
}

/// Create `<root>/<device path>` with `content`, creating parents.
pub fn write_device_file(root: &Path, device_path: &str, content: &str) -> PathBuf {
    let path = root.join(device_path.trim_start_matches('/'));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create device dir");
    }
    fs::write(&path, content).expect("write device file");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_probe_implicit_dirs() {
        let probe = StubProbe::new()
            .with_file("/etc/init.d/softcam.oscam", "")
            .with_file("/etc/init.d/softcam.None", "")
            .with_dir("/proc/hisi");
        assert!(probe.exists_as("/etc/init.d", EntryKind::Dir));
        assert!(probe.exists_as("/etc/init.d/softcam.oscam", EntryKind::File));
        assert!(!probe.exists_as("/etc/init.d/softcam.oscam", EntryKind::Dir));
        assert!(!probe.is_present("/proc/hisi"));
        assert_eq!(
            probe.list_dir("/etc/init.d"),
            vec!["softcam.None", "softcam.oscam"]
        );
        assert_eq!(probe.list_dir("/etc"), vec!["init.d"]);
    }

    #[test]
    fn test_write_boxinfo_is_verified() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_boxinfo(dir.path(), "machine=testbox\n");
        let text = fs::read_to_string(path).unwrap();
        assert!(crate::boxinfo::parse_boxinfo(&text).checksum.is_verified());
    }
}
