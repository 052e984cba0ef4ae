//! Filesystem probe facade.
//!
//! Derivations ask yes/no questions about the pseudo-device tree (procfs,
//! sysfs, /dev). A missing path is always a plain negative answer; no probe
//! ever returns an error.

use std::fs;
use std::path::{Path, PathBuf};

use bc_config::resolve::reroot;
use tracing::{trace, warn};

/// Upper bound for indexed instance enumeration.
pub const MAX_INSTANCES: usize = 64;

/// Kind of filesystem entry a probe requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Any,
    File,
    Dir,
}

/// Read-only filesystem queries.
pub trait FsProbe {
    /// Does the path exist (any kind)?
    fn exists(&self, path: &str) -> bool {
        self.exists_as(path, EntryKind::Any)
    }

    /// Does the path exist with the given kind?
    fn exists_as(&self, path: &str, kind: EntryKind) -> bool;

    /// Does the path exist with read permission? The entry is never opened.
    fn is_readable(&self, path: &str) -> bool;

    /// Is the path a regular file containing `needle`? False when missing.
    fn contains(&self, path: &str, needle: &str) -> bool;

    /// Is the path a non-empty directory, or any non-directory entry?
    fn is_present(&self, path: &str) -> bool;

    /// Entry names of a directory, sorted. Empty when missing.
    fn list_dir(&self, path: &str) -> Vec<String>;
}

/// Count consecutive instances of a path template.
///
/// `{}` in `template` is replaced with 0, 1, 2, ... until `check` fails.
pub fn count_indexed<F>(probe: &dyn FsProbe, template: &str, check: F) -> usize
where
    F: Fn(&dyn FsProbe, &str) -> bool,
{
    count_indexed_from(probe, template, 0, check)
}

/// Like [`count_indexed`], starting at `start`. Returns the first failing index.
pub fn count_indexed_from<F>(probe: &dyn FsProbe, template: &str, start: usize, check: F) -> usize
where
    F: Fn(&dyn FsProbe, &str) -> bool,
{
    let limit = start + MAX_INSTANCES;
    let mut index = start;
    while index < limit {
        let path = instance_path(template, index);
        if !check(probe, &path) {
            break;
        }
        index += 1;
    }
    if index == limit {
        warn!(
            template,
            start,
            limit = MAX_INSTANCES,
            "instance enumeration hit its bound; remaining instances ignored"
        );
    }
    trace!(template, start, end = index, "counted instances");
    index
}

/// Substitute an instance index into a path template.
pub fn instance_path(template: &str, index: usize) -> String {
    template.replace("{}", &index.to_string())
}

/// Probe against the real filesystem, with every absolute path re-rooted.
#[derive(Debug, Clone)]
pub struct RootedFs {
    root: PathBuf,
}

impl Default for RootedFs {
    fn default() -> Self {
        Self::new("/")
    }
}

impl RootedFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        reroot(&self.root, Path::new(path))
    }
}

impl FsProbe for RootedFs {
    fn exists_as(&self, path: &str, kind: EntryKind) -> bool {
        match fs::metadata(self.resolve(path)) {
            Ok(meta) => match kind {
                EntryKind::Any => true,
                EntryKind::File => meta.is_file(),
                EntryKind::Dir => meta.is_dir(),
            },
            Err(_) => false,
        }
    }

    fn is_readable(&self, path: &str) -> bool {
        has_read_access(&self.resolve(path))
    }

    fn contains(&self, path: &str, needle: &str) -> bool {
        let resolved = self.resolve(path);
        // Device nodes and FIFOs are never read.
        let regular = fs::metadata(&resolved).is_ok_and(|meta| meta.is_file());
        let hit = regular
            && fs::read(&resolved)
                .map(|bytes| String::from_utf8_lossy(&bytes).contains(needle))
                .unwrap_or(false);
        trace!(path, needle, hit, "content probe");
        hit
    }

    fn is_present(&self, path: &str) -> bool {
        let resolved = self.resolve(path);
        match fs::symlink_metadata(&resolved) {
            Ok(meta) if meta.is_dir() => fs::read_dir(&resolved)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false),
            Ok(_) => true,
            Err(_) => false,
        }
    }

    fn list_dir(&self, path: &str) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(self.resolve(path)) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

/// Permission check via access(2). Opening the entry could block on a FIFO
/// or wake a device driver.
#[cfg(unix)]
fn has_read_access(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    let result = unsafe { libc::access(c_path.as_ptr(), libc::R_OK) };
    result == 0
}

#[cfg(not(unix))]
fn has_read_access(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, RootedFs) {
        let dir = TempDir::new().unwrap();
        let probe = RootedFs::new(dir.path());
        (dir, probe)
    }

    fn touch(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path.trim_start_matches('/'));
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    #[test]
    fn test_missing_paths_are_negative() {
        let (_dir, probe) = fixture();
        assert!(!probe.exists("/proc/stb/fp/fan"));
        assert!(!probe.exists_as("/proc/stb/fp/fan", EntryKind::File));
        assert!(!probe.is_readable("/proc/stb/fp/fan"));
        assert!(!probe.contains("/proc/stb/fp/fan", "on"));
        assert!(!probe.is_present("/proc/hisi"));
        assert!(probe.list_dir("/etc/init.d").is_empty());
    }

    #[test]
    fn test_kinds_and_content() {
        let (dir, probe) = fixture();
        touch(&dir, "/proc/stb/audio/ac3_choices", "downmix passthrough");
        fs::create_dir_all(dir.path().join("proc/stb/encoder/0")).unwrap();

        assert!(probe.exists_as("/proc/stb/audio/ac3_choices", EntryKind::File));
        assert!(!probe.exists_as("/proc/stb/audio", EntryKind::File));
        assert!(probe.exists_as("/proc/stb/audio", EntryKind::Dir));
        assert!(probe.is_readable("/proc/stb/audio/ac3_choices"));
        assert!(probe.contains("/proc/stb/audio/ac3_choices", "downmix"));
        assert!(!probe.contains("/proc/stb/audio/ac3_choices", "force_ac3"));
        assert!(probe.exists("/proc/stb/encoder/0"));
    }

    #[test]
    fn test_is_present_requires_non_empty_dir() {
        let (dir, probe) = fixture();
        fs::create_dir_all(dir.path().join("proc/hisi")).unwrap();
        assert!(!probe.is_present("/proc/hisi"));
        touch(&dir, "/proc/hisi/info", "");
        assert!(probe.is_present("/proc/hisi"));
        assert!(probe.is_present("/proc/hisi/info"));
    }

    #[test]
    fn test_count_indexed_stops_at_first_gap() {
        let (dir, probe) = fixture();
        for i in [0, 1, 2, 4] {
            touch(&dir, &format!("/dev/dvb/adapter0/video{}", i), "");
        }
        let n = count_indexed(&probe, "/dev/dvb/adapter0/video{}", |p, path| {
            p.exists_as(path, EntryKind::File)
        });
        assert_eq!(n, 3);
    }

    #[test]
    fn test_count_indexed_is_bounded() {
        struct Everything;
        impl FsProbe for Everything {
            fn exists_as(&self, _: &str, _: EntryKind) -> bool {
                true
            }
            fn is_readable(&self, _: &str) -> bool {
                true
            }
            fn contains(&self, _: &str, _: &str) -> bool {
                true
            }
            fn is_present(&self, _: &str) -> bool {
                true
            }
            fn list_dir(&self, _: &str) -> Vec<String> {
                Vec::new()
            }
        }
        let n = count_indexed(&Everything, "/dev/ci{}", |p, path| p.exists(path));
        assert_eq!(n, MAX_INSTANCES);
    }

    #[cfg(unix)]
    fn mkfifo(dir: &TempDir, path: &str) {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let full = dir.path().join(path.trim_start_matches('/'));
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        let c_path = CString::new(full.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) }, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_is_readable_without_blocking() {
        use std::sync::mpsc;
        use std::time::Duration;

        let (dir, probe) = fixture();
        mkfifo(&dir, "/proc/stb/fp/fan");

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let readable = probe.is_readable("/proc/stb/fp/fan");
            let contains = probe.contains("/proc/stb/fp/fan", "auto");
            let _ = tx.send((readable, contains));
        });
        let (readable, contains) = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("probes on a FIFO must not block");
        assert!(readable);
        assert!(!contains);
        drop(dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_device_nodes_count_as_instances() {
        let (dir, probe) = fixture();
        let adapter = dir.path().join("dev/dvb/adapter0");
        fs::create_dir_all(&adapter).unwrap();
        for i in 0..2 {
            std::os::unix::fs::symlink("/dev/null", adapter.join(format!("video{}", i))).unwrap();
        }

        assert!(probe.exists("/dev/dvb/adapter0/video0"));
        assert!(!probe.exists_as("/dev/dvb/adapter0/video0", EntryKind::File));
        assert!(probe.is_readable("/dev/dvb/adapter0/video1"));
        let n = count_indexed(&probe, "/dev/dvb/adapter0/video{}", |p, path| p.exists(path));
        assert_eq!(n, 2);
    }

    #[test]
    fn test_list_dir_sorted() {
        let (dir, probe) = fixture();
        touch(&dir, "/etc/init.d/softcam.oscam", "");
        touch(&dir, "/etc/init.d/softcam.None", "");
        touch(&dir, "/etc/init.d/networking", "");
        assert_eq!(
            probe.list_dir("/etc/init.d"),
            vec!["networking", "softcam.None", "softcam.oscam"]
        );
    }
}
