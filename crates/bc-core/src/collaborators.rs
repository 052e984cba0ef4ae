//! Injected collaborators.
//!
//! Derivation steps never talk to the DVB stack, the softcam manager or the
//! multiboot tooling directly; they go through these traits so the engine can
//! run against static answers in tests.

use std::fmt;

use crate::probe::{count_indexed, FsProbe};

/// Env var carrying the runtime debug level.
pub const ENV_DEBUG_LEVEL: &str = "ENIGMA_DEBUG_LVL";

/// Default debug level when the env var is absent or unparsable.
pub const DEFAULT_DEBUG_LEVEL: i64 = 3;

/// Enumerates installed optional software modules by category.
pub trait ModuleCatalog {
    /// Installed module names of `category` (e.g. `softcam`).
    fn installed(&self, probe: &dyn FsProbe, category: &str) -> Vec<String>;
}

/// Lists `/etc/init.d/<category>.*` scripts, ignoring the `<category>.None`
/// placeholder.
#[derive(Debug, Clone)]
pub struct InitScriptCatalog {
    dir: String,
}

impl Default for InitScriptCatalog {
    fn default() -> Self {
        Self {
            dir: "/etc/init.d".to_string(),
        }
    }
}

impl InitScriptCatalog {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ModuleCatalog for InitScriptCatalog {
    fn installed(&self, probe: &dyn FsProbe, category: &str) -> Vec<String> {
        let prefix = format!("{}.", category);
        probe
            .list_dir(&self.dir)
            .into_iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .filter(|name| !name.is_empty() && name != "None")
            .collect()
    }
}

/// Multiboot slot discovery.
pub trait MultibootProvider {
    /// Device holding the multiboot startup files, if any.
    fn startup_device(&self) -> Option<String>;

    /// Available boot slot numbers.
    fn slots(&self) -> Vec<u32>;
}

/// Single-image box.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMultiboot;

impl MultibootProvider for NoMultiboot {
    fn startup_device(&self) -> Option<String> {
        None
    }

    fn slots(&self) -> Vec<u32> {
        Vec::new()
    }
}

/// Answers owned by the DVB runtime.
pub trait DvbServices {
    /// Number of common-interface slots.
    fn ci_slot_count(&self, probe: &dyn FsProbe) -> usize;

    fn can_measure_frontend_input_power(&self) -> bool;

    fn has_12v_output(&self) -> bool;

    /// Runtime debug level; 4 and above counts as debug mode.
    fn debug_level(&self) -> i64;
}

/// DVB answers derived from device nodes and the environment.
#[derive(Debug, Clone, Default)]
pub struct ProbedDvbServices {
    pub frontend_input_power: bool,
    pub output_12v: bool,
}

impl DvbServices for ProbedDvbServices {
    fn ci_slot_count(&self, probe: &dyn FsProbe) -> usize {
        count_indexed(probe, "/dev/ci{}", |p, path| p.exists(path))
    }

    fn can_measure_frontend_input_power(&self) -> bool {
        self.frontend_input_power
    }

    fn has_12v_output(&self) -> bool {
        self.output_12v
    }

    fn debug_level(&self) -> i64 {
        std::env::var(ENV_DEBUG_LEVEL)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_DEBUG_LEVEL)
    }
}

/// The collaborator set handed to the engine.
pub struct Collaborators {
    pub modules: Box<dyn ModuleCatalog>,
    pub multiboot: Box<dyn MultibootProvider>,
    pub dvb: Box<dyn DvbServices>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            modules: Box::new(InitScriptCatalog::default()),
            multiboot: Box::new(NoMultiboot),
            dvb: Box::new(ProbedDvbServices::default()),
        }
    }
}

impl Collaborators {
    pub fn with_modules(mut self, modules: impl ModuleCatalog + 'static) -> Self {
        self.modules = Box::new(modules);
        self
    }

    pub fn with_multiboot(mut self, multiboot: impl MultibootProvider + 'static) -> Self {
        self.multiboot = Box::new(multiboot);
        self
    }

    pub fn with_dvb(mut self, dvb: impl DvbServices + 'static) -> Self {
        self.dvb = Box::new(dvb);
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::RootedFs;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_init_script_catalog_skips_placeholder() {
        let dir = TempDir::new().unwrap();
        let initd = dir.path().join("etc/init.d");
        fs::create_dir_all(&initd).unwrap();
        for name in ["softcam.None", "softcam.oscam", "softcam.ncam", "networking", "softcam."] {
            fs::write(initd.join(name), "").unwrap();
        }
        let probe = RootedFs::new(dir.path());
        let catalog = InitScriptCatalog::default();
        assert_eq!(catalog.installed(&probe, "softcam"), vec!["ncam", "oscam"]);
        assert!(catalog.installed(&probe, "cardserver").is_empty());
    }

    #[test]
    fn test_probed_ci_slots() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dev")).unwrap();
        fs::write(dir.path().join("dev/ci0"), "").unwrap();
        fs::write(dir.path().join("dev/ci1"), "").unwrap();
        let probe = RootedFs::new(dir.path());
        assert_eq!(ProbedDvbServices::default().ci_slot_count(&probe), 2);
    }

    #[test]
    fn test_no_multiboot() {
        assert_eq!(NoMultiboot.startup_device(), None);
        assert!(NoMultiboot.slots().is_empty());
    }
}
