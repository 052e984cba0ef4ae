//! Platform path resolution.
//!
//! Resolution order: CLI arguments → environment variables → config directories → defaults.
//!
//! Device paths (boot-info file, kernel command line, plugin directory) are
//! absolute paths on the box and are always looked up under the probe root.
//! The model-table override is a host path.

use std::path::{Path, PathBuf};

/// Where a path came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/boxcaps/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for PathSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSource::CliArgument => write!(f, "CLI argument"),
            PathSource::Environment => write!(f, "environment variable"),
            PathSource::XdgConfig => write!(f, "XDG config"),
            PathSource::SystemConfig => write!(f, "system config"),
            PathSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_ROOT: &str = "BOXCAPS_ROOT";
pub const ENV_BOXINFO: &str = "BOXCAPS_BOXINFO";
pub const ENV_CMDLINE: &str = "BOXCAPS_CMDLINE";
pub const ENV_MODELS: &str = "BOXCAPS_MODELS";
pub const ENV_CONFIG_DIR: &str = "BOXCAPS_CONFIG_DIR";

/// Default device paths.
pub const DEFAULT_BOXINFO_PATH: &str = "/usr/lib/enigma.info";
pub const DEFAULT_CMDLINE_PATH: &str = "/proc/cmdline";
pub const DEFAULT_PLUGINS_DIR: &str = "/usr/lib/enigma2/python/Plugins";

const MODELS_FILENAME: &str = "models.json";

/// Application name for XDG directories.
const APP_NAME: &str = "boxcaps";

/// Paths given on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliPaths {
    pub root: Option<PathBuf>,
    pub boxinfo: Option<PathBuf>,
    pub cmdline: Option<PathBuf>,
    pub models: Option<PathBuf>,
}

/// Resolved platform paths with provenance.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Directory every device path is resolved under.
    pub root: PathBuf,
    pub root_source: PathSource,

    /// Boot-information file (device path).
    pub boxinfo: PathBuf,
    pub boxinfo_source: PathSource,

    /// Kernel command line (device path).
    pub cmdline: PathBuf,
    pub cmdline_source: PathSource,

    /// Plugin directory (device path).
    pub plugins_dir: PathBuf,

    /// Model-table override (host path), if any.
    pub models: Option<PathBuf>,
    pub models_source: PathSource,
}

impl Default for PlatformPaths {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            root_source: PathSource::BuiltinDefault,
            boxinfo: PathBuf::from(DEFAULT_BOXINFO_PATH),
            boxinfo_source: PathSource::BuiltinDefault,
            cmdline: PathBuf::from(DEFAULT_CMDLINE_PATH),
            cmdline_source: PathSource::BuiltinDefault,
            plugins_dir: PathBuf::from(DEFAULT_PLUGINS_DIR),
            models: None,
            models_source: PathSource::BuiltinDefault,
        }
    }
}

impl PlatformPaths {
    /// Defaults rooted at `root`.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Map an absolute device path under the probe root.
    pub fn on_device(&self, device_path: &Path) -> PathBuf {
        reroot(&self.root, device_path)
    }
}

/// Join an absolute device path under `root`.
pub fn reroot(root: &Path, device_path: &Path) -> PathBuf {
    match device_path.strip_prefix("/") {
        Ok(relative) => root.join(relative),
        Err(_) => root.join(device_path),
    }
}

/// Resolve all platform paths.
pub fn resolve_paths(cli: &CliPaths) -> PlatformPaths {
    let mut paths = PlatformPaths::default();

    if let Some((root, source)) = value_or_env(cli.root.as_deref(), ENV_ROOT) {
        paths.root = root;
        paths.root_source = source;
    }
    if let Some((boxinfo, source)) = value_or_env(cli.boxinfo.as_deref(), ENV_BOXINFO) {
        paths.boxinfo = boxinfo;
        paths.boxinfo_source = source;
    }
    if let Some((cmdline, source)) = value_or_env(cli.cmdline.as_deref(), ENV_CMDLINE) {
        paths.cmdline = cmdline;
        paths.cmdline_source = source;
    }

    let (models, source) = resolve_models(cli.models.as_deref());
    paths.models = models;
    paths.models_source = source;

    paths
}

/// CLI value, then environment variable. No existence check: device paths may
/// legitimately be missing.
fn value_or_env(cli: Option<&Path>, env_var: &str) -> Option<(PathBuf, PathSource)> {
    if let Some(path) = cli {
        return Some((path.to_path_buf(), PathSource::CliArgument));
    }
    std::env::var(env_var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(|v| (PathBuf::from(v), PathSource::Environment))
}

/// Resolve the model-table override.
///
/// 1. Explicit CLI path (if it exists)
/// 2. BOXCAPS_MODELS
/// 3. BOXCAPS_CONFIG_DIR + models.json
/// 4. XDG config directory (~/.config/boxcaps/)
/// 5. System config (/etc/boxcaps/)
/// 6. Built-in table (None)
fn resolve_models(cli_path: Option<&Path>) -> (Option<PathBuf>, PathSource) {
    if let Some(path) = cli_path {
        if path.exists() {
            return (Some(path.to_path_buf()), PathSource::CliArgument);
        }
    }

    if let Ok(env_path) = std::env::var(ENV_MODELS) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), PathSource::Environment);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(MODELS_FILENAME);
        if path.exists() {
            return (Some(path), PathSource::Environment);
        }
    }

    if let Some(xdg_config) = dirs::config_dir() {
        let path = xdg_config.join(APP_NAME).join(MODELS_FILENAME);
        if path.exists() {
            return (Some(path), PathSource::XdgConfig);
        }
    }

    let system_path = system_config_dir().join(MODELS_FILENAME);
    if system_path.exists() {
        return (Some(system_path), PathSource::SystemConfig);
    }

    (None, PathSource::BuiltinDefault)
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_source_display() {
        assert_eq!(format!("{}", PathSource::CliArgument), "CLI argument");
        assert_eq!(format!("{}", PathSource::Environment), "environment variable");
        assert_eq!(format!("{}", PathSource::BuiltinDefault), "builtin default");
    }

    #[test]
    fn test_reroot() {
        let root = Path::new("/tmp/fixture");
        assert_eq!(
            reroot(root, Path::new("/proc/stb/fp/fan")),
            PathBuf::from("/tmp/fixture/proc/stb/fp/fan")
        );
        assert_eq!(reroot(Path::new("/"), Path::new("/dev/ci0")), PathBuf::from("/dev/ci0"));
    }

    #[test]
    fn test_defaults() {
        let paths = PlatformPaths::default();
        assert_eq!(paths.root, PathBuf::from("/"));
        assert_eq!(paths.boxinfo, PathBuf::from(DEFAULT_BOXINFO_PATH));
        assert_eq!(paths.cmdline, PathBuf::from(DEFAULT_CMDLINE_PATH));
        assert!(paths.models.is_none());
    }

    #[test]
    fn test_rooted_on_device() {
        let paths = PlatformPaths::rooted("/srv/box");
        assert_eq!(
            paths.on_device(&paths.boxinfo),
            PathBuf::from("/srv/box/usr/lib/enigma.info")
        );
    }
}
