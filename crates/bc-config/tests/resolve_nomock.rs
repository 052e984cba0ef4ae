//! No-mock path resolution + model table loading tests.
//!
//! Covers:
//! - Resolution order (CLI > env > config dir > defaults)
//! - Model-table overrides merged over the built-ins
//! - Validation failures surfaced from override files

use bc_config::resolve::{
    resolve_paths, CliPaths, PathSource, ENV_BOXINFO, ENV_CMDLINE, ENV_CONFIG_DIR, ENV_MODELS,
    ENV_ROOT,
};
use bc_config::{family, load_model_families, ValidationError};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
            env::remove_var(key);
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.keys.iter().zip(self.saved.iter()) {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

fn lock_env() -> (std::sync::MutexGuard<'static, ()>, EnvGuard) {
    let lock = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    let guard = EnvGuard::new(&[ENV_ROOT, ENV_BOXINFO, ENV_CMDLINE, ENV_MODELS, ENV_CONFIG_DIR]);
    (lock, guard)
}

const OVERRIDE: &str = r#"{
    "schema_version": "1.0.0",
    "families": { "touch_sensor": { "models": ["testbox"] } },
    "kexec": { "testbox": { "kernel": "mmcblk0p2", "rootfs": "mmcblk0p3" } }
}"#;

#[test]
fn test_cli_beats_environment() {
    let (_lock, _guard) = lock_env();
    env::set_var(ENV_ROOT, "/from/env");
    env::set_var(ENV_BOXINFO, "/env/enigma.info");

    let cli = CliPaths {
        root: Some(PathBuf::from("/from/cli")),
        ..CliPaths::default()
    };
    let paths = resolve_paths(&cli);

    assert_eq!(paths.root, PathBuf::from("/from/cli"));
    assert_eq!(paths.root_source, PathSource::CliArgument);
    assert_eq!(paths.boxinfo, PathBuf::from("/env/enigma.info"));
    assert_eq!(paths.boxinfo_source, PathSource::Environment);
    assert_eq!(paths.cmdline_source, PathSource::BuiltinDefault);
}

#[test]
fn test_models_from_config_dir() {
    let (_lock, _guard) = lock_env();
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("models.json"), OVERRIDE).unwrap();
    env::set_var(ENV_CONFIG_DIR, dir.path());

    let paths = resolve_paths(&CliPaths::default());
    assert_eq!(paths.models, Some(dir.path().join("models.json")));
    assert_eq!(paths.models_source, PathSource::Environment);

    let table = load_model_families(&paths).unwrap();
    assert!(table.contains(family::TOUCH_SENSOR, "testbox"));
    assert!(!table.contains(family::TOUCH_SENSOR, "dm900"));
    assert!(table.contains(family::DREAMBOX_AUDIO, "dm900"));
    assert_eq!(table.kexec_partitions("testbox").unwrap().rootfs, "mmcblk0p3");
}

#[test]
fn test_missing_cli_models_falls_through() {
    let (_lock, _guard) = lock_env();
    let dir = TempDir::new().unwrap();
    let env_file = dir.path().join("env-models.json");
    fs::write(&env_file, OVERRIDE).unwrap();
    env::set_var(ENV_MODELS, &env_file);

    let cli = CliPaths {
        models: Some(dir.path().join("does-not-exist.json")),
        ..CliPaths::default()
    };
    let paths = resolve_paths(&cli);
    assert_eq!(paths.models, Some(env_file));
    assert_eq!(paths.models_source, PathSource::Environment);
}

#[test]
fn test_invalid_override_is_reported() {
    let (_lock, _guard) = lock_env();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("models.json");
    fs::write(&file, r#"{ "schema_version": "2.0.0" }"#).unwrap();

    let cli = CliPaths {
        models: Some(file),
        ..CliPaths::default()
    };
    let paths = resolve_paths(&cli);
    let err = load_model_families(&paths).unwrap_err();
    assert!(matches!(err, ValidationError::VersionMismatch { .. }));
}
