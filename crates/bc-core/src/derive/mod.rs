//! Capability derivation engine.
//!
//! The registry is populated by an ordered table of named [`Step`]s. Each step
//! declares the registry keys it reads and writes; [`DerivationPlan::new`]
//! rejects tables where a step reads a key no earlier step writes, so forward
//! dependencies are checked before anything runs.
//!
//! Steps never fail. A missing path, an absent boot-info key or an unknown
//! model all resolve to false/0/empty.

pub mod model;
pub mod steps;

pub use model::Model;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use bc_common::Value;
use bc_config::ModelFamilies;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::boxinfo::BoxInfo;
use crate::cmdline::BootCmdline;
use crate::collaborators::Collaborators;
use crate::probe::FsProbe;
use crate::registry::CapabilityRegistry;

/// Placeholder for an instance index in a written key.
pub const INDEX_PLACEHOLDER: &str = "{}";

/// Body of a derivation step.
pub type StepFn = Box<dyn Fn(&mut DeriveContext<'_>) + Send + Sync>;

/// One named derivation.
pub struct Step {
    name: &'static str,
    reads: Vec<&'static str>,
    writes: Vec<&'static str>,
    run: StepFn,
}

impl Step {
    /// A step that writes the key it is named after.
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(&mut DeriveContext<'_>) + Send + Sync + 'static,
    {
        Self {
            name,
            reads: Vec::new(),
            writes: vec![name],
            run: Box::new(run),
        }
    }

    /// Registry keys this step consults.
    pub fn reads(mut self, keys: &[&'static str]) -> Self {
        self.reads = keys.to_vec();
        self
    }

    /// Registry keys (or `{}` templates) this step produces, replacing the default.
    pub fn writes(mut self, keys: &[&'static str]) -> Self {
        self.writes = keys.to_vec();
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn read_keys(&self) -> &[&'static str] {
        &self.reads
    }

    pub fn write_keys(&self) -> &[&'static str] {
        &self.writes
    }

    fn declares_write(&self, key: &str) -> bool {
        self.writes.iter().any(|template| key_matches(template, key))
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

/// Does `key` match a write declaration? `{}` matches one or more digits.
pub fn key_matches(template: &str, key: &str) -> bool {
    match template.split_once(INDEX_PLACEHOLDER) {
        None => template == key,
        Some((prefix, suffix)) => {
            key.len() > prefix.len() + suffix.len()
                && key.starts_with(prefix)
                && key.ends_with(suffix)
                && key[prefix.len()..key.len() - suffix.len()]
                    .bytes()
                    .all(|b| b.is_ascii_digit())
        }
    }
}

/// Plan validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("step '{step}' reads '{key}', which no earlier step writes")]
    ReadBeforeWrite { step: String, key: String },

    #[error("'{key}' is written by both '{first}' and '{second}'")]
    DuplicateWrite {
        key: String,
        first: String,
        second: String,
    },

    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),
}

impl From<PlanError> for bc_common::Error {
    fn from(err: PlanError) -> Self {
        bc_common::Error::Plan(err.to_string())
    }
}

/// A validated, ordered step table.
#[derive(Debug)]
pub struct DerivationPlan {
    steps: Vec<Step>,
}

/// Serializable view of a step.
#[derive(Debug, Clone, Serialize)]
pub struct StepInfo {
    pub name: &'static str,
    pub reads: Vec<&'static str>,
    pub writes: Vec<&'static str>,
}

impl DerivationPlan {
    /// Validate a step table.
    pub fn new(steps: Vec<Step>) -> Result<Self, PlanError> {
        let mut names: HashSet<&str> = HashSet::new();
        let mut written: HashMap<&str, &str> = HashMap::new();

        for step in &steps {
            if !names.insert(step.name) {
                return Err(PlanError::DuplicateStep(step.name.to_string()));
            }
            for key in &step.reads {
                if !written.contains_key(key) {
                    return Err(PlanError::ReadBeforeWrite {
                        step: step.name.to_string(),
                        key: key.to_string(),
                    });
                }
            }
            for key in &step.writes {
                if let Some(first) = written.insert(*key, step.name) {
                    return Err(PlanError::DuplicateWrite {
                        key: key.to_string(),
                        first: first.to_string(),
                        second: step.name.to_string(),
                    });
                }
            }
        }

        Ok(Self { steps })
    }

    /// The full capability table.
    pub fn standard() -> Result<Self, PlanError> {
        Self::new(steps::standard_steps())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn describe(&self) -> Vec<StepInfo> {
        self.steps
            .iter()
            .map(|step| StepInfo {
                name: step.name,
                reads: step.reads.clone(),
                writes: step.writes.clone(),
            })
            .collect()
    }
}

/// What a running step can see.
pub struct DeriveContext<'a> {
    pub probe: &'a dyn FsProbe,
    pub boxinfo: &'a BoxInfo,
    pub cmdline: &'a BootCmdline,
    pub collaborators: &'a Collaborators,
    pub model: &'a Model<'a>,
    pub plugins_dir: &'a Path,
    registry: &'a mut CapabilityRegistry,
    reads: Vec<String>,
    writes: Vec<String>,
}

impl<'a> DeriveContext<'a> {
    /// Previously derived value; `None` when absent.
    pub fn value(&mut self, key: &str) -> Value {
        self.reads.push(key.to_string());
        self.registry.get(key).cloned().unwrap_or_default()
    }

    /// Truthiness of a previously derived value.
    pub fn flag(&mut self, key: &str) -> bool {
        self.value(key).is_truthy()
    }

    pub fn int(&mut self, key: &str) -> i64 {
        self.value(key).as_int().unwrap_or(0)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.writes.push(key.clone());
        self.registry.set(key, value);
    }

    /// Path exists and can be opened for reading.
    pub fn readable(&self, path: &str) -> bool {
        self.probe.is_readable(path)
    }

    pub fn readable_any(&self, paths: &[&str]) -> bool {
        paths.iter().any(|p| self.probe.is_readable(p))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.probe.exists(path)
    }

    pub fn has(&self, path: &str, needle: &str) -> bool {
        self.probe.contains(path, needle)
    }

    /// Readable file below the plugin directory.
    pub fn plugin_readable(&self, relative: &str) -> bool {
        let path = self.plugins_dir.join(relative);
        self.probe.is_readable(&path.to_string_lossy())
    }
}

/// Timing and output of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepTrace {
    pub name: &'static str,
    pub writes: Vec<String>,
    pub elapsed_us: u64,
}

/// Diagnostics for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct DerivationTrace {
    pub started_at: String,
    pub model: String,
    pub steps: Vec<StepTrace>,
    pub total_us: u64,
}

/// Registry plus trace.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub registry: CapabilityRegistry,
    pub trace: DerivationTrace,
}

/// Runs a plan against one set of inputs.
pub struct Engine<'a> {
    plan: &'a DerivationPlan,
    probe: &'a dyn FsProbe,
    boxinfo: &'a BoxInfo,
    cmdline: &'a BootCmdline,
    families: &'a ModelFamilies,
    collaborators: &'a Collaborators,
    plugins_dir: &'a Path,
}

impl<'a> Engine<'a> {
    pub fn new(
        plan: &'a DerivationPlan,
        probe: &'a dyn FsProbe,
        boxinfo: &'a BoxInfo,
        cmdline: &'a BootCmdline,
        families: &'a ModelFamilies,
        collaborators: &'a Collaborators,
    ) -> Self {
        Self {
            plan,
            probe,
            boxinfo,
            cmdline,
            families,
            collaborators,
            plugins_dir: Path::new(bc_config::resolve::DEFAULT_PLUGINS_DIR),
        }
    }

    pub fn with_plugins_dir(mut self, plugins_dir: &'a Path) -> Self {
        self.plugins_dir = plugins_dir;
        self
    }

    /// Run every step in order into a fresh registry.
    pub fn run(&self) -> Derivation {
        let model = Model::new(self.boxinfo.model(), self.families);
        let started_at = chrono::Utc::now().to_rfc3339();
        let run_start = Instant::now();
        let mut registry = CapabilityRegistry::new();
        let mut traces = Vec::with_capacity(self.plan.len());

        info!(model = model.name(), steps = self.plan.len(), "deriving capabilities");

        for step in self.plan.steps() {
            let step_start = Instant::now();
            let mut ctx = DeriveContext {
                probe: self.probe,
                boxinfo: self.boxinfo,
                cmdline: self.cmdline,
                collaborators: self.collaborators,
                model: &model,
                plugins_dir: self.plugins_dir,
                registry: &mut registry,
                reads: Vec::new(),
                writes: Vec::new(),
            };
            (step.run)(&mut ctx);
            let DeriveContext { reads, writes, .. } = ctx;

            for key in reads.iter().filter(|k| !step.reads.iter().any(|r| *r == k.as_str())) {
                warn!(step = step.name, key = %key, "step read an undeclared key");
            }
            for key in writes.iter().filter(|k| !step.declares_write(k)) {
                warn!(step = step.name, key = %key, "step wrote an undeclared key");
            }

            let elapsed_us = micros(step_start);
            debug!(step = step.name, written = writes.len(), elapsed_us, "step done");
            traces.push(StepTrace {
                name: step.name,
                writes,
                elapsed_us,
            });
        }

        let total_us = micros(run_start);
        info!(capabilities = registry.len(), total_us, "capabilities derived");

        Derivation {
            registry,
            trace: DerivationTrace {
                started_at,
                model: model.name().to_string(),
                steps: traces,
                total_us,
            },
        }
    }
}

fn micros(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StubProbe;

    fn noop(_: &mut DeriveContext<'_>) {}

    #[test]
    fn test_key_matches_templates() {
        assert!(key_matches("Fan", "Fan"));
        assert!(!key_matches("Fan", "FanPWM"));
        assert!(key_matches("CI{}SupportsHighBitrates", "CI0SupportsHighBitrates"));
        assert!(key_matches("CI{}SupportsHighBitrates", "CI12SupportsHighBitrates"));
        assert!(!key_matches("CI{}SupportsHighBitrates", "CISupportsHighBitrates"));
        assert!(!key_matches("CI{}SupportsHighBitrates", "CIxSupportsHighBitrates"));
    }

    #[test]
    fn test_plan_rejects_read_before_write() {
        let err = DerivationPlan::new(vec![
            Step::new("Display", noop).reads(&["StandbyLED"]),
            Step::new("StandbyLED", noop),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::ReadBeforeWrite {
                step: "Display".to_string(),
                key: "StandbyLED".to_string()
            }
        );
    }

    #[test]
    fn test_plan_rejects_duplicate_writes_and_names() {
        let err = DerivationPlan::new(vec![
            Step::new("Fan", noop),
            Step::new("FanAgain", noop).writes(&["Fan"]),
        ])
        .unwrap_err();
        assert!(matches!(err, PlanError::DuplicateWrite { .. }));

        let err = DerivationPlan::new(vec![
            Step::new("Fan", noop),
            Step::new("Fan", noop).writes(&["Other"]),
        ])
        .unwrap_err();
        assert_eq!(err, PlanError::DuplicateStep("Fan".to_string()));
    }

    #[test]
    fn test_standard_plan_is_valid() {
        let plan = DerivationPlan::standard().unwrap();
        assert!(plan.len() > 90);
        let info = plan.describe();
        let display = info.iter().find(|s| s.name == "Display").unwrap();
        assert_eq!(display.reads, vec!["FrontpanelDisplay", "StandbyLED"]);
    }

    #[test]
    fn test_engine_tracks_reads_and_writes() {
        let plan = DerivationPlan::new(vec![
            Step::new("A", |ctx| ctx.set("A", 2i64)),
            Step::new("B", |ctx| {
                let a = ctx.int("A");
                ctx.set("B", a * 2);
            })
            .reads(&["A"]),
        ])
        .unwrap();
        let probe = StubProbe::new();
        let boxinfo = BoxInfo::empty();
        let cmdline = BootCmdline::default();
        let families = ModelFamilies::builtin();
        let collaborators = Collaborators::default();
        let out = Engine::new(&plan, &probe, &boxinfo, &cmdline, &families, &collaborators).run();

        assert_eq!(out.registry.get_int("B"), 4);
        assert_eq!(out.trace.model, "unknown");
        assert_eq!(out.trace.steps.len(), 2);
        assert_eq!(out.trace.steps[1].writes, vec!["B".to_string()]);
    }
}
