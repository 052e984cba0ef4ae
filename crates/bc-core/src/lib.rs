//! boxcaps core library.
//!
//! - Boot-information store with checksum verification and override rules
//! - Boot command-line parsing
//! - Filesystem probe facade and injected collaborators
//! - Capability derivation engine and registry
//! - Logging and exit codes for the `boxcaps` binary
//!
//! The binary entry point is in `main.rs`.

pub mod boxinfo;
pub mod cmdline;
pub mod collaborators;
pub mod derive;
pub mod exit_codes;
pub mod logging;
pub mod probe;
pub mod registry;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use boxinfo::{BoxInfo, BoxInfoError, ChecksumStatus, ForceOverride, Source};
pub use cmdline::BootCmdline;
pub use collaborators::Collaborators;
pub use derive::{Derivation, DerivationPlan, DerivationTrace, Engine, Model, PlanError, Step};
pub use probe::{FsProbe, RootedFs};
pub use registry::{CapabilityRegistry, Platform};

use bc_config::{ModelFamilies, PlatformPaths};

/// Load every input from `paths` and derive the registry.
///
/// The boot-info file and command line are read through the probe root;
/// a missing file degrades to an empty store or command line.
pub fn build_platform(
    paths: &PlatformPaths,
    families: &ModelFamilies,
    collaborators: &Collaborators,
) -> Result<(Platform, DerivationTrace), PlanError> {
    let probe = RootedFs::new(&paths.root);
    let boxinfo = BoxInfo::load(&paths.on_device(&paths.boxinfo));
    let cmdline = BootCmdline::load(&paths.on_device(&paths.cmdline));
    let plan = DerivationPlan::standard()?;
    let Derivation { registry, trace } =
        Engine::new(&plan, &probe, &boxinfo, &cmdline, families, collaborators)
            .with_plugins_dir(&paths.plugins_dir)
            .run();
    Ok((Platform::new(boxinfo, registry), trace))
}
