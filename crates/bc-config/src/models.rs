//! Model-family tables.
//!
//! Many capabilities are gated on the box model identifier. The model lists
//! are data, not logic: each family is a named set of exact model names and
//! model-name prefixes. The built-in table can be extended or replaced per
//! family from a JSON file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::validate::ValidationError;

/// Family names referenced by the derivation steps.
pub mod family {
    /// Boxes with one CI slot regardless of what the driver reports.
    pub const SINGLE_CI_SLOT: &str = "single_ci_slot";
    pub const TOUCH_SENSOR: &str = "touch_sensor";
    /// Boxes whose front display exposes recording/hdd symbols.
    pub const LCD_SYMBOLS: &str = "lcd_symbols";
    pub const LCD_SHOW_SYMBOLS: &str = "lcd_show_symbols";
    /// Boxes driving power/standby LEDs through the led pattern files.
    pub const LED_PATTERN_LEDS: &str = "led_pattern_leds";
    pub const NO_DEEP_STANDBY: &str = "no_deep_standby";
    pub const NO_POWER_VFD: &str = "no_power_vfd";
    pub const NO_WAKE_ON_LAN: &str = "no_wake_on_lan";
    pub const NO_EXTERNAL_PIP: &str = "no_external_pip";
    pub const SMALL_PIP: &str = "small_pip";
    pub const NO_VFD_SCROLL: &str = "no_vfd_scroll";
    pub const BLINDSCAN_T2: &str = "blindscan_t2";
    pub const FIXED_RC_TYPE: &str = "fixed_rc_type";
    pub const NO_FULLHD_SKIN: &str = "no_fullhd_skin";
    pub const NO_TRANSCODE_WITH_PIP: &str = "no_transcode_with_pip";
    pub const FRONT_DISPLAY_PICON: &str = "front_display_picon";
    pub const YPBPR: &str = "ypbpr";
    pub const SCART: &str = "scart";
    pub const SVIDEO: &str = "svideo";
    pub const NO_COMPOSITE: &str = "no_composite";
    pub const XCORE_VFD: &str = "xcore_vfd";
    pub const NO_OFFLINE_DECODING: &str = "no_offline_decoding";
    pub const NO_OFGWRITE: &str = "no_ofgwrite";
    pub const DREAMBOX_AUDIO: &str = "dreambox_audio";
    pub const FBC_TUNER_ALWAYS_ON: &str = "fbc_tuner_always_on";
    pub const AVL6211_LOOPTHROUGH: &str = "avl6211_loopthrough";
    /// Boxes whose auto-resolution must use the 50Hz videomode file.
    pub const VIDEOMODE_50HZ: &str = "videomode_50hz";
}

/// One model family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySpec {
    /// Exact model identifiers.
    #[serde(default)]
    pub models: Vec<String>,

    /// Model identifier prefixes.
    #[serde(default)]
    pub prefixes: Vec<String>,
}

impl FamilySpec {
    pub fn of(models: &[&str]) -> Self {
        Self {
            models: models.iter().map(|m| m.to_string()).collect(),
            prefixes: Vec::new(),
        }
    }

    pub fn with_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Whether `model` is a member (exact match or prefix match).
    pub fn matches(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
            || self.prefixes.iter().any(|p| model.starts_with(p.as_str()))
    }
}

/// Kernel and root partitions used by the kexec multiboot loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KexecPartitions {
    pub kernel: String,
    pub rootfs: String,
}

/// The complete model table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFamilies {
    pub schema_version: String,

    #[serde(default)]
    pub families: BTreeMap<String, FamilySpec>,

    /// Per-model kexec partitions.
    #[serde(default)]
    pub kexec: BTreeMap<String, KexecPartitions>,
}

impl Default for ModelFamilies {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelFamilies {
    /// An empty table (every family lookup misses).
    pub fn empty() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            families: BTreeMap::new(),
            kexec: BTreeMap::new(),
        }
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        use family::*;

        let mut families = BTreeMap::new();
        let mut add = |name: &str, spec: FamilySpec| {
            families.insert(name.to_string(), spec);
        };

        add(
            SINGLE_CI_SLOT,
            FamilySpec::of(&["h9combo", "h9combose", "h10", "pulse4kmini"]),
        );
        add(TOUCH_SENSOR, FamilySpec::of(&["dm900", "dm920"]));
        add(LCD_SYMBOLS, FamilySpec::of(&["hd51", "vs1500"]));
        add(
            LCD_SHOW_SYMBOLS,
            FamilySpec::of(&["hd51", "vs1500"]).with_prefixes(&["et9"]),
        );
        add(LED_PATTERN_LEDS, FamilySpec::of(&["gbue4k", "gbquad4k"]));
        add(NO_DEEP_STANDBY, FamilySpec::of(&["dm800"]));
        add(NO_POWER_VFD, FamilySpec::of(&["formuler1"]));
        add(NO_WAKE_ON_LAN, FamilySpec::default().with_prefixes(&["et8000"]));
        add(
            NO_EXTERNAL_PIP,
            FamilySpec::of(&["e4hd"]).with_prefixes(&["et9"]),
        );
        add(SMALL_PIP, FamilySpec::of(&["hd51", "h7", "vs1500", "e4hd"]));
        add(NO_VFD_SCROLL, FamilySpec::default().with_prefixes(&["et8500"]));
        add(BLINDSCAN_T2, FamilySpec::default().with_prefixes(&["vu"]));
        add(
            FIXED_RC_TYPE,
            FamilySpec::of(&["gbquad4k", "gbue4k", "et8500"]).with_prefixes(&["et7"]),
        );
        add(
            NO_FULLHD_SKIN,
            FamilySpec::of(&["et4000", "et5000", "sh1", "hd500c", "hd1100", "xp1000", "lc"]),
        );
        add(
            NO_TRANSCODE_WITH_PIP,
            FamilySpec::of(&["vusolo4k", "gbquad4k", "gbue4k"]),
        );
        add(
            FRONT_DISPLAY_PICON,
            FamilySpec::of(&[
                "dm900", "dm920", "et8500", "vusolo4k", "vuuno4kse", "vuduo4k", "vuduo4kse",
                "vuultimo4k", "gbquad4k", "gbue4k",
            ]),
        );
        add(
            YPBPR,
            FamilySpec::of(&[
                "dm8000", "et5000", "et6000", "et6500", "et9000", "et9200", "et9500", "et10000",
                "formuler1", "mbtwinplus", "spycat", "vusolo", "vuduo", "vuduo2", "vuultimo",
            ]),
        );
        add(
            SCART,
            FamilySpec::of(&[
                "dm8000", "et4000", "et6500", "et8000", "et9000", "et9200", "et9500", "et10000",
                "formuler1", "hd1100", "hd1200", "hd1265", "hd2400", "vusolo", "vusolo2",
                "vuduo", "vuduo2", "vuultimo", "vuuno", "xp1000",
            ]),
        );
        add(SVIDEO, FamilySpec::of(&["dm8000"]));
        add(
            NO_COMPOSITE,
            FamilySpec::of(&[
                "dm900", "dm920", "i55", "gbquad4k", "gbue4k", "hd1500", "osnino",
                "osninoplus", "purehd", "purehdse", "revo4k", "vusolo4k", "vuzero4k", "vuduo4k",
                "vuduo4kse", "vuuno4k", "vuuno4kse", "vuultimo4k",
            ]),
        );
        add(
            XCORE_VFD,
            FamilySpec::of(&["osmega", "spycat4k", "spycat4kmini", "spycat4kcombo"]),
        );
        add(
            NO_OFFLINE_DECODING,
            FamilySpec::of(&[
                "osmini", "osminiplus", "et7000mini", "et11000", "mbmicro", "mbtwinplus",
                "mbmicrov2", "et7000", "et8500",
            ]),
        );
        add(NO_OFGWRITE, FamilySpec::default().with_prefixes(&["dm"]));
        add(DREAMBOX_AUDIO, FamilySpec::of(&["dm900", "dm920"]));
        add(
            FBC_TUNER_ALWAYS_ON,
            FamilySpec::of(&[
                "dm900", "dm920", "vusolo4k", "vuduo4k", "vuduo4kse", "vuultimo4k", "vuuno4k",
                "vuuno4kse",
            ]),
        );
        add(AVL6211_LOOPTHROUGH, FamilySpec::of(&["et7500", "et8500"]));
        add(VIDEOMODE_50HZ, FamilySpec::of(&["gbue4k", "gbquad4k"]));

        let mut kexec = BTreeMap::new();
        let mut slot = |models: &[&str], kernel: &str, rootfs: &str| {
            for model in models {
                kexec.insert(
                    model.to_string(),
                    KexecPartitions {
                        kernel: kernel.to_string(),
                        rootfs: rootfs.to_string(),
                    },
                );
            }
        };
        slot(&["vuduo4k", "vuduo4kse"], "mmcblk0p9", "mmcblk0p6");
        slot(
            &["vusolo4k", "vuultimo4k", "vuuno4k", "vuuno4kse"],
            "mmcblk0p4",
            "mmcblk0p1",
        );
        slot(&["vuzero4k"], "mmcblk0p7", "mmcblk0p4");

        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            families,
            kexec,
        }
    }

    /// Load a model table from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_json(&content)
    }

    /// Parse a model table from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Replace families and kexec entries with those present in `overrides`.
    pub fn merge(&mut self, overrides: ModelFamilies) {
        self.families.extend(overrides.families);
        self.kexec.extend(overrides.kexec);
    }

    pub fn family(&self, name: &str) -> Option<&FamilySpec> {
        self.families.get(name)
    }

    /// Whether `model` belongs to the named family. Unknown families match nothing.
    pub fn contains(&self, name: &str, model: &str) -> bool {
        self.family(name).is_some_and(|f| f.matches(model))
    }

    pub fn kexec_partitions(&self, model: &str) -> Option<&KexecPartitions> {
        self.kexec.get(model)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }
}
