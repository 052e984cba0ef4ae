//! The capability table.
//!
//! Order matters: compound flags come after the flags they combine, and
//! [`super::DerivationPlan::new`] checks every declared read against the keys
//! written above it.

use bc_common::Value;
use bc_config::family;

use super::{DeriveContext, Step};
use crate::probe::{count_indexed, count_indexed_from, instance_path};

/// Boot-info keys announcing an HDMI input.
const HDMI_IN_KEYS: [&str; 2] = ["hdmifhdin", "hdmihdin"];

const CEC_DEVICES: &[&str] = &["/dev/cec0", "/dev/hdmi_cec", "/dev/misc/hdmi_cec0"];

const PHYSICAL_LOOPTHROUGH_NIMS: &[&str] =
    &["Vuplus DVB-S NIM(AVL2108)", "GIGA DVB-S2 NIM (Internal)"];

const FBC_TUNERS: &[&str] = &[
    "Vuplus DVB-C NIM(BCM3158)",
    "Vuplus DVB-C NIM(BCM3148)",
    "Vuplus DVB-S NIM(7376 FBC)",
    "Vuplus DVB-S NIM(45308X FBC)",
    "Vuplus DVB-S NIM(45208 FBC)",
    "DVB-S2 NIM(45208 FBC)",
    "DVB-S2X NIM(45308X FBC)",
    "DVB-S2 NIM(45308 FBC)",
    "DVB-C NIM(3128 FBC)",
    "BCM45208",
    "BCM45308X",
    "BCM3158",
];

fn readable(key: &'static str, path: &'static str) -> Step {
    Step::new(key, move |ctx| ctx.set(key, ctx.readable(path)))
}

fn readable_any(key: &'static str, paths: &'static [&'static str]) -> Step {
    Step::new(key, move |ctx| ctx.set(key, ctx.readable_any(paths)))
}

fn contains(key: &'static str, path: &'static str, needle: &'static str) -> Step {
    Step::new(key, move |ctx| ctx.set(key, ctx.has(path, needle)))
}

/// A `<name>_choices` file next to a readable control file.
fn with_choices(key: &'static str, choices: &'static str, control: &'static str) -> Step {
    Step::new(key, move |ctx| {
        ctx.set(key, ctx.readable(choices) && ctx.readable(control))
    })
}

fn member(key: &'static str, family: &'static str) -> Step {
    Step::new(key, move |ctx| ctx.set(key, ctx.model.is_in(family)))
}

fn non_member(key: &'static str, family: &'static str) -> Step {
    Step::new(key, move |ctx| ctx.set(key, !ctx.model.is_in(family)))
}

fn exactly(key: &'static str, model: &'static str) -> Step {
    Step::new(key, move |ctx| ctx.set(key, ctx.model.is(model)))
}

/// Readable control file, unless the model is in `excluded`.
fn readable_unless(key: &'static str, excluded: &'static str, path: &'static str) -> Step {
    Step::new(key, move |ctx| {
        ctx.set(key, !ctx.model.is_in(excluded) && ctx.readable(path))
    })
}

/// Readable `primary`, or `fallback` on models in `family`.
fn readable_or_member(
    key: &'static str,
    primary: &'static str,
    family: &'static str,
    fallback: &'static str,
) -> Step {
    Step::new(key, move |ctx| {
        let value = ctx.readable(primary) || (ctx.model.is_in(family) && ctx.readable(fallback));
        ctx.set(key, value)
    })
}

fn common_interface(ctx: &mut DeriveContext<'_>) {
    let slots = if ctx.model.is_in(family::SINGLE_CI_SLOT) {
        1
    } else {
        ctx.collaborators.dvb.ci_slot_count(ctx.probe)
    };
    ctx.set("CommonInterface", slots);
}

fn ci_slot_features(ctx: &mut DeriveContext<'_>) {
    let slots = usize::try_from(ctx.int("CommonInterface")).unwrap_or(0);
    for slot in 0..slots {
        let tsclk = instance_path("/proc/stb/tsmux/ci{}_tsclk", slot);
        let routing = instance_path("/proc/stb/tsmux/ci{}_relevant_pids_routing", slot);
        let high_bitrates = ctx.readable(&tsclk);
        let pid_routing = ctx.readable(&routing);
        ctx.set(format!("CI{}SupportsHighBitrates", slot), high_bitrates);
        ctx.set(format!("CI{}RelevantPidsRoutingSupport", slot), pid_routing);
    }
}

fn video_decoders(ctx: &mut DeriveContext<'_>) {
    // Decoders are character devices; any entry kind counts.
    let count = count_indexed(ctx.probe, "/dev/dvb/adapter0/video{}", |p, path| p.exists(path));
    ctx.set("NumVideoDecoders", count);
}

fn frontpanel_leds(ctx: &mut DeriveContext<'_>) {
    let start = usize::from(ctx.readable("/proc/stb/fp/led_set_pattern"));
    let count = count_indexed_from(ctx.probe, "/proc/stb/fp/led{}_pattern", start, |p, path| {
        p.is_readable(path)
    });
    ctx.set("NumFrontpanelLEDs", count);
}

fn hdmi_in(ctx: &mut DeriveContext<'_>) {
    let value = HDMI_IN_KEYS
        .iter()
        .filter_map(|key| ctx.boxinfo.get(key))
        .find(|v| v.is_truthy())
        .cloned()
        .unwrap_or(Value::Bool(false));
    ctx.set("HasHDMIin", value);
}

fn hdmi_cec(ctx: &mut DeriveContext<'_>) {
    let value = ctx.boxinfo.get_bool("hdmi")
        && ctx.plugin_readable("SystemPlugins/HdmiCEC/plugin.py")
        && ctx.readable_any(CEC_DEVICES);
    ctx.set("HasHDMI-CEC", value);
}

fn xcore_vfd(ctx: &mut DeriveContext<'_>) {
    let value = ctx.model.is_in(family::XCORE_VFD) && {
        let path = format!("/sys/module/brcmstb_{}/parameters/pt6302_cgram", ctx.model.name());
        ctx.readable(&path)
    };
    ctx.set("hasXcoreVFD", value);
}

fn can_kexec(ctx: &mut DeriveContext<'_>) {
    let has_kexec = ctx.flag("hasKexec");
    let partitions = ctx
        .model
        .families()
        .kexec_partitions(ctx.model.name())
        .filter(|_| {
            !has_kexec
                && ctx.readable("/usr/bin/kernel_auto.bin")
                && ctx.readable("/usr/bin/STARTUP.cpio.gz")
        });
    let value = match partitions {
        Some(p) => Value::str_list([p.kernel.as_str(), p.rootfs.as_str()]),
        None => Value::Bool(false),
    };
    ctx.set("canKexec", value);
}

fn multiboot_startup_device(ctx: &mut DeriveContext<'_>) {
    let value = ctx
        .collaborators
        .multiboot
        .startup_device()
        .map(Value::from)
        .unwrap_or(Value::Bool(false));
    ctx.set("MultibootStartupDevice", value);
}

fn can_mode12(ctx: &mut DeriveContext<'_>) {
    let arg = format!("{}_4.boxmode", ctx.model.name());
    let value = match ctx.cmdline.get(&arg) {
        Some("1") | Some("12") => Value::from("192M"),
        _ => Value::Bool(false),
    };
    ctx.set("canMode12", value);
}

fn can_multiboot(ctx: &mut DeriveContext<'_>) {
    let slots: Vec<Value> = ctx
        .collaborators
        .multiboot
        .slots()
        .into_iter()
        .map(|slot| Value::Int(i64::from(slot)))
        .collect();
    ctx.set("canMultiBoot", Value::List(slots));
}

/// Strip trailing characters off the root device until `/sys/block/<dev>` exists.
fn boot_device(ctx: &mut DeriveContext<'_>) {
    let mut device = ctx
        .cmdline
        .root_device()
        .map(|root| root.trim_start_matches("/dev/").to_string())
        .unwrap_or_default();
    while !device.is_empty() && !ctx.exists(&format!("/sys/block/{}", device)) {
        device.pop();
    }
    let value = if device.is_empty() {
        Value::Bool(false)
    } else {
        Value::Str(device)
    };
    ctx.set("BootDevice", value);
}

fn physical_loopthrough(ctx: &mut DeriveContext<'_>) {
    let mut nims: Vec<&str> = PHYSICAL_LOOPTHROUGH_NIMS.to_vec();
    if ctx.model.is_in(family::AVL6211_LOOPTHROUGH) {
        nims.push("AVL6211");
    }
    ctx.set("HasPhysicalLoopthrough", Value::str_list(nims));
}

/// Every capability, in derivation order.
pub fn standard_steps() -> Vec<Step> {
    vec![
        readable("RecoveryMode", "/proc/stb/fp/boot_mode"),
        Step::new("InDebugMode", |ctx| {
            ctx.set("InDebugMode", ctx.collaborators.dvb.debug_level() >= 4)
        }),
        Step::new("CommonInterface", common_interface),
        readable("CommonInterfaceCIDelay", "/proc/stb/tsmux/rmx_delay"),
        Step::new("CommonInterfaceSlots", ci_slot_features)
            .reads(&["CommonInterface"])
            .writes(&["CI{}SupportsHighBitrates", "CI{}RelevantPidsRoutingSupport"]),
        Step::new("HasSoftcamInstalled", |ctx| {
            let installed = ctx.collaborators.modules.installed(ctx.probe, "softcam");
            ctx.set("HasSoftcamInstalled", !installed.is_empty())
        }),
        Step::new("NumVideoDecoders", video_decoders),
        Step::new("PIPAvailable", |ctx| {
            let decoders = ctx.int("NumVideoDecoders");
            ctx.set("PIPAvailable", decoders > 1)
        })
        .reads(&["NumVideoDecoders"]),
        Step::new("CanMeasureFrontendInputPower", |ctx| {
            ctx.set(
                "CanMeasureFrontendInputPower",
                ctx.collaborators.dvb.can_measure_frontend_input_power(),
            )
        }),
        Step::new("12V_Output", |ctx| {
            ctx.set("12V_Output", ctx.collaborators.dvb.has_12v_output())
        }),
        readable_any(
            "ZapMode",
            &["/proc/stb/video/zapmode", "/proc/stb/video/zapping_mode"],
        ),
        member("HaveTouchSensor", family::TOUCH_SENSOR),
        Step::new("NumFrontpanelLEDs", frontpanel_leds),
        readable_any("FrontpanelDisplay", &["/dev/dbox/oled0", "/dev/dbox/lcd0"]),
        readable_or_member(
            "LCDsymbol_circle_recording",
            "/proc/stb/lcd/symbol_circle",
            family::LCD_SYMBOLS,
            "/proc/stb/lcd/symbol_recording",
        ),
        readable("LCDsymbol_timeshift", "/proc/stb/lcd/symbol_timeshift"),
        Step::new("LCDshow_symbols", |ctx| {
            let value = ctx.model.is_in(family::LCD_SHOW_SYMBOLS)
                && ctx.readable("/proc/stb/lcd/show_symbols");
            ctx.set("LCDshow_symbols", value)
        }),
        Step::new("LCDsymbol_hdd", |ctx| {
            let value =
                ctx.model.is_in(family::LCD_SYMBOLS) && ctx.readable("/proc/stb/lcd/symbol_hdd");
            ctx.set("LCDsymbol_hdd", value)
        }),
        readable("FrontpanelDisplayGrayscale", "/dev/dbox/oled0"),
        non_member("DeepstandbySupport", family::NO_DEEP_STANDBY),
        readable("Fan", "/proc/stb/fp/fan"),
        Step::new("FanPWM", |ctx| {
            let value = ctx.flag("Fan") && ctx.readable("/proc/stb/fp/fan_pwm");
            ctx.set("FanPWM", value)
        })
        .reads(&["Fan"]),
        readable_or_member(
            "PowerLED",
            "/proc/stb/power/powerled",
            family::LED_PATTERN_LEDS,
            "/proc/stb/fp/led1_pattern",
        ),
        readable_or_member(
            "StandbyLED",
            "/proc/stb/power/standbyled",
            family::LED_PATTERN_LEDS,
            "/proc/stb/fp/led0_pattern",
        ),
        readable_any(
            "SuspendLED",
            &["/proc/stb/power/suspendled", "/proc/stb/fp/enable_led"],
        ),
        Step::new("Display", |ctx| {
            let value = ctx.flag("FrontpanelDisplay") || ctx.flag("StandbyLED");
            ctx.set("Display", value)
        })
        .reads(&["FrontpanelDisplay", "StandbyLED"]),
        readable("LedPowerColor", "/proc/stb/fp/ledpowercolor"),
        readable("LedStandbyColor", "/proc/stb/fp/ledstandbycolor"),
        readable("LedSuspendColor", "/proc/stb/fp/ledsuspendledcolor"),
        readable("Power4x7On", "/proc/stb/fp/power4x7on"),
        readable("Power4x7Standby", "/proc/stb/fp/power4x7standby"),
        readable("Power4x7Suspend", "/proc/stb/fp/power4x7suspend"),
        Step::new("PowerOffDisplay", |ctx| {
            let value = (!ctx.model.is_in(family::NO_POWER_VFD)
                && ctx.readable("/proc/stb/power/vfd"))
                || ctx.readable("/proc/stb/lcd/vfd");
            ctx.set("PowerOffDisplay", value)
        }),
        Step::new("WakeOnLAN", |ctx| {
            let value = (!ctx.model.is_in(family::NO_WAKE_ON_LAN)
                && ctx.readable("/proc/stb/power/wol"))
                || ctx.readable("/proc/stb/fp/wol");
            ctx.set("WakeOnLAN", value)
        }),
        readable_unless(
            "HasExternalPIP",
            family::NO_EXTERNAL_PIP,
            "/proc/stb/vmpeg/1/external",
        ),
        readable("VideoDestinationConfigurable", "/proc/stb/vmpeg/0/dst_left"),
        readable("hasPIPVisibleProc", "/proc/stb/vmpeg/1/visible"),
        Step::new("MaxPIPSize", |ctx| {
            let size = if ctx.model.is_in(family::SMALL_PIP) {
                Value::pair(360, 288)
            } else {
                Value::pair(540, 432)
            };
            ctx.set("MaxPIPSize", size)
        }),
        readable_unless(
            "VFD_scroll_repeats",
            family::NO_VFD_SCROLL,
            "/proc/stb/lcd/scroll_repeats",
        ),
        readable_unless(
            "VFD_scroll_delay",
            family::NO_VFD_SCROLL,
            "/proc/stb/lcd/scroll_delay",
        ),
        readable_unless(
            "VFD_initial_scroll_delay",
            family::NO_VFD_SCROLL,
            "/proc/stb/lcd/initial_scroll_delay",
        ),
        readable_unless(
            "VFD_final_scroll_delay",
            family::NO_VFD_SCROLL,
            "/proc/stb/lcd/final_scroll_delay",
        ),
        readable_any(
            "LcdLiveTV",
            &["/proc/stb/fb/sd_detach", "/proc/stb/lcd/live_enable"],
        ),
        readable("LcdLiveTVMode", "/proc/stb/lcd/mode"),
        readable("LcdLiveDecoder", "/proc/stb/lcd/live_decoder"),
        Step::new("FastChannelChange", |ctx| ctx.set("FastChannelChange", false)),
        readable_any("3DMode", &["/proc/stb/fb/3dmode", "/proc/stb/fb/primary/3d"]),
        readable_any(
            "3DZNorm",
            &["/proc/stb/fb/znorm", "/proc/stb/fb/primary/zoffset"],
        ),
        Step::new("Blindscan_t2_available", |ctx| {
            let value =
                ctx.readable("/proc/stb/info/vumodel") && ctx.model.is_in(family::BLINDSCAN_T2);
            ctx.set("Blindscan_t2_available", value)
        }),
        Step::new("RcTypeChangable", |ctx| {
            let value =
                !ctx.model.is_in(family::FIXED_RC_TYPE) && ctx.exists("/proc/stb/ir/rc/type");
            ctx.set("RcTypeChangable", value)
        }),
        non_member("HasFullHDSkinSupport", family::NO_FULLHD_SKIN),
        readable(
            "HasBypassEdidChecking",
            "/proc/stb/hdmi/bypass_edid_checking",
        ),
        Step::new("HasMMC", |ctx| {
            let value = ctx
                .cmdline
                .get("root")
                .is_some_and(|root| root.starts_with("/dev/mmcblk"));
            ctx.set("HasMMC", value)
        }),
        readable("HasColorspace", "/proc/stb/video/hdmi_colorspace"),
        Step::new("HasColorspaceSimple", |ctx| {
            let value = ctx.flag("HasColorspace")
                && ctx.flag("HasMMC")
                && ctx.flag("Blindscan_t2_available");
            ctx.set("HasColorspaceSimple", value)
        })
        .reads(&["HasColorspace", "HasMMC", "Blindscan_t2_available"]),
        Step::new("HasTranscoding", |ctx| {
            let value = ctx.exists("/proc/stb/encoder/0") || ctx.readable("/dev/bcm_enc0");
            ctx.set("HasTranscoding", value)
        }),
        contains(
            "HasH265Encoder",
            "/proc/stb/encoder/0/vcodec_choices",
            "h265",
        ),
        member(
            "CanNotDoSimultaneousTranscodeAndPIP",
            family::NO_TRANSCODE_WITH_PIP,
        ),
        readable("HasColordepth", "/proc/stb/video/hdmi_colordepth"),
        member("HasFrontDisplayPicon", family::FRONT_DISPLAY_PICON),
        readable("Has24hz", "/proc/stb/video/videomode_24hz"),
        contains(
            "Has2160p",
            "/proc/stb/video/videomode_preferred",
            "2160p50",
        ),
        readable("HasHDMIpreemphasis", "/proc/stb/hdmi/preemphasis"),
        readable("HasColorimetry", "/proc/stb/video/hdmi_colorimetry"),
        readable("HasHdrType", "/proc/stb/video/hdmi_hdrtype"),
        Step::new("HasScaler_sharpness", |ctx| {
            let value = ctx.exists("/proc/stb/vmpeg/0/pep_scaler_sharpness");
            ctx.set("HasScaler_sharpness", value)
        }),
        Step::new("HasHDMIin", hdmi_in),
        Step::new("HasHDMI-CEC", hdmi_cec),
        member("HasYPbPr", family::YPBPR),
        member("HasScart", family::SCART),
        member("HasSVideo", family::SVIDEO),
        non_member("HasComposite", family::NO_COMPOSITE),
        Step::new("hasXcoreVFD", xcore_vfd),
        non_member("HasOfflineDecoding", family::NO_OFFLINE_DECODING),
        Step::new("hasKexec", |ctx| {
            ctx.set("hasKexec", ctx.cmdline.raw().contains("kexec=1"))
        }),
        Step::new("canKexec", can_kexec).reads(&["hasKexec"]),
        Step::new("MultibootStartupDevice", multiboot_startup_device),
        Step::new("canMode12", can_mode12),
        Step::new("canMultiBoot", can_multiboot),
        readable("canDualBoot", "/dev/block/by-name/flag"),
        non_member("canFlashWithOfgwrite", family::NO_OFGWRITE),
        with_choices(
            "HDRSupport",
            "/proc/stb/hdmi/hlg_support_choices",
            "/proc/stb/hdmi/hlg_support",
        ),
        Step::new("CanProc", |ctx| {
            let value = ctx.flag("HasMMC") && !ctx.flag("Blindscan_t2_available");
            ctx.set("CanProc", value)
        })
        .reads(&["HasMMC", "Blindscan_t2_available"]),
        readable("HasMultichannelPCM", "/proc/stb/audio/multichannel_pcm"),
        with_choices(
            "HasAutoVolume",
            "/proc/stb/audio/avl_choices",
            "/proc/stb/audio/avl",
        ),
        with_choices(
            "HasAutoVolumeLevel",
            "/proc/stb/audio/autovolumelevel_choices",
            "/proc/stb/audio/autovolumelevel",
        ),
        with_choices(
            "Has3DSurround",
            "/proc/stb/audio/3d_surround_choices",
            "/proc/stb/audio/3d_surround",
        ),
        with_choices(
            "Has3DSpeaker",
            "/proc/stb/audio/3d_surround_speaker_position_choices",
            "/proc/stb/audio/3d_surround_speaker_position",
        ),
        with_choices(
            "Has3DSurroundSpeaker",
            "/proc/stb/audio/3dsurround_choices",
            "/proc/stb/audio/3dsurround",
        ),
        with_choices(
            "Has3DSurroundSoftLimiter",
            "/proc/stb/audio/3dsurround_softlimiter_choices",
            "/proc/stb/audio/3dsurround_softlimiter",
        ),
        member("DreamBoxAudio", family::DREAMBOX_AUDIO),
        contains("CanDownmixAC3", "/proc/stb/audio/ac3_choices", "downmix"),
        contains("CanDownmixDTS", "/proc/stb/audio/dts_choices", "downmix"),
        contains("CanDownmixAAC", "/proc/stb/audio/aac_choices", "downmix"),
        readable("HDMIAudioSource", "/proc/stb/hdmi/audio_source"),
        contains(
            "CanAC3Transcode",
            "/proc/stb/audio/ac3plus_choices",
            "force_ac3",
        ),
        contains("CanDTSHD", "/proc/stb/audio/dtshd_choices", "downmix"),
        contains(
            "CanDownmixAACPlus",
            "/proc/stb/audio/aacplus_choices",
            "downmix",
        ),
        contains(
            "CanAACTranscode",
            "/proc/stb/audio/aac_transcode_choices",
            "off",
        ),
        contains("CanWMAPRO", "/proc/stb/audio/wmapro_choices", "downmix"),
        contains("CanBTAudio", "/proc/stb/audio/btaudio_choices", "off"),
        readable_any(
            "CanBTAudioDelay",
            &[
                "/proc/stb/audio/btaudio_delay",
                "/proc/stb/audio/btaudio_delay_pcm",
            ],
        ),
        Step::new("BootDevice", boot_device),
        exactly("NimExceptionVuSolo2", "vusolo2"),
        exactly("NimExceptionVuDuo2", "vuduo2"),
        exactly("NimExceptionDMM8000", "dm8000"),
        member("FbcTunerPowerAlwaysOn", family::FBC_TUNER_ALWAYS_ON),
        Step::new("HasPhysicalLoopthrough", physical_loopthrough),
        Step::new("HasFBCtuner", |ctx| {
            ctx.set("HasFBCtuner", Value::str_list(FBC_TUNERS.iter().copied()))
        }),
        Step::new("HasHiSi", |ctx| {
            ctx.set("HasHiSi", ctx.probe.is_present("/proc/hisi"))
        }),
        Step::new("FCCactive", |ctx| ctx.set("FCCactive", false)),
        Step::new("Autoresolution_proc_videomode", |ctx| {
            let path = if ctx.model.is_in(family::VIDEOMODE_50HZ) {
                "/proc/stb/video/videomode_50hz"
            } else {
                "/proc/stb/video/videomode"
            };
            ctx.set("Autoresolution_proc_videomode", path)
        }),
    ]
}
