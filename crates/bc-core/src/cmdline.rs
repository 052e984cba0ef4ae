//! Kernel boot command line.
//!
//! `name=value` tokens become a mapping; double-quoted values may contain
//! spaces and lose their quotes. Tokens without `=` are ignored.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

static ARG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn arg_pattern() -> &'static Regex {
    ARG_PATTERN.get_or_init(|| {
        Regex::new(r#"(\S+)=(".*?"|\S+)"#).unwrap_or_else(|e| panic!("invalid cmdline pattern: {}", e))
    })
}

/// Parsed boot command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootCmdline {
    raw: String,
    args: BTreeMap<String, String>,
}

impl BootCmdline {
    /// Parse a raw command line. Later duplicates win.
    pub fn parse(raw: &str) -> Self {
        let args = arg_pattern()
            .captures_iter(raw)
            .map(|caps| (caps[1].to_string(), caps[2].trim_matches('"').to_string()))
            .collect();
        Self {
            raw: raw.to_string(),
            args,
        }
    }

    /// Read and parse a command-line file. Missing files give an empty command line.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "boot command line not readable");
                Self::default()
            }
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    /// `root=` when it names a `/dev/` node.
    pub fn root_device(&self) -> Option<&str> {
        self.get("root").filter(|root| root.starts_with("/dev/"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let cmdline = BootCmdline::parse(
            "console=ttyS0,115200n8 root=/dev/mmcblk0p3 rootwait rw rootfstype=ext4 kexec=1\n",
        );
        assert_eq!(cmdline.get("console"), Some("ttyS0,115200n8"));
        assert_eq!(cmdline.get("root"), Some("/dev/mmcblk0p3"));
        assert_eq!(cmdline.get("rootfstype"), Some("ext4"));
        assert!(!cmdline.contains_key("rootwait"));
        assert_eq!(cmdline.root_device(), Some("/dev/mmcblk0p3"));
        assert!(cmdline.raw().contains("kexec=1"));
    }

    #[test]
    fn test_quoted_values() {
        let cmdline = BootCmdline::parse(r#"a="x y z" b=2 c="""#);
        assert_eq!(cmdline.get("a"), Some("x y z"));
        assert_eq!(cmdline.get("b"), Some("2"));
        assert_eq!(cmdline.get("c"), Some(""));
    }

    #[test]
    fn test_root_must_be_dev_node() {
        let cmdline = BootCmdline::parse("root=UUID=1234-abcd");
        assert_eq!(cmdline.root_device(), None);
        assert_eq!(BootCmdline::parse("").root_device(), None);
    }

    #[test]
    fn test_later_duplicates_win() {
        let cmdline = BootCmdline::parse("root=/dev/sda1 root=/dev/sdb1");
        assert_eq!(cmdline.get("root"), Some("/dev/sdb1"));
    }

    #[test]
    fn test_model_scoped_args() {
        let cmdline = BootCmdline::parse("brcm_cma=504M@264M vuduo4k_4.boxmode=12");
        assert_eq!(cmdline.get("vuduo4k_4.boxmode"), Some("12"));
        assert_eq!(cmdline.iter().count(), 2);
    }
}
