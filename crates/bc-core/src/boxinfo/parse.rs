//! Boot-information file parser.
//!
//! Format: one `key=value` per line, `#` comments and blank lines allowed,
//! terminated by `checksum=<md5 hex>` over every byte before that line.

use std::collections::BTreeMap;

use bc_common::{coerce_value, Value};
use md5::{Digest, Md5};
use serde::Serialize;

/// Line prefix that terminates parsing.
pub const CHECKSUM_PREFIX: &str = "checksum=";

/// Outcome of checksum verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChecksumStatus {
    /// The trailing checksum matches the content.
    Verified,
    /// A checksum line exists but does not match.
    Mismatch { expected: String, computed: String },
    /// No checksum line (or no file at all).
    Missing,
}

impl ChecksumStatus {
    /// Registry/store representation: `True`, `False` or `None`.
    pub fn as_value(&self) -> Value {
        match self {
            ChecksumStatus::Verified => Value::Bool(true),
            ChecksumStatus::Mismatch { .. } => Value::Bool(false),
            ChecksumStatus::Missing => Value::None,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, ChecksumStatus::Verified)
    }
}

/// Parsed boot-info content.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBoxInfo {
    pub entries: BTreeMap<String, Value>,
    pub checksum: ChecksumStatus,
}

/// Parse boot-info text.
///
/// Never fails: values that are not literals stay strings, lines without `=`
/// are ignored. Line endings are normalized to `\n` before hashing.
pub fn parse_boxinfo(text: &str) -> ParsedBoxInfo {
    let normalized = normalize_newlines(text);
    let mut entries = BTreeMap::new();
    let mut checksum = ChecksumStatus::Missing;
    let mut hashed = String::with_capacity(normalized.len());

    for line in normalized.split_inclusive('\n') {
        if line.starts_with(CHECKSUM_PREFIX) {
            let expected = line.trim().split('=').nth(1).unwrap_or_default().to_string();
            let computed = md5_hex(&hashed);
            checksum = if computed == expected {
                ChecksumStatus::Verified
            } else {
                ChecksumStatus::Mismatch { expected, computed }
            };
            break;
        }

        hashed.push_str(line);

        let trimmed = line.trim();
        if trimmed.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            entries.insert(key.to_string(), coerce_value(value.trim()));
        }
    }

    ParsedBoxInfo { entries, checksum }
}

/// MD5 hex digest of `content`.
pub fn md5_hex(content: &str) -> String {
    hex::encode(Md5::digest(content.as_bytes()))
}

/// Append a correct checksum line to `body`.
pub fn with_checksum(body: &str) -> String {
    let body = normalize_newlines(body);
    let mut out = body.clone();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    let digest = md5_hex(&out);
    out.push_str(CHECKSUM_PREFIX);
    out.push_str(&digest);
    out.push('\n');
    out
}

fn normalize_newlines(text: &str) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verified_checksum() {
        let text = with_checksum("machine=testbox\nbrand=\"Test\"\n");
        let parsed = parse_boxinfo(&text);
        assert_eq!(parsed.checksum, ChecksumStatus::Verified);
        assert_eq!(parsed.entries["machine"], Value::from("testbox"));
        assert_eq!(parsed.entries["brand"], Value::from("Test"));
    }

    #[test]
    fn test_checksum_covers_comments_and_blank_lines() {
        let text = with_checksum("# generated\n\nmachine=testbox\n");
        let parsed = parse_boxinfo(&text);
        assert!(parsed.checksum.is_verified());

        let tampered = text.replacen("# generated", "# generatee", 1);
        assert!(matches!(
            parse_boxinfo(&tampered).checksum,
            ChecksumStatus::Mismatch { .. }
        ));
    }

    #[test]
    fn test_missing_checksum_line() {
        let parsed = parse_boxinfo("machine=testbox\n");
        assert_eq!(parsed.checksum, ChecksumStatus::Missing);
        assert_eq!(parsed.checksum.as_value(), Value::None);
    }

    #[test]
    fn test_parsing_stops_at_checksum_line() {
        let mut text = with_checksum("machine=testbox\n");
        text.push_str("late=1\n");
        let parsed = parse_boxinfo(&text);
        assert!(parsed.checksum.is_verified());
        assert!(!parsed.entries.contains_key("late"));
    }

    #[test]
    fn test_value_coercion() {
        let parsed = parse_boxinfo(
            "a=\"1,2\"\nb=(1,2)\nc=True\nd=12\ne=mipsel\nf= spaced value \ng=url=http://x\n=orphan\nnoequals\n",
        );
        assert_eq!(parsed.entries["a"], Value::from("1,2"));
        assert_eq!(parsed.entries["b"], Value::pair(1, 2));
        assert_eq!(parsed.entries["c"], Value::Bool(true));
        assert_eq!(parsed.entries["d"], Value::Int(12));
        assert_eq!(parsed.entries["e"], Value::from("mipsel"));
        assert_eq!(parsed.entries["f"], Value::from("spaced value"));
        assert_eq!(parsed.entries["g"], Value::from("url=http://x"));
        assert_eq!(parsed.entries.len(), 7);
    }

    #[test]
    fn test_crlf_normalized() {
        let text = with_checksum("machine=testbox\n").replace('\n', "\r\n");
        let parsed = parse_boxinfo(&text);
        assert!(parsed.checksum.is_verified());
        assert_eq!(parsed.entries["machine"], Value::from("testbox"));
    }

    #[test]
    fn test_md5_hex_known_vector() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }
}
