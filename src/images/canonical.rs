//! Raw decoder file names to canonical image kinds.
//!
//! The direct and streaming decoders append the pass timestamp to every
//! image (`spread_321_2021-02-05-19-26-23.jpg`), the integrated tool prefixes
//! its images with the instrument and product names (`rgb_msu_mr_rgb_321.png`).
//! Both are reduced to a kind such as `spread_321` or `rgb_321`.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::receiver::ReceiveMode;

/// Tried in order, only the first matching prefix is removed.
pub const PREFIX_CASCADE: [&str; 3] = ["rgb_msu_mr_", "msu_mr_", "rgb_"];

static TIMESTAMP_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}(\.[^.]+)$").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalRule {
    /// Strip a trailing `_YYYY-MM-DD-HH-MM-SS` before the extension.
    TimestampSuffix,
    /// Strip the first matching entry of [`PREFIX_CASCADE`].
    PrefixCascade,
}

impl CanonicalRule {
    pub fn for_mode(mode: ReceiveMode) -> Self {
        if mode.emits_spread_images() {
            CanonicalRule::TimestampSuffix
        } else {
            CanonicalRule::PrefixCascade
        }
    }
}

/// Canonical file name, extension kept.
pub fn canonical_file_name(raw_name: &str, rule: CanonicalRule) -> String {
    match rule {
        CanonicalRule::TimestampSuffix => TIMESTAMP_SUFFIX.replace(raw_name, "$1").into_owned(),
        CanonicalRule::PrefixCascade => PREFIX_CASCADE
            .iter()
            .find_map(|prefix| raw_name.strip_prefix(prefix))
            .unwrap_or(raw_name)
            .to_string(),
    }
}

/// Canonical kind: the canonical file name without its extension.
pub fn canonical_kind(raw_name: &str, rule: CanonicalRule) -> String {
    let name = canonical_file_name(raw_name, rule);
    Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_suffix_is_stripped() {
        assert_eq!(
            canonical_file_name("foo_2021-02-05-19-26-23.jpg", CanonicalRule::TimestampSuffix),
            "foo.jpg"
        );
        assert_eq!(
            canonical_kind("spread_321_2021-02-05-19-26-23.jpg", CanonicalRule::TimestampSuffix),
            "spread_321"
        );
    }

    #[test]
    fn test_names_without_timestamp_are_unchanged() {
        for name in [
            "foo_bar.jpg",
            "spread_321.jpg",
            "foo_2021-02-05-19-26.jpg",
            "foo_2021-02-05-19-26-23-extra.jpg",
            "foo_2021-02-05-19-26-23",
        ] {
            assert_eq!(
                canonical_file_name(name, CanonicalRule::TimestampSuffix),
                name
            );
        }
    }

    #[test]
    fn test_prefix_cascade_removes_one_layer() {
        assert_eq!(
            canonical_file_name("rgb_msu_mr_rgb_321.png", CanonicalRule::PrefixCascade),
            "rgb_321.png"
        );
        // a second pass through the cascade peels the next layer
        assert_eq!(
            canonical_file_name("rgb_321.png", CanonicalRule::PrefixCascade),
            "321.png"
        );
        assert_eq!(
            canonical_kind("msu_mr_rgb_221_corrected.png", CanonicalRule::PrefixCascade),
            "rgb_221_corrected"
        );
        assert_eq!(
            canonical_kind("msu_mr_4.png", CanonicalRule::PrefixCascade),
            "4"
        );
    }

    #[test]
    fn test_prefix_cascade_leaves_unknown_names() {
        assert_eq!(
            canonical_file_name("thermal.png", CanonicalRule::PrefixCascade),
            "thermal.png"
        );
    }

    #[test]
    fn test_rule_follows_mode() {
        assert_eq!(
            CanonicalRule::for_mode(ReceiveMode::RtlFm),
            CanonicalRule::TimestampSuffix
        );
        assert_eq!(
            CanonicalRule::for_mode(ReceiveMode::Gnuradio),
            CanonicalRule::TimestampSuffix
        );
        assert_eq!(
            CanonicalRule::for_mode(ReceiveMode::Satdump),
            CanonicalRule::PrefixCascade
        );
    }
}
