use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Image kinds in the order the website prefers them as the pass thumbnail.
/// Visual composites first, infrared and derived products last.
pub const WEBSITE_THUMBNAIL_PRIORITY: [&str; 15] = [
    "equidistant_321",
    "mercator_321",
    "spread_321",
    "rgb_321_corrected",
    "rgb_321",
    "equidistant_221",
    "mercator_221",
    "spread_221",
    "rgb_221_corrected",
    "rgb_221",
    "spread_IR",
    "equidistant_IR",
    "mercator_IR",
    "thermal",
    "rain",
];

pub struct WebsiteThumbnailSelector<'a> {
    thumb_output: &'a Path,
}

impl<'a> WebsiteThumbnailSelector<'a> {
    pub fn new(thumb_output: &'a Path) -> Self {
        Self { thumb_output }
    }

    pub fn target(&self, filename_base: &str) -> PathBuf {
        self.thumb_output
            .join(format!("{}-website-thumbnail.jpg", filename_base))
    }

    /// Copies the highest-priority existing thumbnail to the website alias.
    /// Returns the kind that was picked, `None` when no candidate exists.
    pub fn select(&self, filename_base: &str) -> io::Result<Option<&'static str>> {
        for kind in WEBSITE_THUMBNAIL_PRIORITY {
            let candidate = self
                .thumb_output
                .join(format!("{}-{}.jpg", filename_base, kind));
            if candidate.is_file() {
                fs::copy(&candidate, self.target(filename_base))?;
                log::info!("Website thumbnail for {} uses {}", filename_base, kind);
                return Ok(Some(kind));
            }
        }
        log::info!("No website thumbnail candidate for {}", filename_base);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_earlier_kind_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base-spread_IR.jpg"), b"ir").unwrap();
        fs::write(dir.path().join("base-spread_221.jpg"), b"221").unwrap();

        let selector = WebsiteThumbnailSelector::new(dir.path());
        assert_eq!(selector.select("base").unwrap(), Some("spread_221"));
        assert_eq!(fs::read(selector.target("base")).unwrap(), b"221");
    }

    #[test]
    fn test_other_passes_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("other-spread_321.jpg"), b"x").unwrap();

        let selector = WebsiteThumbnailSelector::new(dir.path());
        assert_eq!(selector.select("base").unwrap(), None);
        assert!(!selector.target("base").exists());
    }

    #[test]
    fn test_priority_list_has_no_duplicates() {
        let mut kinds = WEBSITE_THUMBNAIL_PRIORITY.to_vec();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), 15);
    }
}
