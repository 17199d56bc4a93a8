use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::StagingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingKind {
    Ram,
    Disk,
}

/// Where intermediate audio lives for this run. Chosen once, never revisited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLocation {
    pub kind: StagingKind,
    pub base: PathBuf,
}

pub struct MemoryStagingPolicy<'a> {
    config: &'a StagingConfig,
}

impl<'a> MemoryStagingPolicy<'a> {
    pub fn new(config: &'a StagingConfig) -> Self {
        Self { config }
    }

    /// Reads available memory and picks a staging location.
    pub fn choose(&self) -> StagingLocation {
        match read_available_memory_kb(Path::new("/proc/meminfo")) {
            Ok(available_kb) => self.choose_for(available_kb),
            Err(e) => {
                log::warn!("Could not read available memory ({}), staging on disk", e);
                self.disk()
            }
        }
    }

    pub fn choose_for(&self, available_kb: u64) -> StagingLocation {
        let available_mb = available_kb / 1024;
        if available_mb < self.config.memory_threshold_mb {
            log::info!(
                "Only {} MB available (threshold {} MB), staging audio on disk at {}",
                available_mb,
                self.config.memory_threshold_mb,
                self.config.disk_dir.display()
            );
            self.disk()
        } else {
            log::info!(
                "{} MB available, staging audio in RAM at {}",
                available_mb,
                self.config.ram_dir.display()
            );
            StagingLocation {
                kind: StagingKind::Ram,
                base: self.config.ram_dir.clone(),
            }
        }
    }

    fn disk(&self) -> StagingLocation {
        StagingLocation {
            kind: StagingKind::Disk,
            base: self.config.disk_dir.clone(),
        }
    }
}

/// `MemAvailable` from a meminfo-formatted file, in kB.
fn read_available_memory_kb(path: &Path) -> io::Result<u64> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no MemAvailable line"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StagingConfig {
        StagingConfig {
            ram_dir: PathBuf::from("/run/pass-o-mat"),
            disk_dir: PathBuf::from("/srv/audio"),
            memory_threshold_mb: 1000,
        }
    }

    #[test]
    fn test_low_memory_falls_back_to_disk() {
        let config = config();
        let policy = MemoryStagingPolicy::new(&config);
        let location = policy.choose_for(999 * 1024);
        assert_eq!(location.kind, StagingKind::Disk);
        assert_eq!(location.base, PathBuf::from("/srv/audio"));
    }

    #[test]
    fn test_enough_memory_stages_in_ram() {
        let config = config();
        let policy = MemoryStagingPolicy::new(&config);
        assert_eq!(policy.choose_for(1000 * 1024).kind, StagingKind::Ram);
        assert_eq!(policy.choose_for(4_000_000).kind, StagingKind::Ram);
    }

    #[test]
    fn test_reads_mem_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meminfo");
        fs::write(
            &path,
            "MemTotal:        3884332 kB\nMemFree:          181600 kB\nMemAvailable:    2417060 kB\n",
        )
        .unwrap();
        assert_eq!(read_available_memory_kb(&path).unwrap(), 2_417_060);

        fs::write(&path, "MemTotal:        3884332 kB\n").unwrap();
        assert!(read_available_memory_kb(&path).is_err());
    }
}
