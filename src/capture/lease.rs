use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

use crate::capture::LeaseError;
use crate::config::ToolsConfig;
use crate::executor::{Executor, ExternalCommand};
use crate::receiver::{ReceiverProfile, ReceiverType};

/// Who currently owns the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseHolder {
    pub pid: u32,
    pub filename_base: String,
    pub acquired_at: DateTime<Utc>,
}

/// Proof that this run owns the receiver. Released explicitly at the end of the run.
#[derive(Debug)]
pub struct CaptureLease {
    holder: LeaseHolder,
    path: PathBuf,
}

impl CaptureLease {
    pub fn holder(&self) -> &LeaseHolder {
        &self.holder
    }
}

/// Exclusive access to the receiver. The newest pass always wins: acquiring
/// revokes any existing holder and terminates every competing capture family.
pub struct CaptureLeaseManager<'a> {
    lease_file: PathBuf,
    executor: &'a Executor,
    tools: &'a ToolsConfig,
}

impl<'a> CaptureLeaseManager<'a> {
    pub fn new(lease_file: &Path, executor: &'a Executor, tools: &'a ToolsConfig) -> Self {
        Self {
            lease_file: lease_file.to_path_buf(),
            executor,
            tools,
        }
    }

    /// Process-name patterns of everything that can hold the SDR.
    /// The configured flowgraph is included in case it does not follow the
    /// `{receiver}_m2_lrpt_rx` naming.
    pub fn competing_families(&self) -> Vec<String> {
        let mut patterns = vec![program_name(&self.tools.rtl_fm)];
        patterns.extend(ReceiverType::iter().map(|t| {
            format!("{}_m2_lrpt_rx", ReceiverProfile::for_type(t).flowgraph_prefix())
        }));
        if let Some(stem) = self.tools.gnuradio_flowgraph.file_stem() {
            let stem = stem.to_string_lossy().into_owned();
            if !patterns.contains(&stem) {
                patterns.push(stem);
            }
        }
        patterns.push(program_name(&self.tools.satdump));
        patterns
    }

    pub fn current_holder(&self) -> Result<Option<LeaseHolder>, LeaseError> {
        if !self.lease_file.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.lease_file)?;
        match serde_yaml::from_str(&content) {
            Ok(holder) => Ok(Some(holder)),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable lease file {}: {}",
                    self.lease_file.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    pub fn acquire(&self, filename_base: &str) -> Result<CaptureLease, LeaseError> {
        let own_pid = std::process::id();

        if let Some(previous) = self.current_holder()? {
            if previous.pid != own_pid {
                log::warn!(
                    "Revoking capture lease held by {} (PID {}) since {}",
                    previous.filename_base,
                    previous.pid,
                    previous.acquired_at
                );
                self.executor.run_unchecked(
                    &ExternalCommand::new(&self.tools.kill)
                        .arg("-TERM")
                        .arg(previous.pid.to_string()),
                )?;
            }
        }

        for pattern in self.competing_families() {
            let output = self
                .executor
                .run_unchecked(&ExternalCommand::new(&self.tools.pkill).arg("-f").arg(&pattern))?;
            if output.success() {
                log::warn!("Terminated running {} process(es) to free the receiver", pattern);
            }
        }

        let holder = LeaseHolder {
            pid: own_pid,
            filename_base: filename_base.to_string(),
            acquired_at: Utc::now(),
        };
        if let Some(parent) = self.lease_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.lease_file, serde_yaml::to_string(&holder)?)?;
        log::info!("Capture lease acquired for {}", filename_base);

        Ok(CaptureLease {
            holder,
            path: self.lease_file.clone(),
        })
    }

    /// Drops the lease file unless a newer pass has already taken it over.
    pub fn release(&self, lease: CaptureLease) -> Result<(), LeaseError> {
        match self.current_holder()? {
            Some(holder) if holder == lease.holder => {
                fs::remove_file(&lease.path)?;
                log::info!("Capture lease released for {}", lease.holder.filename_base);
            }
            Some(holder) => {
                log::info!(
                    "Capture lease now held by {}, leaving it in place",
                    holder.filename_base
                );
            }
            None => {}
        }
        Ok(())
    }
}

fn program_name(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}
