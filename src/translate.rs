//! Limit translation.
//!
//! Maps a [`ResourceLimits`] value to the enforcement primitives the host
//! exposes and records, per limit, whether it will be enforced. The result is
//! a [`LimitPlan`] that the launcher attaches to the child.
//!
//! Translation is partial-success: memory and process-count ceilings that
//! cannot be enforced become warnings, while CPU and file-size ceilings that
//! cannot be enforced abort the launch.

use crate::error::{LaunchError, LimitKind};
use crate::limits::ResourceLimits;
use tracing::{debug, warn};

/// How a single limit will be enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitStatus {
    /// The platform enforces this limit.
    Applied,
    /// Applied, but the platform may not honor it.
    Weak { note: &'static str },
    /// Not applied; the child runs without this ceiling.
    Skipped { reason: String },
}

/// One translated limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitEntry {
    /// Which ceiling this is.
    pub kind: LimitKind,

    /// Value as configured, in the caller's units (see [`LimitKind::unit`]).
    pub requested: u64,

    /// Value handed to the platform primitive.
    ///
    /// Seconds or bytes for rlimits, 100 ns ticks or bytes for job objects.
    pub native: u64,

    /// Enforcement status.
    pub status: LimitStatus,
}

impl LimitEntry {
    /// Returns `true` if the limit is attached to the child.
    pub fn is_enforced(&self) -> bool {
        !matches!(self.status, LimitStatus::Skipped { .. })
    }

    /// Returns `true` if the caller should be warned about this limit.
    pub fn is_warning(&self) -> bool {
        !matches!(self.status, LimitStatus::Applied)
    }
}

/// Translated limits, one entry per configured ceiling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitPlan {
    entries: Vec<LimitEntry>,
}

impl LimitPlan {
    /// All entries, in CPU, memory, process count, file size order.
    pub fn entries(&self) -> &[LimitEntry] {
        &self.entries
    }

    /// Entry for `kind`, if that limit was configured.
    pub fn get(&self, kind: LimitKind) -> Option<&LimitEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    /// Entries that will be attached to the child.
    pub fn enforced(&self) -> impl Iterator<Item = &LimitEntry> {
        self.entries.iter().filter(|e| e.is_enforced())
    }

    /// Entries that were weakened or skipped.
    pub fn warnings(&self) -> impl Iterator<Item = &LimitEntry> {
        self.entries.iter().filter(|e| e.is_warning())
    }

    /// Returns `true` if nothing is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Translate `limits` for the current platform.
///
/// Zero-valued fields produce no entry and no warning.
///
/// # Errors
///
/// `LaunchError::LimitSetup` if a CPU or file-size ceiling cannot be
/// enforced on this host.
pub fn translate_limits(limits: &ResourceLimits) -> Result<LimitPlan, LaunchError> {
    let mut entries = Vec::with_capacity(LimitKind::ALL.len());

    for kind in LimitKind::ALL {
        let Some(requested) = limits.configured(kind) else {
            continue;
        };

        let entry = translate_one(kind, requested, limits)?;
        log_entry(&entry);
        entries.push(entry);
    }

    Ok(LimitPlan { entries })
}

fn log_entry(entry: &LimitEntry) {
    match &entry.status {
        LimitStatus::Applied => debug!(
            target: "zencube::limits",
            limit = %entry.kind,
            value = entry.requested,
            unit = entry.kind.unit(),
            native = entry.native,
            "limit translated"
        ),
        LimitStatus::Weak { note } => warn!(
            target: "zencube::limits",
            limit = %entry.kind,
            value = entry.requested,
            unit = entry.kind.unit(),
            note,
            "limit applied with weak enforcement"
        ),
        LimitStatus::Skipped { reason } => warn!(
            target: "zencube::limits",
            limit = %entry.kind,
            value = entry.requested,
            unit = entry.kind.unit(),
            %reason,
            "limit not enforced, continuing without it"
        ),
    }
}

/// Native value for `kind` on rlimit platforms: seconds or bytes.
#[cfg(unix)]
fn native_value(kind: LimitKind, limits: &ResourceLimits) -> u64 {
    match kind {
        LimitKind::Memory => limits.memory_bytes(),
        LimitKind::FileSize => limits.max_file_bytes(),
        LimitKind::Cpu | LimitKind::ProcessCount => limits.get(kind),
    }
}

#[cfg(unix)]
fn translate_one(
    kind: LimitKind,
    requested: u64,
    limits: &ResourceLimits,
) -> Result<LimitEntry, LaunchError> {
    use crate::rlimit::{self, HardCeiling};

    let native = native_value(kind, limits);
    let Some(resource) = rlimit::resource_for(kind) else {
        return Ok(LimitEntry {
            kind,
            requested,
            native,
            status: LimitStatus::Skipped {
                reason: "not supported on this platform".to_string(),
            },
        });
    };

    plan_rlimit(kind, requested, native, HardCeiling::current(resource))
}

/// Decide how one rlimit is enforced given the current hard ceiling.
///
/// A ceiling the caller cannot raise is fatal for CPU and file size and a
/// skipped warning for memory and process count. An unreadable ceiling
/// leaves the attempt to the child.
#[cfg(unix)]
fn plan_rlimit(
    kind: LimitKind,
    requested: u64,
    native: u64,
    ceiling: Option<crate::rlimit::HardCeiling>,
) -> Result<LimitEntry, LaunchError> {
    let entry = |status| LimitEntry {
        kind,
        requested,
        native,
        status,
    };

    if let Some(hard) = ceiling.and_then(|c| c.blocks(native)) {
        let reason = format!("requested {native} exceeds the hard limit {hard}");
        if kind.is_fatal_on_failure() {
            return Err(LaunchError::LimitSetup { kind, reason });
        }
        return Ok(entry(LimitStatus::Skipped { reason }));
    }

    if kind == LimitKind::Memory && cfg!(target_os = "macos") {
        return Ok(entry(LimitStatus::Weak {
            note: "address-space limits are not reliably enforced on macOS",
        }));
    }

    Ok(entry(LimitStatus::Applied))
}

/// Job objects take CPU time in 100 ns ticks.
#[cfg(windows)]
const TICKS_PER_SECOND: u64 = 10_000_000;

#[cfg(windows)]
fn translate_one(
    kind: LimitKind,
    requested: u64,
    limits: &ResourceLimits,
) -> Result<LimitEntry, LaunchError> {
    let (native, status) = match kind {
        LimitKind::Cpu => (
            requested.saturating_mul(TICKS_PER_SECOND),
            LimitStatus::Applied,
        ),
        LimitKind::Memory => (limits.memory_bytes(), LimitStatus::Applied),
        LimitKind::ProcessCount | LimitKind::FileSize => (
            requested,
            LimitStatus::Skipped {
                reason: "not enforced by job objects on this platform".to_string(),
            },
        ),
    };

    Ok(LimitEntry {
        kind,
        requested,
        native,
        status,
    })
}
