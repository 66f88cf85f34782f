//! Resource limits for process execution.

use crate::error::{ConfigError, LimitKind};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Resource ceilings applied to the child before its program starts.
///
/// Every field is independent. A value of zero means "do not apply this
/// limit", never "a limit of zero".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceLimits {
    /// CPU time ceiling in seconds.
    ///
    /// Exceeding it makes the platform deliver a CPU-limit signal.
    pub cpu_seconds: u64,

    /// Address-space ceiling in megabytes.
    ///
    /// Best-effort: some platforms enforce this weakly or not at all.
    pub memory_mb: u64,

    /// Ceiling on processes owned by the executing user (or job).
    pub max_processes: u64,

    /// Ceiling on any single file the child writes, in megabytes.
    pub max_file_mb: u64,
}

impl ResourceLimits {
    /// Create limits with nothing applied.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Build limits from signed caller input, rejecting negative values.
    ///
    /// Arguments are in field order: CPU seconds, memory MB, process count,
    /// file size MB.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NegativeLimit` for the first negative value.
    pub fn try_from_signed(
        cpu_seconds: i64,
        memory_mb: i64,
        max_processes: i64,
        max_file_mb: i64,
    ) -> Result<Self, ConfigError> {
        let check = |kind, value: i64| {
            u64::try_from(value).map_err(|_| ConfigError::NegativeLimit { kind, value })
        };

        Ok(Self {
            cpu_seconds: check(LimitKind::Cpu, cpu_seconds)?,
            memory_mb: check(LimitKind::Memory, memory_mb)?,
            max_processes: check(LimitKind::ProcessCount, max_processes)?,
            max_file_mb: check(LimitKind::FileSize, max_file_mb)?,
        })
    }

    /// Set the CPU time ceiling in seconds.
    pub fn with_cpu_seconds(mut self, seconds: u64) -> Self {
        self.cpu_seconds = seconds;
        self
    }

    /// Set the address-space ceiling in megabytes.
    pub fn with_memory_mb(mut self, mb: u64) -> Self {
        self.memory_mb = mb;
        self
    }

    /// Set the process-count ceiling.
    pub fn with_max_processes(mut self, count: u64) -> Self {
        self.max_processes = count;
        self
    }

    /// Set the per-file size ceiling in megabytes.
    pub fn with_max_file_mb(mut self, mb: u64) -> Self {
        self.max_file_mb = mb;
        self
    }

    /// Configured value for `kind`, in the caller's units.
    pub fn get(&self, kind: LimitKind) -> u64 {
        match kind {
            LimitKind::Cpu => self.cpu_seconds,
            LimitKind::Memory => self.memory_mb,
            LimitKind::ProcessCount => self.max_processes,
            LimitKind::FileSize => self.max_file_mb,
        }
    }

    /// The configured value for `kind`, or `None` when it is unlimited.
    pub fn configured(&self, kind: LimitKind) -> Option<u64> {
        Some(self.get(kind)).filter(|&v| v > 0)
    }

    /// Returns `true` if no limit is configured.
    pub fn is_unlimited(&self) -> bool {
        LimitKind::ALL.iter().all(|&k| self.get(k) == 0)
    }

    /// Memory ceiling in bytes (saturating).
    pub fn memory_bytes(&self) -> u64 {
        self.memory_mb.saturating_mul(BYTES_PER_MB)
    }

    /// File size ceiling in bytes (saturating).
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_mb.saturating_mul(BYTES_PER_MB)
    }
}
