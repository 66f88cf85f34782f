//! Sandbox configuration.
//!
//! The main entry point for zencube. A `Sandbox` holds the limits every
//! launch runs under and turns requests into [`PreparedLaunch`]es.

use crate::error::Error;
use crate::limits::ResourceLimits;
use crate::prepared::PreparedLaunch;
use crate::request::LaunchRequest;
use crate::translate::translate_limits;

/// Resource limits applied to every command launched through it.
///
/// Create using `Sandbox::new()` or `Sandbox::builder()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sandbox {
    limits: ResourceLimits,
}

impl Sandbox {
    /// Create a sandbox with the given limits.
    pub fn new(limits: ResourceLimits) -> Self {
        Self { limits }
    }

    /// Create a new sandbox builder.
    pub fn builder() -> SandboxBuilder {
        SandboxBuilder::new()
    }

    /// The configured limits.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Validate a request and translate the limits for it.
    ///
    /// This is the ONLY way to create a `PreparedLaunch`. No process exists
    /// yet when this returns, whatever the result.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if the request cannot be passed to the platform verbatim
    /// - `LaunchError::LimitSetup` if a CPU or file-size ceiling cannot be enforced
    pub fn prepare(&self, request: LaunchRequest) -> Result<PreparedLaunch, Error> {
        request.validate()?;
        let plan = translate_limits(&self.limits)?;

        Ok(PreparedLaunch {
            request,
            limits: self.limits,
            plan,
        })
    }
}

/// Builder for `Sandbox`.
#[derive(Debug, Clone, Default)]
pub struct SandboxBuilder {
    limits: ResourceLimits,
}

impl SandboxBuilder {
    /// Create a new builder with every limit unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CPU time ceiling in seconds (0 = unlimited).
    pub fn cpu_seconds(mut self, seconds: u64) -> Self {
        self.limits.cpu_seconds = seconds;
        self
    }

    /// Set the memory ceiling in megabytes (0 = unlimited).
    pub fn memory_mb(mut self, mb: u64) -> Self {
        self.limits.memory_mb = mb;
        self
    }

    /// Set the process-count ceiling (0 = unlimited).
    pub fn max_processes(mut self, count: u64) -> Self {
        self.limits.max_processes = count;
        self
    }

    /// Set the per-file size ceiling in megabytes (0 = unlimited).
    pub fn max_file_mb(mut self, mb: u64) -> Self {
        self.limits.max_file_mb = mb;
        self
    }

    /// Replace all limits at once.
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the sandbox.
    pub fn build(self) -> Sandbox {
        Sandbox {
            limits: self.limits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, LimitKind};

    #[test]
    fn test_builder_sets_limits() {
        let sandbox = Sandbox::builder()
            .cpu_seconds(5)
            .memory_mb(256)
            .max_processes(10)
            .max_file_mb(50)
            .build();

        assert_eq!(
            *sandbox.limits(),
            ResourceLimits {
                cpu_seconds: 5,
                memory_mb: 256,
                max_processes: 10,
                max_file_mb: 50,
            }
        );
    }

    #[test]
    fn test_prepare_rejects_empty_program() {
        let sandbox = Sandbox::default();
        let request = LaunchRequest::new("", Vec::<String>::new());
        let result = sandbox.prepare(request);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::EmptyProgram))
        ));
    }

    #[test]
    fn test_prepare_unlimited_has_empty_plan() {
        let sandbox = Sandbox::default();
        let prepared = sandbox
            .prepare(LaunchRequest::new("/bin/echo", ["hello"]))
            .unwrap();
        assert!(prepared.plan().is_empty());
        assert_eq!(prepared.request().args.len(), 1);
    }

    #[test]
    fn test_prepare_translates_limits() {
        let sandbox = Sandbox::builder().cpu_seconds(2).build();
        let prepared = sandbox
            .prepare(LaunchRequest::new("/bin/true", Vec::<String>::new()))
            .unwrap();
        assert_eq!(prepared.plan().entries().len(), 1);
        assert!(prepared.plan().get(LimitKind::Cpu).is_some());
    }
}
