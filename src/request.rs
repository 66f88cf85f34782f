//! Process launch request.

use crate::error::ConfigError;
use std::ffi::OsString;
use std::path::PathBuf;

/// A command to run under limits.
///
/// The program and its arguments are passed verbatim. There is no shell
/// expansion, quoting or splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Program to execute.
    ///
    /// A bare name is looked up on `PATH`, like `execvp`.
    pub program: PathBuf,

    /// Arguments passed as argv[1..].
    pub args: Vec<OsString>,
}

impl LaunchRequest {
    /// Create a new request.
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a request from an argv tail, whose first element is the program.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyProgram` if `argv` is empty.
    pub fn from_argv<I, S>(argv: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next().ok_or(ConfigError::EmptyProgram)?;
        Ok(Self {
            program: PathBuf::from(program),
            args: argv.collect(),
        })
    }

    /// Check that the request can be handed to the platform unchanged.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.program.as_os_str().is_empty() {
            return Err(ConfigError::EmptyProgram);
        }

        if contains_nul(self.program.as_os_str()) {
            return Err(ConfigError::NulByte {
                what: "program path".to_string(),
            });
        }

        if let Some(i) = self.args.iter().position(|a| contains_nul(a)) {
            return Err(ConfigError::NulByte {
                what: format!("argument {}", i + 1),
            });
        }

        Ok(())
    }

    /// Program and arguments joined by spaces, for logging only.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn contains_nul(s: &std::ffi::OsStr) -> bool {
    s.to_string_lossy().contains('\0')
}
