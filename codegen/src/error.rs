use std::path::PathBuf;

use thiserror::Error;

/// Failure of a generation step.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("Could not write `{path}`: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("{0} index {1} is out of range.")]
    Range(&'static str, u32),
}

/// Caller-facing result code of a generation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    WriteFailure = 1,
    ConfigError = 2,
    Unsupported = 3,
    IndexOutOfRange = 4,
}

impl Status {
    pub fn of<T>(res: &Result<T, CodegenError>) -> Self {
        match res {
            Ok(_) => Self::Success,
            Err(e) => e.status(),
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl CodegenError {
    pub fn status(&self) -> Status {
        match self {
            Self::Write { .. } => Status::WriteFailure,
            Self::Config(_) => Status::ConfigError,
            Self::Unsupported(_) => Status::Unsupported,
            Self::Range(..) => Status::IndexOutOfRange,
        }
    }

    /// Log and return a configuration error.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("{msg}");
        Self::Config(msg)
    }

    /// Log and return an unsupported-feature error.
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("{msg}");
        Self::Unsupported(msg)
    }
}
