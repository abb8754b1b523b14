use std::fmt;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

/// Argument group of a convolution call that failed to resolve during binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingGroup {
    Operand,
    Output,
    Scratch,
    Attribute,
}

impl BindingGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            BindingGroup::Operand => "operand",
            BindingGroup::Output => "output",
            BindingGroup::Scratch => "scratch",
            BindingGroup::Attribute => "attribute",
        }
    }
}

impl fmt::Display for BindingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category of a [`ConvError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Binding,
    Build,
    AutotuneUnavailable,
    Autotune,
    Allocation,
    Execution,
}

/// Error surfaced by a convolution call.
#[derive(Debug, Error)]
pub enum ConvError {
    #[error("failed to bind convolution {group}: {message}")]
    Binding {
        group: BindingGroup,
        message: String,
    },
    #[error("convolution plan construction failed: {message}")]
    Build { message: String },
    #[error("runtime autotuning is unavailable: {message}")]
    AutotuneUnavailable { message: String },
    #[error("runtime autotuning failed: {message}")]
    Autotune { message: String },
    #[error("failed to allocate {bytes} scratch bytes on device {device_ordinal}: {message}")]
    Allocation {
        device_ordinal: usize,
        bytes: u64,
        message: String,
    },
    #[error("convolution execution failed: {message}")]
    Execution { message: String },
}

impl ConvError {
    pub fn binding(group: BindingGroup, message: impl Into<String>) -> Self {
        ConvError::Binding {
            group,
            message: message.into(),
        }
    }

    pub fn build(message: impl Into<String>) -> Self {
        ConvError::Build {
            message: message.into(),
        }
    }

    pub fn autotune_unavailable(message: impl Into<String>) -> Self {
        ConvError::AutotuneUnavailable {
            message: message.into(),
        }
    }

    pub fn autotune(message: impl Into<String>) -> Self {
        ConvError::Autotune {
            message: message.into(),
        }
    }

    pub fn allocation(device_ordinal: usize, bytes: u64, message: impl Into<String>) -> Self {
        ConvError::Allocation {
            device_ordinal,
            bytes,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        ConvError::Execution {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvError::Binding { .. } => ErrorKind::Binding,
            ConvError::Build { .. } => ErrorKind::Build,
            ConvError::AutotuneUnavailable { .. } => ErrorKind::AutotuneUnavailable,
            ConvError::Autotune { .. } => ErrorKind::Autotune,
            ConvError::Allocation { .. } => ErrorKind::Allocation,
            ConvError::Execution { .. } => ErrorKind::Execution,
        }
    }
}

/// Convenience alias for results returned by the convolution runtime.
pub type ConvResult<T> = Result<T, ConvError>;

pub(crate) fn lock_named<'a, T>(mutex: &'a Mutex<T>, what: &str) -> ConvResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| ConvError::execution(format!("{what} mutex poisoned")))
}
