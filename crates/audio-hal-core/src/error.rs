//! Error handling for the routing engine
//!
//! Every fallible operation in the crate returns [`Result`]. Errors raised by the
//! selector and the registry surface synchronously to the stream lifecycle call
//! that triggered them; vendor entry points that are absent produce
//! [`HalError::MissingCapability`], which callers log and skip.

use thiserror::Error;

use crate::sound_device::SoundDevice;
use crate::usecase::UseCase;

/// Result type alias for HAL operations
pub type Result<T> = std::result::Result<T, HalError>;

const EINVAL: i32 = 22;
const EEXIST: i32 = 17;
const EIO: i32 = 5;
const ENOSYS: i32 = 38;

/// Error type for the audio HAL engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    /// Unmapped id, malformed device combination or unsupported stream parameter
    #[error("Invalid argument: {details}")]
    InvalidArgument { details: String },

    /// The selector could not produce a concrete sound device
    #[error("No sound device resolvable for {context}")]
    DeviceUnresolvable { context: String },

    /// A usecase with the same id is already registered
    #[error("Usecase {usecase} is already active")]
    AlreadyExists { usecase: UseCase },

    /// The usecase is not registered
    #[error("Usecase {usecase} is not active")]
    NotFound { usecase: UseCase },

    /// The transfer endpoint rejected an open or start
    #[error("Transfer endpoint failure: {reason}")]
    IoFailure { reason: String },

    /// An optional vendor entry point is not available
    #[error("Vendor entry point '{entry_point}' is not available")]
    MissingCapability { entry_point: &'static str },

    /// A vendor entry point returned a failure status
    #[error("{operation} failed with status {status}")]
    GatewayFailure { operation: &'static str, status: i32 },
}

impl HalError {
    /// Create a new invalid argument error
    pub fn invalid_argument(details: impl Into<String>) -> Self {
        Self::InvalidArgument {
            details: details.into(),
        }
    }

    /// Create a new unresolvable device error
    pub fn unresolvable(context: impl Into<String>) -> Self {
        Self::DeviceUnresolvable {
            context: context.into(),
        }
    }

    /// Create a new I/O failure
    pub fn io(reason: impl Into<String>) -> Self {
        Self::IoFailure {
            reason: reason.into(),
        }
    }

    /// Invalid sound device for an enable/disable request
    pub fn invalid_device(device: SoundDevice) -> Self {
        Self::invalid_argument(format!("sound device {} has no physical path", device))
    }

    /// Negative errno understood by C-facing adapters
    pub fn status(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. }
            | Self::DeviceUnresolvable { .. }
            | Self::NotFound { .. } => -EINVAL,
            Self::AlreadyExists { .. } => -EEXIST,
            Self::IoFailure { .. } => -EIO,
            Self::MissingCapability { .. } => -ENOSYS,
            Self::GatewayFailure { status, .. } => *status,
        }
    }

    /// Whether this error must abort the operation that raised it.
    ///
    /// A missing vendor entry point degrades to a no-op and is never fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MissingCapability { .. })
    }
}
