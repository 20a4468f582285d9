//! Error types for device selection and decoding.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A candidate node exists but could not be opened.
    #[error("failed to open {path}: {source}")]
    DeviceOpenFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The candidate lacks one of the multitouch slot capabilities or
    /// reports an unusable calibration.
    #[error("unsupported device {0}")]
    UnsupportedDevice(String),

    /// Selection finished with nothing attached.
    #[error("no compatible multitouch screens found")]
    NoCompatibleDevice,

    #[error("failed to read events from {identity}: {source}")]
    ReadFailed {
        identity: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Config(String),
}
