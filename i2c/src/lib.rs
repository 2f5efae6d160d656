pub mod dev;
pub mod lcd;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum I2cError {
    #[error("device already initialized")]
    AlreadyInitialized,
    #[error("device not initialized, call begin() first")]
    NotInitialized,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("bus error: {0}")]
    Bus(String),
}

impl From<std::io::Error> for I2cError {
    fn from(err: std::io::Error) -> Self {
        I2cError::Io(err.kind())
    }
}

pub type I2cResult<T> = Result<T, I2cError>;

/// An I2C bus adapter on the host, capable of opening connections to
/// individual slave devices.
pub trait I2cDriver: Debug {
    /// Opens the bus for communication with the slave at `address`.
    ///
    /// `address` is the 7-bit slave address. The returned handle owns the
    /// connection until dropped.
    fn open(&self, address: u8) -> I2cResult<Box<dyn I2cBus + '_>>;
}

/// An open connection to one slave device on an I2C bus.
///
/// Dropping the handle closes the connection.
pub trait I2cBus: Debug {
    /// Performs a single write transaction carrying `data`.
    fn write(&mut self, data: &[u8]) -> I2cResult<()>;
}
