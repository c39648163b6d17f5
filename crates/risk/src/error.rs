// In crates/risk/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// A numeric argument violated its precondition (e.g. a zero price).
    #[error("Invalid risk check input: {0}")]
    InvalidInput(String),

    #[error("Invalid risk parameters: {0}")]
    InvalidLimits(String),
}

pub type Result<T> = std::result::Result<T, Error>;
