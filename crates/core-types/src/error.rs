// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown trade side: '{0}' (expected 'buy' or 'sell')")]
    UnknownSide(String),
}

pub type Result<T> = std::result::Result<T, Error>;
