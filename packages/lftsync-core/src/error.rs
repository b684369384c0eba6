use thiserror::Error;

use crate::ids::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("index error: {0}")]
    Index(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("parent {0} is already being synced")]
    Busy(NodeId),
}
