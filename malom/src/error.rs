use std::io;
use std::path::PathBuf;

use crate::id::SectorId;

/// Errors reported by the database.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// File I/O error
    #[error(transparent)]
    Io(#[from] io::Error),

    /// File of a sector that must exist is missing
    #[error("missing database file {} for sector {id}", .path.display())]
    MissingSector { id: SectorId, path: PathBuf },

    /// Directory with database files does not exist or contains no files
    #[error("database files not found in {}", .0.display())]
    NoDatabase(PathBuf),

    /// Header of a sector file does not match the expected layout
    #[error("{}: header field {field} is {found}, expected {expected}", .path.display())]
    HeaderMismatch { path: PathBuf, field: &'static str, expected: i64, found: i64 },

    /// The database has no sector for a (valid) position
    #[error("no database entry for sector {0}")]
    SectorNotFound(SectorId),

    /// Position or its description rejected by validation
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    /// Unknown variant name
    #[error("unknown variant {0:?}, expected std, lask or mora")]
    UnknownVariant(String),

    /// Unsupported configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A consistency check has failed, the database is broken
    #[error("consistency check failed: {0}")]
    Inconsistent(String),
}

pub type Result<T> = std::result::Result<T, Error>;
