use thiserror::Error;

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to open file {}", .path.display())]
    FailedToOpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("An I/O error has occurred while reading the report")]
    FailedToRead {
        #[source]
        source: io::Error,
    },

    /// The whole input was scanned but not a single block had a valid header.
    /// Almost always means the input is not `dmidecode` output.
    #[error("Unable to parse `dmidecode` output, no records were extracted")]
    EmptyResult,

    #[error("DMI table is empty, parse a report before querying it")]
    NotInitialized,

    #[error("`serde_json` failed with error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::FailedToRead { source: err }
    }
}
