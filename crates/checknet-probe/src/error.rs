use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("no address found for {0}")]
    NoAddress(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("missing {0} stdout")]
    MissingOutput(&'static str),

    #[error("failed to read prober output: {0}")]
    Io(#[from] io::Error),
}
