//! Error kinds surfaced to clients (spec §7). `BreakpointsChanged` never
//! reaches this enum, it's handled entirely inside `rdbg_trace::Tracer`.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("address is not on the heap")]
    NotOnHeap,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Trace(#[from] rdbg_trace::Error),

    #[error("binary format not recognized")]
    BinaryFormatUnrecognized,

    #[error("no file open at fd {0}")]
    BadFd(u32),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bad-expression-syntax and bad-mode messages are built in a couple of
/// places (the evaluator, `Open`); this keeps their wording consistent
/// without exporting a constructor nobody else should call.
pub(crate) fn invalid_request(msg: impl fmt::Display) -> Error {
    Error::InvalidRequest(msg.to_string())
}
