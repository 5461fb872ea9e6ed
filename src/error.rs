use std::path::PathBuf;

use thiserror::Error;

type Span = logos::Span;

/// S-expression, netlist and board parse errors
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("SExpr {0} not found")]
    MissingChild(String),
    #[error("Value not found")]
    MissingValue(),
    #[error("Unexpected end of file at {at:?}")]
    UnexpectedEof { at: Span },
    #[error("Expected {expected} but found {found} at {at:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        at: Span,
    },
    #[error("Unknown token {found} at {at:?}")]
    UnknownToken { found: String, at: Span },
    #[error("Expected a ({expected} ...) file but found ({found} ...)")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },
    #[error("Invalid number {0}")]
    InvalidNumber(String),
}

/// Errors that stop a merge run
#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("Invalid {field} pattern: {source}")]
    Pattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Could not write output: {0}")]
    Write(#[from] std::io::Error),
}
