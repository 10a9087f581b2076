use std::{error::Error, fmt};

use log::debug;

/// The kind decides how callers react: a `Db` error is a local
/// failure, while `TransactionAborted` means the transaction has been
/// chosen as a deadlock victim and must be rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Db,
    TransactionAborted,
}

#[derive(Debug)]
pub struct DbError {
    kind: ErrorKind,
    details: String,
}

impl DbError {
    pub fn new(msg: &str) -> DbError {
        DbError {
            kind: ErrorKind::Db,
            details: msg.to_string(),
        }
    }

    pub fn aborted(msg: &str) -> DbError {
        DbError {
            kind: ErrorKind::TransactionAborted,
            details: msg.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_aborted(&self) -> bool {
        self.kind == ErrorKind::TransactionAborted
    }

    pub fn show_backtrace(&self) {
        let bt = backtrace::Backtrace::new();
        debug!("{}\n{:?}", self.details, bt);
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl Error for DbError {}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        DbError::new(&e.to_string())
    }
}
