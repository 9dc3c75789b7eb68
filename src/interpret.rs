//! Interpreting NUM records.
//!
//! Turning a NUM record into its final structured form is left to an
//! implementation of the [Interpret] trait. Besides the interpreted record
//! the interpreter can ask the resolver to look somewhere else by returning
//! one of the two redirect kinds.
//!
//! [Passthrough] is a minimal interpreter that returns records unchanged
//! apart from undoing legacy escapes, and recognizes `@R` redirects.

use crate::error::Error;
use crate::record::replace_legacy_escapes;

//------------ Interpretation ------------------------------------------------

/// The outcome of interpreting a NUM record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Interpretation {
    /// The interpreted record.
    Record(String),

    /// Start over at the independent location of a new target.
    ///
    /// The target is either a NUM address with a module number or a path
    /// relative to the current location.
    LookupRedirect(String),

    /// Look at a different path of the current location.
    QueryRedirect(String),
}

//------------ Interpret -----------------------------------------------------

/// A record interpreter.
pub trait Interpret: Send + Sync {
    /// Interprets a NUM record.
    fn interpret(&self, record: &str) -> Result<Interpretation, Error>;
}

impl<T: Interpret + ?Sized> Interpret for std::sync::Arc<T> {
    fn interpret(&self, record: &str) -> Result<Interpretation, Error> {
        (**self).interpret(record)
    }
}

impl<T: Interpret + ?Sized> Interpret for Box<T> {
    fn interpret(&self, record: &str) -> Result<Interpretation, Error> {
        (**self).interpret(record)
    }
}

//------------ Passthrough ---------------------------------------------------

/// An interpreter that returns records as they are.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

/// The key of a lookup redirect.
const REDIRECT_KEY: &str = "@R=";

impl Interpret for Passthrough {
    fn interpret(&self, record: &str) -> Result<Interpretation, Error> {
        let record = replace_legacy_escapes(record);
        if let Some(pos) = record.find(REDIRECT_KEY) {
            let value = &record[pos + REDIRECT_KEY.len()..];
            let end = value.find([';', ')']).unwrap_or(value.len());
            let target = value[..end].trim().trim_matches('`');
            if target.is_empty() {
                return Err(Error::BadRecord(record.clone()));
            }
            return Ok(Interpretation::LookupRedirect(target.into()));
        }
        Ok(Interpretation::Record(record))
    }
}

//============ Tests =========================================================
