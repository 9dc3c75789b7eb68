//! Error type for NUM record discovery.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::{error, io};

/// Error type for NUM record discovery.
///
/// Every failure of a resolution ends up as one of these values. The type
/// is cheap to clone so the same error can be handed to a result handler
/// and returned to the caller.
#[derive(Clone, Debug)]
pub enum Error {
    /// The identifier or NUM address could not be parsed.
    InvalidIdentifier(String),

    /// A configuration value was rejected.
    InvalidParameter(String),

    /// Querying DNS for the given name failed.
    DnsQuery {
        /// The DNS name that was queried.
        name: String,

        /// The underlying I/O error.
        source: Arc<io::Error>,
    },

    /// No DNS response arrived for the given name in time.
    QueryTimeout(String),

    /// The fragments of a record do not add up to the declared total.
    RrSetIncomplete {
        /// The number of fragments declared in a header.
        expected: usize,

        /// The number of TXT answers received.
        received: usize,
    },

    /// A fragment header could not be parsed.
    RrSetHeaderFormat(String),

    /// A multi-answer set contains a fragment without a header.
    RrSetNoHeaders,

    /// Too many redirects were followed.
    MaxRedirectsExceeded,

    /// A redirect pointed back to the current location or was malformed.
    InvalidRedirect(String),

    /// A relative path tried to leave the root.
    RootEscape(String),

    /// The populator reported an error.
    PopulatorError {
        /// The error code sent by the populator.
        code: u32,

        /// The description sent by the populator.
        description: String,
    },

    /// The populator sent a status or error code we don’t know.
    InvalidPopulatorResponse(u32),

    /// No record could be found at any location.
    NoRecordAvailable,

    /// The record interpreter rejected a record.
    BadRecord(String),

    /// The client has been shut down.
    ShutDown,

    /// The resolution was cancelled before it completed.
    Cancelled,
}

impl Error {
    /// Creates a DNS query error for the given name.
    pub fn dns_query(name: impl Into<String>, err: io::Error) -> Self {
        Error::DnsQuery {
            name: name.into(),
            source: Arc::new(err),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::InvalidIdentifier(id) => {
                write!(f, "invalid NUM identifier '{id}'")
            }
            Error::InvalidParameter(msg) => {
                write!(f, "invalid parameter: {msg}")
            }
            Error::DnsQuery { name, source } => {
                write!(f, "DNS query for {name} failed: {source}")
            }
            Error::QueryTimeout(name) => {
                write!(f, "timeout waiting for a response for {name}")
            }
            Error::RrSetIncomplete { expected, received } => write!(
                f,
                "incomplete record set: expected {expected} parts, \
                 received {received}"
            ),
            Error::RrSetHeaderFormat(part) => {
                write!(f, "bad record part header in '{part}'")
            }
            Error::RrSetNoHeaders => {
                write!(f, "record parts without headers")
            }
            Error::MaxRedirectsExceeded => {
                write!(f, "maximum number of redirects exceeded")
            }
            Error::InvalidRedirect(msg) => {
                write!(f, "invalid redirect: {msg}")
            }
            Error::RootEscape(path) => {
                write!(f, "path '{path}' goes above the root")
            }
            Error::PopulatorError { code, description } => {
                write!(f, "populator error {code}: {description}")
            }
            Error::InvalidPopulatorResponse(code) => {
                write!(f, "invalid populator response code {code}")
            }
            Error::NoRecordAvailable => {
                write!(f, "cannot retrieve NUM record from any location")
            }
            Error::BadRecord(msg) => write!(f, "bad NUM record: {msg}"),
            Error::ShutDown => write!(f, "client has been shut down"),
            Error::Cancelled => write!(f, "resolution was cancelled"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::DnsQuery { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

//============ Tests =========================================================
