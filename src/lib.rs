//! A client for the NUM protocol.
//!
//! NUM publishes structured records about domains, email addresses, and
//! URLs as TXT records in the DNS. This crate finds those records: given an
//! identifier and a module number it derives the DNS names where a record
//! may live, queries them in order, reassembles records that were split
//! over several TXT records, follows redirects, and, if asked to, talks to
//! the populator service which creates records on demand.
//!
//! # Modules
//!
//! * [identifier] parses and normalizes identifiers and NUM addresses,
//! * [location] derives the DNS names of the places a record may live,
//! * [record] reassembles records from TXT answers,
//! * [resolver] contains the resolution state machine, and
//! * [client] runs resolutions on a background task.
//!
//! The DNS transport and the interpretation of records are pluggable via
//! the [TxtLookup] and [Interpret] traits.
//!
//! # Reference of Feature Flags
//!
//! * `resolv`: Enables [dns::StubLookup], a DNS transport based on the stub
//!   resolver of the [domain](https://github.com/NLnetLabs/domain) crate,
//!   and `Client::new`. This feature is enabled by default.
//! * `logging`: Enables the `logging` module for setting up a
//!   [tracing](https://github.com/tokio-rs/tracing) subscriber.
//! * `serde`: Allows reading a [Config] with
//!   [serde](https://serde.rs/).

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cache;
pub mod client;
pub mod config;
pub mod dns;
pub mod error;
pub mod hash;
pub mod identifier;
pub mod idn;
pub mod interpret;
pub mod location;
#[cfg(feature = "logging")]
pub mod logging;
pub mod path;
pub mod populator;
pub mod record;
pub mod resolver;

pub use self::client::{Client, Pending};
pub use self::config::Config;
pub use self::dns::{TxtAnswer, TxtLookup};
pub use self::error::Error;
pub use self::identifier::{Identifier, Kind, NumAddress};
pub use self::interpret::{Interpret, Interpretation, Passthrough};
pub use self::location::{Location, LocationGenerator, LocationSet};
pub use self::resolver::{Context, Handler, Resolved, Resolver};
