//! Shared helpers for the integration tests.
#![allow(dead_code)]

use futures_util::future::BoxFuture;
use numlib::{
    Error, Handler, Identifier, Location, LocationGenerator, LocationSet,
    Resolved, TxtAnswer, TxtLookup,
};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

//------------ DummyDns ------------------------------------------------------

/// An in-memory table of TXT records.
///
/// Each name has a sequence of answers. Every query takes the next answer
/// from the sequence, the last answer is repeated forever. Names not in the
/// table have no TXT records.
#[derive(Clone, Debug, Default)]
pub struct DummyDns {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    queries: Vec<String>,
}

#[derive(Clone, Debug, Default)]
struct Entry {
    answers: VecDeque<Reply>,
    signed: bool,
    delay: Option<Duration>,
}

#[derive(Clone, Debug)]
enum Reply {
    Records(Vec<String>),
    Fail,
    Hang,
}

impl DummyDns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the TXT records at a name.
    pub fn add(&self, name: &str, records: &[&str]) -> &Self {
        self.add_sequence(name, &[records])
    }

    /// Sets a sequence of answers for a name.
    pub fn add_sequence(&self, name: &str, answers: &[&[&str]]) -> &Self {
        let answers = answers
            .iter()
            .map(|records| {
                Reply::Records(records.iter().map(|s| s.to_string()).collect())
            })
            .collect();
        self.entry(name, |entry| entry.answers = answers);
        self
    }

    /// Makes queries for a name fail.
    pub fn fail(&self, name: &str) -> &Self {
        self.entry(name, |entry| entry.answers = [Reply::Fail].into());
        self
    }

    /// Makes queries for a name never complete.
    pub fn hang(&self, name: &str) -> &Self {
        self.entry(name, |entry| entry.answers = [Reply::Hang].into());
        self
    }

    /// Marks the answers for a name as validated by DNSSEC.
    pub fn sign(&self, name: &str) -> &Self {
        self.entry(name, |entry| entry.signed = true);
        self
    }

    /// Delays answers for a name.
    pub fn delay(&self, name: &str, delay: Duration) -> &Self {
        self.entry(name, |entry| entry.delay = Some(delay));
        self
    }

    /// Returns all names queried so far in order.
    pub fn queries(&self) -> Vec<String> {
        self.inner.lock().unwrap().queries.clone()
    }

    /// Returns how often a name was queried.
    pub fn query_count(&self, name: &str) -> usize {
        self.queries().iter().filter(|q| *q == name).count()
    }

    fn entry(&self, name: &str, op: impl FnOnce(&mut Entry)) {
        let mut inner = self.inner.lock().unwrap();
        op(inner.entries.entry(name.into()).or_default())
    }

    fn next_reply(&self, name: &str) -> (Reply, bool, Option<Duration>) {
        let mut inner = self.inner.lock().unwrap();
        inner.queries.push(name.into());
        let entry = match inner.entries.get_mut(name) {
            Some(entry) => entry,
            None => return (Reply::Records(Vec::new()), false, None),
        };
        let reply = if entry.answers.len() > 1 {
            entry.answers.pop_front()
        } else {
            entry.answers.front().cloned()
        };
        (
            reply.unwrap_or(Reply::Records(Vec::new())),
            entry.signed,
            entry.delay,
        )
    }
}

impl TxtLookup for DummyDns {
    fn lookup_txt<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<TxtAnswer, Error>> {
        let (reply, signed, delay) = self.next_reply(name);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match reply {
                Reply::Records(records) => Ok(TxtAnswer::new(records, signed)),
                Reply::Fail => Err(Error::dns_query(
                    name,
                    io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
                )),
                Reply::Hang => std::future::pending().await,
            }
        })
    }
}

//------------ Recorder ------------------------------------------------------

/// A handler that remembers everything it is told.
#[derive(Debug, Default)]
pub struct Recorder {
    locations: Mutex<Vec<Location>>,
    results: Mutex<Vec<Resolved>>,
    errors: Mutex<Vec<Error>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn locations(&self) -> Vec<Location> {
        self.locations.lock().unwrap().clone()
    }

    pub fn results(&self) -> Vec<Resolved> {
        self.results.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<Error> {
        self.errors.lock().unwrap().clone()
    }
}

impl Handler for Recorder {
    fn set_location(&self, location: Location) {
        self.locations.lock().unwrap().push(location)
    }

    fn set_result(&self, resolved: &Resolved) {
        self.results.lock().unwrap().push(resolved.clone())
    }

    fn set_error(&self, error: &Error) {
        self.errors.lock().unwrap().push(error.clone())
    }
}

//------------ Helpers -------------------------------------------------------

/// Sets up logging for a test.
///
/// Use the RUST_LOG environment variable to see what is going on, e.g.,
///   RUST_LOG=numlib=DEBUG
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .without_time()
        .try_init()
        .ok();
}

/// Returns the locations for an identifier in the default zone.
pub fn locations(raw: &str, module: u32) -> LocationSet {
    LocationGenerator::new("num.net")
        .generate(module, &Identifier::parse(raw).unwrap())
}
