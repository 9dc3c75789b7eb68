//! Looking up TXT records.
//!
//! The resolver only needs a single DNS operation: fetch the TXT records
//! at a name. It is expressed by the [TxtLookup] trait so that the DNS
//! transport can be exchanged, e.g., for an in-memory table in tests.
//!
//! With the `resolv` feature, [StubLookup] implements the trait on top of
//! the stub resolver of the `domain` crate.

use crate::error::Error;
use futures_util::future::BoxFuture;
use std::sync::Arc;

//------------ TxtAnswer -----------------------------------------------------

/// The TXT records found at a name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TxtAnswer {
    /// The payload of each TXT record.
    ///
    /// The character-strings of a record are concatenated. The list is
    /// empty if there were no TXT records.
    pub records: Vec<String>,

    /// Whether the answer was validated by DNSSEC.
    pub dnssec_signed: bool,
}

impl TxtAnswer {
    /// Creates an answer with the given records.
    pub fn new(records: Vec<String>, dnssec_signed: bool) -> Self {
        Self {
            records,
            dnssec_signed,
        }
    }

    /// Creates an answer without records.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

//------------ TxtLookup -----------------------------------------------------

/// Looks up TXT records.
pub trait TxtLookup: Send + Sync {
    /// Looks up the TXT records at an absolute DNS name.
    ///
    /// A name without TXT records, as well as a name that has a CNAME or
    /// SPF record instead, results in an empty answer. Only failures to
    /// talk to DNS are errors.
    fn lookup_txt<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<TxtAnswer, Error>>;
}

impl<T: TxtLookup + ?Sized> TxtLookup for Arc<T> {
    fn lookup_txt<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<TxtAnswer, Error>> {
        (**self).lookup_txt(name)
    }
}

impl<T: TxtLookup + ?Sized> TxtLookup for Box<T> {
    fn lookup_txt<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<TxtAnswer, Error>> {
        (**self).lookup_txt(name)
    }
}

//------------ StubLookup ----------------------------------------------------

#[cfg(feature = "resolv")]
pub use self::stub::StubLookup;

#[cfg(feature = "resolv")]
mod stub {
    use super::{TxtAnswer, TxtLookup};
    use crate::config::Config;
    use crate::error::Error;
    use domain::base::iana::{Rcode, Rtype};
    use domain::base::wire::ParseError;
    use domain::base::{Message, Name};
    use domain::rdata::Txt;
    use domain::resolv::stub::conf::{ResolvConf, ServerConf, Transport};
    use domain::resolv::StubResolver;
    use futures_util::future::BoxFuture;
    use std::io;
    use std::str::FromStr;
    use std::sync::Arc;
    use tracing::debug;

    /// The prefix of SPF policies published as TXT records.
    const SPF_PREFIX: &str = "v=spf";

    /// TXT lookups through a stub resolver.
    #[derive(Clone)]
    pub struct StubLookup {
        /// The resolver.
        resolver: Arc<StubResolver>,
    }

    impl StubLookup {
        /// Creates a lookup using the system’s resolver configuration.
        pub fn new() -> Self {
            Self::from_config(&Config::default())
        }

        /// Creates a lookup from a client config.
        ///
        /// The upstream servers, TCP-only flag, and query timeout are taken
        /// from the config.
        pub fn from_config(config: &Config) -> Self {
            let mut conf = if config.servers().is_empty() {
                ResolvConf::default()
            } else {
                let mut conf = ResolvConf::new();
                conf.servers.extend(config.servers().iter().map(|addr| {
                    ServerConf::new(*addr, Transport::UdpTcp)
                }));
                conf.finalize();
                conf
            };
            conf.options.timeout = config.query_timeout();
            conf.options.use_vc = config.tcp_only();
            for server in &mut conf.servers {
                server.request_timeout = config.query_timeout();
                if config.tcp_only() {
                    server.transport = Transport::Tcp;
                }
            }
            Self {
                resolver: Arc::new(StubResolver::from_conf(conf)),
            }
        }

        /// Performs the actual lookup.
        async fn query(&self, name: &str) -> Result<TxtAnswer, Error> {
            let qname = Name::<Vec<u8>>::from_str(name).map_err(|err| {
                let kind = io::ErrorKind::InvalidInput;
                Error::dns_query(name, io::Error::new(kind, err.to_string()))
            })?;
            let answer = self
                .resolver
                .query((qname, Rtype::TXT))
                .await
                .map_err(|err| Error::dns_query(name, err))?;
            txt_answer(name, answer.as_slice())
        }
    }

    impl Default for StubLookup {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TxtLookup for StubLookup {
        fn lookup_txt<'a>(
            &'a self,
            name: &'a str,
        ) -> BoxFuture<'a, Result<TxtAnswer, Error>> {
            Box::pin(self.query(name))
        }
    }

    //------------ txt_answer ------------------------------------------------

    /// Extracts the TXT records from a response message.
    ///
    /// NXDOMAIN results in an empty answer, any other error response code
    /// is an error. If the answer section has a CNAME or SPF record, or a
    /// TXT record holding an SPF policy, there is no NUM record at the name
    /// and the answer is empty, too.
    fn txt_answer(
        name: &str,
        message: &[u8],
    ) -> Result<TxtAnswer, Error> {
        let invalid_data = |err: String| {
            Error::dns_query(
                name,
                io::Error::new(io::ErrorKind::InvalidData, err),
            )
        };
        let parse_err = |err: ParseError| invalid_data(err.to_string());

        let message = Message::from_octets(message)
            .map_err(|err| invalid_data(err.to_string()))?;
        let rcode = message.header().rcode();
        if rcode == Rcode::NXDOMAIN {
            debug!("{name}: no such domain");
            return Ok(TxtAnswer::empty());
        }
        if rcode != Rcode::NOERROR {
            return Err(Error::dns_query(
                name,
                io::Error::new(
                    io::ErrorKind::Other,
                    format!("response code {rcode}"),
                ),
            ));
        }

        for record in message.answer().map_err(parse_err)? {
            let rtype = record.map_err(parse_err)?.rtype();
            if rtype == Rtype::CNAME || rtype == Rtype::SPF {
                debug!("{name}: found {rtype} instead of TXT");
                return Ok(TxtAnswer::empty());
            }
        }

        let mut records = Vec::new();
        let txts = message.answer().map_err(parse_err)?.limit_to::<Txt<_>>();
        for record in txts {
            let record = record.map_err(parse_err)?;
            let text: String = record
                .data()
                .iter()
                .map(String::from_utf8_lossy)
                .collect();
            if text.starts_with(SPF_PREFIX) {
                debug!("{name}: found an SPF policy instead of TXT");
                return Ok(TxtAnswer::empty());
            }
            records.push(text);
        }
        Ok(TxtAnswer::new(records, message.header().ad()))
    }

    //--- Tests

}

//============ Tests =========================================================
