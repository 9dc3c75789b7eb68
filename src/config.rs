//! Client configuration.
//!
//! The [Config] type collects everything a [`Client`][crate::client::Client]
//! needs to know before it can start looking up NUM records: how long to
//! wait for DNS, which zone hosts the third-party records, whether the
//! populator may be asked, the two populator retry schedules, and how the
//! cache of derived DNS names behaves.
//!
//! Numeric values are clamped to sensible ranges when they are set, in the
//! same way for values coming from code and, with the `serde` feature, for
//! values read from a configuration document.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::error::Error;
use std::cmp;
use std::net::SocketAddr;
use std::time::Duration;

//------------ DefMinMax -----------------------------------------------------

/// The default, minimum, and maximum values for a config variable.
#[derive(Clone, Copy)]
pub struct DefMinMax<T> {
    /// The default value,
    def: T,

    /// The minimum value,
    min: T,

    /// The maximum value,
    max: T,
}

impl<T> DefMinMax<T> {
    /// Creates a new value.
    pub const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    /// Returns the default value.
    pub fn default(self) -> T {
        self.def
    }

    /// Trims the given value to fit into the minimum/maximum range.
    pub fn limit(self, value: T) -> T
    where
        T: Ord,
    {
        cmp::max(self.min, cmp::min(self.max, value))
    }
}

//------------ Limits --------------------------------------------------------

/// Limits on the time to wait for a single DNS query.
const QUERY_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(2),
    Duration::from_millis(100),
    Duration::from_secs(60),
);

/// Limits on a single populator retry delay.
const RETRY_DELAY: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(1),
    Duration::ZERO,
    Duration::from_secs(5 * 60),
);

/// Limits on how long a derived set of DNS names stays cached.
const CACHE_TTL: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(10 * 60),
    Duration::from_secs(1),
    Duration::from_secs(24 * 3600),
);

/// Limits on the number of cached sets of DNS names.
const CACHE_CAPACITY: DefMinMax<u64> = DefMinMax::new(1_000, 1, 1_000_000);

/// Limits on how long shutdown waits for an in-flight resolution.
const SHUTDOWN_GRACE: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(1),
    Duration::ZERO,
    Duration::from_secs(30),
);

/// The default top-level zone for hosted records.
pub const DEFAULT_TOP_LEVEL_ZONE: &str = "num.net";

/// Delays before each retry after a populator status code 1.
const STATUS_RETRY_DELAYS: [u64; 4] = [2_000, 3_000, 5_000, 10_000];

/// Delays before each retry after a populator error code 100.
const ERROR_RETRY_DELAYS: [u64; 3] = [1_000, 2_000, 3_000];

//------------ Config --------------------------------------------------------

/// Configuration of a NUM client.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "ConfigFile"))]
pub struct Config {
    /// Time to wait for a single DNS response.
    query_timeout: Duration,

    /// Zone under which hosted and populator records live.
    top_level_zone: String,

    /// Whether the populator is asked when nothing else has a record.
    populator_required: bool,

    /// Retry schedule after a populator status code 1.
    status_retry_delays: Vec<Duration>,

    /// Retry schedule after a populator error code 100.
    error_retry_delays: Vec<Duration>,

    /// How long derived DNS names are cached.
    cache_ttl: Duration,

    /// Maximum number of cached sets of DNS names.
    cache_capacity: u64,

    /// How long shutdown waits for an in-flight resolution.
    shutdown_grace: Duration,

    /// Whether DNS is only queried over TCP.
    tcp_only: bool,

    /// Upstream servers. Empty means the system configuration.
    servers: Vec<SocketAddr>,
}

impl Config {
    /// Creates a new config with default values.
    ///
    /// The default values are documented at the relevant set_* methods.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the time to wait for a single DNS response.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Sets the time to wait for a single DNS response.
    ///
    /// The value has to be at least 100 milliseconds, at most 60 seconds
    /// and the default is two seconds.
    pub fn set_query_timeout(&mut self, value: Duration) {
        self.query_timeout = QUERY_TIMEOUT.limit(value)
    }

    /// Returns the top-level zone for hosted records.
    pub fn top_level_zone(&self) -> &str {
        &self.top_level_zone
    }

    /// Returns the zone the populator answers for.
    pub fn populator_zone(&self) -> String {
        format!("populator.{}", self.top_level_zone)
    }

    /// Sets the top-level zone for hosted and populator records.
    ///
    /// Leading and trailing dots are removed. The default is `num.net`.
    /// An empty zone is rejected.
    pub fn set_top_level_zone(
        &mut self,
        zone: impl AsRef<str>,
    ) -> Result<(), Error> {
        let zone = zone.as_ref().trim().trim_matches('.');
        if zone.is_empty() {
            return Err(Error::InvalidParameter(
                "top level zone must not be empty".into(),
            ));
        }
        self.top_level_zone = zone.into();
        Ok(())
    }

    /// Returns whether the populator may be asked.
    pub fn populator_required(&self) -> bool {
        self.populator_required
    }

    /// Sets whether the populator may be asked.
    ///
    /// This is the default for new resolution contexts. It is off by
    /// default.
    pub fn set_populator_required(&mut self, value: bool) {
        self.populator_required = value
    }

    /// Returns the retry schedule after a populator status code 1.
    pub fn status_retry_delays(&self) -> &[Duration] {
        &self.status_retry_delays
    }

    /// Sets the retry schedule after a populator status code 1.
    ///
    /// Each delay is capped at five minutes. The default is 2, 3, 5, and
    /// 10 seconds.
    pub fn set_status_retry_delays(
        &mut self,
        delays: impl IntoIterator<Item = Duration>,
    ) {
        self.status_retry_delays =
            delays.into_iter().map(|d| RETRY_DELAY.limit(d)).collect()
    }

    /// Returns the retry schedule after a populator error code 100.
    pub fn error_retry_delays(&self) -> &[Duration] {
        &self.error_retry_delays
    }

    /// Sets the retry schedule after a populator error code 100.
    ///
    /// Each delay is capped at five minutes. The default is 1, 2, and 3
    /// seconds.
    pub fn set_error_retry_delays(
        &mut self,
        delays: impl IntoIterator<Item = Duration>,
    ) {
        self.error_retry_delays =
            delays.into_iter().map(|d| RETRY_DELAY.limit(d)).collect()
    }

    /// Returns how long derived DNS names are cached.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Sets how long derived DNS names are cached.
    ///
    /// The value has to be at least one second, at most one day and the
    /// default is ten minutes.
    pub fn set_cache_ttl(&mut self, value: Duration) {
        self.cache_ttl = CACHE_TTL.limit(value)
    }

    /// Returns the maximum number of cached sets of DNS names.
    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
    }

    /// Sets the maximum number of cached sets of DNS names.
    ///
    /// The value has to be at least one, at most 1,000,000 and the default
    /// is 1000.
    pub fn set_cache_capacity(&mut self, value: u64) {
        self.cache_capacity = CACHE_CAPACITY.limit(value)
    }

    /// Returns how long shutdown waits for an in-flight resolution.
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    /// Sets how long shutdown waits for an in-flight resolution.
    ///
    /// The value has to be at most 30 seconds and the default is one
    /// second.
    pub fn set_shutdown_grace(&mut self, value: Duration) {
        self.shutdown_grace = SHUTDOWN_GRACE.limit(value)
    }

    /// Returns whether DNS is only queried over TCP.
    pub fn tcp_only(&self) -> bool {
        self.tcp_only
    }

    /// Sets whether DNS is only queried over TCP.
    pub fn set_tcp_only(&mut self, value: bool) {
        self.tcp_only = value
    }

    /// Returns the upstream servers.
    pub fn servers(&self) -> &[SocketAddr] {
        &self.servers
    }

    /// Sets the upstream servers.
    ///
    /// If the list is empty, the system’s resolver configuration is used.
    pub fn set_servers(
        &mut self,
        servers: impl IntoIterator<Item = SocketAddr>,
    ) {
        self.servers = servers.into_iter().collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_timeout: QUERY_TIMEOUT.default(),
            top_level_zone: DEFAULT_TOP_LEVEL_ZONE.into(),
            populator_required: false,
            status_retry_delays: millis(&STATUS_RETRY_DELAYS),
            error_retry_delays: millis(&ERROR_RETRY_DELAYS),
            cache_ttl: CACHE_TTL.default(),
            cache_capacity: CACHE_CAPACITY.default(),
            shutdown_grace: SHUTDOWN_GRACE.default(),
            tcp_only: false,
            servers: Vec::new(),
        }
    }
}

/// Converts a list of milliseconds into durations.
fn millis(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_millis).collect()
}

//------------ ConfigFile ----------------------------------------------------

/// The serialized form of a [Config].
///
/// Durations are given in milliseconds. Missing values keep their
/// defaults.
#[cfg(feature = "serde")]
#[derive(Default, serde::Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    /// See [Config::set_query_timeout].
    query_timeout_ms: Option<u64>,

    /// See [Config::set_top_level_zone].
    top_level_zone: Option<String>,

    /// See [Config::set_populator_required].
    populator_required: Option<bool>,

    /// See [Config::set_status_retry_delays].
    status_retry_delays_ms: Option<Vec<u64>>,

    /// See [Config::set_error_retry_delays].
    error_retry_delays_ms: Option<Vec<u64>>,

    /// See [Config::set_cache_ttl].
    cache_ttl_ms: Option<u64>,

    /// See [Config::set_cache_capacity].
    cache_capacity: Option<u64>,

    /// See [Config::set_shutdown_grace].
    shutdown_grace_ms: Option<u64>,

    /// See [Config::set_tcp_only].
    tcp_only: Option<bool>,

    /// See [Config::set_servers].
    servers: Option<Vec<SocketAddr>>,
}

#[cfg(feature = "serde")]
impl TryFrom<ConfigFile> for Config {
    type Error = Error;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        let mut config = Config::new();
        if let Some(value) = file.query_timeout_ms {
            config.set_query_timeout(Duration::from_millis(value));
        }
        if let Some(zone) = file.top_level_zone {
            config.set_top_level_zone(zone)?;
        }
        if let Some(value) = file.populator_required {
            config.set_populator_required(value);
        }
        if let Some(delays) = file.status_retry_delays_ms {
            config.set_status_retry_delays(millis(&delays));
        }
        if let Some(delays) = file.error_retry_delays_ms {
            config.set_error_retry_delays(millis(&delays));
        }
        if let Some(value) = file.cache_ttl_ms {
            config.set_cache_ttl(Duration::from_millis(value));
        }
        if let Some(value) = file.cache_capacity {
            config.set_cache_capacity(value);
        }
        if let Some(value) = file.shutdown_grace_ms {
            config.set_shutdown_grace(Duration::from_millis(value));
        }
        if let Some(value) = file.tcp_only {
            config.set_tcp_only(value);
        }
        if let Some(servers) = file.servers {
            config.set_servers(servers);
        }
        Ok(config)
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn def_min_max_limit() {
        let limits = DefMinMax::new(5u32, 1, 10);
        assert_eq!(limits.default(), 5);
        assert_eq!(limits.limit(0), 1);
        assert_eq!(limits.limit(7), 7);
        assert_eq!(limits.limit(70), 10);
    }

    #[test]
    fn defaults() {
        let config = Config::new();
        assert_eq!(config.query_timeout(), Duration::from_secs(2));
        assert_eq!(config.top_level_zone(), "num.net");
        assert_eq!(config.populator_zone(), "populator.num.net");
        assert!(!config.populator_required());
        assert_eq!(config.status_retry_delays().len(), 4);
        assert_eq!(config.error_retry_delays()[2], Duration::from_secs(3));
        assert!(config.servers().is_empty());
    }

    #[test]
    fn setters_clamp() {
        let mut config = Config::new();
        config.set_query_timeout(Duration::from_millis(1));
        assert_eq!(config.query_timeout(), Duration::from_millis(100));
        config.set_cache_capacity(0);
        assert_eq!(config.cache_capacity(), 1);
        config.set_status_retry_delays([Duration::from_secs(3600)]);
        assert_eq!(config.status_retry_delays(), [Duration::from_secs(300)]);
    }

    #[test]
    fn top_level_zone() {
        let mut config = Config::new();
        config.set_top_level_zone(".example.org.").unwrap();
        assert_eq!(config.top_level_zone(), "example.org");
        assert_eq!(config.populator_zone(), "populator.example.org");
        assert!(matches!(
            config.set_top_level_zone(" . "),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(config.top_level_zone(), "example.org");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize() {
        let config: Config = serde_json::from_str(
            r#"{
                "query-timeout-ms": 50,
                "top-level-zone": "example.net",
                "populator-required": true,
                "status-retry-delays-ms": [10, 20],
                "servers": ["127.0.0.1:53"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.query_timeout(), Duration::from_millis(100));
        assert_eq!(config.top_level_zone(), "example.net");
        assert!(config.populator_required());
        assert_eq!(
            config.status_retry_delays(),
            [Duration::from_millis(10), Duration::from_millis(20)]
        );
        assert_eq!(config.error_retry_delays().len(), 3);
        assert_eq!(config.servers().len(), 1);

        assert!(serde_json::from_str::<Config>(r#"{"top-level-zone": ""}"#)
            .is_err());
    }
}
