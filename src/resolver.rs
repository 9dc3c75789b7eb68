//! The NUM record resolution state machine.
//!
//! A resolution tries the locations of an identifier one after another:
//!
//! ```text
//! Independent ──▶ Hosted ──▶ Populator ──▶ Stop
//! ```
//!
//! Module 0 stops after the independent location. The populator is only
//! asked if the caller wants it and the identifier has no branch.
//!
//! A record found at a location may be a zone distribution record, which
//! makes an email lookup move to its distributed locations, or it may
//! contain a redirect, which restarts the search elsewhere. At most
//! [MAX_REDIRECTS] redirects are followed.
//!
//! The populator answers with status or error codes that tell the resolver
//! where to look next and whether to wait first. Waiting follows the retry
//! schedules of the [Config].

use crate::config::Config;
use crate::dns::TxtLookup;
use crate::error::Error;
use crate::identifier::{Identifier, NumAddress};
use crate::interpret::{Interpret, Interpretation};
use crate::location::{Location, LocationGenerator, LocationSet};
use crate::populator::{
    PopulatorResponse, ERROR_RETRY, STATUS_AT_HOSTED, STATUS_AT_INDEPENDENT,
    STATUS_CHECK_LATER, VALID_RECORD,
};
use crate::record;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

//------------ Constants -----------------------------------------------------

/// The maximum number of redirects followed by a single resolution.
pub const MAX_REDIRECTS: u32 = 3;

//------------ Handler -------------------------------------------------------

/// Receives progress of a resolution.
///
/// All methods do nothing by default. The unit type is a handler that
/// ignores everything.
pub trait Handler: Send + Sync {
    /// The resolution moved on to a new location.
    fn set_location(&self, _location: Location) {}

    /// A record has been resolved.
    ///
    /// While waiting for the populator this may be called several times
    /// before the resolution completes.
    fn set_result(&self, _resolved: &Resolved) {}

    /// The resolution failed.
    fn set_error(&self, _error: &Error) {}
}

impl Handler for () {}

impl<T: Handler + ?Sized> Handler for Arc<T> {
    fn set_location(&self, location: Location) {
        (**self).set_location(location)
    }

    fn set_result(&self, resolved: &Resolved) {
        (**self).set_result(resolved)
    }

    fn set_error(&self, error: &Error) {
        (**self).set_error(error)
    }
}

//------------ Resolved ------------------------------------------------------

/// A successfully resolved NUM record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resolved {
    /// The record as assembled from DNS.
    pub raw: String,

    /// The record as returned by the interpreter.
    pub interpreted: String,

    /// The location the record was found at.
    pub location: Location,

    /// Whether the DNS answer was validated by DNSSEC.
    pub dnssec_signed: bool,
}

//------------ Context -------------------------------------------------------

/// The state of a single resolution.
#[derive(Clone, Debug)]
pub struct Context {
    /// The identifier currently looked up.
    identifier: Identifier,

    /// The module number currently looked up.
    module: u32,

    /// The DNS names of all locations.
    locations: LocationSet,

    /// The location to query next.
    location: Location,

    /// The number of redirects followed so far.
    redirect_count: u32,

    /// Whether the populator may be asked.
    populator_required: bool,

    /// Whether the last DNS answer was validated by DNSSEC.
    dnssec_signed: bool,
}

impl Context {
    /// Creates a new context.
    pub fn new(
        identifier: Identifier,
        module: u32,
        locations: LocationSet,
    ) -> Self {
        Context {
            identifier,
            module,
            locations,
            location: Location::Independent,
            redirect_count: 0,
            populator_required: false,
            dnssec_signed: false,
        }
    }

    /// Returns the identifier currently looked up.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Returns the module number currently looked up.
    pub fn module(&self) -> u32 {
        self.module
    }

    /// Returns the DNS names of all locations.
    pub fn locations(&self) -> &LocationSet {
        &self.locations
    }

    /// Returns the current location.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Returns the number of redirects followed so far.
    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    /// Returns whether the populator may be asked.
    pub fn populator_required(&self) -> bool {
        self.populator_required
    }

    /// Sets whether the populator may be asked.
    pub fn set_populator_required(&mut self, value: bool) {
        self.populator_required = value
    }

    /// Returns whether the last DNS answer was validated by DNSSEC.
    pub fn dnssec_signed(&self) -> bool {
        self.dnssec_signed
    }

    /// Moves on after a location had no record.
    fn advance(&mut self) {
        self.location = match self.location {
            Location::Independent if self.module == 0 => Location::Stop,
            Location::Independent => Location::Hosted,
            Location::Hosted
                if self.populator_required
                    && self.module != 0
                    && self.locations.populator().is_some() =>
            {
                Location::Populator
            }
            _ => Location::Stop,
        };
    }

    /// Counts a redirect, failing if there were too many.
    fn count_redirect(&mut self) -> Result<(), Error> {
        self.redirect_count += 1;
        if self.redirect_count > MAX_REDIRECTS {
            error!("maximum number of redirects ({MAX_REDIRECTS}) exceeded");
            return Err(Error::MaxRedirectsExceeded);
        }
        Ok(())
    }

    /// Applies a lookup redirect.
    ///
    /// An absolute target replaces identifier and module, a relative one
    /// replaces the branch. Either way the search restarts at the
    /// independent location.
    fn lookup_redirect(
        &mut self,
        target: &str,
        generator: &LocationGenerator,
    ) -> Result<(), Error> {
        self.count_redirect()?;
        if NumAddress::is_absolute(target) {
            let (identifier, module) = NumAddress::parse(target)
                .map_err(|_| Error::InvalidRedirect(target.into()))?
                .into_parts(self.module);
            let locations = generator.locations(module, &identifier);
            if locations.independent() == self.locations.independent() {
                return Err(Error::InvalidRedirect(
                    "cannot redirect back to the same location".into(),
                ));
            }
            self.identifier = identifier;
            self.module = module;
            self.locations = locations;
        } else {
            let from = match self.location {
                Location::Hosted => Location::Hosted,
                _ => Location::Independent,
            };
            self.locations = self.locations.redirect_branch(from, target)?;
        }
        self.location = Location::Independent;
        info!("lookup redirected to {}", self.locations.independent());
        Ok(())
    }

    /// Applies a query redirect at the current location.
    fn query_redirect(&mut self, target: &str) -> Result<(), Error> {
        self.count_redirect()?;
        let location = match self.location {
            Location::Populator => Location::Hosted,
            location => location,
        };
        self.locations = self.locations.redirect_location(location, target)?;
        self.location = location;
        if let Some(name) = self.locations.name(location) {
            info!("query redirected to {name}");
        }
        Ok(())
    }
}

//------------ Step ----------------------------------------------------------

/// What to do after a record was handed to the interpreter.
enum Step {
    /// The resolution is complete.
    Done(Resolved),

    /// A redirect was applied, continue at the context’s location.
    Redirected,
}

//------------ Resolver ------------------------------------------------------

/// Resolves NUM identifiers into records.
#[derive(Clone, Debug)]
pub struct Resolver<L, I> {
    /// The DNS transport.
    lookup: L,

    /// The record interpreter.
    interpreter: I,

    /// Derives the DNS names of locations.
    generator: LocationGenerator,

    /// The time to wait for a single DNS query.
    query_timeout: Duration,

    /// Whether new contexts may ask the populator.
    populator_required: bool,

    /// The retry schedule after a populator status code 1.
    status_retry_delays: Vec<Duration>,

    /// The retry schedule after a populator error code 100.
    error_retry_delays: Vec<Duration>,
}

impl<L: TxtLookup, I: Interpret> Resolver<L, I> {
    /// Creates a resolver with a cached location generator.
    pub fn new(config: &Config, lookup: L, interpreter: I) -> Self {
        Self::with_generator(
            config,
            LocationGenerator::from_config(config),
            lookup,
            interpreter,
        )
    }

    /// Creates a resolver using the given location generator.
    pub fn with_generator(
        config: &Config,
        generator: LocationGenerator,
        lookup: L,
        interpreter: I,
    ) -> Self {
        Resolver {
            lookup,
            interpreter,
            generator,
            query_timeout: config.query_timeout(),
            populator_required: config.populator_required(),
            status_retry_delays: config.status_retry_delays().into(),
            error_retry_delays: config.error_retry_delays().into(),
        }
    }

    /// Returns the location generator.
    pub fn generator(&self) -> &LocationGenerator {
        &self.generator
    }

    /// Creates a context for an identifier and module number.
    pub fn context(&self, identifier: Identifier, module: u32) -> Context {
        let locations = self.generator.locations(module, &identifier);
        let mut ctx = Context::new(identifier, module, locations);
        ctx.set_populator_required(self.populator_required);
        ctx
    }

    /// Creates a context for a NUM address.
    ///
    /// Addresses without a module number use module 0.
    pub fn begin(&self, address: &str) -> Result<Context, Error> {
        let (identifier, module) = NumAddress::parse(address)?.into_parts(0);
        Ok(self.context(identifier, module))
    }

    /// Resolves the record for a context.
    ///
    /// Returns `Ok(None)` if none of the locations had a record.
    pub async fn resolve(
        &self,
        ctx: &mut Context,
        handler: &dyn Handler,
    ) -> Result<Option<Resolved>, Error> {
        info!(
            "resolving {} module {}",
            ctx.identifier, ctx.module
        );
        let res = self.run(ctx, handler).await;
        match res {
            Ok(Some(ref resolved)) => {
                info!("found record at the {} location", resolved.location)
            }
            Ok(None) => info!("no record for {}", ctx.identifier),
            Err(ref err) => {
                error!("resolving {} failed: {err}", ctx.identifier);
                handler.set_error(err);
            }
        }
        res
    }

    /// Runs the state machine.
    async fn run(
        &self,
        ctx: &mut Context,
        handler: &dyn Handler,
    ) -> Result<Option<Resolved>, Error> {
        ctx.location = Location::Independent;
        handler.set_location(ctx.location);
        loop {
            let step = match ctx.location {
                Location::Stop => return Ok(None),
                Location::Independent | Location::Hosted => {
                    match self.query_location(ctx).await? {
                        Some(raw) => Some(self.accept(ctx, raw)?),
                        None => None,
                    }
                }
                Location::Populator => {
                    self.query_populator(ctx, handler).await?
                }
            };
            match step {
                Some(Step::Done(resolved)) => {
                    handler.set_result(&resolved);
                    return Ok(Some(resolved));
                }
                Some(Step::Redirected) => handler.set_location(ctx.location),
                None => {
                    let from = ctx.location;
                    ctx.advance();
                    info!(
                        "no record at the {from} location, trying {}",
                        ctx.location
                    );
                    handler.set_location(ctx.location);
                }
            }
        }
    }

    /// Hands a record to the interpreter.
    fn accept(&self, ctx: &mut Context, raw: String) -> Result<Step, Error> {
        match self.interpreter.interpret(&raw)? {
            Interpretation::Record(interpreted) => Ok(Step::Done(Resolved {
                raw,
                interpreted,
                location: ctx.location,
                dnssec_signed: ctx.dnssec_signed,
            })),
            Interpretation::LookupRedirect(target) => {
                ctx.lookup_redirect(&target, &self.generator)?;
                Ok(Step::Redirected)
            }
            Interpretation::QueryRedirect(target) => {
                ctx.query_redirect(&target)?;
                Ok(Step::Redirected)
            }
        }
    }

    /// Queries the current independent or hosted location.
    ///
    /// Follows a zone distribution record for email addresses.
    async fn query_location(
        &self,
        ctx: &mut Context,
    ) -> Result<Option<String>, Error> {
        let name = match ctx.locations.name(ctx.location) {
            Some(name) => name.to_owned(),
            None => return Ok(None),
        };
        let record = match self.fetch_record(ctx, &name).await? {
            Some(record) => record,
            None => return Ok(None),
        };
        let level = match record::zone_distribution_level(&record) {
            None => return Ok(Some(record)),
            Some(_) if !ctx.identifier.is_email() => {
                warn!(
                    "ignoring zone distribution record at {name} for \
                     non-email identifier {}",
                    ctx.identifier
                );
                return Ok(None);
            }
            Some(Err(value)) => {
                warn!(
                    "invalid zone distribution level '{value}' at {name}"
                );
                return Ok(None);
            }
            Some(Ok(level)) => level,
        };

        info!("zone distribution record at {name}, level {level}");
        ctx.locations =
            self.generator
                .distributed(ctx.module, &ctx.identifier, level);
        let name = match ctx.locations.name(ctx.location) {
            Some(name) => name.to_owned(),
            None => return Ok(None),
        };
        match self.fetch_record(ctx, &name).await? {
            Some(record) if record::is_zone_distribution(&record) => {
                warn!("ignoring repeated zone distribution record at {name}");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Fetches a NUM record, skipping other TXT records.
    async fn fetch_record(
        &self,
        ctx: &mut Context,
        name: &str,
    ) -> Result<Option<String>, Error> {
        Ok(self.fetch(ctx, name).await?.filter(|record| {
            let num = record::is_num_record(record);
            if !num {
                warn!("ignoring non-NUM TXT record at {name}");
            }
            num
        }))
    }

    /// Fetches and assembles the TXT records at a name.
    async fn fetch(
        &self,
        ctx: &mut Context,
        name: &str,
    ) -> Result<Option<String>, Error> {
        debug!("querying {name}");
        let answer = timeout(self.query_timeout, self.lookup.lookup_txt(name))
            .await
            .map_err(|_| Error::QueryTimeout(name.into()))??;
        ctx.dnssec_signed = answer.dnssec_signed;
        let record = record::assemble(&answer.records)?;
        if let Some(ref record) = record {
            debug!("{name}: {record}");
        }
        Ok(record)
    }

    /// Asks the populator.
    async fn query_populator(
        &self,
        ctx: &mut Context,
        handler: &dyn Handler,
    ) -> Result<Option<Step>, Error> {
        let name = match ctx.locations.populator() {
            Some(name) => name.to_owned(),
            None => return Ok(None),
        };
        info!("asking the populator at {name}");
        let text = match self.fetch(ctx, &name).await? {
            Some(text) => text,
            None => {
                warn!("no response from the populator at {name}");
                return Ok(None);
            }
        };
        match PopulatorResponse::parse(&text)?.check()? {
            PopulatorResponse::Status { code, .. } => {
                self.handle_status(ctx, handler, code, text).await.map(Some)
            }
            PopulatorResponse::Error {
                code: ERROR_RETRY,
                description,
            } => {
                error!("populator error {ERROR_RETRY}: {description}");
                self.retry_populator(ctx, handler, &name).await.map(Some)
            }
            PopulatorResponse::Error { code, description } => {
                error!("populator error {code}: {description}");
                Err(Error::PopulatorError { code, description })
            }
            PopulatorResponse::Record(record) => {
                if record::is_num_record(&record) {
                    self.accept(ctx, record).map(Some)
                } else {
                    warn!("ignoring non-NUM response from {name}");
                    Ok(None)
                }
            }
        }
    }

    /// Acts on a populator status code.
    async fn handle_status(
        &self,
        ctx: &mut Context,
        handler: &dyn Handler,
        code: u32,
        text: String,
    ) -> Result<Step, Error> {
        info!("populator status {code}");
        match code {
            STATUS_CHECK_LATER => self.wait_for_record(ctx, handler).await,
            STATUS_AT_INDEPENDENT | STATUS_AT_HOSTED => {
                ctx.location = if code == STATUS_AT_INDEPENDENT {
                    Location::Independent
                } else {
                    Location::Hosted
                };
                handler.set_location(ctx.location);
                match self.query_location(ctx).await? {
                    Some(raw) => self.accept(ctx, raw),
                    None => {
                        error!("no record at the {} location", ctx.location);
                        Err(Error::NoRecordAvailable)
                    }
                }
            }
            VALID_RECORD => self.accept(ctx, text),
            code => Err(Error::InvalidPopulatorResponse(code)),
        }
    }

    /// Checks the independent location while the populator works.
    ///
    /// Every record found is passed to the handler. The last one is the
    /// result once the schedule is exhausted.
    async fn wait_for_record(
        &self,
        ctx: &mut Context,
        handler: &dyn Handler,
    ) -> Result<Step, Error> {
        ctx.location = Location::Independent;
        handler.set_location(ctx.location);
        let mut last = None;
        for delay in &self.status_retry_delays {
            info!("checking the independent location in {delay:?}");
            sleep(*delay).await;
            let raw = match self.query_location(ctx).await? {
                Some(raw) => raw,
                None => continue,
            };
            let is_object = PopulatorResponse::parse(&raw)
                .map_or(true, |res| res.is_object());
            if is_object {
                continue;
            }
            match self.accept(ctx, raw) {
                Ok(Step::Done(resolved)) => {
                    handler.set_result(&resolved);
                    last = Some(resolved);
                }
                Ok(Step::Redirected) => return Ok(Step::Redirected),
                Err(err) => warn!(
                    "ignoring record while waiting for the populator: {err}"
                ),
            }
        }
        match last {
            Some(resolved) => Ok(Step::Done(resolved)),
            None => {
                error!("populator did not provide a record in time");
                Err(Error::NoRecordAvailable)
            }
        }
    }

    /// Asks the populator again after it reported being busy.
    async fn retry_populator(
        &self,
        ctx: &mut Context,
        handler: &dyn Handler,
        name: &str,
    ) -> Result<Step, Error> {
        for delay in &self.error_retry_delays {
            info!("asking the populator again in {delay:?}");
            sleep(*delay).await;
            let text = match self.fetch(ctx, name).await? {
                Some(text) => text,
                None => continue,
            };
            match PopulatorResponse::parse(&text)?.check()? {
                PopulatorResponse::Status { code, .. } => {
                    return self.handle_status(ctx, handler, code, text).await
                }
                PopulatorResponse::Error {
                    code: ERROR_RETRY, ..
                } => continue,
                PopulatorResponse::Error { code, description } => {
                    error!("populator error {code}: {description}");
                    return Err(Error::PopulatorError { code, description });
                }
                PopulatorResponse::Record(record) => {
                    if record::is_num_record(&record) {
                        return self.accept(ctx, record);
                    }
                }
            }
        }
        error!("populator stayed busy");
        Err(Error::NoRecordAvailable)
    }
}

//============ Tests =========================================================
