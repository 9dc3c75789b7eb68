//! Where NUM records live.
//!
//! A NUM record for an identifier and module number can be found at up to
//! three places in the DNS, tried in order:
//!
//! * the _independent_ location in the identifier’s own zone,
//!   `{module}._num.{domain}.`,
//! * the _hosted_ location in a third-party zone sharded by a hash of the
//!   domain, `{module}._{domain}.{c}.{b}.{a}.{zone}.`,
//! * the _populator_, a service that can create hosted records on demand,
//!   `{module}._{domain}.populator.{zone}.`.
//!
//! Email addresses add `_{local}.e.` in front of the domain part and never
//! use the populator. Identifiers with a branch put the branch in front of
//! the module number and don’t use the populator either.
//!
//! The [LocationGenerator] derives a [LocationSet] with all these names.
//! Redirects and zone distribution records derive new sets from existing
//! ones rather than changing them.

use crate::cache::LocationCache;
use crate::config::Config;
use crate::error::Error;
use crate::hash::{domain_and_hash, hash};
use crate::identifier::{branch_to_path, Identifier};
use crate::idn;
use crate::path;
use std::fmt;
use tracing::trace;

//------------ Constants -----------------------------------------------------

/// The infix of independent locations.
const UTILITY_MODULE_INFIX: &str = "._num.";

/// The label separating the local part of an email from the domain.
const EMAIL_SEPARATOR: &str = "e";

/// The label in front of the top-level zone for populator locations.
const POPULATOR_LABEL: &str = "populator";

//------------ Location ------------------------------------------------------

/// A place to look for a NUM record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Location {
    /// The identifier’s own zone.
    Independent,

    /// The hosted zone.
    Hosted,

    /// The populator service.
    Populator,

    /// There is nothing left to try.
    Stop,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Location::Independent => "INDEPENDENT",
            Location::Hosted => "HOSTED",
            Location::Populator => "POPULATOR",
            Location::Stop => "STOP",
        })
    }
}

//------------ LocationSet ---------------------------------------------------

/// The DNS names of all locations for one identifier and module.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocationSet {
    /// The independent location including the branch.
    independent: String,

    /// The independent location without the branch.
    root_independent: String,

    /// The hosted location including the branch.
    hosted: String,

    /// The hosted location without the branch.
    root_hosted: String,

    /// The populator location of a root identifier.
    ///
    /// This is kept even if a redirect adds a branch so that redirecting
    /// back to the root makes the populator available again.
    root_populator: Option<String>,

    /// Whether there is no branch.
    is_root: bool,
}

impl LocationSet {
    /// Creates a set from the root names and an optional branch.
    fn with_roots(
        root_independent: String,
        root_hosted: String,
        root_populator: Option<String>,
        branch: Option<&str>,
    ) -> Self {
        LocationSet {
            independent: prefix_branch(branch, &root_independent),
            hosted: prefix_branch(branch, &root_hosted),
            root_independent,
            root_hosted,
            root_populator,
            is_root: branch.is_none(),
        }
    }

    /// Returns the independent location.
    pub fn independent(&self) -> &str {
        &self.independent
    }

    /// Returns the independent location without a branch.
    pub fn root_independent(&self) -> &str {
        &self.root_independent
    }

    /// Returns the hosted location.
    pub fn hosted(&self) -> &str {
        &self.hosted
    }

    /// Returns the hosted location without a branch.
    pub fn root_hosted(&self) -> &str {
        &self.root_hosted
    }

    /// Returns the populator location.
    ///
    /// Only root identifiers other than email addresses have one.
    pub fn populator(&self) -> Option<&str> {
        if self.is_root {
            self.root_populator.as_deref()
        } else {
            None
        }
    }

    /// Returns whether the set is for an identifier without a branch.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Returns the DNS name for a location.
    pub fn name(&self, location: Location) -> Option<&str> {
        match location {
            Location::Independent => Some(&self.independent),
            Location::Hosted => Some(&self.hosted),
            Location::Populator => self.populator(),
            Location::Stop => None,
        }
    }

    /// Returns the root DNS name for a location.
    fn root(&self, location: Location) -> Option<&str> {
        match location {
            Location::Independent => Some(&self.root_independent),
            Location::Hosted => Some(&self.root_hosted),
            _ => None,
        }
    }

    /// Returns the branch of a location as a path.
    ///
    /// For `manager.sales.1._num.example.com.` this is `/sales/manager`.
    pub fn path(&self, location: Location) -> Option<String> {
        let name = self.name(location)?;
        let root = self.root(location)?;
        let branch = name
            .strip_suffix(root)
            .and_then(|prefix| prefix.strip_suffix('.'))
            .filter(|prefix| !prefix.is_empty());
        Some(branch_to_path(branch))
    }

    /// Returns a new set with the path of one location replaced.
    ///
    /// Only the independent and hosted locations have paths.
    pub fn with_path(
        &self,
        location: Location,
        path: &str,
    ) -> Result<Self, Error> {
        let branch = path_to_branch(path)?;
        let mut res = self.clone();
        match location {
            Location::Independent => {
                res.independent =
                    prefix_branch(branch.as_deref(), &self.root_independent);
            }
            Location::Hosted => {
                res.hosted =
                    prefix_branch(branch.as_deref(), &self.root_hosted);
            }
            _ => {
                return Err(Error::InvalidRedirect(format!(
                    "no path at the {location} location"
                )))
            }
        }
        res.is_root = res.independent == res.root_independent
            && res.hosted == res.root_hosted;
        Ok(res)
    }

    /// Returns a new set with the branch of all locations replaced.
    pub fn with_branch_path(&self, path: &str) -> Result<Self, Error> {
        let branch = path_to_branch(path)?;
        Ok(Self::with_roots(
            self.root_independent.clone(),
            self.root_hosted.clone(),
            self.root_populator.clone(),
            branch.as_deref(),
        ))
    }

    /// Resolves a relative redirect at a location into a new set.
    ///
    /// The redirect is resolved against the location’s current path and
    /// only the name of that location changes. A redirect that ends up at
    /// the current name is rejected.
    pub fn redirect_location(
        &self,
        location: Location,
        redirect: &str,
    ) -> Result<Self, Error> {
        let current = self.path(location).ok_or_else(|| {
            Error::InvalidRedirect(format!(
                "cannot redirect at the {location} location"
            ))
        })?;
        let res =
            self.with_path(location, &path::resolve(&current, redirect)?)?;
        if res.name(location) == self.name(location) {
            return Err(Error::InvalidRedirect(
                "cannot redirect back to the same location".into(),
            ));
        }
        Ok(res)
    }

    /// Resolves a relative redirect for all locations into a new set.
    ///
    /// The redirect is resolved against the path of `location`, the result
    /// becomes the branch of both independent and hosted locations.
    pub fn redirect_branch(
        &self,
        location: Location,
        redirect: &str,
    ) -> Result<Self, Error> {
        let current = self.path(location).unwrap_or_else(|| "/".into());
        let res = self.with_branch_path(&path::resolve(&current, redirect)?)?;
        let before = self.name(location).unwrap_or(&self.independent);
        let after = res.name(location).unwrap_or(&res.independent);
        if before == after {
            return Err(Error::InvalidRedirect(
                "cannot redirect back to the same location".into(),
            ));
        }
        Ok(res)
    }
}

//------------ LocationGenerator ---------------------------------------------

/// Derives the DNS names of NUM records.
#[derive(Clone, Debug)]
pub struct LocationGenerator {
    /// The top-level zone of hosted records.
    top_level_zone: String,

    /// The cache of derived sets, if enabled.
    cache: Option<LocationCache>,
}

impl LocationGenerator {
    /// Creates a generator without a cache.
    pub fn new(top_level_zone: impl Into<String>) -> Self {
        Self {
            top_level_zone: top_level_zone.into(),
            cache: None,
        }
    }

    /// Creates a generator using the given cache.
    pub fn with_cache(
        top_level_zone: impl Into<String>,
        cache: LocationCache,
    ) -> Self {
        Self {
            top_level_zone: top_level_zone.into(),
            cache: Some(cache),
        }
    }

    /// Creates a cached generator from a client config.
    pub fn from_config(config: &Config) -> Self {
        Self::with_cache(
            config.top_level_zone(),
            LocationCache::from_config(config),
        )
    }

    /// Returns the cache, if there is one.
    pub fn cache(&self) -> Option<&LocationCache> {
        self.cache.as_ref()
    }

    /// Returns the top-level zone.
    pub fn top_level_zone(&self) -> &str {
        &self.top_level_zone
    }

    /// Returns the locations for an identifier, using the cache.
    pub fn locations(
        &self,
        module: u32,
        identifier: &Identifier,
    ) -> LocationSet {
        match self.cache {
            Some(ref cache) => cache
                .get_with(module, identifier, || {
                    self.generate(module, identifier)
                }),
            None => self.generate(module, identifier),
        }
    }

    /// Derives the locations for an identifier.
    pub fn generate(
        &self,
        module: u32,
        identifier: &Identifier,
    ) -> LocationSet {
        trace!("deriving locations for {identifier} module {module}");
        let domain = identifier.domain();
        let branch = identifier.branch();
        match identifier.local_part() {
            Some(local) => LocationSet::with_roots(
                self.email_independent(module, local, domain),
                self.email_hosted(module, local, domain),
                None,
                branch,
            ),
            None => LocationSet::with_roots(
                format!("{module}{UTILITY_MODULE_INFIX}{domain}."),
                format!(
                    "{module}._{}.{}.",
                    domain_and_hash(domain),
                    self.top_level_zone
                ),
                Some(format!(
                    "{module}._{domain}.{POPULATOR_LABEL}.{}.",
                    self.top_level_zone
                )),
                branch,
            ),
        }
    }

    /// Derives the distributed email locations for a shard level.
    ///
    /// The local part is followed by its own hash of the given level.
    /// Identifiers other than email addresses are returned unchanged.
    ///
    /// # Panics
    ///
    /// The function panics if `level` is not 1, 2, or 3.
    pub fn distributed(
        &self,
        module: u32,
        identifier: &Identifier,
        level: u8,
    ) -> LocationSet {
        let local = match identifier.local_part() {
            Some(local) => format!("{local}{}", hash(level, local)),
            None => return self.generate(module, identifier),
        };
        let domain = identifier.domain();
        LocationSet::with_roots(
            self.email_independent(module, &local, domain),
            self.email_hosted(module, &local, domain),
            None,
            identifier.branch(),
        )
    }

    /// Returns the root independent location for an email address.
    fn email_independent(
        &self,
        module: u32,
        local: &str,
        domain: &str,
    ) -> String {
        format!(
            "{module}._{local}.{EMAIL_SEPARATOR}{UTILITY_MODULE_INFIX}{domain}."
        )
    }

    /// Returns the root hosted location for an email address.
    fn email_hosted(&self, module: u32, local: &str, domain: &str) -> String {
        format!(
            "{module}._{local}.{EMAIL_SEPARATOR}._{}.{}.",
            domain_and_hash(domain),
            self.top_level_zone
        )
    }
}

//------------ Helpers -------------------------------------------------------

/// Puts an optional branch in front of a root name.
fn prefix_branch(branch: Option<&str>, root: &str) -> String {
    match branch {
        Some(branch) => format!("{branch}.{root}"),
        None => root.into(),
    }
}

/// Converts a path into a branch.
///
/// The root path has no branch.
fn path_to_branch(path: &str) -> Result<Option<String>, Error> {
    let labels = path
        .split('/')
        .filter(|seg| !seg.is_empty())
        .rev()
        .map(|seg| idn::to_ascii(&seg.replace(' ', "_")))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| Error::InvalidRedirect(path.into()))?;
    if labels.is_empty() {
        Ok(None)
    } else {
        Ok(Some(labels.join(".")))
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    fn locations(module: u32, raw: &str) -> LocationSet {
        LocationGenerator::new("num.net")
            .generate(module, &Identifier::parse(raw).unwrap())
    }

    #[rstest]
    #[case("numexample.com")]
    #[case("www.numexample.com")]
    #[case("http://numexample.com")]
    #[case("https://www.numexample.com/")]
    fn domain_locations(#[case] raw: &str) {
        let set = locations(1, raw);
        assert_eq!(set.independent(), "1._num.numexample.com.");
        assert_eq!(set.hosted(), "1._numexample.com.c.7.m.num.net.");
        assert_eq!(
            set.populator(),
            Some("1._numexample.com.populator.num.net.")
        );
        assert!(set.is_root());
    }

    #[test]
    fn unicode_locations() {
        let set = locations(1, "testdomain例.com");
        assert_eq!(set.hosted(), "1._xn--testdomain-4y5p.com.b.5.m.num.net.");

        let set = locations(1, "testdomain例.com/test1例/test2例/test3例");
        assert_eq!(
            set.independent(),
            "xn--test3-9d3h.xn--test2-9d3h.xn--test1-9d3h.\
             1._num.xn--testdomain-4y5p.com."
        );
        assert_eq!(set.root_independent(), "1._num.xn--testdomain-4y5p.com.");
        assert!(set.populator().is_none());

        let set = locations(1, "http://www.num例.com/sales/index.html");
        assert_eq!(set.independent(), "sales.1._num.xn--num-xc0e.com.");
        assert_eq!(set.root_hosted(), "1._xn--num-xc0e.com.n.f.5.num.net.");
    }

    #[test]
    fn email_locations() {
        let set = locations(1, "xi@num例.com");
        assert_eq!(set.independent(), "1._xi.e._num.xn--num-xc0e.com.");
        assert!(set.populator().is_none());

        let set = locations(1, "john.smith@numexample.com");
        assert_eq!(
            set.hosted(),
            "1._john.smith.e._numexample.com.c.7.m.num.net."
        );
    }

    #[test]
    fn email_local_part_as_written() {
        let generator = LocationGenerator::new("num.net");
        let id = Identifier::parse("Jöhn@numexample.com/a.b").unwrap();
        let set = generator.generate(1, &id);
        assert_eq!(set.independent(), "a.b.1._Jöhn.e._num.numexample.com.");
        assert_eq!(
            generator.distributed(1, &id, 1).root_independent(),
            format!("1._Jöhn{}.e._num.numexample.com.", hash(1, "Jöhn"))
        );
    }

    #[rstest]
    #[case(1, "1._john.smith.3.e._num.numexample.com.")]
    #[case(2, "1._john.smith.6.3.e._num.numexample.com.")]
    #[case(3, "1._john.smith.d.6.3.e._num.numexample.com.")]
    fn distributed_email(#[case] level: u8, #[case] expected: &str) {
        let generator = LocationGenerator::new("num.net");
        let id = Identifier::parse("john.smith@numexample.com").unwrap();
        let set = generator.distributed(1, &id, level);
        assert_eq!(set.independent(), expected);
    }

    #[test]
    fn distributed_email_hosted_and_branch() {
        let generator = LocationGenerator::new("num.net");
        let id = Identifier::parse("john.smith@numexample.com").unwrap();
        assert_eq!(
            generator.distributed(1, &id, 1).hosted(),
            "1._john.smith.3.e._numexample.com.c.7.m.num.net."
        );
        assert_eq!(
            generator.distributed(1, &id, 2).hosted(),
            "1._john.smith.6.3.e._numexample.com.c.7.m.num.net."
        );

        let id =
            Identifier::parse("john.smith@numexample.com/foo/bar").unwrap();
        assert_eq!(
            generator.distributed(1, &id, 1).independent(),
            "bar.foo.1._john.smith.3.e._num.numexample.com."
        );
    }

    #[test]
    fn custom_zone() {
        let set = LocationGenerator::new("example.org")
            .generate(0, &Identifier::parse("numexample.com").unwrap());
        assert_eq!(set.hosted(), "0._numexample.com.c.7.m.example.org.");
        assert_eq!(
            set.populator(),
            Some("0._numexample.com.populator.example.org.")
        );
    }

    #[test]
    fn paths() {
        let set = locations(1, "example.com/sales/manager");
        assert_eq!(
            set.independent(),
            "manager.sales.1._num.example.com."
        );
        assert_eq!(
            set.path(Location::Independent).as_deref(),
            Some("/sales/manager")
        );
        assert_eq!(
            locations(1, "example.com")
                .path(Location::Hosted)
                .as_deref(),
            Some("/")
        );
        assert!(set.path(Location::Populator).is_none());

        let moved = set.with_path(Location::Independent, "/").unwrap();
        assert_eq!(moved.independent(), "1._num.example.com.");
        assert_eq!(moved.hosted(), set.hosted());
    }

    #[test]
    fn location_redirects() {
        let set = locations(1, "example.com/sales");
        let moved = set
            .redirect_location(Location::Independent, "../support")
            .unwrap();
        assert_eq!(moved.independent(), "support.1._num.example.com.");
        assert_eq!(moved.hosted(), set.hosted());

        assert!(matches!(
            set.redirect_location(Location::Independent, "."),
            Err(Error::InvalidRedirect(_))
        ));
        assert!(matches!(
            set.redirect_location(Location::Independent, "../.."),
            Err(Error::RootEscape(_))
        ));
    }

    #[test]
    fn branch_redirects() {
        let set = locations(1, "lookup.root.redirect1.com");
        let moved = set
            .redirect_branch(Location::Independent, "redirected")
            .unwrap();
        assert_eq!(
            moved.independent(),
            "redirected.1._num.lookup.root.redirect1.com."
        );
        assert!(moved.hosted().starts_with("redirected.1._lookup."));
        assert!(moved.populator().is_none());

        let back = moved.redirect_branch(Location::Independent, "/").unwrap();
        assert_eq!(back, set);
    }
}
