//! NUM identifiers and addresses.
//!
//! An [Identifier] is what a user wants to look up: a domain name, an email
//! address, or a URL. Constructing one is the only place where the raw
//! string is normalized, so every identifier value is already in the form
//! used to derive DNS names:
//!
//! * schemes, `www.`, ports, queries, and fragments are removed,
//! * each non-ASCII label of the domain is converted into an A-label,
//! * the path becomes the _branch,_ its segments reversed and joined with
//!   dots.
//!
//! A [NumAddress] is an identifier together with the module number, written
//! as `num://[local@]domain[:module][/path]` or without the scheme.

#![warn(missing_docs)]

use crate::error::Error;
use crate::idn;
use std::fmt;
use std::str::FromStr;

//------------ Limits --------------------------------------------------------

/// The maximum length of a domain name in octets.
const MAX_DOMAIN_LEN: usize = 253;

/// The maximum length of a label in octets.
const MAX_LABEL_LEN: usize = 63;

/// The maximum length of the local part of an email address in octets.
const MAX_LOCAL_PART_LEN: usize = 64;

/// The schemes removed from raw identifiers.
const SCHEMES: [&str; 3] = ["http://", "https://", "num://"];

//------------ Kind ----------------------------------------------------------

/// The kind of an identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    /// A domain name, possibly followed by a path.
    Domain,

    /// An email address.
    Email,

    /// An HTTP or HTTPS URL.
    Url,
}

//------------ Identifier ----------------------------------------------------

/// A normalized NUM identifier.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Identifier {
    /// What kind of identifier this is.
    kind: Kind,

    /// The ASCII domain without `www.` and without surrounding dots.
    domain: String,

    /// The local part of an email address.
    local_part: Option<String>,

    /// The reversed, dot separated path, if there is one.
    branch: Option<String>,
}

impl Identifier {
    /// Parses and normalizes a raw identifier.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidIdentifier(raw.into()));
        }
        let is_http = raw
            .get(..4)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("http"));
        let rest = strip_query(strip_scheme(raw));
        let (authority, path) = match rest.find('/') {
            Some(pos) => rest.split_at(pos),
            None => (rest, ""),
        };

        let (kind, local_part, host) = match authority.split_once('@') {
            Some((local, host)) => {
                (Kind::Email, Some(normalize_local_part(local, raw)?), host)
            }
            None if is_http => (Kind::Url, None, authority),
            None => (Kind::Domain, None, authority),
        };

        let branch = match kind {
            Kind::Email => email_branch(path, raw)?,
            _ => normalize_branch(path, raw)?,
        };
        Ok(Identifier {
            kind,
            domain: normalize_domain(host, raw)?,
            local_part,
            branch,
        })
    }

    /// Returns the kind of the identifier.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Returns whether this is an email address.
    pub fn is_email(&self) -> bool {
        self.kind == Kind::Email
    }

    /// Returns the normalized domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the local part of an email address.
    pub fn local_part(&self) -> Option<&str> {
        self.local_part.as_deref()
    }

    /// Returns the branch, i.e., the reversed and dot separated path.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Returns whether the identifier has no branch.
    pub fn is_root(&self) -> bool {
        self.branch.is_none()
    }

    /// Returns the branch as a path.
    ///
    /// A root identifier has the path `/`.
    pub fn path(&self) -> String {
        branch_to_path(self.branch.as_deref())
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = match self.branch {
            Some(_) => self.path(),
            None => String::new(),
        };
        match (self.kind, self.local_part.as_deref()) {
            (Kind::Email, Some(local)) => {
                write!(f, "{}@{}{}", local, self.domain, path)
            }
            (Kind::Url, _) => write!(f, "https://{}{}", self.domain, path),
            _ => write!(f, "{}{}", self.domain, path),
        }
    }
}

//------------ NumAddress ----------------------------------------------------

/// An identifier together with a module number.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NumAddress {
    /// The identifier.
    identifier: Identifier,

    /// The module number, if the address had one.
    module: Option<u32>,
}

impl NumAddress {
    /// Parses an address.
    ///
    /// The form is `[scheme://][local@]host[:module][/path]`.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let raw = raw.trim();
        let (scheme, rest) = match raw.find("://") {
            Some(pos) => (&raw[..pos], &raw[pos + 3..]),
            None => ("", raw),
        };
        let rest = strip_query(rest);
        let (authority, path) = match rest.find('/') {
            Some(pos) => rest.split_at(pos),
            None => (rest, ""),
        };
        let (user_host, module) = match authority.rsplit_once(':') {
            Some((user_host, module)) => {
                let module = module
                    .parse::<u32>()
                    .map_err(|_| Error::InvalidIdentifier(raw.into()))?;
                (user_host, Some(module))
            }
            None => (authority, None),
        };

        let identifier = if scheme.eq_ignore_ascii_case("http")
            || scheme.eq_ignore_ascii_case("https")
        {
            Identifier::parse(&format!("{scheme}://{user_host}{path}"))?
        } else {
            Identifier::parse(&format!("{user_host}{path}"))?
        };
        Ok(NumAddress { identifier, module })
    }

    /// Returns whether a redirect target is an absolute address.
    ///
    /// Absolute targets carry a scheme or a module number.
    pub fn is_absolute(target: &str) -> bool {
        target.contains("://")
            || target.match_indices(':').any(|(pos, _)| {
                target[pos + 1..].starts_with(|ch: char| ch.is_ascii_digit())
            })
    }

    /// Returns the identifier.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Returns the module number if the address had one.
    pub fn module(&self) -> Option<u32> {
        self.module
    }

    /// Converts the address into its identifier and module number.
    ///
    /// Addresses without a module number use `default_module`.
    pub fn into_parts(self, default_module: u32) -> (Identifier, u32) {
        (self.identifier, self.module.unwrap_or(default_module))
    }
}

impl FromStr for NumAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

//------------ Helpers -------------------------------------------------------

/// Converts an optional branch back into a path.
pub(crate) fn branch_to_path(branch: Option<&str>) -> String {
    match branch {
        Some(branch) => {
            let mut segments: Vec<&str> = branch.split('.').collect();
            segments.reverse();
            format!("/{}", segments.join("/"))
        }
        None => "/".into(),
    }
}

/// Removes a recognized scheme from the start of a raw identifier.
fn strip_scheme(raw: &str) -> &str {
    for scheme in SCHEMES {
        if let Some(prefix) = raw.get(..scheme.len()) {
            if prefix.eq_ignore_ascii_case(scheme) {
                return &raw[scheme.len()..];
            }
        }
    }
    raw
}

/// Removes a query and fragment.
fn strip_query(raw: &str) -> &str {
    match raw.find(['?', '#']) {
        Some(pos) => &raw[..pos],
        None => raw,
    }
}

/// Normalizes the host part into an ASCII domain.
fn normalize_domain(host: &str, raw: &str) -> Result<String, Error> {
    let invalid = || Error::InvalidIdentifier(raw.into());

    let host = match host.find(':') {
        Some(pos) => &host[..pos],
        None => host,
    };
    let host = match host.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &host[4..],
        _ => host,
    };
    let host = host.trim_matches('.');
    if host.is_empty()
        || host.chars().any(|ch| ch.is_whitespace() || ch.is_control())
    {
        return Err(invalid());
    }

    let domain = idn::name_to_ascii(host).map_err(|_| invalid())?;
    if domain.len() > MAX_DOMAIN_LEN
        || domain
            .split('.')
            .any(|label| label.is_empty() || label.len() > MAX_LABEL_LEN)
    {
        return Err(invalid());
    }
    Ok(domain)
}

/// Checks the local part of an email address.
///
/// The local part is used as is, it is neither lowercased nor converted
/// into A-labels.
fn normalize_local_part(local: &str, raw: &str) -> Result<String, Error> {
    if local.is_empty()
        || local.len() > MAX_LOCAL_PART_LEN
        || local.chars().any(|ch| ch.is_whitespace() || ch.is_control())
    {
        return Err(Error::InvalidIdentifier(raw.into()));
    }
    Ok(local.into())
}

/// Turns a path into a branch.
///
/// The segments are reversed and joined with dots. A last segment that
/// contains a dot names a document rather than a branch and is dropped.
fn normalize_branch(path: &str, raw: &str) -> Result<Option<String>, Error> {
    let mut segments: Vec<&str> =
        path.split('/').filter(|seg| !seg.is_empty()).collect();
    if segments.last().map_or(false, |seg| seg.contains('.')) {
        segments.pop();
    }
    if segments.is_empty() {
        return Ok(None);
    }
    let labels = segments
        .iter()
        .rev()
        .map(|seg| idn::to_ascii(&seg.replace(' ', "_")))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| Error::InvalidIdentifier(raw.into()))?;
    Ok(Some(labels.join(".")))
}

/// Turns the path of an email address into a branch.
///
/// Unlike [normalize_branch], all segments are kept as they are apart from
/// the conversion into A-labels.
fn email_branch(path: &str, raw: &str) -> Result<Option<String>, Error> {
    let labels = path
        .split('/')
        .filter(|seg| !seg.is_empty())
        .rev()
        .map(idn::to_ascii)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| Error::InvalidIdentifier(raw.into()))?;
    if labels.is_empty() {
        return Ok(None);
    }
    Ok(Some(labels.join(".")))
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("numexample.com")]
    #[case("www.numexample.com")]
    #[case("http://numexample.com")]
    #[case("https://www.numexample.com/")]
    #[case("WWW.numexample.com.")]
    #[case("numexample.com:8080")]
    fn same_domain(#[case] raw: &str) {
        let id = Identifier::parse(raw).unwrap();
        assert_eq!(id.domain(), "numexample.com");
        assert!(id.is_root());
    }

    #[test]
    fn kinds() {
        assert_eq!(
            Identifier::parse("numexample.com").unwrap().kind(),
            Kind::Domain
        );
        assert_eq!(
            Identifier::parse("HTTPS://numexample.com").unwrap().kind(),
            Kind::Url
        );
        let email = Identifier::parse("john.smith@numexample.com").unwrap();
        assert_eq!(email.kind(), Kind::Email);
        assert_eq!(email.local_part(), Some("john.smith"));
        assert_eq!(email.domain(), "numexample.com");
    }

    #[test]
    fn unicode_domain() {
        let id = Identifier::parse("testdomain例.com").unwrap();
        assert_eq!(id.domain(), "xn--testdomain-4y5p.com");
    }

    #[test]
    fn branches() {
        let id = Identifier::parse("numexample.com/sales/manager").unwrap();
        assert_eq!(id.branch(), Some("manager.sales"));
        assert_eq!(id.path(), "/sales/manager");

        let id =
            Identifier::parse("http://www.num例.com/sales/index.html").unwrap();
        assert_eq!(id.domain(), "xn--num-xc0e.com");
        assert_eq!(id.branch(), Some("sales"));

        let id = Identifier::parse("testdomain例.com/test1例/test2例/test3例")
            .unwrap();
        assert_eq!(
            id.branch(),
            Some("xn--test3-9d3h.xn--test2-9d3h.xn--test1-9d3h")
        );

        let id = Identifier::parse("example.com/big sales/?q=1#top").unwrap();
        assert_eq!(id.branch(), Some("big_sales"));

        assert!(Identifier::parse("example.com/").unwrap().is_root());
        assert!(Identifier::parse("example.com/a.html").unwrap().is_root());
    }

    #[test]
    fn email_branches() {
        let id =
            Identifier::parse("john.smith@numexample.com/foo/bar").unwrap();
        assert_eq!(id.local_part(), Some("john.smith"));
        assert_eq!(id.domain(), "numexample.com");
        assert_eq!(id.branch(), Some("bar.foo"));

        // Document-like segments are branches, too.
        let id = Identifier::parse("john@numexample.com/a/b.html").unwrap();
        assert_eq!(id.branch(), Some("b.html.a"));

        let id = Identifier::parse("john@numexample.com/例").unwrap();
        assert_eq!(id.branch(), Some("xn--fsq"));
    }

    #[test]
    fn email_local_part_is_kept() {
        let id = Identifier::parse("Jöhn@numexample.com").unwrap();
        assert_eq!(id.local_part(), Some("Jöhn"));
        assert_eq!(id.domain(), "numexample.com");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("www.")]
    #[case("@example.com")]
    #[case("bad domain.com")]
    #[case("a..b.com")]
    fn invalid(#[case] raw: &str) {
        assert!(matches!(
            Identifier::parse(raw),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn too_long() {
        let label = "a".repeat(64);
        assert!(Identifier::parse(&format!("{label}.com")).is_err());
        let local = "b".repeat(65);
        assert!(Identifier::parse(&format!("{local}@example.com")).is_err());
    }

    #[rstest]
    #[case("numexample.com")]
    #[case("https://www.numexample.com/sales/team/")]
    #[case("john.smith@numexample.com/foo/bar")]
    #[case("http://www.num例.com/sales/index.html")]
    fn idempotent(#[case] raw: &str) {
        let id = Identifier::parse(raw).unwrap();
        let again = Identifier::parse(&id.to_string()).unwrap();
        assert_eq!(id, again);
    }

    #[test]
    fn addresses() {
        let addr = NumAddress::parse("num://numexample.com:1/sales").unwrap();
        assert_eq!(addr.module(), Some(1));
        assert_eq!(addr.identifier().domain(), "numexample.com");
        assert_eq!(addr.identifier().branch(), Some("sales"));

        let addr = NumAddress::parse("john@numexample.com:3").unwrap();
        assert_eq!(addr.identifier().local_part(), Some("john"));
        assert_eq!(addr.module(), Some(3));

        let (id, module) =
            NumAddress::parse("numexample.com").unwrap().into_parts(0);
        assert_eq!(id.domain(), "numexample.com");
        assert_eq!(module, 0);

        let addr =
            NumAddress::parse("http://url.example.com:1/sales/").unwrap();
        assert_eq!(addr.identifier().kind(), Kind::Url);

        assert!(NumAddress::parse("numexample.com:x").is_err());
    }

    #[test]
    fn absolute_targets() {
        assert!(NumAddress::is_absolute("example.com:1"));
        assert!(NumAddress::is_absolute("example.com:1/sales"));
        assert!(NumAddress::is_absolute("num://example.com/sales"));
        assert!(!NumAddress::is_absolute("sales"));
        assert!(!NumAddress::is_absolute("../sales"));
        assert!(!NumAddress::is_absolute("a:b"));
    }
}
