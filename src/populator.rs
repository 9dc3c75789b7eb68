//! Responses of the populator service.
//!
//! When neither the independent nor the hosted location has a record, the
//! populator can be asked to create one. It answers with a status object
//! telling the client where and when to look again, an error object, or
//! the record itself:
//!
//! ```text
//! _n=1;@status=(code=1;description=Record will be available shortly)
//! _n=1;@error=(code=101;description=Domain not found)
//! ```
//!
//! Depending on the protocol version the objects are spelled
//! `status_(…)`, `status_=(…)`, `@status=(…)`, or `@status(…)`, and the
//! same for errors.

use crate::error::Error;
use std::ops::RangeInclusive;

//------------ Constants -----------------------------------------------------

/// Check the independent location again later.
pub const STATUS_CHECK_LATER: u32 = 1;

/// The record is now available at the independent location.
pub const STATUS_AT_INDEPENDENT: u32 = 2;

/// The record is now available at the hosted location.
pub const STATUS_AT_HOSTED: u32 = 3;

/// The populator returned the record itself.
pub const VALID_RECORD: u32 = 999;

/// The populator is busy, ask it again later.
pub const ERROR_RETRY: u32 = 100;

/// The range of error codes a populator may send.
const ERROR_CODES: RangeInclusive<u32> = 100..=104;

/// The names of the two kinds of objects.
const STATUS: &str = "status";
const ERROR: &str = "error";

//------------ PopulatorResponse ---------------------------------------------

/// A parsed populator response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PopulatorResponse {
    /// A status object.
    Status {
        /// The status code.
        code: u32,

        /// The human readable description.
        description: String,
    },

    /// An error object.
    Error {
        /// The error code.
        code: u32,

        /// The human readable description.
        description: String,
    },

    /// Anything else is the record itself.
    Record(String),
}

impl PopulatorResponse {
    /// Parses the text of a populator response.
    ///
    /// An object without a numeric code is an invalid response.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let found = [STATUS, ERROR]
            .into_iter()
            .filter_map(|kind| find_object(text, kind).map(|obj| (kind, obj)))
            .min_by_key(|(_, (pos, _))| *pos);
        let (kind, (_, body)) = match found {
            Some(found) => found,
            None => return Ok(PopulatorResponse::Record(text.into())),
        };

        let mut code = None;
        let mut description = String::new();
        for item in body.split(';') {
            match item.split_once('=') {
                Some((key, value)) if key.trim() == "code" => {
                    code = value.trim().parse::<u32>().ok();
                }
                Some((key, value)) if key.trim() == "description" => {
                    description = value.trim().into();
                }
                _ => {}
            }
        }
        let code = code.ok_or(Error::InvalidPopulatorResponse(0))?;
        Ok(if kind == STATUS {
            PopulatorResponse::Status { code, description }
        } else {
            PopulatorResponse::Error { code, description }
        })
    }

    /// Returns the code of the response.
    ///
    /// A record has the code [VALID_RECORD].
    pub fn code(&self) -> u32 {
        match *self {
            PopulatorResponse::Status { code, .. } => code,
            PopulatorResponse::Error { code, .. } => code,
            PopulatorResponse::Record(_) => VALID_RECORD,
        }
    }

    /// Returns whether this is a status or error object.
    pub fn is_object(&self) -> bool {
        !matches!(self, PopulatorResponse::Record(_))
    }

    /// Checks that the code is one the protocol defines.
    pub fn check(self) -> Result<Self, Error> {
        let valid = match self {
            PopulatorResponse::Status { code, .. } => matches!(
                code,
                STATUS_CHECK_LATER
                    | STATUS_AT_INDEPENDENT
                    | STATUS_AT_HOSTED
                    | VALID_RECORD
            ),
            PopulatorResponse::Error { code, .. } => {
                ERROR_CODES.contains(&code)
            }
            PopulatorResponse::Record(_) => true,
        };
        if valid {
            Ok(self)
        } else {
            Err(Error::InvalidPopulatorResponse(self.code()))
        }
    }
}

/// Finds the first object of the given kind.
///
/// Returns the position of the object and the text between its
/// parentheses.
fn find_object<'a>(text: &'a str, kind: &str) -> Option<(usize, &'a str)> {
    let openers = [
        format!("{kind}_("),
        format!("{kind}_=("),
        format!("@{kind}=("),
        format!("@{kind}("),
    ];
    let (pos, opener) = openers
        .iter()
        .filter_map(|opener| {
            text.find(opener.as_str()).map(|pos| (pos, opener))
        })
        .min_by_key(|(pos, _)| *pos)?;
    let body = &text[pos + opener.len()..];
    Some((pos, &body[..closing_paren(body).unwrap_or(body.len())]))
}

/// Returns the position of the parenthesis closing an object body.
///
/// Parentheses inside the body, e.g., in a description, must be balanced.
fn closing_paren(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (pos, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(pos),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("_n=1;status_(code=1;description=Wait)")]
    #[case("_n=1;status_=(code=1;description=Wait)")]
    #[case("_n=1;@status=(code=1;description=Wait)")]
    #[case("_n=1;@status(code=1;description=Wait)")]
    fn status_framings(#[case] text: &str) {
        assert_eq!(
            PopulatorResponse::parse(text).unwrap(),
            PopulatorResponse::Status {
                code: 1,
                description: "Wait".into()
            }
        );
    }

    #[test]
    fn errors() {
        let res = PopulatorResponse::parse(
            "_n=1;@error=(code=101;description=Domain not found)",
        )
        .unwrap();
        assert_eq!(
            res,
            PopulatorResponse::Error {
                code: 101,
                description: "Domain not found".into()
            }
        );
        assert!(res.is_object());
        assert_eq!(res.clone().check().unwrap(), res);
    }

    #[test]
    fn description_with_parentheses() {
        let res = PopulatorResponse::parse(
            "_n=1;@error=(code=104;description=Failed (try again later))",
        )
        .unwrap();
        assert_eq!(
            res,
            PopulatorResponse::Error {
                code: 104,
                description: "Failed (try again later)".into()
            }
        );
        assert_eq!(closing_paren("a(b)c)d"), Some(5));
        assert_eq!(closing_paren("a(b"), None);
    }

    #[test]
    fn records() {
        let res = PopulatorResponse::parse("_n=1;o(n=Example)").unwrap();
        assert_eq!(res.code(), VALID_RECORD);
        assert!(!res.is_object());
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            PopulatorResponse::parse("_n=1;@status=(description=x)"),
            Err(Error::InvalidPopulatorResponse(0))
        ));
        assert!(matches!(
            PopulatorResponse::parse("_n=1;@status=(code=7)")
                .unwrap()
                .check(),
            Err(Error::InvalidPopulatorResponse(7))
        ));
        assert!(matches!(
            PopulatorResponse::parse("_n=1;@error=(code=200)")
                .unwrap()
                .check(),
            Err(Error::InvalidPopulatorResponse(200))
        ));
    }
}
