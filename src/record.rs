//! Assembling NUM records from TXT answers.
//!
//! A NUM record may be too long for a single TXT record. It is then split
//! into parts, each stored in its own TXT record with a header in front:
//!
//! ```text
//! 1/3|_n=1;o(n=NUM Exampl
//! 2|e Co
//! 3|;fb=example])
//! ```
//!
//! A header is the 1-based index of the part, optionally followed by a
//! slash and the total number of parts, and a vertical bar. The order in
//! which the parts arrive doesn’t matter. A record that wasn’t split
//! doesn’t need a header.
//!
//! The character-strings of each TXT record are concatenated before the
//! header is looked at.

use crate::error::Error;

//------------ Constants -----------------------------------------------------

/// The prefix of a zone distribution record.
pub const ZDR_PREFIX: &str = "_n=1;zd=";

/// Separates a part header from its payload.
const HEADER_SEPARATOR: char = '|';

//------------ assemble ------------------------------------------------------

/// Assembles the payloads of a set of TXT answers into one record.
///
/// Returns `Ok(None)` if there are no answers.
pub fn assemble<S: AsRef<str>>(
    answers: &[S],
) -> Result<Option<String>, Error> {
    let received = answers.len();
    if received == 0 {
        return Ok(None);
    }

    let mut parts: Vec<Option<&str>> = vec![None; received];
    for answer in answers {
        let answer = answer.as_ref();
        let (header, payload) = match split_header(answer)? {
            Some(split) => split,
            None if received == 1 => return Ok(Some(answer.into())),
            None => return Err(Error::RrSetNoHeaders),
        };
        if let Some(expected) = header.total {
            if expected != received {
                return Err(Error::RrSetIncomplete { expected, received });
            }
        }
        let slot = header
            .index
            .checked_sub(1)
            .and_then(|index| parts.get_mut(index))
            .ok_or(Error::RrSetIncomplete {
                expected: header.index.max(received),
                received,
            })?;
        if slot.is_some() {
            return Err(Error::RrSetHeaderFormat(answer.into()));
        }
        *slot = Some(payload);
    }

    // Every slot is filled: there are as many parts as slots and each
    // went into a different one.
    Ok(Some(parts.into_iter().flatten().collect()))
}

//------------ PartHeader ----------------------------------------------------

/// The header of a record part.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct PartHeader {
    /// The 1-based index of the part.
    index: usize,

    /// The total number of parts, if given.
    total: Option<usize>,
}

/// Splits a part into header and payload.
///
/// Returns `Ok(None)` if the part doesn’t start with something that looks
/// like a header. Numbers that don’t fit are an error.
fn split_header(part: &str) -> Result<Option<(PartHeader, &str)>, Error> {
    let (header, payload) = match part.split_once(HEADER_SEPARATOR) {
        Some(split) => split,
        None => return Ok(None),
    };
    let (index, total) = match header.split_once('/') {
        Some((index, total)) => (index, Some(total)),
        None => (header, None),
    };
    if !is_number(index) || !total.map_or(true, is_number) {
        return Ok(None);
    }

    let format_err = || Error::RrSetHeaderFormat(part.into());
    let index = index.parse::<usize>().map_err(|_| format_err())?;
    let total = match total {
        Some(total) => Some(total.parse::<usize>().map_err(|_| format_err())?),
        None => None,
    };
    if index == 0 || total == Some(0) {
        return Err(format_err());
    }
    Ok(Some((PartHeader { index, total }, payload)))
}

/// Returns whether a string is a non-empty sequence of ASCII digits.
fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|ch| ch.is_ascii_digit())
}

//------------ Record checks -------------------------------------------------

/// Returns whether an assembled record is a NUM record.
///
/// NUM records start with `_n=` followed by the protocol version and a
/// semicolon. Other TXT records at the same name, e.g., catch-all records
/// of a zone, are not NUM records. Legacy escapes are undone first.
pub fn is_num_record(record: &str) -> bool {
    replace_legacy_escapes(record)
        .strip_prefix("_n=")
        .and_then(|rest| rest.split_once(';'))
        .map_or(false, |(version, _)| is_number(version))
}

/// Returns whether a record is a zone distribution record.
pub fn is_zone_distribution(record: &str) -> bool {
    record.starts_with(ZDR_PREFIX)
}

/// Returns the shard level of a zone distribution record.
///
/// Returns `None` if the record isn’t a zone distribution record. Returns
/// `Some(Err(_))` with the offending value if the level is not a number
/// between 1 and 3.
pub fn zone_distribution_level(record: &str) -> Option<Result<u8, String>> {
    let value = record.strip_prefix(ZDR_PREFIX)?;
    let value = value.split(';').next().unwrap_or_default().trim();
    Some(match value.parse::<u8>() {
        Ok(level) if (1..=3).contains(&level) => Ok(level),
        _ => Err(value.into()),
    })
}

/// Replaces escapes used by older record generators.
///
/// Older generators escaped semicolons and spaces with a backslash.
pub fn replace_legacy_escapes(record: &str) -> String {
    record.replace("\\;", ";").replace("\\ ", " ")
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single() {
        assert_eq!(assemble::<&str>(&[]).unwrap(), None);
        assert_eq!(
            assemble(&["_n=1;o(n=Example)"]).unwrap().as_deref(),
            Some("_n=1;o(n=Example)")
        );
        assert_eq!(
            assemble(&["1/1|_n=1;a=b"]).unwrap().as_deref(),
            Some("_n=1;a=b")
        );
    }

    #[test]
    fn reorders_parts() {
        let parts = ["2|e Co", "1/3|_n=1;o(n=NUM Exampl", "3|;fb=example])"];
        assert_eq!(
            assemble(&parts).unwrap().as_deref(),
            Some("_n=1;o(n=NUM Example Co;fb=example])")
        );
    }

    #[test]
    fn empty_payload() {
        let parts = ["1/4|_n=1;", "3|b", "2|a", "4|"];
        assert_eq!(assemble(&parts).unwrap().as_deref(), Some("_n=1;ab"));
    }

    #[test]
    fn wrong_total() {
        let parts = ["1/3|_n=1;", "2|a"];
        assert!(matches!(
            assemble(&parts),
            Err(Error::RrSetIncomplete {
                expected: 3,
                received: 2
            })
        ));
        assert!(matches!(
            assemble(&["2/3|_n=1;"]),
            Err(Error::RrSetIncomplete { .. })
        ));
    }

    #[test]
    fn index_out_of_range() {
        let parts = ["1|_n=1;", "5|a"];
        assert!(matches!(
            assemble(&parts),
            Err(Error::RrSetIncomplete { .. })
        ));
    }

    #[test]
    fn missing_headers() {
        let parts = ["_n=1;a", "2|b"];
        assert!(matches!(assemble(&parts), Err(Error::RrSetNoHeaders)));
    }

    #[test]
    fn bad_headers() {
        let parts = ["0|_n=1;", "2|b"];
        assert!(matches!(
            assemble(&parts),
            Err(Error::RrSetHeaderFormat(_))
        ));
        let parts = ["1|_n=1;", "1|b"];
        assert!(matches!(
            assemble(&parts),
            Err(Error::RrSetHeaderFormat(_))
        ));
        let parts = ["99999999999999999999999|_n=1;", "2|b"];
        assert!(matches!(
            assemble(&parts),
            Err(Error::RrSetHeaderFormat(_))
        ));
    }

    #[test]
    fn num_records() {
        assert!(is_num_record("_n=1;o(n=Example)"));
        assert!(is_num_record("_n=12;"));
        assert!(!is_num_record("_n=;x"));
        assert!(!is_num_record("v=spf1 -all"));
        assert!(!is_num_record("_n=1"));
        assert!(is_num_record("_n=1\\;o(n=x)"));
    }

    #[test]
    fn zone_distribution() {
        assert!(is_zone_distribution("_n=1;zd=2"));
        assert_eq!(zone_distribution_level("_n=1;o(n=x)"), None);
        assert_eq!(zone_distribution_level("_n=1;zd=1"), Some(Ok(1)));
        assert_eq!(zone_distribution_level("_n=1;zd=3;"), Some(Ok(3)));
        assert_eq!(
            zone_distribution_level("_n=1;zd=4"),
            Some(Err("4".into()))
        );
        assert_eq!(
            zone_distribution_level("_n=1;zd=x"),
            Some(Err("x".into()))
        );
    }

    #[test]
    fn legacy_escapes() {
        assert_eq!(
            replace_legacy_escapes("_n=1\\;o(n=NUM\\ Example)"),
            "_n=1;o(n=NUM Example)"
        );
    }
}
