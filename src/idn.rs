//! International labels for NUM identifiers.
//!
//! Identifiers may contain Unicode labels. Before they can become part of a
//! DNS name they are converted into A-labels by IDNA ToASCII: the label is
//! mapped as described in [UTS #46], which folds case and applies
//! compatibility normalization, and then Punycode encoded with the ACE
//! prefix `xn--`.
//!
//! Labels made only of ASCII characters are left alone.
//!
//! [UTS #46]: https://www.unicode.org/reports/tr46/

use std::fmt;

//------------ to_ascii ------------------------------------------------------

/// Converts a single label into its ASCII form.
///
/// Labels made only of ASCII characters are returned unchanged. All other
/// labels are mapped and turned into an A-label. Mapping may produce a
/// full stop, in which case the result is more than one label.
pub fn to_ascii(label: &str) -> Result<String, EncodeError> {
    if label.is_ascii() {
        return Ok(label.into());
    }
    idna::domain_to_ascii(label).map_err(|_| EncodeError)
}

/// Converts each dot separated label of a name into its ASCII form.
pub fn name_to_ascii(name: &str) -> Result<String, EncodeError> {
    let labels = name
        .split('.')
        .map(to_ascii)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(labels.join("."))
}

//------------ EncodeError ---------------------------------------------------

/// A label could not be converted into an A-label.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EncodeError;

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid international label")
    }
}

impl std::error::Error for EncodeError {}

//============ Tests =========================================================
