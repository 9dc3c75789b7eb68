//! Resolving relative redirect paths.

use crate::error::Error;

/// Resolves a redirect path against a base path.
///
/// A redirect starting with `/` replaces the base. Otherwise it is appended
/// to the base. The combined path is then walked segment by segment: `..`
/// removes the previous segment, `.` and empty segments are skipped. Going
/// above the root is an error.
///
/// The result always starts with a `/` and never ends with one unless it
/// is the root itself.
pub fn resolve(base: &str, redirect: &str) -> Result<String, Error> {
    let base = base.strip_suffix('/').unwrap_or(base);
    let combined = if redirect.starts_with('/') {
        redirect.to_string()
    } else {
        format!("{base}/{redirect}")
    };

    let mut stack: Vec<&str> = Vec::new();
    for segment in combined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return Err(Error::RootEscape(combined.clone()));
                }
            }
            segment => stack.push(segment),
        }
    }
    Ok(format!("/{}", stack.join("/")))
}

//============ Tests =========================================================
