//! Path pattern compiler.
//!
//! Benchmark queries address paths with a small glob dialect:
//!
//! * `**/` matches zero or more leading path segments,
//! * `**` matches any run of characters, separators included,
//! * `*` matches any run of characters inside one segment.
//!
//! [`compile`] lowers such a pattern into an anchored POSIX-style regular
//! expression for the engine's matching operator. Regex metacharacters in the
//! input are not escaped and reach the engine as written.

use once_cell::sync::Lazy;
use regex::Regex;

/// Replacement for a descendant axis followed by a separator.
const DESCENDANT_SEGMENTS: &str = "(.*/)?";
/// Replacement for a bare descendant axis.
const DESCENDANT_ANY: &str = ".*";

// A `*` directly after `.` is already a regex quantifier and stays as is.
static LABEL_WILDCARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^.])\*").unwrap());

/// Compiles a path pattern into an anchored matcher expression.
///
/// Rules are applied in order: `**/`, then the remaining `**`, then the first
/// label wildcard `*` not preceded by `.`. Only that first label wildcard is
/// rewritten; later ones pass through unchanged.
pub fn compile(pattern: &str) -> String {
    let expanded = pattern
        .replace("**/", DESCENDANT_SEGMENTS)
        .replace("**", DESCENDANT_ANY);
    let labelled = LABEL_WILDCARD.replacen(&expanded, 1, "${1}[^/]*");
    format!("^{labelled}$")
}
