//! Find-by-filter primitive.
//!
//! Every lookup in the reconciler goes through these helpers: zero
//! matches and one match are ordinary outcomes, while multiple matches
//! for a deterministically-named resource is a configuration invariant
//! violation the reconciler cannot disambiguate, so it is surfaced as a
//! fatal error rather than retried.

use crate::cloud::types::{Filter, ResourceKind};
use crate::error::{Error, Result};

/// Reject an empty filter before any remote call is made.
pub fn require_filter(filter: &Filter) -> Result<()> {
    if filter.is_empty() {
        return Err(Error::config("no filters were passed"));
    }
    Ok(())
}

/// Reduce a list result to zero-or-one match.
///
/// More than one match is fatal: the resource is named
/// deterministically, so duplicates mean the account is in a state the
/// reconciler cannot repair.
pub fn at_most_one<T>(kind: ResourceKind, filter: &Filter, mut matches: Vec<T>) -> Result<Option<T>> {
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        n => Err(Error::multiple_matches(kind, filter.to_string(), n)),
    }
}

/// Reduce a list result to exactly one match.
///
/// Used for bring-your-own adoption, where "no match" means the caller
/// pointed at a resource that does not exist. That is a distinct error
/// from the ambiguous multi-match case, so callers can decide whether
/// to create or to escalate.
pub fn exactly_one<T>(kind: ResourceKind, filter: &Filter, matches: Vec<T>) -> Result<T> {
    at_most_one(kind, filter, matches)?
        .ok_or_else(|| Error::no_match(kind, filter.to_string()))
}
