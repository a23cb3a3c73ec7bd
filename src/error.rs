//! Error types for the reconciler

use thiserror::Error;

use crate::cloud::types::ResourceKind;
use crate::cloud::CloudError;

/// Main error type for reconcile operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration or invariant violation; fatal, never retried
    #[error("configuration error: {0}")]
    Config(String),

    /// A filter expected to match exactly one resource matched none
    #[error("no {kind} found matching {filter}")]
    NoMatch {
        /// Kind of resource looked up
        kind: ResourceKind,
        /// Filter that matched nothing
        filter: String,
    },

    /// A filter matched more than one resource where at most one is valid
    #[error("found {count} {kind} resources matching {filter}, should not happen")]
    MultipleMatches {
        /// Kind of resource looked up
        kind: ResourceKind,
        /// Filter that matched ambiguously
        filter: String,
        /// Number of matches observed
        count: usize,
    },

    /// A waiter exhausted its budget before the resource converged
    #[error("timed out waiting for {resource} to reach {target}")]
    Timeout {
        /// Resource being waited on
        resource: String,
        /// Target state that was never observed
        target: String,
    },

    /// A remote call failed
    #[error("cloud API error: {0}")]
    Cloud(#[from] CloudError),

    /// A lower-level error wrapped with resource kind and name context
    #[error("{context}: {source}")]
    Op {
        /// What the reconciler was doing
        context: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a no-match error for the given kind and filter
    pub fn no_match(kind: ResourceKind, filter: impl Into<String>) -> Self {
        Self::NoMatch {
            kind,
            filter: filter.into(),
        }
    }

    /// Create a multiple-matches error for the given kind and filter
    pub fn multiple_matches(kind: ResourceKind, filter: impl Into<String>, count: usize) -> Self {
        Self::MultipleMatches {
            kind,
            filter: filter.into(),
            count,
        }
    }

    /// Create a timeout error naming the resource and target state
    pub fn timeout(resource: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Timeout {
            resource: resource.into(),
            target: target.into(),
        }
    }

    /// Wrap this error with operation context (resource kind and name)
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Op {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True if the root cause is an ambiguous-filter match
    pub fn is_ambiguous(&self) -> bool {
        match self {
            Self::NoMatch { .. } | Self::MultipleMatches { .. } => true,
            Self::Op { source, .. } => source.is_ambiguous(),
            _ => false,
        }
    }
}

/// Result type alias using the crate's [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
