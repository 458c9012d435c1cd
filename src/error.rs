//! Unified error types.

/// The error type returned by arbor's fallible operations.
///
/// Application-level outcomes (404, a recovered panic, etc.) are written to
/// the [`ResponseWriter`](crate::ResponseWriter), never returned as `Error`s.
/// This type surfaces transport failures such as binding to a port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A route pattern that cannot be inserted into the path trie.
///
/// Registration methods on [`Router`](crate::Router) panic with this error's
/// message: a bad route is a programming mistake and should stop the process
/// before it starts serving.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("path must start with `/`")]
    MissingLeadingSlash,

    #[error("wildcard segment `{0}` has no name")]
    EmptyWildcardName(String),

    #[error("catch-all `:*` must be the last segment")]
    CatchAllNotLast,

    #[error("invalid constraint for `:{name}`: {source}")]
    InvalidRegex {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("a route with this pattern is already registered")]
    Duplicate,
}
