//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. Most errors are
//! reported rather than propagated: user watchers route evaluation failures
//! through [`crate::config::handle_error`] and keep going, while render
//! subscribers hand them back to the caller.

use crate::reactive::SubscriberId;

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A subscriber's evaluation function failed.
    #[error("error evaluating \"{expression}\": {message}")]
    Evaluation { expression: String, message: String },

    /// A subscriber's reaction callback failed.
    #[error("error in callback for \"{expression}\": {message}")]
    Callback { expression: String, message: String },

    /// A subscriber kept re-queueing itself within a single flush.
    #[error("infinite update loop in subscriber {id:?} (\"{expression}\"), exceeded {limit} runs")]
    InfiniteUpdate {
        id: SubscriberId,
        expression: String,
        limit: usize,
    },

    /// A watch expression is not a simple dotted path.
    #[error("failed watching path \"{0}\": only simple dot-delimited paths are supported")]
    InvalidPath(String),

    /// A reactive `set`/`del` was attempted on something that holds no properties.
    #[error("cannot {0}")]
    InvalidTarget(String),

    /// The patch engine expected a live node that was never created.
    #[error("virtual node has no live node ({0})")]
    MissingLiveNode(&'static str),

    /// A child component failed to produce its first tree.
    #[error("failed to mount component <{name}>: {source}")]
    ComponentMount {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// The component was used after `destroy`.
    #[error("component <{0}> has been destroyed")]
    ComponentDestroyed(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Build an evaluation error from any displayable message.
    pub fn evaluation(expression: impl Into<String>, message: impl ToString) -> Self {
        Self::Evaluation {
            expression: expression.into(),
            message: message.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
