use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A correspondent record exists but carries no profile, so a thread
    /// cannot be created; the correspondent is asked to re-verify.
    #[error("correspondent {0} has no profile on record")]
    MissingProfile(i64),

    /// An external messaging call failed; logged and abandoned, no retry.
    #[error("{context}: {message}")]
    Gateway { context: String, message: String },

    #[error(transparent)]
    Store(#[from] doorman_storage::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn gateway(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Gateway {
            context: context.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
