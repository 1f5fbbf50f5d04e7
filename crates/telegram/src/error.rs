use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The Bot API answered `ok: false`.
    #[error("{method} rejected: {description}")]
    Api { method: String, description: String },

    /// The Bot API answered `ok: true` but the result was not in the
    /// expected shape.
    #[error("{method} returned an unexpected payload")]
    Payload { method: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    #[must_use]
    pub fn api(method: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Api {
            method: method.into(),
            description: description.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
