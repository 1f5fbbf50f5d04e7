//! Platform-neutral inline-keyboard model. The Telegram crate serializes
//! this into `reply_markup` payloads; core crates only describe intent.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub data: String,
}

impl Button {
    #[must_use]
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Single-row keyboard with one button.
    #[must_use]
    pub fn single(button: Button) -> Self {
        Self {
            rows: vec![vec![button]],
        }
    }

    /// Lay buttons out left-to-right in rows of `per_row`.
    #[must_use]
    pub fn chunked(buttons: Vec<Button>, per_row: usize) -> Self {
        let per_row = per_row.max(1);
        Self {
            rows: buttons
                .chunks(per_row)
                .map(<[Button]>::to_vec)
                .collect(),
        }
    }

    /// Keyboard with no buttons; used to clear inline controls in place.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}
