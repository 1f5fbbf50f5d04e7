use serde::{Deserialize, Serialize};

/// Identity snapshot of a correspondent, captured from the messaging
/// platform at verification time and reused for thread naming, the pinned
/// profile card, and blacklist audit entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_tag: Option<String>,
}

impl Profile {
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            handle: None,
            language_tag: None,
        }
    }

    /// `@handle` when present, otherwise an em-dash placeholder for display.
    #[must_use]
    pub fn handle_label(&self) -> String {
        self.handle
            .as_deref()
            .map_or_else(|| "—".to_string(), |h| format!("@{h}"))
    }

    /// Flag emoji matching the language tag, globe when unknown.
    #[must_use]
    pub fn flag(&self) -> &'static str {
        match self.language_tag.as_deref() {
            Some("zh" | "zh-hans") => "🇨🇳",
            Some("zh-hant") => "🇹🇼",
            Some("en") => "🇺🇸",
            Some("ru") => "🇷🇺",
            Some("ja") => "🇯🇵",
            Some("ko") => "🇰🇷",
            Some("es") => "🇪🇸",
            Some("fr") => "🇫🇷",
            Some("de") => "🇩🇪",
            _ => "🌐",
        }
    }
}
