//! Callback-data tokens shared between the crates that build inline
//! buttons and the handler that parses them back.

/// Challenge option submission: `verify_{token}`.
#[must_use]
pub fn verify(token: &str) -> String {
    format!("verify_{token}")
}

/// Manual blacklist button on a profile card: `block_{correspondent}`.
#[must_use]
pub fn block(correspondent: i64) -> String {
    format!("block_{correspondent}")
}

/// Lift-blacklist button on an audit entry: `unban_{correspondent}`.
#[must_use]
pub fn unban(correspondent: i64) -> String {
    format!("unban_{correspondent}")
}

#[must_use]
pub fn parse_verify(data: &str) -> Option<&str> {
    data.strip_prefix("verify_")
}

#[must_use]
pub fn parse_block(data: &str) -> Option<i64> {
    data.strip_prefix("block_")?.parse().ok()
}

#[must_use]
pub fn parse_unban(data: &str) -> Option<i64> {
    data.strip_prefix("unban_")?.parse().ok()
}
