//! Challenge prompt rendering and keyboard serialization.

use {
    doorman_common::{
        callbacks,
        keyboard::{Button, Keyboard},
    },
    doorman_verification::{Challenge, ChallengeKind},
    serde_json::{Value, json},
};

/// Render the challenge prompt sent to an unverified correspondent.
#[must_use]
pub fn challenge_prompt(challenge: &Challenge) -> String {
    format!(
        "🛡 <b>Verification required</b>\n\n\
         Solve this {} to reach the operators:\n\n\
         <b>{}</b>\n\n\
         You have {} chances and 3 minutes.",
        challenge.kind.label(),
        challenge.question,
        challenge.remaining_chances,
    )
}

/// Build the option keyboard for a challenge.
///
/// Sequence options already tapped get a checkmark so the correspondent
/// can see their progress; other kinds never re-render the keyboard.
#[must_use]
pub fn challenge_keyboard(challenge: &Challenge) -> Keyboard {
    let per_row = match challenge.kind {
        ChallengeKind::Sequence => 4,
        ChallengeKind::Arithmetic | ChallengeKind::Pictogram => 2,
    };
    let buttons = challenge
        .options
        .iter()
        .map(|option| {
            let tapped = challenge.kind == ChallengeKind::Sequence
                && challenge.attempts.contains(option);
            let text = if tapped {
                format!("✅ {option}")
            } else {
                option.clone()
            };
            Button::new(text, callbacks::verify(option))
        })
        .collect();
    Keyboard::chunked(buttons, per_row)
}

/// Serialize a keyboard into the Bot API `reply_markup` object.
#[must_use]
pub fn to_reply_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| json!({ "text": b.text, "callback_data": b.data }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}
