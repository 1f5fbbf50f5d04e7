use {
    rand::{Rng, seq::SliceRandom},
    serde::{Deserialize, Serialize},
};

/// Wrong submissions allowed before the correspondent is blacklisted.
pub const MAX_CHANCES: u32 = 3;

/// Logical challenge lifetime (ms); checked lazily on each submission.
pub const CHALLENGE_EXPIRY_MS: i64 = 3 * 60 * 1000;

/// Fixed symbol alphabet for pictogram challenges.
const PICTOGRAMS: [&str; 8] = ["🐱", "🐶", "🐭", "🐹", "🐰", "🦊", "🐻", "🐼"];

/// Target digits and disjoint distractor digits for sequence challenges.
const SEQUENCE_TARGET: [u32; 4] = [1, 2, 3, 4];
const SEQUENCE_DISTRACTORS: [u32; 3] = [5, 6, 7];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    Arithmetic,
    Pictogram,
    Sequence,
}

impl ChallengeKind {
    /// Short human label used in the challenge prompt.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Arithmetic => "arithmetic puzzle",
            Self::Pictogram => "pick the symbol",
            Self::Sequence => "tap in order",
        }
    }

    /// Blacklist reason recorded when this kind of challenge is failed.
    #[must_use]
    pub fn failure_reason(self) -> &'static str {
        match self {
            Self::Arithmetic => "verification failed (wrong arithmetic answer)",
            Self::Pictogram => "verification failed (wrong symbol)",
            Self::Sequence => "verification failed (wrong order)",
        }
    }
}

/// Blacklist reason recorded when a challenge expires unanswered.
pub const EXPIRY_REASON: &str = "verification timed out";

/// One verification puzzle instance with bounded attempts and expiry.
///
/// Owned exclusively by one correspondent; the handler layer keys it by
/// correspondent id and destroys it on success, exhaustion, or expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub kind: ChallengeKind,
    pub question: String,
    pub answer: String,
    pub options: Vec<String>,
    /// Submission history; for sequence challenges this is the prefix
    /// buffer and resets on a wrong full-length attempt.
    pub attempts: Vec<String>,
    pub remaining_chances: u32,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Result of evaluating one submitted option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Correct — the correspondent should be marked verified.
    Accepted,
    /// Sequence prefix grew but is not yet complete; persist and continue.
    Progress,
    /// Wrong submission; `remaining` chances left before blacklisting.
    Rejected { remaining: u32 },
    /// Chances exhausted — blacklist with the kind's failure reason.
    Exhausted,
    /// Past expiry — blacklist with [`EXPIRY_REASON`].
    Expired,
}

impl Challenge {
    /// Generate a challenge of a uniformly random kind.
    #[must_use]
    pub fn generate(now_ms: i64) -> Self {
        let mut rng = rand::rng();
        let (kind, question, answer, mut options) = match rng.random_range(0..3) {
            0 => arithmetic(&mut rng),
            1 => pictogram(&mut rng),
            _ => sequence(),
        };
        options.shuffle(&mut rng);
        Self {
            kind,
            question,
            answer,
            options,
            attempts: Vec::new(),
            remaining_chances: MAX_CHANCES,
            created_at: now_ms,
            expires_at: now_ms + CHALLENGE_EXPIRY_MS,
        }
    }

    /// Feed one submitted option token into the state machine.
    ///
    /// Pure over `self` and `now_ms`: callers persist or discard the
    /// updated challenge depending on the outcome.
    pub fn evaluate(&mut self, token: &str, now_ms: i64) -> Outcome {
        if now_ms >= self.expires_at {
            return Outcome::Expired;
        }

        match self.kind {
            ChallengeKind::Sequence => {
                self.attempts.push(token.to_string());
                if self.attempts.len() < self.answer.chars().count() {
                    return Outcome::Progress;
                }
                if self.attempts.concat() == self.answer {
                    return Outcome::Accepted;
                }
                self.attempts.clear();
                self.fail()
            },
            ChallengeKind::Arithmetic | ChallengeKind::Pictogram => {
                self.attempts.push(token.to_string());
                if token == self.answer {
                    return Outcome::Accepted;
                }
                self.fail()
            },
        }
    }

    fn fail(&mut self) -> Outcome {
        self.remaining_chances = self.remaining_chances.saturating_sub(1);
        if self.remaining_chances == 0 {
            Outcome::Exhausted
        } else {
            Outcome::Rejected {
                remaining: self.remaining_chances,
            }
        }
    }

    /// Concatenation of the current sequence prefix, for progress toasts.
    #[must_use]
    pub fn entered(&self) -> String {
        self.attempts.concat()
    }
}

fn arithmetic(rng: &mut impl Rng) -> (ChallengeKind, String, String, Vec<String>) {
    let (a, b, op, answer) = match rng.random_range(0..3) {
        0 => {
            let a: i64 = rng.random_range(1..=50);
            let b: i64 = rng.random_range(1..=50);
            (a, b, "+", a + b)
        },
        1 => {
            // Subtrahend strictly below the minuend so the result stays positive.
            let a: i64 = rng.random_range(2..=50);
            let b: i64 = rng.random_range(1..a);
            (a, b, "−", a - b)
        },
        _ => {
            let a: i64 = rng.random_range(1..=12);
            let b: i64 = rng.random_range(1..=12);
            (a, b, "×", a * b)
        },
    };

    let mut options = vec![answer.to_string()];
    while options.len() < 4 {
        let distractor = answer + rng.random_range(-5..=5);
        let token = distractor.to_string();
        if distractor > 0 && distractor != answer && !options.contains(&token) {
            options.push(token);
        }
    }

    (
        ChallengeKind::Arithmetic,
        format!("{a} {op} {b} = ?"),
        answer.to_string(),
        options,
    )
}

fn pictogram(rng: &mut impl Rng) -> (ChallengeKind, String, String, Vec<String>) {
    let target = PICTOGRAMS[rng.random_range(0..PICTOGRAMS.len())];
    let mut options = vec![target.to_string()];
    while options.len() < 4 {
        let candidate = PICTOGRAMS[rng.random_range(0..PICTOGRAMS.len())];
        if candidate != target && !options.iter().any(|o| o == candidate) {
            options.push(candidate.to_string());
        }
    }
    (
        ChallengeKind::Pictogram,
        format!("Tap this symbol: {target}"),
        target.to_string(),
        options,
    )
}

fn sequence() -> (ChallengeKind, String, String, Vec<String>) {
    let answer: String = SEQUENCE_TARGET.iter().map(ToString::to_string).collect();
    let options = SEQUENCE_TARGET
        .iter()
        .chain(SEQUENCE_DISTRACTORS.iter())
        .map(ToString::to_string)
        .collect();
    (
        ChallengeKind::Sequence,
        format!("Tap the digits in order: {answer}"),
        answer,
        options,
    )
}
