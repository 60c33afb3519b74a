//! Duration tokens used by triggers (`15m`, `1h30m`, `2d`, `1w`).
//!
//! Day and week suffixes are handled first; everything else goes through the
//! standard unit grammar (`h`, `m`, `s`, `ms`, `us`, `ns`, with fractions and
//! combinations such as `1h30m` or `1.5h`).

use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use thiserror::Error;

const DAY_SECS: u64 = 24 * 60 * 60;
const WEEK_SECS: u64 = 7 * DAY_SECS;

/// Longest representable duration, about 2562047h (`i64::MAX` nanoseconds).
const MAX_NANOS: u128 = i64::MAX as u128;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Errors produced while parsing a duration token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("unknown unit {unit:?} in duration {token:?}")]
    UnknownUnit { token: String, unit: String },

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("negative duration {0:?} is not supported")]
    Negative(String),

    #[error("duration {0:?} is too large")]
    Overflow(String),
}

/// Parses a duration token.
///
/// An empty token is a zero duration.
pub fn parse_duration(token: &str) -> Result<Duration, DurationError> {
    if token.is_empty() {
        return Ok(Duration::ZERO);
    }

    if let Some(duration) = parse_days_or_weeks(token)? {
        return Ok(duration);
    }

    parse_standard(token)
}

/// Matches `^(\d+)([wd])$`. Returns `None` when the token has another shape.
fn parse_days_or_weeks(token: &str) -> Result<Option<Duration>, DurationError> {
    let (count, unit_secs) = match token.as_bytes().last() {
        Some(b'd') => (&token[..token.len() - 1], DAY_SECS),
        Some(b'w') => (&token[..token.len() - 1], WEEK_SECS),
        _ => return Ok(None),
    };

    if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    let count: u64 = count
        .parse()
        .map_err(|_| DurationError::Overflow(token.to_string()))?;

    match count.checked_mul(unit_secs) {
        Some(secs) if u128::from(secs) * NANOS_PER_SEC <= MAX_NANOS => {
            Ok(Some(Duration::from_secs(secs)))
        }
        _ => Err(DurationError::Overflow(token.to_string())),
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 60 * 60 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}

/// Sequence of `<number>[.<fraction>]<unit>` components.
fn parse_standard(token: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(token.to_string());

    let mut rest = match token.as_bytes().first() {
        Some(b'-') => return Err(DurationError::Negative(token.to_string())),
        Some(b'+') => &token[1..],
        _ => token,
    };

    // A bare zero needs no unit.
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let whole_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let whole = &rest[..whole_len];
        rest = &rest[whole_len..];

        let mut fraction = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let fraction_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            fraction = &after_dot[..fraction_len];
            rest = &after_dot[fraction_len..];
        }

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| *c == '.' || c.is_ascii_digit())
            .map_or(rest.len(), |(i, _)| i);
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        if unit.is_empty() {
            return Err(DurationError::MissingUnit(token.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            token: token.to_string(),
            unit: unit.to_string(),
        })?;

        let overflow = || DurationError::Overflow(token.to_string());
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut component = whole.checked_mul(scale).ok_or_else(overflow)?;

        if !fraction.is_empty() {
            // Digits beyond nanosecond precision cannot change the result.
            let digits = &fraction[..fraction.len().min(18)];
            let numerator: u128 = digits.parse().map_err(|_| invalid())?;
            let denominator = 10u128.pow(digits.len() as u32);
            component = component
                .checked_add(numerator * scale / denominator)
                .ok_or_else(overflow)?;
        }

        total = total.checked_add(component).ok_or_else(overflow)?;
    }

    if total > MAX_NANOS {
        return Err(DurationError::Overflow(token.to_string()));
    }
    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| DurationError::Overflow(token.to_string()))?;
    let nanos = (total % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Whole minutes in `duration`, rounding any partial minute up.
pub fn whole_minutes(duration: Duration) -> u64 {
    let secs = duration
        .as_secs()
        .saturating_add(u64::from(duration.subsec_nanos() > 0));
    secs.div_ceil(60)
}

/// A validated duration token.
///
/// Keeps the token as the user wrote it (so listings show `1w`, not
/// `604800s`) next to its parsed value. Serialized as the bare token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TriggerDuration {
    token: String,
    value: Duration,
}

impl TriggerDuration {
    /// Parses and validates a token.
    pub fn parse(token: &str) -> Result<Self, DurationError> {
        let value = parse_duration(token)?;
        Ok(Self {
            token: token.to_string(),
            value,
        })
    }

    /// The token as written, empty when no duration was given.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn value(&self) -> Duration {
        self.value
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }

    /// The duration in whole minutes, the unit used for snoozes and status
    /// expiry.
    pub fn minutes(&self) -> u64 {
        whole_minutes(self.value)
    }
}

impl TryFrom<String> for TriggerDuration {
    type Error = DurationError;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        let value = parse_duration(&token)?;
        Ok(Self { token, value })
    }
}

impl From<TriggerDuration> for String {
    fn from(duration: TriggerDuration) -> Self {
        duration.token
    }
}

impl fmt::Display for TriggerDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}
