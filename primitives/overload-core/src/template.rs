//! Parser for trigger definitions.
//!
//! ```text
//! name = [status text] (emoji) [DND] [for duration]
//! ```
//!
//! For example `vacation = On a boat! (⛵) DND for 1w`.

use crate::action::{Action, ActionTemplate, Presence};
use crate::duration::{DurationError, TriggerDuration};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Example shown to users whenever a definition does not parse.
pub const DEFINITION_EXAMPLE: &str = "/create-trigger vacation = I'm on a boat! (⛵) DND for 1w";

/// Example durations shown when a duration token does not parse.
pub const DURATION_EXAMPLES: &str = "15m, 1h, 2d, 1w";

#[allow(clippy::expect_used)]
static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]+) ?=(?: ?(.+))? +\((.*)\)( DND)?(?: for (\S+))?$")
        .expect("trigger definition pattern is valid")
});

/// Errors produced while parsing a trigger definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Invalid trigger definition {definition:?}. Try {example}", example = DEFINITION_EXAMPLE)]
    InvalidDefinition { definition: String },

    #[error(
        "invalid duration in trigger definition {duration:?}, here are some examples: {examples}",
        examples = DURATION_EXAMPLES
    )]
    InvalidDuration {
        duration: String,
        #[source]
        source: DurationError,
    },
}

/// Whether `name` could have been produced by a definition.
pub fn is_valid_trigger_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c == '-' || c == '_' || c.is_ascii_alphanumeric())
}

/// Parses a definition into a template.
///
/// The team id is left empty; callers stamp it before storing.
pub fn parse_template(definition: &str) -> Result<ActionTemplate, TemplateError> {
    let captures =
        DEFINITION
            .captures(definition)
            .ok_or_else(|| TemplateError::InvalidDefinition {
                definition: definition.to_string(),
            })?;

    let group = |index: usize| captures.get(index).map_or("", |m| m.as_str());

    let duration_token = group(5);
    let duration =
        TriggerDuration::parse(duration_token).map_err(|source| TemplateError::InvalidDuration {
            duration: duration_token.to_string(),
            source,
        })?;

    Ok(ActionTemplate {
        name: group(1).to_string(),
        team_id: String::new(),
        action: Action {
            presence: Presence::Away,
            status_text: group(2).to_string(),
            status_emoji: group(3).to_string(),
            do_not_disturb: !group(4).is_empty(),
            duration,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_full_definition() {
        let template = parse_template("vacation = On a boat! (⛵) DND for 1w").unwrap();

        assert_eq!(template.name, "vacation");
        assert_eq!(template.action.presence, Presence::Away);
        assert_eq!(template.action.status_text, "On a boat!");
        assert_eq!(template.action.status_emoji, "⛵");
        assert!(template.action.do_not_disturb);
        assert_eq!(template.action.duration.token(), "1w");
        assert_eq!(
            template.action.duration.value(),
            Duration::from_secs(7 * 24 * 60 * 60)
        );
    }

    #[test]
    fn parses_emoji_only_definition() {
        let template = parse_template("brb = (☕)").unwrap();

        assert_eq!(template.name, "brb");
        assert_eq!(template.action.status_text, "");
        assert_eq!(template.action.status_emoji, "☕");
        assert!(!template.action.do_not_disturb);
        assert_eq!(template.action.duration.value(), Duration::ZERO);
        assert!(template.action.duration.is_empty());
    }

    #[yare::parameterized(
        no_spaces_around_eq = { "lunch=Eating (🍔)",                "lunch",     "Eating",         "🍔", false, "" },
        space_before_eq     = { "lunch =Eating (🍔)",               "lunch",     "Eating",         "🍔", false, "" },
        hyphenated_name     = { "deep-work = Heads down (🎧) DND",  "deep-work", "Heads down",     "🎧", true,  "" },
        underscore_name     = { "on_call = Paged (📟) for 12h",     "on_call",   "Paged",          "📟", false, "12h" },
        slack_shortcode     = { "sick = Out sick (:face_with_thermometer:) DND for 2d", "sick", "Out sick", ":face_with_thermometer:", true, "2d" },
        empty_emoji         = { "quiet = Shh () DND",               "quiet",     "Shh",            "",   true,  "" },
        parens_in_text      = { "mtg = Sync (weekly) (📅) for 30m", "mtg",       "Sync (weekly)",  "📅", false, "30m" },
        compound_duration   = { "gym = Lifting (🏋) DND for 1h30m", "gym",       "Lifting",        "🏋", true,  "1h30m" },
        multi_digit_minutes = { "walk = (🚶) for 15m",              "walk",      "",               "🚶", false, "15m" },
    )]
    fn parses_definition_shapes(
        definition: &str,
        name: &str,
        text: &str,
        emoji: &str,
        dnd: bool,
        duration: &str,
    ) {
        let template = parse_template(definition).unwrap();
        assert_eq!(template.name, name);
        assert_eq!(template.action.status_text, text);
        assert_eq!(template.action.status_emoji, emoji);
        assert_eq!(template.action.do_not_disturb, dnd);
        assert_eq!(template.action.duration.token(), duration);
    }

    #[yare::parameterized(
        missing_emoji      = { "vacation = On a boat!" },
        missing_name       = { "= On a boat! (⛵)" },
        missing_equals     = { "vacation On a boat! (⛵)" },
        space_in_name      = { "long vacation = On a boat! (⛵)" },
        emoji_not_last     = { "vacation = (⛵) On a boat!" },
        lowercase_dnd      = { "vacation = On a boat! (⛵) dnd" },
        for_without_token  = { "vacation = On a boat! (⛵) for" },
        empty              = { "" },
        combining_mark     = { "cafe\u{301} = Coffee (☕)" },
        accented_name      = { "café = Coffee (☕)" },
        connector_in_name  = { "a‿b = Linked (🔗)" },
    )]
    fn rejects_malformed_definitions(definition: &str) {
        assert!(matches!(
            parse_template(definition),
            Err(TemplateError::InvalidDefinition { .. })
        ));
    }

    #[yare::parameterized(
        word       = { "vacation = On a boat! (⛵) DND for ever" },
        bare_count = { "vacation = On a boat! (⛵) for 15" },
        bad_unit   = { "vacation = On a boat! (⛵) DND for 2y" },
        too_long   = { "vacation = On a boat! (⛵) DND for 18446744073709551615s1ns" },
    )]
    fn reports_bad_durations_separately(definition: &str) {
        let err = parse_template(definition).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidDuration { .. }));
        assert!(err.to_string().contains(DURATION_EXAMPLES));
    }

    #[yare::parameterized(
        simple     = { "vacation",   true },
        hyphen     = { "deep-work",  true },
        underscore = { "on_call",    true },
        empty      = { "",           false },
        traversal  = { "../secrets", false },
        nested     = { "a/b",        false },
        spaced     = { "a b",        false },
        accented   = { "café",       false },
        combining  = { "cafe\u{301}", false },
    )]
    fn validates_trigger_names(name: &str, valid: bool) {
        assert_eq!(is_valid_trigger_name(name), valid);
    }

    #[test]
    fn usage_error_shows_an_example() {
        let err = parse_template("nonsense").unwrap_err();
        assert!(err.to_string().contains(DEFINITION_EXAMPLE));
    }
}
