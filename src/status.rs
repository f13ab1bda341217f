//! Status normalization
//!
//! Reduces a member's free-text status (description, details, state, revive
//! setting) to one canonical token such as `[Mexico] - Going` or
//! `[Hospital] Mugged - Revives: ALL`. Timelines merge on token equality, so
//! the reduction must stay pure and deterministic.
//!
//! Location extraction lives behind [`LocationLookup`] so the heuristic
//! alias table and pattern cascade can change without touching the timeline
//! or compliance code.

use regex::Regex;

use crate::error::Result;

/// Token for a member who is free to act.
pub const AVAILABLE: &str = "Available";

/// Demonym and abbreviation aliases, matched as substrings in table order.
///
/// The first match wins. Several entries overlap (`cayman`/`caymanian`,
/// `sa` inside longer words), so reordering changes emitted tokens.
pub const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("mexican", "Mexico"),
    ("cayman", "Cayman Islands"),
    ("caymanian", "Cayman Islands"),
    ("canadian", "Canada"),
    ("hawaiian", "Hawaii"),
    ("british", "United Kingdom"),
    ("uk", "United Kingdom"),
    ("argentinian", "Argentina"),
    ("argentine", "Argentina"),
    ("swiss", "Switzerland"),
    ("japanese", "Japan"),
    ("chinese", "China"),
    ("emirati", "United Arab Emirates"),
    ("uae", "United Arab Emirates"),
    ("southafrican", "South Africa"),
    ("sa", "South Africa"),
];

const HOSPITAL_PATTERN: &str = r"(?i)in (?:a |an )?([a-z\s]+) hospital";
const PLACE_PATTERN: &str =
    r"(?i)(?:Traveling to|Returning to Torn from|Hiding out in|In) ([a-z\s]+)";

/// Discrete member state as reported by the faction roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberState {
    Traveling,
    Abroad,
    Hospital,
    Jail,
    Okay,
    Other(String),
}

impl From<&str> for MemberState {
    fn from(raw: &str) -> Self {
        match raw {
            "Traveling" => MemberState::Traveling,
            "Abroad" => MemberState::Abroad,
            "Hospital" => MemberState::Hospital,
            "Jail" => MemberState::Jail,
            "Okay" => MemberState::Okay,
            other => MemberState::Other(other.to_string()),
        }
    }
}

/// Who may revive a hospitalized member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevivePolicy {
    Everyone,
    NoOne,
    Partial,
}

impl From<&str> for RevivePolicy {
    fn from(raw: &str) -> Self {
        match raw {
            "Everyone" => RevivePolicy::Everyone,
            "No one" => RevivePolicy::NoOne,
            _ => RevivePolicy::Partial,
        }
    }
}

impl RevivePolicy {
    fn suffix(self) -> &'static str {
        match self {
            RevivePolicy::Everyone => " - Revives: ALL",
            RevivePolicy::NoOne => " - Revives: OFF",
            RevivePolicy::Partial => " - Revives: Partial",
        }
    }
}

/// Raw status fields for one member.
#[derive(Debug, Clone, Copy)]
pub struct RawStatus<'a> {
    pub description: &'a str,
    pub details: Option<&'a str>,
    pub state: &'a str,
    pub revive_setting: &'a str,
}

/// Resolves the location tag embedded in a status description.
pub trait LocationLookup {
    fn locate(&self, description: &str) -> Option<String>;
}

/// Alias table plus ordered pattern rules.
#[derive(Debug, Clone)]
pub struct LocationRules {
    aliases: Vec<(String, String)>,
    hospital: Regex,
    places: Vec<Regex>,
}

impl LocationRules {
    /// Build the rule set used for the live faction roster.
    pub fn standard() -> Result<Self> {
        Ok(Self {
            aliases: COUNTRY_ALIASES
                .iter()
                .map(|(alias, name)| (alias.to_string(), name.to_string()))
                .collect(),
            hospital: Regex::new(HOSPITAL_PATTERN)?,
            places: vec![Regex::new(PLACE_PATTERN)?],
        })
    }

    /// Build a rule set from an explicit alias table and place patterns.
    ///
    /// Every pattern must expose the place words as capture group 1.
    pub fn new(
        aliases: Vec<(String, String)>,
        hospital_pattern: &str,
        place_patterns: &[&str],
    ) -> Result<Self> {
        let places = place_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            aliases,
            hospital: Regex::new(hospital_pattern)?,
            places,
        })
    }

    fn alias_for(&self, key: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(alias, _)| alias == key)
            .map(|(_, name)| name.as_str())
    }

    fn resolve_words(&self, words: &str) -> String {
        let trimmed = words.trim();
        let key: String = trimmed
            .to_lowercase()
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect();
        match self.alias_for(&key) {
            Some(name) => name.to_string(),
            None => title_case(trimmed),
        }
    }
}

impl LocationLookup for LocationRules {
    fn locate(&self, description: &str) -> Option<String> {
        let lower = description.to_lowercase();

        if lower.contains("hospital") {
            let place = self
                .hospital
                .captures(description)
                .and_then(|caps| caps.get(1))
                .map(|words| self.resolve_words(words.as_str()));
            return Some(place.unwrap_or_else(|| "Hospital".to_string()));
        }

        if let Some((_, name)) = self
            .aliases
            .iter()
            .find(|(alias, _)| lower.contains(alias.as_str()))
        {
            return Some(name.clone());
        }

        self.places.iter().find_map(|rule| {
            rule.captures(description)
                .and_then(|caps| caps.get(1))
                .map(|words| self.resolve_words(words.as_str()))
        })
    }
}

/// Maps raw member status to canonical tokens.
#[derive(Debug, Clone)]
pub struct StatusNormalizer<L = LocationRules> {
    lookup: L,
}

impl StatusNormalizer<LocationRules> {
    pub fn standard() -> Result<Self> {
        Ok(Self::new(LocationRules::standard()?))
    }
}

impl<L: LocationLookup> StatusNormalizer<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Reduce one raw status to its canonical token.
    pub fn normalize(&self, raw: &RawStatus<'_>) -> String {
        let state = MemberState::from(raw.state);
        let location = self.lookup.locate(raw.description);
        let place = |fallback: &'static str| location.clone().unwrap_or_else(|| fallback.to_string());

        let mut token = match &state {
            MemberState::Traveling => {
                let direction = if raw.description.starts_with("Returning") {
                    "Returning"
                } else {
                    "Going"
                };
                format!("[{}] - {direction}", place("Traveling"))
            }
            MemberState::Abroad => format!("[{}] - Idle", place("Abroad")),
            MemberState::Hospital => {
                format!("[{}]{}", place("Hospital"), hospital_cause(raw.details))
            }
            MemberState::Jail => "Jail".to_string(),
            MemberState::Okay => AVAILABLE.to_string(),
            MemberState::Other(_) => {
                if raw.description.to_lowercase().contains("federal jail") {
                    "Fedded".to_string()
                } else {
                    "Unknown".to_string()
                }
            }
        };

        if state == MemberState::Hospital {
            token.push_str(RevivePolicy::from(raw.revive_setting).suffix());
        }

        token
    }
}

fn hospital_cause(details: Option<&str>) -> &'static str {
    let details = details.unwrap_or_default();
    if details.contains("Mugged") {
        " Mugged"
    } else if details.contains("Attacked") {
        " Attacked"
    } else if details.contains("Hospitalized") {
        " Hospitalized"
    } else if details.contains("Lost to") {
        " Lost"
    } else {
        " Event"
    }
}

/// Uppercase the first character of every word.
///
/// Word boundaries follow ASCII word characters (`[A-Za-z0-9_]`).
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_is_word = false;
    for ch in raw.chars() {
        let is_word = ch.is_ascii_alphanumeric() || ch == '_';
        if is_word && !prev_is_word {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        prev_is_word = is_word;
    }
    out
}
