use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(MatchMode {
    Exact => "exact",
    Contains => "contains",
});

str_enum!(LlmBackend {
    Ollama => "ollama",
    OpenAi => "openai",
});

str_enum!(SearchBackend {
    Brave => "brave",
    Google => "google",
});

impl Default for MatchMode {
    fn default() -> Self {
        Self::Exact
    }
}

// ═══════════════════════════════════════════════════════════
// Severity
// ═══════════════════════════════════════════════════════════

/// Adjudicated interaction severity.
///
/// Serialized with the labels the frontend compares against
/// (`"No Interaction"` carries a space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    High,
    Moderate,
    Low,
    NoInteraction,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognised severity label: {0:?}")]
pub struct InvalidSeverity(pub String);

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[Self::High, Self::Moderate, Self::Low, Self::NoInteraction]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Moderate => "Moderate",
            Self::Low => "Low",
            Self::NoInteraction => "No Interaction",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = InvalidSeverity;

    /// Case-insensitive; `No Interaction`, `NoInteraction` and
    /// `no_interaction` all name the same label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "high" => Ok(Self::High),
            "moderate" => Ok(Self::Moderate),
            "low" => Ok(Self::Low),
            "nointeraction" => Ok(Self::NoInteraction),
            _ => Err(InvalidSeverity(s.to_string())),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!(" MODERATE ".parse::<Severity>().unwrap(), Severity::Moderate);
        assert_eq!("Low".parse::<Severity>().unwrap(), Severity::Low);
    }

    #[test]
    fn no_interaction_spellings() {
        for label in ["No Interaction", "NoInteraction", "no_interaction", "no-interaction"] {
            assert_eq!(label.parse::<Severity>().unwrap(), Severity::NoInteraction, "{label}");
        }
    }

    #[test]
    fn severity_rejects_unknown_labels() {
        let err = "Major".parse::<Severity>().unwrap_err();
        assert_eq!(err, InvalidSeverity("Major".into()));
        assert!("".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_serializes_display_label() {
        let json = serde_json::to_string(&Severity::NoInteraction).unwrap();
        assert_eq!(json, "\"No Interaction\"");
        let back: Severity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Severity::NoInteraction);
    }

    #[test]
    fn match_mode_defaults_to_exact() {
        assert_eq!(MatchMode::default(), MatchMode::Exact);
        assert_eq!("Contains".parse::<MatchMode>().unwrap(), MatchMode::Contains);
        assert!("fuzzy".parse::<MatchMode>().is_err());
    }

    #[test]
    fn backend_names_round_trip() {
        assert_eq!("openai".parse::<LlmBackend>().unwrap(), LlmBackend::OpenAi);
        assert_eq!(LlmBackend::Ollama.as_str(), "ollama");
        assert_eq!("GOOGLE".parse::<SearchBackend>().unwrap(), SearchBackend::Google);
    }
}
