//! Playground variants and what each one is allowed to do.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which playground flavour a set of slots is shown as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// One editor, one preview.
    #[default]
    Single,
    /// Several independent tabs.
    Tabs,
    /// A sequence of steps with prev/next navigation, persisted across runs.
    Steps,
}

impl Variant {
    /// Only step sequences remember edits across reloads.
    pub fn persists(&self) -> bool {
        matches!(self, Variant::Steps)
    }

    /// Whether the raw-code editor can be collapsed to a read-only snippet.
    pub fn has_expand(&self) -> bool {
        matches!(self, Variant::Steps)
    }

    /// Whether `next`/`previous` move between slots.
    pub fn navigates(&self) -> bool {
        matches!(self, Variant::Steps)
    }

    /// How long the "Copied!" indicator stays visible.
    pub fn default_copy_feedback(&self) -> Duration {
        match self {
            Variant::Single | Variant::Tabs => Duration::from_millis(2000),
            Variant::Steps => Duration::from_millis(1500),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Single => "single",
            Variant::Tabs => "tabs",
            Variant::Steps => "steps",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Variant::Single),
            "tabs" => Ok(Variant::Tabs),
            "steps" => Ok(Variant::Steps),
            other => Err(format!("unknown variant '{other}' (expected single, tabs or steps)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_steps_persist() {
        assert!(!Variant::Single.persists());
        assert!(!Variant::Tabs.persists());
        assert!(Variant::Steps.persists());
    }

    #[test]
    fn test_parse_variant() {
        assert_eq!("Steps".parse::<Variant>().unwrap(), Variant::Steps);
        assert_eq!(" tabs ".parse::<Variant>().unwrap(), Variant::Tabs);
        assert!("carousel".parse::<Variant>().is_err());
    }

    #[test]
    fn test_copy_feedback_is_finite_and_visible() {
        for v in [Variant::Single, Variant::Tabs, Variant::Steps] {
            let d = v.default_copy_feedback();
            assert!(d >= Duration::from_millis(1500) && d <= Duration::from_secs(4));
        }
    }
}
