//! Line catalog records and line naming grammar.
//!
//! # Invariants
//! - Flight lines are named `<type letter><number>[.<version>]`.
//! - Any line whose name matches that grammar carries the parsed type,
//!   number and version, whatever its category.

use crate::model::symbol::Symbol;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FLIGHT_LINE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([LBTSRPD])(\d+)(?:\.(\d+))?$").expect("flight line name pattern is valid")
});

static PLAIN_LINE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("plain line name pattern is valid")
});

/// Line category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCategory {
    Normal,
    Flight,
    Group,
}

impl LineCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Flight => "flight",
            Self::Group => "group",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Self::Normal),
            "flight" => Some(Self::Flight),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

/// Survey line type, encoded by the first letter of flight line names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    Normal,
    Base,
    Tie,
    Test,
    Trend,
    Special,
    Random,
}

impl LineType {
    pub fn letter(self) -> char {
        match self {
            Self::Normal => 'L',
            Self::Base => 'B',
            Self::Tie => 'T',
            Self::Test => 'S',
            Self::Trend => 'R',
            Self::Special => 'P',
            Self::Random => 'D',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'L' => Some(Self::Normal),
            'B' => Some(Self::Base),
            'T' => Some(Self::Tie),
            'S' => Some(Self::Test),
            'R' => Some(Self::Trend),
            'P' => Some(Self::Special),
            'D' => Some(Self::Random),
            _ => None,
        }
    }
}

/// Parts of a name that follows the flight line grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineName {
    pub line_type: LineType,
    pub number: u32,
    pub version: u32,
}

/// Parses `<type letter><number>[.<version>]`.
pub fn parse_line_name(name: &str) -> Option<LineName> {
    let captures = FLIGHT_LINE_NAME.captures(name)?;
    let letter = captures.get(1)?.as_str().chars().next()?;
    let number = captures.get(2)?.as_str().parse::<u32>().ok()?;
    let version = match captures.get(3) {
        Some(value) => value.as_str().parse::<u32>().ok()?,
        None => 0,
    };
    Some(LineName {
        line_type: LineType::from_letter(letter)?,
        number,
        version,
    })
}

/// Checks a line name against the grammar of its category.
///
/// Returns a short reason on rejection.
pub fn validate_line_name(name: &str, category: LineCategory) -> Result<(), &'static str> {
    match category {
        LineCategory::Flight => {
            if parse_line_name(name).is_none() {
                return Err("flight line names need a type letter (L B T S R P D) and a number");
            }
        }
        LineCategory::Normal | LineCategory::Group => {
            if !PLAIN_LINE_NAME.is_match(name) {
                return Err("line names use letters, digits, '_', '.' or '-' only");
            }
        }
    }
    Ok(())
}

/// Persisted line attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecord {
    pub name: String,
    pub category: LineCategory,
    pub line_type: LineType,
    pub date: f64,
    pub flight: u32,
    pub number: u32,
    pub version: u32,
    pub group_class: Option<String>,
    pub selected: bool,
}

impl LineRecord {
    /// Creates a selected line record, deriving type/number from the name.
    pub fn new(name: impl Into<String>, category: LineCategory) -> Self {
        let name = name.into();
        let parsed = parse_line_name(&name);
        Self {
            line_type: parsed.map_or(LineType::Normal, |value| value.line_type),
            number: parsed.map_or(0, |value| value.number),
            version: parsed.map_or(0, |value| value.version),
            name,
            category,
            date: 0.0,
            flight: 0,
            group_class: None,
            selected: true,
        }
    }

    pub fn apply(&mut self, patch: &LinePatch) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(flight) = patch.flight {
            self.flight = flight;
        }
        if let Some(version) = patch.version {
            self.version = version;
        }
        if let Some(group_class) = &patch.group_class {
            self.group_class = Some(group_class.clone()).filter(|value| !value.is_empty());
        }
    }
}

/// Line metadata as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDetails {
    pub symbol: Symbol,
    #[serde(flatten)]
    pub record: LineRecord,
}

/// Partial line metadata update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinePatch {
    pub date: Option<f64>,
    pub flight: Option<u32>,
    pub version: Option<u32>,
    /// An empty string removes the group class.
    pub group_class: Option<String>,
}
