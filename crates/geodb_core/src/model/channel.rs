//! Channel catalog records.
//!
//! # Invariants
//! - `array_width >= 1`; `1` is a scalar channel, `> 1` an array channel
//!   whose columns are addressed as `name[0]..name[w-1]`.
//! - `array_width` and `element_type` never change after creation.

use crate::model::element::{ElementType, TextFormat};
use crate::model::symbol::Symbol;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CHANNEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("channel name pattern is valid"));

/// Default display width for new channels.
pub const DEFAULT_CHANNEL_WIDTH: u32 = 12;
/// Default display decimals for new channels.
pub const DEFAULT_CHANNEL_DECIMALS: u32 = 2;

/// How numbers of a channel are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    Normal,
    Exp,
    Time,
    Date,
    Geographic,
    SigDig,
    Hex,
}

impl DisplayFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Exp => "exp",
            Self::Time => "time",
            Self::Date => "date",
            Self::Geographic => "geographic",
            Self::SigDig => "sig_dig",
            Self::Hex => "hex",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Self::Normal),
            "exp" => Some(Self::Exp),
            "time" => Some(Self::Time),
            "date" => Some(Self::Date),
            "geographic" => Some(Self::Geographic),
            "sig_dig" => Some(Self::SigDig),
            "hex" => Some(Self::Hex),
            _ => None,
        }
    }
}

/// Channel listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelFilter {
    /// Scalar and array channels.
    #[default]
    All,
    /// Scalar channels only.
    Normal,
    /// Array channels only.
    Array,
    /// Channels flagged for display. Not tracked by the storage backends,
    /// so this always lists nothing.
    Displayed,
}

/// Persisted channel attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub name: String,
    pub element_type: ElementType,
    pub array_width: u32,
    pub format: DisplayFormat,
    pub width: u32,
    pub decimals: u32,
    pub unit: String,
    pub label: String,
    pub class: String,
    pub protect: bool,
}

impl ChannelRecord {
    /// Creates a record with default display settings.
    pub fn new(name: impl Into<String>, element_type: ElementType, array_width: u32) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            element_type,
            array_width: array_width.max(1),
            format: DisplayFormat::Normal,
            width: DEFAULT_CHANNEL_WIDTH,
            decimals: DEFAULT_CHANNEL_DECIMALS,
            unit: String::new(),
            class: String::new(),
            protect: false,
        }
    }

    pub fn is_array(&self) -> bool {
        self.array_width > 1
    }

    /// Text rendering settings derived from the display attributes.
    pub fn text_format(&self) -> TextFormat {
        TextFormat {
            format: self.format,
            width: self.width,
            decimals: self.decimals,
        }
    }

    /// Applies the fields present in `patch`.
    pub fn apply(&mut self, patch: &ChannelPatch) {
        if let Some(class) = &patch.class {
            self.class = class.clone();
        }
        if let Some(format) = patch.format {
            self.format = format;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(decimals) = patch.decimals {
            self.decimals = decimals;
        }
        if let Some(unit) = &patch.unit {
            self.unit = unit.clone();
        }
        if let Some(label) = &patch.label {
            self.label = label.clone();
        }
        if let Some(protect) = patch.protect {
            self.protect = protect;
        }
    }
}

/// Channel metadata as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDetails {
    pub symbol: Symbol,
    #[serde(flatten)]
    pub record: ChannelRecord,
}

/// Partial channel metadata update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPatch {
    pub class: Option<String>,
    pub format: Option<DisplayFormat>,
    pub width: Option<u32>,
    pub decimals: Option<u32>,
    pub unit: Option<String>,
    pub label: Option<String>,
    pub protect: Option<bool>,
}

impl ChannelPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Whether this patch removes write protection.
    pub fn clears_protection(&self) -> bool {
        self.protect == Some(false)
    }
}

/// Creation request for [`crate::Database::new_channel`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewChannel {
    pub element_type: ElementType,
    pub array_width: u32,
    pub details: ChannelPatch,
}

impl Default for NewChannel {
    fn default() -> Self {
        Self {
            element_type: ElementType::Double,
            array_width: 1,
            details: ChannelPatch::default(),
        }
    }
}

impl NewChannel {
    pub fn of(element_type: ElementType) -> Self {
        Self {
            element_type,
            ..Self::default()
        }
    }

    pub fn array(element_type: ElementType, array_width: u32) -> Self {
        Self {
            element_type,
            array_width,
            ..Self::default()
        }
    }

    pub fn with_details(mut self, details: ChannelPatch) -> Self {
        self.details = details;
        self
    }
}

/// Checks a channel name; returns a short reason on rejection.
pub fn validate_channel_name(name: &str) -> Result<(), &'static str> {
    if CHANNEL_NAME.is_match(name) {
        Ok(())
    } else {
        Err("channel names start with a letter or '_' followed by letters, digits or '_'")
    }
}

/// Splits `base[i]` column addressing into its parts.
pub fn parse_column_name(name: &str) -> Option<(&str, u32)> {
    let open = name.find('[')?;
    let inner = name[open + 1..].strip_suffix(']')?;
    let index = inner.parse::<u32>().ok()?;
    let base = &name[..open];
    if base.is_empty() {
        return None;
    }
    Some((base, index))
}

/// Formats the synthetic name of one array column.
pub fn column_name(base: &str, index: u32) -> String {
    format!("{base}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::{
        column_name, parse_column_name, validate_channel_name, ChannelPatch, ChannelRecord,
        DisplayFormat,
    };
    use crate::model::element::ElementType;

    #[test]
    fn apply_only_touches_present_fields() {
        let mut record = ChannelRecord::new("mag", ElementType::Double, 1);
        record.unit = "nT".to_string();

        record.apply(&ChannelPatch {
            decimals: Some(4),
            format: Some(DisplayFormat::Exp),
            ..ChannelPatch::default()
        });

        assert_eq!(record.decimals, 4);
        assert_eq!(record.format, DisplayFormat::Exp);
        assert_eq!(record.unit, "nT");
        assert_eq!(record.width, 12);
    }

    #[test]
    fn channel_names_follow_identifier_grammar() {
        assert!(validate_channel_name("Mag_1").is_ok());
        assert!(validate_channel_name("_x").is_ok());
        assert!(validate_channel_name("1mag").is_err());
        assert!(validate_channel_name("ARR[0]").is_err());
        assert!(validate_channel_name("").is_err());
    }

    #[test]
    fn column_names_round_trip() {
        assert_eq!(column_name("ARR", 2), "ARR[2]");
        assert_eq!(parse_column_name("ARR[2]"), Some(("ARR", 2)));
        assert_eq!(parse_column_name("ARR"), None);
        assert_eq!(parse_column_name("[1]"), None);
        assert_eq!(parse_column_name("ARR[x]"), None);
    }

    #[test]
    fn record_serializes_flat_details() {
        let record = ChannelRecord::new("em", ElementType::Float, 3);
        let details = super::ChannelDetails {
            symbol: crate::model::symbol::Symbol::new(4),
            record,
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["symbol"], 4);
        assert_eq!(json["array_width"], 3);
        assert_eq!(json["element_type"], "float");
    }
}
