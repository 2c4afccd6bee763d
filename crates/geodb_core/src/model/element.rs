//! Element types, dummy values and sample conversion.
//!
//! # Responsibility
//! - Define the closed set of element types a channel can store.
//! - Own the reserved dummy value of every element type.
//! - Convert stored samples into caller-requested element types.
//!
//! # Invariants
//! - "No data" is decided by `Element::is_dummy` alone, never by a side flag.
//! - Conversion maps dummy to dummy in every direction.
//! - Values that cannot be represented in the target type become dummy.
//! - NaN and infinities are not values: stored and converted floats hold dummy instead.

use crate::model::channel::DisplayFormat;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;

pub const SHORT_DUMMY: i16 = i16::MIN + 1;
pub const LONG_DUMMY: i32 = i32::MIN + 1;
pub const LONG64_DUMMY: i64 = i64::MIN + 1;
pub const FLOAT_DUMMY: f32 = -1.0e32;
pub const DOUBLE_DUMMY: f64 = -1.0e32;

/// Element type of a channel or vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Short,
    Long,
    Long64,
    Float,
    Double,
    Text,
}

impl ElementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
            Self::Long64 => "long64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "short" => Some(Self::Short),
            "long" => Some(Self::Long),
            "long64" => Some(Self::Long64),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Display settings used when numbers are rendered as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextFormat {
    pub format: DisplayFormat,
    /// Maximum characters kept; `0` keeps everything.
    pub width: u32,
    pub decimals: u32,
}

impl Default for TextFormat {
    fn default() -> Self {
        Self {
            format: DisplayFormat::Normal,
            width: 0,
            decimals: 2,
        }
    }
}

impl TextFormat {
    /// Renders one non-dummy number.
    pub fn render(&self, value: f64) -> String {
        let decimals = self.decimals as usize;
        let text = match self.format {
            DisplayFormat::Exp => format!("{value:.decimals$e}"),
            DisplayFormat::Hex => format!("{:X}", value.round() as i64),
            DisplayFormat::SigDig => {
                let magnitude = if value == 0.0 {
                    0
                } else {
                    value.abs().log10().floor() as i64
                };
                let after = (self.decimals as i64 - 1 - magnitude).max(0) as usize;
                format!("{value:.after$}")
            }
            DisplayFormat::Normal
            | DisplayFormat::Time
            | DisplayFormat::Date
            | DisplayFormat::Geographic => format!("{value:.decimals$}"),
        };
        self.clip(text)
    }

    fn clip(&self, text: String) -> String {
        if self.width == 0 || text.chars().count() <= self.width as usize {
            return text;
        }
        text.chars().take(self.width as usize).collect()
    }
}

/// Typed sample buffer as kept by storage backends.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Short(Vec<i16>),
    Long(Vec<i32>),
    Long64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Text(Vec<String>),
}

impl Samples {
    /// Builds a buffer of `len` dummies of the given element type.
    pub fn dummies(element_type: ElementType, len: usize) -> Self {
        match element_type {
            ElementType::Short => Self::Short(vec![SHORT_DUMMY; len]),
            ElementType::Long => Self::Long(vec![LONG_DUMMY; len]),
            ElementType::Long64 => Self::Long64(vec![LONG64_DUMMY; len]),
            ElementType::Float => Self::Float(vec![FLOAT_DUMMY; len]),
            ElementType::Double => Self::Double(vec![DOUBLE_DUMMY; len]),
            ElementType::Text => Self::Text(vec![String::new(); len]),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Short(_) => ElementType::Short,
            Self::Long(_) => ElementType::Long,
            Self::Long64(_) => ElementType::Long64,
            Self::Float(_) => ElementType::Float,
            Self::Double(_) => ElementType::Double,
            Self::Text(_) => ElementType::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Short(values) => values.len(),
            Self::Long(values) => values.len(),
            Self::Long64(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::Double(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts every sample into `T`, mapping dummies to `T::dummy()`.
    pub fn to_values<T: Element>(&self, format: &TextFormat) -> Vec<T> {
        match self {
            Self::Short(values) => convert_numbers(values, format),
            Self::Long(values) => convert_numbers(values, format),
            Self::Long64(values) => convert_numbers(values, format),
            Self::Float(values) => convert_numbers(values, format),
            Self::Double(values) => convert_numbers(values, format),
            Self::Text(values) => {
                if let Some(same) = (values as &dyn Any).downcast_ref::<Vec<T>>() {
                    return same.clone();
                }
                values
                    .iter()
                    .map(|value| {
                        if value.is_dummy() {
                            T::dummy()
                        } else {
                            T::from_text(value, format)
                        }
                    })
                    .collect()
            }
        }
    }

    /// Replaces NaN and infinite floating samples with the type's dummy.
    pub fn finite(self) -> Samples {
        match self {
            Self::Float(values) => Self::Float(
                values
                    .into_iter()
                    .map(|value| if value.is_finite() { value } else { FLOAT_DUMMY })
                    .collect(),
            ),
            Self::Double(values) => Self::Double(
                values
                    .into_iter()
                    .map(|value| if value.is_finite() { value } else { DOUBLE_DUMMY })
                    .collect(),
            ),
            other => other,
        }
    }

    /// Converts into the requested storage element type.
    pub fn convert(&self, element_type: ElementType, format: &TextFormat) -> Samples {
        if self.element_type() == element_type {
            return self.clone();
        }
        match element_type {
            ElementType::Short => Self::Short(self.to_values(format)),
            ElementType::Long => Self::Long(self.to_values(format)),
            ElementType::Long64 => Self::Long64(self.to_values(format)),
            ElementType::Float => Self::Float(self.to_values(format)),
            ElementType::Double => Self::Double(self.to_values(format)),
            ElementType::Text => Self::Text(self.to_values(format)),
        }
    }
}

#[allow(clippy::ptr_arg)]
fn convert_numbers<S, T>(values: &Vec<S>, format: &TextFormat) -> Vec<T>
where
    S: Element + Copy + Into<NumberSample>,
    T: Element,
{
    if let Some(same) = (values as &dyn Any).downcast_ref::<Vec<T>>() {
        return same.clone();
    }
    values
        .iter()
        .map(|value| {
            if value.is_dummy() {
                T::dummy()
            } else {
                let number: NumberSample = (*value).into();
                T::from_number(number.0, format)
            }
        })
        .collect()
}

/// Widened numeric sample used as the conversion pivot.
#[derive(Debug, Clone, Copy)]
pub struct NumberSample(pub f64);

impl From<i16> for NumberSample {
    fn from(value: i16) -> Self {
        Self(f64::from(value))
    }
}

impl From<i32> for NumberSample {
    fn from(value: i32) -> Self {
        Self(f64::from(value))
    }
}

impl From<i64> for NumberSample {
    fn from(value: i64) -> Self {
        Self(value as f64)
    }
}

impl From<f32> for NumberSample {
    fn from(value: f32) -> Self {
        Self(f64::from(value))
    }
}

impl From<f64> for NumberSample {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// A value type that can live in a vector or dense array.
pub trait Element: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Element type inferred for buffers of this Rust type.
    const ELEMENT_TYPE: ElementType;

    /// Reserved "no data" value.
    fn dummy() -> Self;

    fn is_dummy(&self) -> bool;

    /// Converts a non-dummy number; unrepresentable values become dummy.
    fn from_number(value: f64, format: &TextFormat) -> Self;

    /// Converts non-dummy text; unparsable values become dummy.
    fn from_text(value: &str, format: &TextFormat) -> Self;

    fn into_samples(values: Vec<Self>) -> Samples;
}

macro_rules! integer_element {
    ($ty:ty, $variant:ident, $dummy:expr) => {
        impl Element for $ty {
            const ELEMENT_TYPE: ElementType = ElementType::$variant;

            fn dummy() -> Self {
                $dummy
            }

            fn is_dummy(&self) -> bool {
                *self == $dummy
            }

            fn from_number(value: f64, _format: &TextFormat) -> Self {
                let rounded = value.round();
                if !rounded.is_finite() || rounded <= <$ty>::MIN as f64 || rounded > <$ty>::MAX as f64
                {
                    return $dummy;
                }
                rounded as $ty
            }

            fn from_text(value: &str, format: &TextFormat) -> Self {
                match value.trim().parse::<f64>() {
                    Ok(number) => Self::from_number(number, format),
                    Err(_) => $dummy,
                }
            }

            fn into_samples(values: Vec<Self>) -> Samples {
                Samples::$variant(values)
            }
        }
    };
}

integer_element!(i16, Short, SHORT_DUMMY);
integer_element!(i32, Long, LONG_DUMMY);
integer_element!(i64, Long64, LONG64_DUMMY);

impl Element for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::Float;

    fn dummy() -> Self {
        FLOAT_DUMMY
    }

    fn is_dummy(&self) -> bool {
        *self == FLOAT_DUMMY
    }

    fn from_number(value: f64, _format: &TextFormat) -> Self {
        let narrowed = value as f32;
        if narrowed.is_finite() {
            narrowed
        } else {
            FLOAT_DUMMY
        }
    }

    fn from_text(value: &str, format: &TextFormat) -> Self {
        match value.trim().parse::<f64>() {
            Ok(number) => Self::from_number(number, format),
            Err(_) => FLOAT_DUMMY,
        }
    }

    fn into_samples(values: Vec<Self>) -> Samples {
        Samples::Float(values)
    }
}

impl Element for f64 {
    const ELEMENT_TYPE: ElementType = ElementType::Double;

    fn dummy() -> Self {
        DOUBLE_DUMMY
    }

    fn is_dummy(&self) -> bool {
        *self == DOUBLE_DUMMY
    }

    fn from_number(value: f64, _format: &TextFormat) -> Self {
        if value.is_finite() {
            value
        } else {
            DOUBLE_DUMMY
        }
    }

    fn from_text(value: &str, format: &TextFormat) -> Self {
        match value.trim().parse::<f64>() {
            Ok(number) => Self::from_number(number, format),
            Err(_) => DOUBLE_DUMMY,
        }
    }

    fn into_samples(values: Vec<Self>) -> Samples {
        Samples::Double(values)
    }
}

impl Element for String {
    const ELEMENT_TYPE: ElementType = ElementType::Text;

    fn dummy() -> Self {
        String::new()
    }

    fn is_dummy(&self) -> bool {
        self.is_empty()
    }

    fn from_number(value: f64, format: &TextFormat) -> Self {
        format.render(value)
    }

    fn from_text(value: &str, _format: &TextFormat) -> Self {
        value.to_string()
    }

    fn into_samples(values: Vec<Self>) -> Samples {
        Samples::Text(values)
    }
}
