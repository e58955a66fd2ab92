/// Option schema: one declared argument of a leaf command.
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use slashforge_core::{ChannelType, Choice, ChoiceValue, CommandError, EntityKind};

use crate::value::OptionValue;

/// Platform limit on options per node, children per fork and choices per option.
pub const MAX_ENTRIES: usize = 25;
pub const MAX_DESCRIPTION_LEN: usize = 100;
pub const MAX_CHOICE_NAME_LEN: usize = 100;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_-]{1,32}$").unwrap());

/// Check an externally visible name: lowercase, 1-32 chars of `[a-z0-9_-]`.
pub fn validate_name(path: &str, name: &str) -> Result<(), CommandError> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(CommandError::invalid_shape(
            path,
            format!("name '{name}' must be 1-32 characters of [a-z0-9_-]"),
        ))
    }
}

pub(crate) fn validate_description(path: &str, description: &str) -> Result<(), CommandError> {
    let len = description.chars().count();
    if (1..=MAX_DESCRIPTION_LEN).contains(&len) {
        Ok(())
    } else {
        Err(CommandError::invalid_shape(
            path,
            format!("description must be 1-{MAX_DESCRIPTION_LEN} characters, got {len}"),
        ))
    }
}

// ---------------------------------------------------------------------------
// Option type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Attachment,
}

impl OptionType {
    /// Numeric type code used in the registration manifest.
    pub fn code(self) -> u8 {
        match self {
            OptionType::String => 3,
            OptionType::Integer => 4,
            OptionType::Boolean => 5,
            OptionType::User => 6,
            OptionType::Channel => 7,
            OptionType::Role => 8,
            OptionType::Mentionable => 9,
            OptionType::Number => 10,
            OptionType::Attachment => 11,
        }
    }

    /// The directory entity this type resolves to, if any.
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            OptionType::User => Some(EntityKind::User),
            OptionType::Channel => Some(EntityKind::Channel),
            OptionType::Role => Some(EntityKind::Role),
            OptionType::Mentionable => Some(EntityKind::Mentionable),
            OptionType::Attachment => Some(EntityKind::Attachment),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, OptionType::Integer | OptionType::Number)
    }

    /// Types that may carry choices or autocomplete.
    pub fn is_choosable(self) -> bool {
        matches!(self, OptionType::String | OptionType::Integer | OptionType::Number)
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptionType::String => "string",
            OptionType::Integer => "integer",
            OptionType::Number => "number",
            OptionType::Boolean => "boolean",
            OptionType::User => "user",
            OptionType::Channel => "channel",
            OptionType::Role => "role",
            OptionType::Mentionable => "mentionable",
            OptionType::Attachment => "attachment",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Value bounds
// ---------------------------------------------------------------------------

/// A `min_value`/`max_value` bound. Integer bounds stay integers so integer
/// options compare exactly across the whole `i64` range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BoundValue {
    Integer(i64),
    Number(f64),
}

impl BoundValue {
    /// Order `value` against this bound. `None` for non-numeric values.
    pub fn compare(self, value: &OptionValue) -> Option<Ordering> {
        match (value, self) {
            (&OptionValue::Integer(v), BoundValue::Integer(b)) => Some(v.cmp(&b)),
            (&OptionValue::Integer(v), BoundValue::Number(b)) => Some(compare_int_float(v, b)),
            (&OptionValue::Number(v), BoundValue::Integer(b)) => Some(compare_int_float(b, v).reverse()),
            (&OptionValue::Number(v), BoundValue::Number(b)) => v.partial_cmp(&b),
            _ => None,
        }
    }
}

/// Exact ordering of an integer against a finite float.
fn compare_int_float(int: i64, float: f64) -> Ordering {
    if float >= i64::MAX as f64 {
        return Ordering::Less;
    }
    if float < i64::MIN as f64 {
        return Ordering::Greater;
    }
    let floor = float.floor();
    match int.cmp(&(floor as i64)) {
        Ordering::Equal if float > floor => Ordering::Less,
        other => other,
    }
}

impl PartialOrd for BoundValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match *self {
            BoundValue::Integer(v) => other.compare(&OptionValue::Integer(v)),
            BoundValue::Number(v) => other.compare(&OptionValue::Number(v)),
        }
    }
}

impl fmt::Display for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundValue::Integer(v) => write!(f, "{v}"),
            BoundValue::Number(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for BoundValue {
    fn from(value: i32) -> Self {
        BoundValue::Integer(value.into())
    }
}

impl From<i64> for BoundValue {
    fn from(value: i64) -> Self {
        BoundValue::Integer(value)
    }
}

impl From<u32> for BoundValue {
    fn from(value: u32) -> Self {
        BoundValue::Integer(value.into())
    }
}

impl From<f64> for BoundValue {
    fn from(value: f64) -> Self {
        BoundValue::Number(value)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct OptionSchema {
    pub name: String,
    pub description: String,
    pub kind: OptionType,
    pub required: bool,
    pub min_value: Option<BoundValue>,
    pub max_value: Option<BoundValue>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub choices: Vec<Choice>,
    pub autocomplete: bool,
    pub channel_types: BTreeSet<ChannelType>,
    /// Bound when the option is omitted. Only optional scalar options may declare one.
    pub default: Option<OptionValue>,
}

impl OptionSchema {
    pub fn new(kind: OptionType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            choices: Vec::new(),
            autocomplete: false,
            channel_types: BTreeSet::new(),
            default: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::String, name, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Integer, name, description)
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Number, name, description)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Boolean, name, description)
    }

    pub fn user(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::User, name, description)
    }

    pub fn channel(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Channel, name, description)
    }

    pub fn role(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Role, name, description)
    }

    pub fn mentionable(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Mentionable, name, description)
    }

    pub fn attachment(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Attachment, name, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_value(mut self, min: impl Into<BoundValue>) -> Self {
        self.min_value = Some(min.into());
        self
    }

    pub fn max_value(mut self, max: impl Into<BoundValue>) -> Self {
        self.max_value = Some(max.into());
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn choice(mut self, name: impl Into<String>, value: impl Into<ChoiceValue>) -> Self {
        self.choices.push(Choice::new(name, value));
        self
    }

    pub fn autocomplete(mut self) -> Self {
        self.autocomplete = true;
        self
    }

    pub fn channel_types<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = ChannelType>,
    {
        self.channel_types.extend(types);
        self
    }

    pub fn default_value(mut self, value: impl Into<OptionValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Registration-time validation. `path` is the owning node's qualified name.
    pub fn validate(&self, path: &str) -> Result<(), CommandError> {
        let path = format!("{path}.{}", self.name);
        validate_name(&path, &self.name)?;
        validate_description(&path, &self.description)?;

        let has_value_bounds = self.min_value.is_some() || self.max_value.is_some();
        let has_length_bounds = self.min_length.is_some() || self.max_length.is_some();

        if has_value_bounds && !self.kind.is_numeric() {
            return Err(CommandError::invalid_shape(
                &path,
                format!("min/max value is only valid on integer or number options, not {}", self.kind),
            ));
        }
        let float_bound = [self.min_value, self.max_value]
            .iter()
            .any(|b| matches!(b, Some(BoundValue::Number(_))));
        if self.kind == OptionType::Integer && float_bound {
            return Err(CommandError::invalid_shape(&path, "integer options take integer min/max values"));
        }
        if [self.min_value, self.max_value]
            .iter()
            .any(|b| matches!(b, Some(BoundValue::Number(n)) if !n.is_finite()))
        {
            return Err(CommandError::invalid_shape(&path, "min/max value must be finite"));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(CommandError::invalid_shape(&path, format!("min_value {min} exceeds max_value {max}")));
            }
        }
        if has_length_bounds && self.kind != OptionType::String {
            return Err(CommandError::invalid_shape(
                &path,
                format!("min/max length is only valid on string options, not {}", self.kind),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(CommandError::invalid_shape(&path, format!("min_length {min} exceeds max_length {max}")));
            }
        }

        if !self.choices.is_empty() {
            if self.autocomplete {
                return Err(CommandError::invalid_shape(&path, "choices and autocomplete are mutually exclusive"));
            }
            if !self.kind.is_choosable() {
                return Err(CommandError::invalid_shape(&path, format!("{} options cannot declare choices", self.kind)));
            }
            if self.choices.len() > MAX_ENTRIES {
                return Err(CommandError::invalid_shape(
                    &path,
                    format!("{} choices declared, at most {MAX_ENTRIES} allowed", self.choices.len()),
                ));
            }
            for choice in &self.choices {
                let len = choice.name.chars().count();
                if !(1..=MAX_CHOICE_NAME_LEN).contains(&len) {
                    return Err(CommandError::invalid_shape(
                        &path,
                        format!("choice label must be 1-{MAX_CHOICE_NAME_LEN} characters"),
                    ));
                }
                if !self.choice_matches_type(&choice.value) {
                    return Err(CommandError::invalid_shape(
                        &path,
                        format!("choice '{}' has a value that is not a {}", choice.name, self.kind),
                    ));
                }
            }
        }

        if self.autocomplete && !self.kind.is_choosable() {
            return Err(CommandError::invalid_shape(&path, format!("{} options cannot use autocomplete", self.kind)));
        }
        if !self.channel_types.is_empty() && self.kind != OptionType::Channel {
            return Err(CommandError::invalid_shape(&path, "channel_types is only valid on channel options"));
        }

        if let Some(default) = &self.default {
            if self.required {
                return Err(CommandError::invalid_shape(&path, "required options cannot declare a default"));
            }
            let matches = match (self.kind, default) {
                (OptionType::String, OptionValue::String(_))
                | (OptionType::Integer, OptionValue::Integer(_))
                | (OptionType::Number, OptionValue::Number(_) | OptionValue::Integer(_))
                | (OptionType::Boolean, OptionValue::Boolean(_)) => true,
                _ => false,
            };
            if !matches {
                return Err(CommandError::invalid_shape(
                    &path,
                    format!("default {} does not match option type {}", default.type_name(), self.kind),
                ));
            }
        }

        Ok(())
    }

    fn choice_matches_type(&self, value: &ChoiceValue) -> bool {
        matches!(
            (self.kind, value),
            (OptionType::String, ChoiceValue::String(_))
                | (OptionType::Integer, ChoiceValue::Integer(_))
                | (OptionType::Number, ChoiceValue::Number(_) | ChoiceValue::Integer(_))
        )
    }

    pub fn manifest(&self) -> ManifestOption {
        ManifestOption {
            kind: self.kind.code(),
            name: self.name.clone(),
            description: self.description.clone(),
            required: self.required,
            choices: self.choices.clone(),
            autocomplete: self.autocomplete,
            min_value: self.min_value,
            max_value: self.max_value,
            min_length: self.min_length,
            max_length: self.max_length,
            channel_types: self.channel_types.iter().map(|t| t.code()).collect(),
            options: Vec::new(),
        }
    }
}

/// Serializable option description. Subcommands and subcommand groups use
/// the same shape with type codes 1 and 2 and nested `options`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestOption {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub autocomplete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<BoundValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<BoundValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ManifestOption>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_platform_charset() {
        assert!(validate_name("x", "tag-edit_2").is_ok());
        assert!(validate_name("x", "Tag").is_err());
        assert!(validate_name("x", "two words").is_err());
        assert!(validate_name("x", "").is_err());
        assert!(validate_name("x", &"a".repeat(33)).is_err());
        assert!(validate_name("x", &"a".repeat(32)).is_ok());
    }

    #[test]
    fn choices_and_autocomplete_are_exclusive() {
        let opt = OptionSchema::string("colour", "Pick one").choice("Red", "red").autocomplete();
        let err = opt.validate("paint").unwrap_err();
        assert!(matches!(err, CommandError::InvalidShape { ref path, .. } if path == "paint.colour"));
    }

    #[test]
    fn bounds_require_compatible_types() {
        assert!(OptionSchema::string("s", "text").min_value(1).validate("c").is_err());
        assert!(OptionSchema::integer("n", "count").min_length(1).validate("c").is_err());
        assert!(OptionSchema::integer("n", "count").min_value(5).max_value(1).validate("c").is_err());
        assert!(OptionSchema::integer("n", "count").min_value(1).max_value(5).validate("c").is_ok());
    }

    #[test]
    fn integer_options_take_integer_bounds() {
        assert!(OptionSchema::integer("n", "count").min_value(0.5).validate("c").is_err());
        assert!(OptionSchema::number("x", "ratio").min_value(0).max_value(1.5).validate("c").is_ok());
        assert!(OptionSchema::number("x", "ratio").min_value(2).max_value(1.5).validate("c").is_err());
        assert!(OptionSchema::number("x", "ratio").max_value(f64::INFINITY).validate("c").is_err());
        let big = 1i64 << 53;
        assert!(OptionSchema::integer("n", "count").min_value(big + 1).max_value(big).validate("c").is_err());
    }

    #[test]
    fn bounds_compare_exactly() {
        let max = BoundValue::from(1i64 << 53);
        assert_eq!(max.compare(&OptionValue::Integer((1 << 53) + 1)), Some(Ordering::Greater));
        assert_eq!(max.compare(&OptionValue::Integer(1 << 53)), Some(Ordering::Equal));
        assert_eq!(BoundValue::Number(2.5).compare(&OptionValue::Integer(2)), Some(Ordering::Less));
        assert_eq!(BoundValue::Number(2.5).compare(&OptionValue::Integer(3)), Some(Ordering::Greater));
        assert_eq!(BoundValue::Integer(2).compare(&OptionValue::Number(1.5)), Some(Ordering::Less));
        assert_eq!(BoundValue::Integer(1).compare(&OptionValue::String("1".into())), None);
    }

    #[test]
    fn choice_values_must_match_type() {
        let bad = OptionSchema::integer("integer_option", "Pick").choice("One", "one");
        assert!(bad.validate("c").is_err());
        let good = OptionSchema::integer("integer_option", "Pick").choice("One", 1i64).choice("Two", 2i64);
        assert!(good.validate("c").is_ok());
    }

    #[test]
    fn constraints_may_coexist_with_choices() {
        let opt = OptionSchema::integer("n", "count").choice("One", 1i64).min_value(0).max_value(10);
        assert!(opt.validate("c").is_ok());
    }

    #[test]
    fn too_many_choices_rejected() {
        let mut opt = OptionSchema::string("s", "text");
        for i in 0..26 {
            opt = opt.choice(format!("c{i}"), format!("v{i}"));
        }
        assert!(opt.validate("c").is_err());
    }

    #[test]
    fn channel_types_only_on_channels() {
        assert!(OptionSchema::string("s", "text").channel_types([ChannelType::Text]).validate("c").is_err());
        assert!(OptionSchema::channel("ch", "where").channel_types([ChannelType::Text]).validate("c").is_ok());
    }

    #[test]
    fn defaults_only_on_optional_matching_options() {
        assert!(OptionSchema::integer("n", "count").default_value(3i64).validate("c").is_ok());
        assert!(OptionSchema::integer("n", "count").required().default_value(3i64).validate("c").is_err());
        assert!(OptionSchema::integer("n", "count").default_value("three").validate("c").is_err());
    }

    #[test]
    fn manifest_uses_type_codes() {
        let manifest = OptionSchema::integer("n", "count").required().min_value(1).manifest();
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["type"], 4);
        assert_eq!(json["required"], true);
        assert_eq!(json["min_value"], 1);
        assert!(json.get("choices").is_none());
    }
}
