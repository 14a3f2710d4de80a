//! HandBrakeCLI option schema.
//!
//! The schema is a static rule table naming every legal group and option,
//! the option's encoding kind and its constraints. It ships in two equivalent
//! serializations (`handbrake.schema.json` and `handbrake.schema.toml`) that
//! are embedded at compile time and parsed once per process.

mod validate;

pub use validate::validate;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use serde::Deserialize;

use crate::config::OptionGroup;
use crate::error::{HandBrakeError, Result};

/// JSON serialization of the bundled schema.
pub const SCHEMA_JSON: &str = include_str!("handbrake.schema.json");

/// TOML serialization of the bundled schema.
pub const SCHEMA_TOML: &str = include_str!("handbrake.schema.toml");

/// Bundled schema, parsed on first use.
///
/// A broken artifact is a packaging defect; the error message is kept so
/// every caller sees it.
static BUNDLED: LazyLock<std::result::Result<Schema, String>> =
    LazyLock::new(|| match Schema::from_json_str(SCHEMA_JSON) {
        Ok(schema) => {
            log::debug!(
                "Loaded option schema v{} for HandBrake {}",
                schema.schema_version,
                schema.handbrake_version
            );
            Ok(schema)
        }
        Err(e) => {
            log::error!("Bundled option schema is unusable: {}", e);
            Err(e.to_string())
        }
    });

/// How a configuration value becomes command-line tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    /// `--key value`
    Scalar,
    /// `--key`, presence only
    Flag,
    /// `--key` / `--no-key`
    Negatable,
    /// `--key v1,v2`
    List,
    /// `--key a=1:b=2`
    Cluster,
    /// `--key` | `--no-key` | `--key preset` | `--key a=1:b=2`
    Hybrid,
    /// `--key N:M`
    Ratio,
    /// `--key top:bottom:left:right`
    Rect,
    /// `--key unit:value`
    Position,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionKind::Scalar => "scalar",
            OptionKind::Flag => "flag",
            OptionKind::Negatable => "negatable",
            OptionKind::List => "list",
            OptionKind::Cluster => "cluster",
            OptionKind::Hybrid => "hybrid",
            OptionKind::Ratio => "ratio",
            OptionKind::Rect => "rect",
            OptionKind::Position => "position",
        };
        f.write_str(name)
    }
}

/// Type of a scalar value, list item or cluster attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    /// String or integer, e.g. a track number or `scan`
    Token,
}

impl ValueType {
    /// Type name with its indefinite article, for messages.
    pub fn with_article(self) -> &'static str {
        match self {
            ValueType::String => "a string",
            ValueType::Integer => "an integer",
            ValueType::Number => "a number",
            ValueType::Boolean => "a boolean",
            ValueType::Token => "a string or integer",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Token => "string or integer",
        };
        f.write_str(name)
    }
}

/// Declaration of a single option.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionSpec {
    pub kind: OptionKind,

    /// Scalar or list item type; strings when absent
    #[serde(rename = "type", default)]
    pub value_type: Option<ValueType>,

    /// Closed set of legal scalar or list item values
    #[serde(default)]
    pub values: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    pub minimum: Option<f64>,

    #[serde(default)]
    pub maximum: Option<f64>,

    /// Closed set of cluster attributes; any attribute is accepted when absent
    #[serde(default)]
    pub attributes: Option<BTreeMap<String, ValueType>>,

    /// Legal preset names of a hybrid option; any name when absent
    #[serde(default)]
    pub presets: Option<Vec<String>>,

    /// Whether a hybrid option accepts `false`
    #[serde(default)]
    pub negatable: bool,

    /// Legal units of a position option
    #[serde(default)]
    pub units: Option<Vec<String>>,

    /// Side separator of a rect option
    #[serde(default)]
    pub separator: Option<String>,
}

impl OptionSpec {
    /// Declares an option of `kind` with no further constraints.
    pub fn new(kind: OptionKind) -> Self {
        Self {
            kind,
            value_type: None,
            values: None,
            minimum: None,
            maximum: None,
            attributes: None,
            presets: None,
            negatable: false,
            units: None,
            separator: None,
        }
    }

    /// Scalar or list item type.
    pub fn item_type(&self) -> ValueType {
        self.value_type.unwrap_or_default()
    }

    /// Separator placed between rect sides.
    pub fn rect_separator(&self) -> &str {
        self.separator.as_deref().unwrap_or(":")
    }

    /// Checks the declaration for internal consistency.
    fn check(&self, group: OptionGroup, key: &str) -> Result<()> {
        let at = format!("{}.{}", group, key);
        let fail = |reason: String| Err(HandBrakeError::definition(format!("{}: {}", at, reason)));

        if key.is_empty() || key.contains('-') {
            return fail("option keys use underscores, never dashes".to_string());
        }

        let typed = matches!(self.kind, OptionKind::Scalar | OptionKind::List);

        if self.value_type.is_some() && !typed {
            return fail(format!("'type' is not allowed on a {} option", self.kind));
        }

        if let Some(values) = &self.values {
            if !typed {
                return fail(format!("'values' is not allowed on a {} option", self.kind));
            }
            if values.is_empty() {
                return fail("'values' must not be empty".to_string());
            }
            for value in values {
                if validate::read_scalar(self.item_type(), value).is_none() {
                    return fail(format!(
                        "enumerated value {} is not {}",
                        value,
                        self.item_type().with_article()
                    ));
                }
            }
        }

        if self.minimum.is_some() || self.maximum.is_some() {
            if !typed || !matches!(self.item_type(), ValueType::Integer | ValueType::Number) {
                return fail("bounds are only allowed on integer or number values".to_string());
            }
            if let (Some(min), Some(max)) = (self.minimum, self.maximum) {
                if min > max {
                    return fail(format!("minimum {} exceeds maximum {}", min, max));
                }
            }
        }

        if let Some(attributes) = &self.attributes {
            if !matches!(self.kind, OptionKind::Cluster | OptionKind::Hybrid) {
                return fail(format!("'attributes' is not allowed on a {} option", self.kind));
            }
            if attributes.keys().any(|name| name.is_empty() || name.contains('-')) {
                return fail("attribute names use underscores, never dashes".to_string());
            }
        }

        if self.presets.is_some() && self.kind != OptionKind::Hybrid {
            return fail(format!("'presets' is not allowed on a {} option", self.kind));
        }

        if self.negatable && self.kind != OptionKind::Hybrid {
            return fail(format!("'negatable' is not allowed on a {} option", self.kind));
        }

        match (&self.units, self.kind) {
            (None, OptionKind::Position) => {
                return fail("position options need 'units'".to_string());
            }
            (Some(units), OptionKind::Position) if units.is_empty() => {
                return fail("'units' must not be empty".to_string());
            }
            (Some(_), kind) if kind != OptionKind::Position => {
                return fail(format!("'units' is not allowed on a {} option", kind));
            }
            _ => {}
        }

        match (&self.separator, self.kind) {
            (Some(separator), OptionKind::Rect) if separator.is_empty() => {
                fail("'separator' must not be empty".to_string())
            }
            (Some(_), kind) if kind != OptionKind::Rect => {
                fail(format!("'separator' is not allowed on a {} option", kind))
            }
            _ => Ok(()),
        }
    }
}

/// The complete rule table.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schema {
    /// HandBrakeCLI release whose documented options this schema describes
    pub handbrake_version: String,

    /// Revision of the schema layout
    pub schema_version: u32,

    groups: BTreeMap<OptionGroup, BTreeMap<String, OptionSpec>>,
}

impl Schema {
    /// Returns the bundled schema, parsing it on first use.
    ///
    /// # Errors
    ///
    /// Returns `SchemaDefinition` if the embedded artifact is broken.
    pub fn bundled() -> Result<&'static Schema> {
        BUNDLED.as_ref().map_err(|reason| HandBrakeError::definition(reason.clone()))
    }

    /// Parses and checks a JSON schema artifact.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let schema: Schema = serde_json::from_str(text)
            .map_err(|e| HandBrakeError::definition(format!("malformed JSON schema: {}", e)))?;
        schema.check()?;
        Ok(schema)
    }

    /// Parses and checks a TOML schema artifact.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let schema: Schema = toml::from_str(text)
            .map_err(|e| HandBrakeError::definition(format!("malformed TOML schema: {}", e)))?;
        schema.check()?;
        Ok(schema)
    }

    /// Builds a schema from already-declared groups.
    pub fn from_groups(
        handbrake_version: impl Into<String>,
        groups: BTreeMap<OptionGroup, BTreeMap<String, OptionSpec>>,
    ) -> Result<Self> {
        let schema = Self {
            handbrake_version: handbrake_version.into(),
            schema_version: 1,
            groups,
        };
        schema.check()?;
        Ok(schema)
    }

    /// Declared options of one group.
    pub fn group(&self, group: OptionGroup) -> Option<&BTreeMap<String, OptionSpec>> {
        self.groups.get(&group)
    }

    /// Declaration of a single option.
    pub fn option(&self, group: OptionGroup, key: &str) -> Option<&OptionSpec> {
        self.groups.get(&group)?.get(key)
    }

    /// Checks every declaration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `SchemaDefinition` naming the first inconsistent option.
    pub fn check(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(HandBrakeError::definition("schema declares no groups"));
        }
        for (group, options) in &self.groups {
            for (key, spec) in options {
                spec.check(*group, key)?;
            }
        }
        Ok(())
    }
}
