//! Validated job configuration.
//!
//! A [`JobConfig`] only exists after the job description passed schema
//! validation. Every option value is already discriminated into the variant
//! matching its declared encoding kind, so the command builder never has to
//! guess at shapes.

mod loader;

pub use loader::Loader;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::OptionKind;

/// Option groups, mirroring the sections of the HandBrakeCLI manual.
///
/// Declaration order is the canonical emission order of the command builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionGroup {
    #[serde(rename = "source_options")]
    Source,
    #[serde(rename = "destination_options")]
    Destination,
    #[serde(rename = "video_options")]
    Video,
    #[serde(rename = "audio_options")]
    Audio,
    #[serde(rename = "picture_options")]
    Picture,
    #[serde(rename = "filters_options")]
    Filters,
    #[serde(rename = "subtitles_options")]
    Subtitles,
}

impl OptionGroup {
    /// All groups in canonical order.
    pub const ALL: [OptionGroup; 7] = [
        OptionGroup::Source,
        OptionGroup::Destination,
        OptionGroup::Video,
        OptionGroup::Audio,
        OptionGroup::Picture,
        OptionGroup::Filters,
        OptionGroup::Subtitles,
    ];

    /// Key used for this group in job descriptions and the schema.
    pub fn key(self) -> &'static str {
        match self {
            OptionGroup::Source => "source_options",
            OptionGroup::Destination => "destination_options",
            OptionGroup::Video => "video_options",
            OptionGroup::Audio => "audio_options",
            OptionGroup::Picture => "picture_options",
            OptionGroup::Filters => "filters_options",
            OptionGroup::Subtitles => "subtitles_options",
        }
    }

    /// Looks up a group by its job description key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| group.key() == key)
    }
}

impl fmt::Display for OptionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single command-line value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(text) => f.write_str(text),
            Scalar::Number(number) => write!(f, "{}", number),
            // HandBrakeCLI takes 1/0 wherever a list or cluster holds a switch
            Scalar::Bool(true) => f.write_str("1"),
            Scalar::Bool(false) => f.write_str("0"),
        }
    }
}

/// Ordered `attr=value` pairs of a keyed cluster.
pub type Cluster = Vec<(String, Scalar)>;

/// The three legal shapes of a hybrid flag, plus its negated form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HybridValue {
    /// `true`: bare flag
    Enabled,
    /// `false` on a negatable option: `--no-` form
    Disabled,
    /// Named preset
    Preset(String),
    /// Custom settings cluster
    Custom(Cluster),
}

/// Crop-style rectangle. Sides absent from the job description are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Rect {
    /// Side names in emission order.
    pub const SIDES: [&'static str; 4] = ["top", "bottom", "left", "right"];

    /// Side values in emission order.
    pub fn sides(&self) -> [u32; 4] {
        [self.top, self.bottom, self.left, self.right]
    }

    pub(crate) fn set(&mut self, side: &str, value: u32) -> bool {
        match side {
            "top" => self.top = value,
            "bottom" => self.bottom = value,
            "left" => self.left = value,
            "right" => self.right = value,
            _ => return false,
        }
        true
    }
}

/// A validated option value, one variant per encoding kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Scalar(Scalar),
    /// Presence-only flag; `false` means the flag is left out
    Flag(bool),
    Negatable(bool),
    List(Vec<Scalar>),
    Cluster(Cluster),
    Hybrid(HybridValue),
    /// `N:M`, passed through verbatim
    Ratio(String),
    Rect(Rect),
    /// `unit:value`, e.g. `duration:30`
    Position { unit: String, value: Scalar },
}

impl OptionValue {
    /// Encoding kind this value was validated as.
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Scalar(_) => OptionKind::Scalar,
            OptionValue::Flag(_) => OptionKind::Flag,
            OptionValue::Negatable(_) => OptionKind::Negatable,
            OptionValue::List(_) => OptionKind::List,
            OptionValue::Cluster(_) => OptionKind::Cluster,
            OptionValue::Hybrid(_) => OptionKind::Hybrid,
            OptionValue::Ratio(_) => OptionKind::Ratio,
            OptionValue::Rect(_) => OptionKind::Rect,
            OptionValue::Position { .. } => OptionKind::Position,
        }
    }
}

/// One option inside a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionEntry {
    /// Option key in underscore form, as written in the job description
    pub key: String,
    pub value: OptionValue,
}

/// A validated transcode job.
///
/// Created by the validator, immutable afterwards. Groups iterate in
/// canonical order; entries keep the order of the job description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobConfig {
    source: String,
    output_file: String,
    groups: BTreeMap<OptionGroup, Vec<OptionEntry>>,
}

impl JobConfig {
    pub(crate) fn new(
        source: String,
        output_file: String,
        groups: BTreeMap<OptionGroup, Vec<OptionEntry>>,
    ) -> Self {
        Self {
            source,
            output_file,
            groups,
        }
    }

    /// Input path handed to `--input`.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Output path handed to `--output`.
    pub fn output_file(&self) -> &str {
        &self.output_file
    }

    /// Entries of one group, if the job description had it.
    pub fn group(&self, group: OptionGroup) -> Option<&[OptionEntry]> {
        self.groups.get(&group).map(Vec::as_slice)
    }

    /// Present groups in canonical order.
    pub fn groups(&self) -> impl Iterator<Item = (OptionGroup, &[OptionEntry])> {
        self.groups
            .iter()
            .map(|(group, entries)| (*group, entries.as_slice()))
    }

    /// Finds a single option by group and key.
    pub fn option(&self, group: OptionGroup, key: &str) -> Option<&OptionValue> {
        self.group(group)?
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }
}
