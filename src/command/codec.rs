//! Option codec: one validated option value in, HandBrakeCLI tokens out.
//!
//! Pure functions, no state. The shape of the output depends only on the
//! option's declared kind and its value.

use crate::config::{Cluster, HybridValue, OptionValue, Scalar};
use crate::error::EncodingError;
use crate::schema::OptionSpec;

/// Keys whose HandBrakeCLI spelling is camel-cased rather than dashed.
///
/// Checked before the generic underscore-to-dash rule.
const CAMEL_CASE_FLAGS: [(&str, &str); 2] =
    [("max_height", "--maxHeight"), ("max_width", "--maxWidth")];

/// Converts an option key to its long command-line flag.
///
/// `encoder_preset` becomes `--encoder-preset`; the two camel-cased
/// exceptions map to their fixed spelling.
pub fn cli_flag(key: &str) -> String {
    if let Some((_, flag)) = CAMEL_CASE_FLAGS.iter().find(|(name, _)| *name == key) {
        return (*flag).to_string();
    }
    format!("--{}", dashed(key))
}

/// Converts an option key to its negated long flag, e.g. `--no-two-pass`.
pub fn negated_flag(key: &str) -> String {
    format!("--no-{}", dashed(key))
}

fn dashed(name: &str) -> String {
    name.replace('_', "-")
}

/// Encodes one option into command-line tokens.
///
/// # Arguments
///
/// * `key` - Option key in underscore form
/// * `spec` - The option's schema declaration
/// * `value` - The validated value
///
/// # Returns
///
/// Zero tokens for a disabled presence-only flag, one for a bare flag and
/// two (flag plus argument) otherwise.
///
/// # Errors
///
/// Returns `EncodingError::KindMismatch` when `value` was not validated as
/// the declared kind. Values are never coerced.
pub fn encode(
    key: &str,
    spec: &OptionSpec,
    value: &OptionValue,
) -> Result<Vec<String>, EncodingError> {
    if value.kind() != spec.kind {
        return Err(EncodingError::KindMismatch {
            key: key.to_string(),
            expected: spec.kind,
            found: value.kind(),
        });
    }

    let flag = cli_flag(key);
    let tokens = match value {
        OptionValue::Scalar(scalar) => vec![flag, scalar.to_string()],
        OptionValue::Flag(true) | OptionValue::Negatable(true) => vec![flag],
        OptionValue::Flag(false) => Vec::new(),
        OptionValue::Negatable(false) => vec![negated_flag(key)],
        OptionValue::List(items) => vec![flag, list_format(items)],
        OptionValue::Cluster(pairs) => vec![flag, cluster_format(pairs)],
        OptionValue::Hybrid(HybridValue::Enabled) => vec![flag],
        OptionValue::Hybrid(HybridValue::Disabled) => vec![negated_flag(key)],
        OptionValue::Hybrid(HybridValue::Preset(preset)) => vec![flag, preset.clone()],
        OptionValue::Hybrid(HybridValue::Custom(pairs)) => vec![flag, cluster_format(pairs)],
        OptionValue::Ratio(ratio) => vec![flag, ratio.clone()],
        OptionValue::Rect(rect) => {
            let sides = rect.sides().map(|side| side.to_string());
            vec![flag, sides.join(spec.rect_separator())]
        }
        OptionValue::Position { unit, value } => vec![flag, format!("{}:{}", unit, value)],
    };
    Ok(tokens)
}

/// Comma-joined list, order preserved.
pub fn list_format(items: &[Scalar]) -> String {
    items
        .iter()
        .map(Scalar::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Colon-joined `attr=value` pairs in the order they were given.
pub fn cluster_format(pairs: &Cluster) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", dashed(name), value))
        .collect::<Vec<_>>()
        .join(":")
}
