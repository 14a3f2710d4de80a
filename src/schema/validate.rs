//! Job description validation.
//!
//! Checks a raw job description against the schema and, in the same pass,
//! discriminates every value into the [`OptionValue`] variant of its declared
//! kind. Nothing reaches the command builder without going through here.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{OptionKind, OptionSpec, Schema, ValueType};
use crate::config::{
    Cluster, HybridValue, JobConfig, OptionEntry, OptionGroup, OptionValue, Rect, Scalar,
};
use crate::error::{HandBrakeError, Result};

const SOURCE_KEY: &str = "source";
const OUTPUT_KEY: &str = "output_file";

/// Validates a job description and returns the typed configuration.
///
/// # Arguments
///
/// * `raw` - Job description as parsed JSON/TOML data
/// * `schema` - Rule table to validate against
///
/// # Errors
///
/// Returns `SchemaValidation` naming the first offending location.
pub fn validate(raw: &Value, schema: &Schema) -> Result<JobConfig> {
    let document = raw.as_object().ok_or_else(|| {
        HandBrakeError::invalid("$", format!("expected an object, found {}", describe(raw)))
    })?;

    let source = required_string(document, SOURCE_KEY)?;
    let output_file = required_string(document, OUTPUT_KEY)?;

    let mut groups = BTreeMap::new();
    for (key, value) in document {
        if key == SOURCE_KEY || key == OUTPUT_KEY {
            continue;
        }

        let group = OptionGroup::from_key(key).ok_or_else(|| {
            HandBrakeError::invalid(key.as_str(), "unrecognized top-level key")
        })?;

        let options = value.as_object().ok_or_else(|| {
            HandBrakeError::invalid(
                key.as_str(),
                format!("expected an object, found {}", describe(value)),
            )
        })?;

        let mut entries = Vec::with_capacity(options.len());
        for (option, value) in options {
            let path = format!("{}.{}", key, option);
            let spec = schema
                .option(group, option)
                .ok_or_else(|| HandBrakeError::invalid(path.as_str(), "unknown option"))?;
            entries.push(OptionEntry {
                key: option.clone(),
                value: validate_value(&path, spec, value)?,
            });
        }
        groups.insert(group, entries);
    }

    Ok(JobConfig::new(source, output_file, groups))
}

fn required_string(document: &Map<String, Value>, key: &str) -> Result<String> {
    match document.get(key) {
        Some(Value::String(text)) if !text.is_empty() => Ok(text.clone()),
        Some(Value::String(_)) => Err(HandBrakeError::invalid(key, "must not be empty")),
        Some(other) => Err(HandBrakeError::invalid(
            key,
            format!("expected a string, found {}", describe(other)),
        )),
        None => Err(HandBrakeError::invalid(key, "required key is missing")),
    }
}

/// Discriminates one value into the variant of `spec.kind`.
fn validate_value(path: &str, spec: &OptionSpec, value: &Value) -> Result<OptionValue> {
    match spec.kind {
        OptionKind::Scalar => Ok(OptionValue::Scalar(typed_scalar(path, spec, value)?)),

        OptionKind::Flag => match value {
            Value::Bool(enabled) => Ok(OptionValue::Flag(*enabled)),
            other => Err(mismatch(path, "a boolean", other)),
        },

        OptionKind::Negatable => match value {
            Value::Bool(enabled) => Ok(OptionValue::Negatable(*enabled)),
            other => Err(mismatch(path, "a boolean", other)),
        },

        OptionKind::List => {
            let items = value
                .as_array()
                .ok_or_else(|| mismatch(path, "an array", value))?;
            if items.is_empty() {
                return Err(HandBrakeError::invalid(path, "list must not be empty"));
            }
            items
                .iter()
                .enumerate()
                .map(|(index, item)| typed_scalar(&format!("{}[{}]", path, index), spec, item))
                .collect::<Result<Vec<_>>>()
                .map(OptionValue::List)
        }

        OptionKind::Cluster => {
            let attributes = value
                .as_object()
                .ok_or_else(|| mismatch(path, "an object", value))?;
            Ok(OptionValue::Cluster(cluster(path, spec, attributes)?))
        }

        OptionKind::Hybrid => hybrid(path, spec, value).map(OptionValue::Hybrid),

        OptionKind::Ratio => {
            let text = value.as_str().ok_or_else(|| mismatch(path, "an \"N:M\" string", value))?;
            if !is_ratio(text) {
                return Err(HandBrakeError::invalid(
                    path,
                    format!("'{}' is not a ratio of two positive integers (N:M)", text),
                ));
            }
            Ok(OptionValue::Ratio(text.to_string()))
        }

        OptionKind::Rect => {
            let sides = value
                .as_object()
                .ok_or_else(|| mismatch(path, "an object", value))?;
            let mut rect = Rect::default();
            for (side, amount) in sides {
                let side_path = format!("{}.{}", path, side);
                let amount = amount
                    .as_u64()
                    .and_then(|amount| u32::try_from(amount).ok())
                    .ok_or_else(|| mismatch(&side_path, "a non-negative integer", amount))?;
                if !rect.set(side, amount) {
                    return Err(HandBrakeError::invalid(
                        side_path,
                        format!("unknown side, expected one of {}", Rect::SIDES.join(", ")),
                    ));
                }
            }
            Ok(OptionValue::Rect(rect))
        }

        OptionKind::Position => {
            let pairs = value
                .as_object()
                .ok_or_else(|| mismatch(path, "an object with a single unit", value))?;
            let mut pairs = pairs.iter();
            let (unit, amount) = match (pairs.next(), pairs.next()) {
                (Some(pair), None) => pair,
                _ => {
                    return Err(HandBrakeError::invalid(
                        path,
                        "expected exactly one unit:value pair",
                    ));
                }
            };
            let units = spec.units.as_deref().unwrap_or_default();
            if !units.iter().any(|legal| legal == unit) {
                return Err(HandBrakeError::invalid(
                    format!("{}.{}", path, unit),
                    format!("unknown unit, expected one of {}", units.join(", ")),
                ));
            }
            match amount {
                Value::Number(number) if number.as_f64().is_some_and(|n| n >= 0.0) => {
                    Ok(OptionValue::Position {
                        unit: unit.clone(),
                        value: Scalar::Number(number.clone()),
                    })
                }
                other => Err(mismatch(
                    &format!("{}.{}", path, unit),
                    "a non-negative number",
                    other,
                )),
            }
        }
    }
}

fn hybrid(path: &str, spec: &OptionSpec, value: &Value) -> Result<HybridValue> {
    match value {
        Value::Bool(true) => Ok(HybridValue::Enabled),
        Value::Bool(false) if spec.negatable => Ok(HybridValue::Disabled),
        Value::Bool(false) => Err(HandBrakeError::invalid(path, "option has no negated form")),
        Value::String(preset) => match &spec.presets {
            Some(presets) if !presets.iter().any(|legal| legal == preset) => {
                Err(HandBrakeError::invalid(
                    path,
                    format!("unknown preset '{}', expected one of {}", preset, presets.join(", ")),
                ))
            }
            _ => Ok(HybridValue::Preset(preset.clone())),
        },
        Value::Object(attributes) => cluster(path, spec, attributes).map(HybridValue::Custom),
        other => Err(mismatch(path, "true, false, a preset name or an object", other)),
    }
}

fn cluster(path: &str, spec: &OptionSpec, attributes: &Map<String, Value>) -> Result<Cluster> {
    if attributes.is_empty() {
        return Err(HandBrakeError::invalid(path, "custom settings must not be empty"));
    }

    let mut pairs = Vec::with_capacity(attributes.len());
    for (name, value) in attributes {
        let attr_path = format!("{}.{}", path, name);
        let scalar = match &spec.attributes {
            Some(declared) => {
                let value_type = declared.get(name).ok_or_else(|| {
                    HandBrakeError::invalid(attr_path.as_str(), "unknown attribute")
                })?;
                read_scalar(*value_type, value)
                    .ok_or_else(|| mismatch(&attr_path, value_type.with_article(), value))?
            }
            None => any_scalar(value).ok_or_else(|| mismatch(&attr_path, "a scalar", value))?,
        };
        pairs.push((name.clone(), scalar));
    }
    Ok(pairs)
}

/// Reads a scalar of `spec`'s item type and applies enumeration and bounds.
fn typed_scalar(path: &str, spec: &OptionSpec, value: &Value) -> Result<Scalar> {
    let value_type = spec.item_type();
    let scalar = read_scalar(value_type, value)
        .ok_or_else(|| mismatch(path, value_type.with_article(), value))?;

    if let Some(values) = &spec.values {
        if !values.iter().any(|legal| same_value(legal, value)) {
            let legal = values.iter().map(Value::to_string).collect::<Vec<_>>().join(", ");
            return Err(HandBrakeError::invalid(
                path,
                format!("{} is not one of {}", value, legal),
            ));
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = spec.minimum.filter(|min| number < *min) {
            return Err(HandBrakeError::invalid(
                path,
                format!("{} is below the minimum {}", value, min),
            ));
        }
        if let Some(max) = spec.maximum.filter(|max| number > *max) {
            return Err(HandBrakeError::invalid(
                path,
                format!("{} is above the maximum {}", value, max),
            ));
        }
    }

    Ok(scalar)
}

/// Reads `value` as a scalar of `value_type`, without coercion.
pub(crate) fn read_scalar(value_type: ValueType, value: &Value) -> Option<Scalar> {
    match (value_type, value) {
        (ValueType::String | ValueType::Token, Value::String(text)) => {
            Some(Scalar::Text(text.clone()))
        }
        (ValueType::Integer | ValueType::Token, Value::Number(number))
            if number.is_i64() || number.is_u64() =>
        {
            Some(Scalar::Number(number.clone()))
        }
        (ValueType::Number, Value::Number(number)) => Some(Scalar::Number(number.clone())),
        (ValueType::Boolean, Value::Bool(flag)) => Some(Scalar::Bool(*flag)),
        _ => None,
    }
}

fn any_scalar(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(text) => Some(Scalar::Text(text.clone())),
        Value::Number(number) => Some(Scalar::Number(number.clone())),
        Value::Bool(flag) => Some(Scalar::Bool(*flag)),
        _ => None,
    }
}

/// Enumeration match; numbers compare by value so `16` and `16.0` agree.
fn same_value(legal: &Value, value: &Value) -> bool {
    match (legal.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => legal == value,
    }
}

fn is_ratio(text: &str) -> bool {
    let positive = |part: &str| {
        !part.is_empty()
            && part.bytes().all(|b| b.is_ascii_digit())
            && part.bytes().any(|b| b != b'0')
    };
    matches!(text.split_once(':'), Some((n, m)) if positive(n) && positive(m))
}

fn mismatch(path: &str, expected: &str, found: &Value) -> HandBrakeError {
    HandBrakeError::invalid(path, format!("expected {}, found {}", expected, describe(found)))
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(raw: Value) -> Result<JobConfig> {
        validate(&raw, Schema::bundled().unwrap())
    }

    fn rejection(raw: Value) -> (String, String) {
        match check(raw) {
            Err(HandBrakeError::SchemaValidation { path, reason }) => (path, reason),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    fn job(group: &str, options: Value) -> Value {
        json!({ "source": "in.mkv", "output_file": "out.mkv", group: options })
    }

    #[test]
    fn accepts_the_sample_job() {
        let config = check(json!({
            "source": "cool_video.mkv",
            "output_file": "output.mkv",
            "video_options": { "encoder": "x265_10bit", "encoder_preset": "slow", "quality": 19 },
            "audio_options": {
                "audio": [1, 3],
                "aencoder": ["opus", "opus"],
                "ab": [128, 192],
                "mixdown": ["stereo", "5_2_lfe"]
            },
            "subtitles_options": {
                "subtitle": [1, 2],
                "subname": ["Signs and Songs", "Full Subtitles"]
            }
        }))
        .unwrap();

        assert_eq!(config.source(), "cool_video.mkv");
        assert_eq!(config.output_file(), "output.mkv");
        assert_eq!(
            config.option(OptionGroup::Video, "quality"),
            Some(&OptionValue::Scalar(Scalar::Number(19.into())))
        );
        let keys: Vec<_> = config
            .group(OptionGroup::Audio)
            .unwrap()
            .iter()
            .map(|entry| entry.key.as_str())
            .collect();
        assert_eq!(keys, ["audio", "aencoder", "ab", "mixdown"]);
    }

    #[test]
    fn source_and_output_are_required_strings() {
        assert_eq!(rejection(json!({ "output_file": "out.mkv" })).0, "source");
        assert_eq!(rejection(json!({ "source": "in.mkv" })).0, "output_file");
        assert_eq!(rejection(json!({ "source": 3, "output_file": "out.mkv" })).0, "source");
        assert_eq!(rejection(json!({ "source": "", "output_file": "out.mkv" })).0, "source");
        assert_eq!(rejection(json!(["in.mkv"])).0, "$");
    }

    #[test]
    fn rejects_unrecognized_top_level_keys() {
        let (path, reason) = rejection(json!({
            "source": "in.mkv",
            "output_file": "out.mkv",
            "video": { "quality": 20 }
        }));
        assert_eq!(path, "video");
        assert!(reason.contains("unrecognized"));
    }

    #[test]
    fn source_and_output_never_live_in_groups() {
        let (path, _) = rejection(job("video_options", json!({ "source": "in.mkv" })));
        assert_eq!(path, "video_options.source");
    }

    #[test]
    fn rejects_unknown_and_dashed_options() {
        assert_eq!(
            rejection(job("video_options", json!({ "encoder-preset": "slow" }))).0,
            "video_options.encoder-preset"
        );
        assert_eq!(
            rejection(job("audio_options", json!({ "quality": 20 }))).0,
            "audio_options.quality"
        );
    }

    #[test]
    fn rejects_shape_mismatches() {
        let cases = [
            ("video_options", json!({ "quality": [19] }), "video_options.quality"),
            ("audio_options", json!({ "audio": 1 }), "audio_options.audio"),
            ("audio_options", json!({ "audio": [1, "two"] }), "audio_options.audio[1]"),
            ("audio_options", json!({ "audio": [] }), "audio_options.audio"),
            ("video_options", json!({ "two_pass": "yes" }), "video_options.two_pass"),
            (
                "subtitles_options",
                json!({ "subtitle_burned": 1 }),
                "subtitles_options.subtitle_burned",
            ),
            ("video_options", json!({ "encopts": "ref=4" }), "video_options.encopts"),
            ("video_options", json!({ "encopts": { "ref": [4] } }), "video_options.encopts.ref"),
            ("picture_options", json!({ "pixel_aspect": "4/3" }), "picture_options.pixel_aspect"),
            ("picture_options", json!({ "pixel_aspect": "0:1" }), "picture_options.pixel_aspect"),
            ("picture_options", json!({ "crop": [0, 0, 0, 0] }), "picture_options.crop"),
            ("picture_options", json!({ "crop": { "top": -2 } }), "picture_options.crop.top"),
            ("picture_options", json!({ "crop": { "middle": 2 } }), "picture_options.crop.middle"),
            ("source_options", json!({ "start_at": 30 }), "source_options.start_at"),
            (
                "source_options",
                json!({ "start_at": { "seconds": 30 } }),
                "source_options.start_at.seconds",
            ),
            (
                "source_options",
                json!({ "start_at": { "duration": 1, "frame": 2 } }),
                "source_options.start_at",
            ),
            ("filters_options", json!({ "bwdif": 3 }), "filters_options.bwdif"),
        ];
        for (group, options, expected) in cases {
            let (path, reason) = rejection(job(group, options.clone()));
            assert_eq!(path, expected, "{} {} -> {}", group, options, reason);
        }
    }

    #[test]
    fn enforces_enumerations_and_bounds() {
        assert_eq!(
            rejection(job("video_options", json!({ "encoder": "x266" }))).0,
            "video_options.encoder"
        );
        assert_eq!(
            rejection(job("audio_options", json!({ "mixdown": ["stereo", "quad"] }))).0,
            "audio_options.mixdown[1]"
        );
        assert_eq!(
            rejection(job("video_options", json!({ "quality": 101 }))).0,
            "video_options.quality"
        );
        assert_eq!(
            rejection(job("picture_options", json!({ "modulus": 3 }))).0,
            "picture_options.modulus"
        );
        assert!(check(job("picture_options", json!({ "modulus": 16 }))).is_ok());
        assert!(check(job("video_options", json!({ "quality": 19.5 }))).is_ok());
    }

    #[test]
    fn discriminates_hybrid_shapes() {
        let config = check(job(
            "filters_options",
            json!({
                "bwdif": true,
                "decomb": "bob",
                "deinterlace": false,
                "hqdn3d": { "y_spatial": 3, "cb_spatial": 2 }
            }),
        ))
        .unwrap();
        let value = |key| config.option(OptionGroup::Filters, key).cloned();
        assert_eq!(value("bwdif"), Some(OptionValue::Hybrid(HybridValue::Enabled)));
        assert_eq!(
            value("decomb"),
            Some(OptionValue::Hybrid(HybridValue::Preset("bob".into())))
        );
        assert_eq!(value("deinterlace"), Some(OptionValue::Hybrid(HybridValue::Disabled)));
        assert!(matches!(
            value("hqdn3d"),
            Some(OptionValue::Hybrid(HybridValue::Custom(ref pairs))) if pairs.len() == 2
        ));
    }

    #[test]
    fn hybrid_constraints() {
        assert_eq!(
            rejection(job("filters_options", json!({ "bwdif": "sideways" }))).0,
            "filters_options.bwdif"
        );
        assert_eq!(
            rejection(job("filters_options", json!({ "bwdif": { "speed": 3 } }))).0,
            "filters_options.bwdif.speed"
        );
        assert_eq!(
            rejection(job("filters_options", json!({ "bwdif": { "mode": "3" } }))).0,
            "filters_options.bwdif.mode"
        );
        assert_eq!(
            rejection(job("filters_options", json!({ "colorspace": false }))).0,
            "filters_options.colorspace"
        );
        assert_eq!(
            rejection(job("filters_options", json!({ "bwdif": {} }))).0,
            "filters_options.bwdif"
        );
    }

    #[test]
    fn type_errors_name_the_expected_type() {
        let (_, reason) = rejection(job("source_options", json!({ "title": "one" })));
        assert_eq!(reason, "expected an integer, found a string");

        let (_, reason) = rejection(job("filters_options", json!({ "bwdif": { "mode": "3" } })));
        assert_eq!(reason, "expected an integer, found a string");

        let (_, reason) = rejection(job("video_options", json!({ "quality": "19" })));
        assert_eq!(reason, "expected a number, found a string");
    }

    #[test]
    fn crop_fills_missing_sides() {
        let crop = json!({ "crop": { "right": 4, "top": 8 } });
        let config = check(job("picture_options", crop)).unwrap();
        assert_eq!(
            config.option(OptionGroup::Picture, "crop"),
            Some(&OptionValue::Rect(Rect { top: 8, bottom: 0, left: 0, right: 4 }))
        );
    }

    #[test]
    fn open_clusters_take_any_scalar() {
        let config = check(job(
            "video_options",
            json!({ "encopts": { "ref": 4, "no_fast_pskip": true, "aq_mode": "2" } }),
        ))
        .unwrap();
        assert_eq!(
            config.option(OptionGroup::Video, "encopts"),
            Some(&OptionValue::Cluster(vec![
                ("ref".into(), Scalar::Number(4.into())),
                ("no_fast_pskip".into(), Scalar::Bool(true)),
                ("aq_mode".into(), Scalar::Text("2".into())),
            ]))
        );
    }

    #[test]
    fn token_lists_accept_numbers_and_names() {
        assert!(check(job("subtitles_options", json!({ "subtitle": [1, "scan"] }))).is_ok());
        assert_eq!(
            rejection(job("subtitles_options", json!({ "subtitle": [1.5] }))).0,
            "subtitles_options.subtitle[0]"
        );
    }

    #[test]
    fn positions_keep_unit_and_value() {
        let start_at = json!({ "start_at": { "duration": 30 } });
        let config = check(job("source_options", start_at)).unwrap();
        assert_eq!(
            config.option(OptionGroup::Source, "start_at"),
            Some(&OptionValue::Position {
                unit: "duration".into(),
                value: Scalar::Number(30.into())
            })
        );
    }

    #[test]
    fn undeclared_groups_reject_every_option() {
        let mut picture = BTreeMap::new();
        picture.insert("crop".to_string(), OptionSpec::new(OptionKind::Rect));
        let mut groups = BTreeMap::new();
        groups.insert(OptionGroup::Picture, picture);
        let schema = Schema::from_groups("test", groups).unwrap();

        let raw = job("video_options", json!({ "quality": 20 }));
        assert!(matches!(
            validate(&raw, &schema),
            Err(HandBrakeError::SchemaValidation { .. })
        ));
    }
}
