//! Turns parsed style lines into host-typed property overrides.
//!
//! A whole rule materializes in one batch through the host's
//! setter-parsing facility. The blur marker is the one value form
//! handled locally: it never reaches the host parser, a placeholder
//! setter resolves the property name instead.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use glaze_dsl::style::StyleLine;
use glaze_tree::host::{ParseFacilityError, ResolvedSetter, SetterLine, StyleParser};
use glaze_tree::value::{Color, Value};
use glaze_tree::PropertyId;

use crate::brush::BlurBrushSpec;

/// Type retried when a rule's target type cannot be resolved from text
/// but the element demonstrably exists in the tree.
pub const FALLBACK_BASE_TYPE: &str = "Windows.UI.Xaml.FrameworkElement";

const BLUR_MARKER_OPEN: &str = "<GlazeBlur";
const BLUR_MARKER_CLOSE: &str = "/>";

/// One materialized override value.
///
/// `Plain(Value::Unset)` is the explicit-clear sentinel. `Blur` stays in
/// parameter form; a live brush is built per application.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideValue {
    Plain(Value),
    Blur(BlurBrushSpec),
}

/// Values a rule contributes, keyed by property then by visual state
/// (empty string is the stateless default).
pub type PropertyOverrides = HashMap<PropertyId, HashMap<String, OverrideValue>>;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("bad blur marker: {0}")]
    BadBlurMarker(String),
    #[error(transparent)]
    Parse(#[from] ParseFacilityError),
}

/// Materializes a rule's style lines against `target_type`, retrying
/// against `fallback_type` when the target type is unresolvable.
pub fn resolve_property_overrides(
    parser: &dyn StyleParser,
    target_type: &str,
    fallback_type: &str,
    styles: &[StyleLine],
) -> Result<PropertyOverrides, MaterializeError> {
    let mut blur_specs = Vec::with_capacity(styles.len());
    let mut setters = Vec::with_capacity(styles.len());
    for style in styles {
        let blur = parse_blur_marker(style)?;
        let placeholder = blur.is_some() || style.is_explicit_clear();
        setters.push(SetterLine {
            property: style.property.clone(),
            raw_value: if placeholder { None } else { Some(style.raw_value.clone()) },
            markup: style.is_markup && !placeholder,
        });
        blur_specs.push(blur);
    }

    let resolved = parse_with_fallback(parser, target_type, fallback_type, &setters)?;

    let mut overrides = PropertyOverrides::new();
    for ((setter, style), blur) in resolved.iter().zip(styles).zip(blur_specs) {
        let value = match blur {
            Some(spec) => OverrideValue::Blur(spec),
            None if style.is_explicit_clear() => OverrideValue::Plain(Value::Unset),
            None => OverrideValue::Plain(setter.value.clone()),
        };
        overrides
            .entry(setter.property)
            .or_default()
            .insert(style.state.clone(), value);
    }
    Ok(overrides)
}

/// Resolves raw property filters to typed expected values.
pub fn resolve_property_filters(
    parser: &dyn StyleParser,
    target_type: &str,
    fallback_type: &str,
    filters: &[glaze_dsl::matcher::PropertyFilter],
) -> Result<Vec<(PropertyId, Value)>, MaterializeError> {
    let setters: Vec<SetterLine> = filters
        .iter()
        .map(|f| SetterLine {
            property: f.property.clone(),
            raw_value: Some(f.raw_value.clone()),
            markup: false,
        })
        .collect();
    let resolved = parse_with_fallback(parser, target_type, fallback_type, &setters)?;
    Ok(resolved
        .into_iter()
        .map(|ResolvedSetter { property, value }| (property, value))
        .collect())
}

fn parse_with_fallback(
    parser: &dyn StyleParser,
    target_type: &str,
    fallback_type: &str,
    setters: &[SetterLine],
) -> Result<Vec<ResolvedSetter>, MaterializeError> {
    match parser.parse_setters(target_type, setters) {
        Ok(resolved) => Ok(resolved),
        Err(ParseFacilityError::UnresolvedType(_))
            if !fallback_type.is_empty() && fallback_type != target_type =>
        {
            warn!(
                target_type,
                fallback_type, "type unresolvable from text, retrying against fallback"
            );
            Ok(parser.parse_setters(fallback_type, setters)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Parses a `<GlazeBlur .../>` markup value. Returns `None` for any
/// other markup so it flows to the host parser untouched.
pub fn parse_blur_marker(style: &StyleLine) -> Result<Option<BlurBrushSpec>, MaterializeError> {
    if !style.is_markup {
        return Ok(None);
    }
    let raw = style.raw_value.trim();
    let Some(inner) = raw
        .strip_prefix(BLUR_MARKER_OPEN)
        .and_then(|r| r.strip_suffix(BLUR_MARKER_CLOSE))
    else {
        return Ok(None);
    };

    let mut spec = BlurBrushSpec::default();
    for (name, value) in parse_attributes(inner)? {
        match name {
            "BlurAmount" => {
                spec.blur_radius = value
                    .parse::<f32>()
                    .map_err(|_| MaterializeError::BadBlurMarker(format!("BlurAmount={value}")))?;
            }
            "TintColor" => {
                if let Some(key) = value
                    .strip_prefix("{ThemeResource ")
                    .and_then(|v| v.strip_suffix('}'))
                {
                    spec.tint_theme_resource = Some(key.trim().to_string());
                } else {
                    spec.tint_color = Some(Color::parse(value).ok_or_else(|| {
                        MaterializeError::BadBlurMarker(format!("TintColor={value}"))
                    })?);
                }
            }
            "TintOpacity" => {
                spec.tint_opacity = Some(value.parse::<f32>().map_err(|_| {
                    MaterializeError::BadBlurMarker(format!("TintOpacity={value}"))
                })?);
            }
            other => {
                return Err(MaterializeError::BadBlurMarker(format!(
                    "unknown attribute {other}"
                )));
            }
        }
    }
    Ok(Some(spec))
}

/// Scans `name="value"` attribute pairs.
fn parse_attributes(input: &str) -> Result<Vec<(&str, &str)>, MaterializeError> {
    let mut out = Vec::new();
    let mut rest = input.trim();
    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| MaterializeError::BadBlurMarker(rest.to_string()))?;
        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let Some(quoted) = after.strip_prefix('"') else {
            return Err(MaterializeError::BadBlurMarker(rest.to_string()));
        };
        let close = quoted
            .find('"')
            .ok_or_else(|| MaterializeError::BadBlurMarker(rest.to_string()))?;
        out.push((name, &quoted[..close]));
        rest = quoted[close + 1..].trim_start();
    }
    Ok(out)
}
