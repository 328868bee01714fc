//! Whole-rule assembly: a target chain plus its style lines.

use tracing::warn;

use crate::matcher::ElementMatcher;
use crate::style::StyleLine;
use crate::DslError;

const DEFAULT_NAMESPACE: &str = "Windows.UI.Xaml.Controls.";
const SHAPES_RECTANGLE: &str = "Windows.UI.Xaml.Shapes.Rectangle";

/// Namespace alias prefixes accepted in type names.
const TYPE_ALIASES: &[(&str, &str)] = &[
    ("taskbar:", "Taskbar."),
    ("systemtray:", "SystemTray."),
    ("udk:", "WindowsUdk.UI.Shell."),
    ("muxc:", "Microsoft.UI.Xaml.Controls."),
];

/// Expands namespace aliases and qualifies bare type names.
pub fn adjust_type_name(type_name: &str) -> String {
    if !type_name.contains('.') && !type_name.contains(':') {
        if type_name == "Rectangle" {
            return SHAPES_RECTANGLE.to_string();
        }
        return format!("{DEFAULT_NAMESPACE}{type_name}");
    }
    for (alias, replacement) in TYPE_ALIASES {
        if let Some(rest) = type_name.strip_prefix(alias) {
            return format!("{replacement}{rest}");
        }
    }
    type_name.to_string()
}

/// One compiled rule: matchers leaf-first plus parsed style lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Original target text, kept for diagnostics.
    pub target: String,
    /// `matchers[0]` matches the element itself, the rest its ancestors
    /// walking strictly upward.
    pub matchers: Vec<ElementMatcher>,
    pub styles: Vec<StyleLine>,
}

impl Rule {
    /// Parses a target chain and its style lines into a rule.
    ///
    /// Segments are separated by `>` and parsed leaf-last in the text,
    /// so the produced matcher list is reversed relative to the source.
    /// At most one segment in the chain may carry an `@StateGroup`.
    /// Style lines starting with `//` are soft-disabled and skipped.
    pub fn parse(target: &str, styles: &[String]) -> Result<Rule, DslError> {
        if target.trim().is_empty() {
            return Err(DslError::EmptyChain);
        }
        let mut matchers = Vec::new();
        for segment in target.split('>').rev() {
            let mut matcher = ElementMatcher::parse(segment)?;
            matcher.type_name = adjust_type_name(&matcher.type_name);
            matchers.push(matcher);
        }
        if matchers.iter().filter(|m| m.state_group.is_some()).count() > 1 {
            return Err(DslError::DuplicateStateGroup);
        }

        let mut parsed_styles = Vec::new();
        for style in styles {
            let trimmed = style.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with("//") {
                warn!(target: "glaze_dsl", style = %trimmed, "skipping disabled style line");
                continue;
            }
            parsed_styles.push(StyleLine::parse(trimmed)?);
        }

        Ok(Rule {
            target: target.trim().to_string(),
            matchers,
            styles: parsed_styles,
        })
    }

    /// The matcher for the element the styles apply to.
    pub fn leaf(&self) -> &ElementMatcher {
        &self.matchers[0]
    }
}
