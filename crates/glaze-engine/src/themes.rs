//! Built-in theme catalogue.
//!
//! A theme is a canned set of target styles and constants inserted into
//! the registry before the user's own rules, so user rules win every
//! property they contest.

/// One canned rule of a theme.
pub struct ThemeTargetStyle {
    pub target: &'static str,
    pub styles: &'static [&'static str],
}

pub struct Theme {
    pub name: &'static str,
    pub style_constants: &'static [&'static str],
    pub target_styles: &'static [ThemeTargetStyle],
}

pub fn find_theme(name: &str) -> Option<&'static Theme> {
    THEMES.iter().find(|t| t.name == name)
}

pub const THEMES: &[Theme] = &[
    Theme {
        name: "Translucent",
        style_constants: &["chipBackground=#28FFFFFF", "chipStroke=#40FFFFFF"],
        target_styles: &[
            ThemeTargetStyle {
                target: "Rectangle#BackgroundFill",
                styles: &["Fill:=<GlazeBlur BlurAmount=\"18\" TintColor=\"#30202020\"/>"],
            },
            ThemeTargetStyle {
                target: "Rectangle#BackgroundStroke",
                styles: &["Fill:="],
            },
            ThemeTargetStyle {
                target: "taskbar:TaskListButtonPanel > Border#BackgroundElement",
                styles: &["Background=$chipBackground", "CornerRadius=8"],
            },
            ThemeTargetStyle {
                target: "systemtray:OmniButton > Grid#ContainerGrid",
                styles: &["Background=$chipBackground", "BorderBrush=$chipStroke"],
            },
        ],
    },
    Theme {
        name: "Frosted",
        style_constants: &[],
        target_styles: &[
            ThemeTargetStyle {
                target: "Rectangle#BackgroundFill",
                styles: &[
                    "Fill:=<GlazeBlur BlurAmount=\"30\" TintColor=\"{ThemeResource SystemChromeAltHighColor}\" TintOpacity=\"0.7\"/>",
                ],
            },
            ThemeTargetStyle {
                target: "taskbar:TaskListButton",
                styles: &["CornerRadius=6"],
            },
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use glaze_dsl::Rule;

    #[test]
    fn lookup_is_exact() {
        assert!(find_theme("Translucent").is_some());
        assert!(find_theme("translucent").is_none());
        assert!(find_theme("").is_none());
    }

    #[test]
    fn every_catalogue_rule_parses() {
        for theme in THEMES {
            for entry in theme.target_styles {
                let styles: Vec<String> =
                    entry.styles.iter().map(|s| s.to_string()).collect();
                assert!(
                    Rule::parse(entry.target, &styles).is_ok(),
                    "bad catalogue rule in {}: {}",
                    theme.name,
                    entry.target
                );
            }
        }
    }
}
