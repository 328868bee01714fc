//! Session configuration: the user's rules, constants and theme choice.

use serde::{Deserialize, Serialize};

use glaze_tree::host::SettingsStore;

/// One target chain with its style lines.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetStyles {
    pub target: String,
    #[serde(default)]
    pub styles: Vec<String>,
}

/// Everything a session loads at startup and on settings change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub control_styles: Vec<TargetStyles>,
    #[serde(default)]
    pub style_constants: Vec<String>,
}

impl SessionConfig {
    /// Reads the indexed key scheme the settings store uses:
    /// `theme`, `controlStyles[i].target`, `controlStyles[i].styles[j]`
    /// and `styleConstants[i]`. Each list ends at the first missing
    /// index.
    pub fn from_settings(store: &dyn SettingsStore) -> SessionConfig {
        let mut config = SessionConfig {
            theme: store.string("theme").filter(|t| !t.is_empty()),
            ..Default::default()
        };

        for i in 0.. {
            let Some(target) = store.string(&format!("controlStyles[{i}].target")) else {
                break;
            };
            let mut styles = Vec::new();
            for j in 0.. {
                let Some(style) = store.string(&format!("controlStyles[{i}].styles[{j}]")) else {
                    break;
                };
                styles.push(style);
            }
            config.control_styles.push(TargetStyles { target, styles });
        }

        for i in 0.. {
            let Some(constant) = store.string(&format!("styleConstants[{i}]")) else {
                break;
            };
            config.style_constants.push(constant);
        }

        config
    }

    pub fn from_json(text: &str) -> Result<SessionConfig, serde_json::Error> {
        serde_json::from_str(text)
    }
}
