//! `kambot config` -- display and check the resolved configuration.
//!
//! # Examples
//!
//! ```text
//! kambot config show
//! kambot config section pipeline
//! kambot config validate -c ./kambot.json
//! ```

use std::path::Path;

use kambot_types::config::Config;

/// Print the resolved configuration as formatted JSON.
pub fn config_show(config: &Config) {
    match serde_json::to_string_pretty(config) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: failed to serialize config: {e}"),
    }
}

/// Print one configuration section, or list the known ones.
pub fn config_section(config: &Config, section: &str) {
    let value = serde_json::to_value(config).unwrap_or_default();
    match value.get(section) {
        Some(v) => match serde_json::to_string_pretty(v) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error: failed to serialize section: {e}"),
        },
        None => eprintln!(
            "error: unknown section '{section}' (available: {})",
            section_names(&value).join(", ")
        ),
    }
}

/// Run the semantic checks and report where the config came from.
pub fn config_validate(config: &Config, source: Option<&Path>) -> anyhow::Result<()> {
    config.validate()?;
    println!("config ok ({})", source_label(source));
    Ok(())
}

fn source_label(source: Option<&Path>) -> String {
    match source {
        Some(path) => path.display().to_string(),
        None => "defaults".into(),
    }
}

fn section_names(value: &serde_json::Value) -> Vec<&str> {
    value
        .as_object()
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default()
}
