//! Read `$XDG_CONFIG_HOME/<app>/config.toml` into env key-value pairs.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::{env_prefix, LoadError};

/// Where the app's config file lives, whether or not it exists.
pub fn config_path(app_name: &str) -> Result<PathBuf, LoadError> {
    let base = dirs::config_dir()
        .ok_or_else(|| LoadError::XdgPath("no config directory for this platform".into()))?;
    Ok(base.join(app_name).join("config.toml"))
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    graph: toml::Table,
    #[serde(default)]
    controller: toml::Table,
}

/// Scalar TOML value as an env string. Strings are taken raw, not quoted.
fn scalar(key: &str, value: &toml::Value) -> Result<String, LoadError> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => Err(LoadError::XdgValue {
            key: key.to_string(),
        }),
    }
}

fn parse(app_name: &str, content: &str) -> Result<HashMap<String, String>, LoadError> {
    let file: ConfigFile = toml::from_str(content)?;
    let prefix = env_prefix(app_name);
    let mut out = file.env;
    for (key, value) in file.graph.iter().chain(file.controller.iter()) {
        let name = format!("{prefix}{}", key.to_ascii_uppercase());
        out.insert(name, scalar(key, value)?);
    }
    Ok(out)
}

/// Missing file yields an empty map.
pub fn load_env_map(app_name: &str) -> Result<HashMap<String, String>, LoadError> {
    let path = config_path(app_name)?;
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    parse(app_name, &content)
}
