use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "purposepay.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base: String,
    pub demo_user_id: String,
    pub demo_credit_score: u32,
    /// Unset means requests may wait indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".into(),
            demo_user_id: "u123".into(),
            demo_credit_score: 650,
            request_timeout_secs: None,
        }
    }
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file if it exists, then environment overrides.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let mut settings = if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        toml::from_str::<Settings>(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?
    } else {
        Settings::default()
    };

    if let Some(v) = env("PURPOSEPAY_API_BASE") {
        settings.api_base = v;
    }
    if let Some(v) = env("APP__API_BASE") {
        settings.api_base = v;
    }
    if let Some(v) = env("APP__DEMO_USER_ID") {
        settings.demo_user_id = v;
    }
    if let Some(v) = env("APP__DEMO_CREDIT_SCORE") {
        settings.demo_credit_score = v
            .parse()
            .with_context(|| format!("APP__DEMO_CREDIT_SCORE is not a number: '{v}'"))?;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = Some(
            v.parse()
                .with_context(|| format!("APP__REQUEST_TIMEOUT_SECS is not a number: '{v}'"))?,
        );
    }

    settings.api_base = normalize_api_base(&settings.api_base)?;
    Ok(settings)
}

pub fn normalize_api_base(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).with_context(|| format!("invalid api base url '{trimmed}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api base url must use http or https, got '{}'", url.scheme());
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env, fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings =
            load_settings_from(Path::new("/nonexistent/purposepay.toml"), no_env).expect("load");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn file_values_are_overridden_by_env() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("purposepay_settings_{suffix}.toml"));
        fs::write(
            &path,
            "api_base = \"http://10.0.0.5:8000/\"\ndemo_credit_score = 720\n",
        )
        .expect("write settings");

        let vars: HashMap<&str, &str> =
            HashMap::from([("APP__DEMO_USER_ID", "u999"), ("APP__REQUEST_TIMEOUT_SECS", "5")]);
        let settings = load_settings_from(&path, |key| vars.get(key).map(|v| v.to_string()))
            .expect("load");

        assert_eq!(settings.api_base, "http://10.0.0.5:8000");
        assert_eq!(settings.demo_credit_score, 720);
        assert_eq!(settings.demo_user_id, "u999");
        assert_eq!(settings.request_timeout_secs, Some(5));

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(normalize_api_base("ftp://example.org").is_err());
        assert!(normalize_api_base("not a url").is_err());
    }
}
