use std::{collections::HashMap, fs};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_url: String,
    pub poll_interval_secs: u64,
    pub remember_me: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            poll_interval_secs: 30,
            remember_me: true,
        }
    }
}

/// Defaults, overridden by `dashboard.toml`, overridden by `CUIDAMED_*`
/// environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("dashboard.toml") {
        apply_file(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("CUIDAMED_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("CUIDAMED_POLL_INTERVAL_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_interval_secs = parsed;
        }
    }
    if let Ok(v) = std::env::var("CUIDAMED_REMEMBER_ME") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.remember_me = parsed;
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("server_url").and_then(|v| v.as_str()) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("poll_interval_secs").and_then(|v| v.as_integer()) {
        if v > 0 {
            settings.poll_interval_secs = v as u64;
        }
    }
    if let Some(v) = file_cfg.get("remember_me").and_then(|v| v.as_bool()) {
        settings.remember_me = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "server_url = \"http://med.example:8080\"\npoll_interval_secs = 10\nremember_me = false\n",
        );
        assert_eq!(settings.server_url, "http://med.example:8080");
        assert_eq!(settings.poll_interval_secs, 10);
        assert!(!settings.remember_me);
    }

    #[test]
    fn unknown_and_mistyped_keys_are_ignored() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "poll_interval_secs = \"soon\"\ncolor_scheme = \"dark\"\n",
        );
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "poll_interval_secs = 0\n");
        assert_eq!(settings.poll_interval_secs, 30);
    }

    #[test]
    fn malformed_file_leaves_defaults() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "not toml at all [");
        assert_eq!(settings, Settings::default());
    }
}
