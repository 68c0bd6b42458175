use serde::{Deserialize, Serialize};

fn default_schema_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 15_000,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// `probe` checks that the source answers before reporting it prepared,
    /// `null` prepares everything instantly.
    pub audio_backend: String,
    pub start_looping: bool,
    pub probe_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            audio_backend: "probe".to_string(),
            start_looping: false,
            probe_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub app_title: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_title: "Echo Play".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub api_base_url: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub log_level: String,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            api_base_url: "http://127.0.0.1:3000/".to_string(),
            user_id: None,
            log_level: "info".to_string(),
            http: HttpConfig::default(),
            playback: PlaybackConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    #[test]
    fn partial_file_fills_sections_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            api_base_url = "http://10.0.0.2:3000/"
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.schema_version, 1);
        assert_eq!(cfg.user_id, None);
        assert_eq!(cfg.http.connect_timeout_ms, 15_000);
        assert_eq!(cfg.playback.audio_backend, "probe");
        assert_eq!(cfg.notification.app_title, "Echo Play");
    }
}
