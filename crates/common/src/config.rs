//! Service configuration persisted as `config/services.json`.
//!
//! The daemon calls [`ConfigStore::load_or_create`] at startup; clients only
//! ever [`ConfigStore::load`] and treat a missing file as "daemon never ran".

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::protocol::Service;

pub const DEFAULT_EDITOR_COMMAND: &str = "code";
pub const DEFAULT_AUDIO_COMMAND: &str = "afplay";
pub const DEFAULT_SPEECH_COMMAND: &str = "say";
pub const DEFAULT_SOUNDS_DIR: &str = "/System/Library/Sounds";
pub const DEFAULT_VOICE: &str = "system";
pub const DEFAULT_SPEECH_RATE: u32 = 200;
pub const DEFAULT_MIN_PLAY_INTERVAL_MS: u64 = 2000;

/// Settings every service entry carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(alias = "timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    #[serde(flatten)]
    pub settings: ServiceSettings,
    #[serde(default = "default_editor_command")]
    pub command: String,
    #[serde(default = "default_true", alias = "path_translation")]
    pub path_translation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    #[serde(flatten)]
    pub settings: ServiceSettings,
    #[serde(default = "default_audio_command")]
    pub command: String,
    #[serde(default = "default_sounds_dir", alias = "sounds_dir")]
    pub sounds_dir: PathBuf,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    #[serde(flatten)]
    pub settings: ServiceSettings,
    #[serde(default = "default_speech_command")]
    pub command: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_rate")]
    pub rate: u32,
}

/// The whole of `services.json`. An absent entry means the service is off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default, alias = "vscode", skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechConfig>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            editor: Some(EditorConfig {
                settings: ServiceSettings {
                    enabled: true,
                    timeout_ms: 10_000,
                    description: "Editor integration".to_string(),
                },
                command: default_editor_command(),
                path_translation: true,
            }),
            audio: Some(AudioConfig {
                settings: ServiceSettings {
                    enabled: true,
                    timeout_ms: 5_000,
                    description: "Audio notifications".to_string(),
                },
                command: default_audio_command(),
                sounds_dir: default_sounds_dir(),
                min_interval_ms: DEFAULT_MIN_PLAY_INTERVAL_MS,
            }),
            speech: Some(SpeechConfig {
                settings: ServiceSettings {
                    enabled: true,
                    timeout_ms: 30_000,
                    description: "Text-to-speech".to_string(),
                },
                command: default_speech_command(),
                voice: default_voice(),
                rate: DEFAULT_SPEECH_RATE,
            }),
        }
    }
}

impl ServicesConfig {
    pub fn settings(&self, service: Service) -> Option<&ServiceSettings> {
        match service {
            Service::Editor => self.editor.as_ref().map(|c| &c.settings),
            Service::Audio => self.audio.as_ref().map(|c| &c.settings),
            Service::Speech => self.speech.as_ref().map(|c| &c.settings),
        }
    }

    pub fn is_enabled(&self, service: Service) -> bool {
        self.settings(service).is_some_and(|s| s.enabled)
    }

    /// Settings of an enabled service, or [`BridgeError::ServiceDisabled`].
    pub fn require_enabled(&self, service: Service) -> BridgeResult<&ServiceSettings> {
        self.settings(service)
            .filter(|s| s.enabled)
            .ok_or(BridgeError::ServiceDisabled(service))
    }
}

/// Reads and writes `services.json` inside a config directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join("services.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the existing file, or write and return the defaults.
    ///
    /// A file that fails to parse is replaced by the defaults.
    pub fn load_or_create(&self) -> BridgeResult<ServicesConfig> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<ServicesConfig>(&raw) {
                Ok(config) => {
                    debug!("Loaded services config from {}", self.path.display());
                    return Ok(config);
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {} ({}); recreating defaults",
                        self.path.display(),
                        err
                    );
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let config = ServicesConfig::default();
        self.save(&config)?;
        Ok(config)
    }

    pub fn load(&self) -> BridgeResult<ServicesConfig> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(BridgeError::ConfigMissing(self.path.clone()))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, config: &ServicesConfig) -> BridgeResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(config)? + "\n";
        fs::write(&self.path, body)?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_editor_command() -> String {
    DEFAULT_EDITOR_COMMAND.to_string()
}

fn default_audio_command() -> String {
    DEFAULT_AUDIO_COMMAND.to_string()
}

fn default_speech_command() -> String {
    DEFAULT_SPEECH_COMMAND.to_string()
}

fn default_sounds_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SOUNDS_DIR)
}

fn default_min_interval_ms() -> u64 {
    DEFAULT_MIN_PLAY_INTERVAL_MS
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_rate() -> u32 {
    DEFAULT_SPEECH_RATE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_or_create_writes_defaults_once() {
        let temp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(temp.path());

        let first = store.load_or_create().unwrap();
        let bytes_after_first = fs::read(store.path()).unwrap();
        let second = store.load_or_create().unwrap();
        let bytes_after_second = fs::read(store.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(bytes_after_first, bytes_after_second);
        assert!(first.is_enabled(Service::Editor));
        assert!(first.is_enabled(Service::Audio));
        assert!(first.is_enabled(Service::Speech));
    }

    #[test]
    fn corrupt_file_is_replaced_with_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(temp.path());
        fs::write(store.path(), "{ not json").unwrap();

        let config = store.load_or_create().unwrap();
        assert_eq!(config, ServicesConfig::default());
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn load_without_file_reports_missing_config() {
        let temp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(temp.path());
        assert!(matches!(store.load(), Err(BridgeError::ConfigMissing(_))));
    }

    #[test]
    fn legacy_keys_are_understood() {
        let raw = r#"{
            "vscode": {"enabled": true, "timeout": 10000, "description": "VS Code", "command": "code", "path_translation": false},
            "audio": {"enabled": false, "timeout": 5000, "sounds_dir": "/tmp/sounds"}
        }"#;
        let config: ServicesConfig = serde_json::from_str(raw).unwrap();

        let editor = config.editor.as_ref().unwrap();
        assert!(!editor.path_translation);
        assert_eq!(editor.settings.timeout_ms, 10000);

        let audio = config.audio.as_ref().unwrap();
        assert_eq!(audio.sounds_dir, PathBuf::from("/tmp/sounds"));
        assert_eq!(audio.min_interval_ms, DEFAULT_MIN_PLAY_INTERVAL_MS);

        assert!(config.speech.is_none());
        assert!(matches!(
            config.require_enabled(Service::Audio),
            Err(BridgeError::ServiceDisabled(Service::Audio))
        ));
        assert!(matches!(
            config.require_enabled(Service::Speech),
            Err(BridgeError::ServiceDisabled(Service::Speech))
        ));
    }
}
