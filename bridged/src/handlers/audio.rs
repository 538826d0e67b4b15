//! `audio/play`: play a notification sound, at most once per interval per sound.

use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use hostbridge_common::{
    AudioConfig, BridgeError, BridgeRequest, BridgeResponse, BridgeResult, Service,
};

use super::{into_response, unknown_action};
use crate::host_command::CommandRunner;

pub struct AudioHandler {
    command: String,
    sounds_dir: PathBuf,
    min_interval: Duration,
    /// Last successful play per sound name. Reset on daemon restart.
    last_played: HashMap<String, Instant>,
    runner: Arc<dyn CommandRunner>,
}

impl AudioHandler {
    pub fn new(config: &AudioConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            command: config.command.clone(),
            sounds_dir: config.sounds_dir.clone(),
            min_interval: Duration::from_millis(config.min_interval_ms),
            last_played: HashMap::new(),
            runner,
        }
    }

    pub async fn handle(&mut self, request: &BridgeRequest) -> BridgeResponse {
        let outcome = match request.action.as_str() {
            "play" => self.play(request).await,
            _ => Err(unknown_action(Service::Audio, request)),
        };
        into_response(Service::Audio, request.id, outcome)
    }

    async fn play(&mut self, request: &BridgeRequest) -> BridgeResult<BridgeResponse> {
        let sound = request.require_str("sound")?.to_string();
        let volume = request.payload_f64("volume").unwrap_or(1.0);
        info!("Audio request: {} {} (volume: {})", request.action, sound, volume);

        if let Some(remaining) = self.cooldown_remaining(&sound, Instant::now()) {
            let remaining_ms = (remaining.as_millis() as u64).max(1);
            info!(
                "Rate limiting: Skipping {} ({}ms until next allowed play)",
                sound, remaining_ms
            );
            return Ok(BridgeResponse::skipped(
                request.id,
                "Rate limited - sound played too recently",
            )
            .with_data(json!({ "sound": sound, "remainingTime": remaining_ms })));
        }

        let sound_file = self.resolve_sound(&sound).ok_or_else(|| BridgeError::NotFound {
            what: "Sound file",
            path: PathBuf::from(&sound),
        })?;

        let mut args = Vec::new();
        if (volume - 1.0).abs() > f64::EPSILON {
            args.push("-v".to_string());
            args.push(volume.to_string());
        }
        args.push(sound_file.to_string_lossy().into_owned());

        self.runner.run(&self.command, &args).await?;
        info!("Audio played successfully: {}", sound_file.display());
        self.last_played.insert(sound, Instant::now());

        Ok(BridgeResponse::success(request.id, "Audio played successfully")
            .with_data(json!({ "sound": sound_file })))
    }

    fn cooldown_remaining(&self, sound: &str, now: Instant) -> Option<Duration> {
        let last = self.last_played.get(sound)?;
        let elapsed = now.saturating_duration_since(*last);
        (elapsed < self.min_interval).then(|| self.min_interval - elapsed)
    }

    /// `<soundsDir>/<sound>`, then `<soundsDir>/<sound>.aiff`, then `<sound>` itself.
    fn resolve_sound(&self, sound: &str) -> Option<PathBuf> {
        [
            self.sounds_dir.join(sound),
            self.sounds_dir.join(format!("{sound}.aiff")),
            PathBuf::from(sound),
        ]
        .into_iter()
        .find(|candidate| candidate.is_file())
    }
}
