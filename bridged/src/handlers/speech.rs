//! `speech/say`: speak a message, unless it waited too long in the queue.
//!
//! After a daemon outage the speech queue can hold minutes of backlog;
//! replaying it all would talk over itself, so old requests are skipped.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use hostbridge_common::config::{DEFAULT_SPEECH_RATE, DEFAULT_VOICE};
use hostbridge_common::{
    BridgeError, BridgeRequest, BridgeResponse, BridgeResult, Service, SpeechConfig,
};

use super::{into_response, unknown_action};
use crate::host_command::{render_command_line, CommandRunner};

pub struct SpeechHandler {
    command: String,
    voice: String,
    rate: u32,
    max_age: Duration,
    runner: Arc<dyn CommandRunner>,
}

impl SpeechHandler {
    pub fn new(config: &SpeechConfig, max_age: Duration, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            command: config.command.clone(),
            voice: config.voice.clone(),
            rate: config.rate,
            max_age,
            runner,
        }
    }

    pub async fn handle(&mut self, request: &BridgeRequest) -> BridgeResponse {
        let message = request.payload_str("message").unwrap_or_default();

        if self.is_stale(request, Utc::now()) {
            info!(
                "Skipping stale speech request (older than {}s): '{}'",
                self.max_age.as_secs(),
                message
            );
            return BridgeResponse::skipped(request.id, "Request too old, skipped").with_data(
                json!({ "reason": "stale", "max_age_seconds": self.max_age.as_secs() }),
            );
        }

        let outcome = match request.action.as_str() {
            "say" => self.say(request).await,
            _ => Err(unknown_action(Service::Speech, request)),
        };
        into_response(Service::Speech, request.id, outcome)
    }

    /// Unparsable timestamps count as stale. Timestamps in the future do not.
    fn is_stale(&self, request: &BridgeRequest, now: DateTime<Utc>) -> bool {
        let Some(sent) = request.parsed_timestamp() else {
            return true;
        };
        let age = now.signed_duration_since(sent.with_timezone(&Utc));
        age.num_seconds() > self.max_age.as_secs() as i64
    }

    async fn say(&self, request: &BridgeRequest) -> BridgeResult<BridgeResponse> {
        let message = request.require_str("message")?;
        let voice = request.payload_str("voice").unwrap_or(self.voice.as_str());
        let rate = requested_rate(request)?.unwrap_or(self.rate);
        info!(
            "Speech request: {} '{}' (voice: {}, rate: {})",
            request.action, message, voice, rate
        );

        let args = say_args(message, voice, rate);
        info!("Speaking via {}", render_command_line(&self.command, &args));
        self.runner.run(&self.command, &args).await?;
        info!("Speech completed successfully");

        Ok(BridgeResponse::success(request.id, "Speech completed successfully")
            .with_data(json!({ "message": message, "voice": voice })))
    }
}

/// Optional `rate`: a whole number of words per minute that fits in `u32`.
fn requested_rate(request: &BridgeRequest) -> BridgeResult<Option<u32>> {
    let Some(raw) = request.payload.get("rate").filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    raw.as_u64()
        .and_then(|rate| u32::try_from(rate).ok())
        .map(Some)
        .ok_or_else(|| BridgeError::Malformed(format!("invalid speech rate: {raw}")))
}

fn say_args(message: &str, voice: &str, rate: u32) -> Vec<String> {
    let mut args = Vec::new();
    if voice != DEFAULT_VOICE {
        args.push("-v".to_string());
        args.push(voice.to_string());
    }
    if rate != DEFAULT_SPEECH_RATE {
        args.push("-r".to_string());
        args.push(rate.to_string());
    }
    args.push(message.to_string());
    args
}
