//! Host-Bridge Client Library
//!
//! Container-side half of the host bridge. Requests are appended to
//! `requests/<service>.queue` and answered by the host daemon in
//! `responses/<service>.response`; see [`HostBridge`].

use serde_json::{json, Map, Value};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use hostbridge_common::{
    BridgeError, BridgeLayout, BridgeRequest, BridgeResponse, Priority, ResponseStatus, Service,
    ServicesConfig,
};

use hostbridge_common::fs::ndjson;
use hostbridge_common::{ConfigStore, POLL_INTERVAL_MS};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("Request {id} timed out after {timeout_ms}ms")]
    Timeout { id: Uuid, timeout_ms: u64 },
    #[error("Request failed: {}", .0.message)]
    Rejected(BridgeResponse),
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        ClientError::Bridge(BridgeError::Io(err))
    }
}

/// Per-request overrides. Unset fields fall back to `services.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    pub timeout_ms: Option<u64>,
    pub priority: Option<Priority>,
}

/// Client for one bridge directory.
#[derive(Debug, Clone)]
pub struct HostBridge {
    layout: BridgeLayout,
    poll_interval: Duration,
}

impl HostBridge {
    /// Open the bridge rooted at `root`, creating its request, response and
    /// config directories.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let layout = BridgeLayout::new(root);
        for dir in [
            layout.requests_dir(),
            layout.responses_dir(),
            layout.config_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            layout,
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
        })
    }

    /// Explicit root, then `HOSTBRIDGE_DIR`, then `<cwd>/runtime/host-bridge`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, ClientError> {
        let layout = BridgeLayout::resolve(explicit)?;
        Self::new(layout.root())
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::resolve(None)
    }

    pub fn layout(&self) -> &BridgeLayout {
        &self.layout
    }

    /// Build a request from the service's configured defaults and wait for its answer.
    pub async fn request(
        &self,
        service: Service,
        action: &str,
        payload: Map<String, Value>,
        options: RequestOptions,
    ) -> Result<BridgeResponse, ClientError> {
        let config = self.services_status()?;
        let settings = config.require_enabled(service)?;

        let request = BridgeRequest::new(
            service,
            action,
            payload,
            options.timeout_ms.unwrap_or(settings.timeout_ms),
            options.priority.unwrap_or_default(),
        );
        self.submit(request).await
    }

    /// Send a fully built request and poll for the response with its id.
    ///
    /// The service's response file is emptied first, so concurrent waiters
    /// on the same service can lose their answers.
    pub async fn submit(&self, request: BridgeRequest) -> Result<BridgeResponse, ClientError> {
        let service = request.service;
        let response_file = self.layout.response_file(service);

        ndjson::truncate(&response_file)?;
        ndjson::append_json_line(&self.layout.queue_file(service), &request)?;
        debug!("Queued {} request {}", service, request.id);

        let timeout = Duration::from_millis(request.timeout_ms);
        let started = Instant::now();
        loop {
            if started.elapsed() > timeout {
                return Err(ClientError::Timeout {
                    id: request.id,
                    timeout_ms: request.timeout_ms,
                });
            }

            if let Some(response) = self.find_response(service, request.id) {
                return if response.is_success() {
                    Ok(response)
                } else {
                    Err(ClientError::Rejected(response))
                };
            }

            sleep(self.poll_interval).await;
        }
    }

    fn find_response(&self, service: Service, id: Uuid) -> Option<BridgeResponse> {
        let lines = match ndjson::read_lines(&self.layout.response_file(service)) {
            Ok(lines) => lines,
            Err(err) => {
                debug!("Response file for {} not readable yet: {}", service, err);
                return None;
            }
        };
        // Lines that fail to parse may still be mid-write.
        lines
            .iter()
            .filter_map(|line| serde_json::from_str::<BridgeResponse>(line).ok())
            .find(|response| response.id == id)
    }

    /// Append a request without clearing responses or waiting for an answer.
    pub fn enqueue(&self, request: &BridgeRequest) -> Result<Uuid, ClientError> {
        self.services_status()?.require_enabled(request.service)?;
        self.append(request)
    }

    pub fn audio_play_nowait(&self, sound: &str) -> Result<Uuid, ClientError> {
        self.enqueue_simple(Service::Audio, "play", audio_payload(sound, 1.0))
    }

    pub fn speech_say_nowait(&self, message: &str) -> Result<Uuid, ClientError> {
        self.enqueue_simple(Service::Speech, "say", speech_payload(message, None, None))
    }

    fn enqueue_simple(
        &self,
        service: Service,
        action: &str,
        payload: Map<String, Value>,
    ) -> Result<Uuid, ClientError> {
        let config = self.services_status()?;
        let settings = config.require_enabled(service)?;
        let request = BridgeRequest::new(
            service,
            action,
            payload,
            settings.timeout_ms,
            Priority::Normal,
        );
        self.append(&request)
    }

    fn append(&self, request: &BridgeRequest) -> Result<Uuid, ClientError> {
        ndjson::append_json_line(&self.layout.queue_file(request.service), request)?;
        info!("Queued {} request {}", request.service, request.id);
        Ok(request.id)
    }

    /// Open a container path in the host editor.
    pub async fn editor_open(&self, path: &str) -> bool {
        let mut payload = Map::new();
        payload.insert("path".into(), json!(path));
        self.succeeded(
            "open editor",
            self.request(Service::Editor, "open", payload, RequestOptions::default())
                .await,
        )
    }

    pub async fn audio_play(&self, sound: &str, volume: f64) -> bool {
        self.succeeded(
            "play audio",
            self.request(
                Service::Audio,
                "play",
                audio_payload(sound, volume),
                RequestOptions::default(),
            )
            .await,
        )
    }

    pub async fn speech_say(&self, message: &str, voice: Option<&str>, rate: Option<u32>) -> bool {
        self.succeeded(
            "speak",
            self.request(
                Service::Speech,
                "say",
                speech_payload(message, voice, rate),
                RequestOptions::default(),
            )
            .await,
        )
    }

    fn succeeded(&self, what: &str, outcome: Result<BridgeResponse, ClientError>) -> bool {
        match outcome {
            Ok(response) => response.is_success(),
            Err(err) => {
                warn!("Failed to {}: {}", what, err);
                false
            }
        }
    }

    /// Only checks that the PID file exists.
    pub fn is_host_daemon_running(&self) -> bool {
        self.layout.pid_file().exists()
    }

    pub fn services_status(&self) -> Result<ServicesConfig, ClientError> {
        Ok(ConfigStore::new(&self.layout.config_dir()).load()?)
    }
}

fn audio_payload(sound: &str, volume: f64) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("sound".into(), json!(sound));
    payload.insert("volume".into(), json!(volume));
    payload
}

fn speech_payload(message: &str, voice: Option<&str>, rate: Option<u32>) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("message".into(), json!(message));
    if let Some(voice) = voice.filter(|v| !v.is_empty()) {
        payload.insert("voice".into(), json!(voice));
    }
    if let Some(rate) = rate.filter(|r| *r > 0) {
        payload.insert("rate".into(), json!(rate));
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn bridge_with_defaults(root: &std::path::Path) -> HostBridge {
        let bridge = HostBridge::new(root).unwrap();
        ConfigStore::new(&bridge.layout().config_dir())
            .save(&ServicesConfig::default())
            .unwrap();
        bridge
    }

    /// Answers the first request found on `service`'s queue with `status`.
    fn spawn_responder(layout: BridgeLayout, service: Service, status: ResponseStatus) {
        tokio::spawn(async move {
            loop {
                let lines = ndjson::drain(&layout.queue_file(service)).unwrap();
                if let Some(line) = lines.first() {
                    let request: BridgeRequest = serde_json::from_str(line).unwrap();
                    let response = BridgeResponse::new(request.id, status, "handled");
                    let file = layout.response_file(service);
                    fs::write(&file, "{\"partial\":\n").unwrap();
                    ndjson::append_json_line(&file, &response).unwrap();
                    return;
                }
                sleep(Duration::from_millis(20)).await;
            }
        });
    }

    #[tokio::test]
    async fn disabled_service_fails_before_writing_queue() {
        let temp = tempfile::tempdir().unwrap();
        let bridge = HostBridge::new(temp.path()).unwrap();
        let mut config = ServicesConfig::default();
        if let Some(speech) = config.speech.as_mut() {
            speech.settings.enabled = false;
        }
        ConfigStore::new(&bridge.layout().config_dir())
            .save(&config)
            .unwrap();

        let err = bridge
            .request(Service::Speech, "say", Map::new(), RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Bridge(BridgeError::ServiceDisabled(Service::Speech))
        ));
        assert!(!bridge.layout().queue_file(Service::Speech).exists());
        assert!(!bridge.speech_say("hello", None, None).await);
    }

    #[tokio::test]
    async fn missing_config_means_daemon_never_ran() {
        let temp = tempfile::tempdir().unwrap();
        let bridge = HostBridge::new(temp.path()).unwrap();

        let err = bridge.audio_play_nowait("Hero").unwrap_err();
        assert!(matches!(err, ClientError::Bridge(BridgeError::ConfigMissing(_))));
        assert!(!bridge.is_host_daemon_running());
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let temp = tempfile::tempdir().unwrap();
        let bridge = bridge_with_defaults(temp.path());

        let options = RequestOptions {
            timeout_ms: Some(150),
            priority: Some(Priority::High),
        };
        let started = Instant::now();
        let err = bridge
            .request(Service::Editor, "open", Map::new(), options)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Timeout { timeout_ms: 150, .. }));
        assert!(started.elapsed() >= Duration::from_millis(150));

        let queued = ndjson::read_lines(&bridge.layout().queue_file(Service::Editor)).unwrap();
        let request: BridgeRequest = serde_json::from_str(&queued[0]).unwrap();
        assert_eq!(request.priority, Priority::High);
        assert_eq!(request.timeout_ms, 150);
    }

    #[tokio::test]
    async fn matching_response_resolves_request() {
        let temp = tempfile::tempdir().unwrap();
        let bridge = bridge_with_defaults(temp.path());
        spawn_responder(bridge.layout().clone(), Service::Audio, ResponseStatus::Success);

        assert!(bridge.audio_play("Hero", 0.5).await);
    }

    #[tokio::test]
    async fn non_success_response_is_rejected_with_its_message() {
        let temp = tempfile::tempdir().unwrap();
        let bridge = bridge_with_defaults(temp.path());
        spawn_responder(bridge.layout().clone(), Service::Audio, ResponseStatus::Skipped);

        let err = bridge
            .request(
                Service::Audio,
                "play",
                audio_payload("Hero", 1.0),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();

        match &err {
            ClientError::Rejected(response) => assert_eq!(response.status, ResponseStatus::Skipped),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "Request failed: handled");
    }

    #[tokio::test]
    async fn enqueue_keeps_existing_responses() {
        let temp = tempfile::tempdir().unwrap();
        let bridge = bridge_with_defaults(temp.path());
        let response_file = bridge.layout().response_file(Service::Speech);
        fs::write(&response_file, "{\"id\":\"earlier\"}\n").unwrap();

        let id = bridge.speech_say_nowait("tests passed").unwrap();

        assert_eq!(
            fs::read_to_string(&response_file).unwrap(),
            "{\"id\":\"earlier\"}\n"
        );
        let queued = ndjson::read_lines(&bridge.layout().queue_file(Service::Speech)).unwrap();
        let request: BridgeRequest = serde_json::from_str(&queued[0]).unwrap();
        assert_eq!(request.id, id);
        assert_eq!(request.payload_str("message"), Some("tests passed"));
        assert_eq!(request.timeout_ms, 30_000);
    }

    #[test]
    fn response_lookup_skips_undecodable_lines() {
        let temp = tempfile::tempdir().unwrap();
        let bridge = HostBridge::new(temp.path()).unwrap();
        let id = Uuid::new_v4();
        let file = bridge.layout().response_file(Service::Editor);
        fs::write(&file, b"\xc3\x28 torn\n").unwrap();
        ndjson::append_json_line(&file, &BridgeResponse::success(id, "opened")).unwrap();

        let found = bridge.find_response(Service::Editor, id).expect("response found");
        assert_eq!(found.message, "opened");
    }

    #[test]
    fn pid_file_marks_daemon_as_running() {
        let temp = tempfile::tempdir().unwrap();
        let bridge = HostBridge::new(temp.path()).unwrap();
        assert!(!bridge.is_host_daemon_running());

        fs::write(bridge.layout().pid_file(), "4242\n").unwrap();
        assert!(bridge.is_host_daemon_running());
    }

    #[test]
    fn speech_payload_omits_unset_overrides() {
        let payload = speech_payload("hi", Some(""), Some(0));
        assert_eq!(payload.len(), 1);

        let payload = speech_payload("hi", Some("Samantha"), Some(180));
        assert_eq!(payload.get("voice"), Some(&json!("Samantha")));
        assert_eq!(payload.get("rate"), Some(&json!(180)));
    }
}
