//! One poll cycle: drain each service queue and answer every request in it.

use tracing::{debug, error, info, warn};

use hostbridge_common::fs::ndjson;
use hostbridge_common::{BridgeLayout, BridgeRequest, BridgeResult, Service};

use crate::handlers::HandlerRegistry;

pub struct Dispatcher {
    layout: BridgeLayout,
    registry: HandlerRegistry,
}

impl Dispatcher {
    pub fn new(layout: BridgeLayout, registry: HandlerRegistry) -> Self {
        Self { layout, registry }
    }

    pub fn services(&self) -> Vec<Service> {
        self.registry.services()
    }

    /// Process every registered queue once, in service order.
    ///
    /// Handlers run sequentially; a slow host command delays the services
    /// after it. Returns the number of requests answered.
    pub async fn poll_once(&mut self) -> usize {
        let mut answered = 0;
        for service in self.registry.services() {
            match self.process_queue(service).await {
                Ok(count) => answered += count,
                Err(err) => error!("Error processing {} queue: {}", service, err),
            }
        }
        answered
    }

    async fn process_queue(&mut self, service: Service) -> BridgeResult<usize> {
        let lines = ndjson::drain(&self.layout.queue_file(service))?;
        if lines.is_empty() {
            return Ok(0);
        }
        info!("Processing {} queue ({} line(s))", service, lines.len());

        let response_file = self.layout.response_file(service);
        let Some(handler) = self.registry.get_mut(service) else {
            error!("No handler registered for service: {}", service);
            return Ok(0);
        };

        let mut answered = 0;
        for line in lines {
            let request = match serde_json::from_str::<BridgeRequest>(&line) {
                Ok(request) => request,
                Err(err) => {
                    error!("Invalid JSON in {} queue: {} ({})", service, line, err);
                    continue;
                }
            };

            if request.service != service {
                warn!(
                    "Request {} names service {} but arrived on the {} queue",
                    request.id, request.service, service
                );
            }

            let response = handler.handle(&request).await;
            debug!(
                "Answering {} request {} with {}",
                service, request.id, response.status
            );
            if let Err(err) = ndjson::append_json_line(&response_file, &response) {
                error!(
                    "Failed to write {} response for {}: {}",
                    service, request.id, err
                );
                continue;
            }
            answered += 1;
        }

        Ok(answered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerOptions;
    use crate::host_command::testing::RecordingRunner;
    use hostbridge_common::{
        BridgeResponse, PathTranslator, Priority, ResponseStatus, ServicesConfig,
    };
    use serde_json::{json, Map};
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    fn dispatcher(root: &std::path::Path, sounds_dir: &std::path::Path) -> Dispatcher {
        let layout = BridgeLayout::new(root);
        layout.ensure_dirs().unwrap();
        let mut config = ServicesConfig::default();
        if let Some(audio) = config.audio.as_mut() {
            audio.sounds_dir = sounds_dir.to_path_buf();
        }
        let options = HandlerOptions {
            translator: PathTranslator::new(root.join("project")),
            speech_max_age: Duration::from_secs(120),
        };
        let registry =
            HandlerRegistry::from_config(&config, &options, Arc::new(RecordingRunner::default()));
        Dispatcher::new(layout, registry)
    }

    fn play(sound: &str) -> BridgeRequest {
        let mut payload = Map::new();
        payload.insert("sound".into(), json!(sound));
        BridgeRequest::new(Service::Audio, "play", payload, 1000, Priority::Normal)
    }

    fn responses(layout: &BridgeLayout, service: Service) -> Vec<BridgeResponse> {
        ndjson::read_lines(&layout.response_file(service))
            .unwrap()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn queue_is_drained_and_answered_in_order() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("Hero.aiff"), b"x").unwrap();
        let mut dispatcher = dispatcher(temp.path(), temp.path());
        let layout = BridgeLayout::new(temp.path());

        let first = play("Hero");
        let second = play("Hero");
        ndjson::append_json_line(&layout.queue_file(Service::Audio), &first).unwrap();
        ndjson::append_json_line(&layout.queue_file(Service::Audio), &second).unwrap();

        assert_eq!(dispatcher.poll_once().await, 2);

        let answers = responses(&layout, Service::Audio);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].id, first.id);
        assert_eq!(answers[0].status, ResponseStatus::Success);
        assert_eq!(answers[1].id, second.id);
        assert_eq!(answers[1].status, ResponseStatus::Skipped);
        assert_eq!(
            fs::metadata(layout.queue_file(Service::Audio)).unwrap().len(),
            0
        );
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(temp.path(), temp.path());
        let layout = BridgeLayout::new(temp.path());

        let mut payload = Map::new();
        payload.insert("path".into(), json!("/nowhere/at/all"));
        let request = BridgeRequest::new(Service::Editor, "open", payload, 1000, Priority::Normal);
        let queue = layout.queue_file(Service::Editor);
        fs::write(&queue, "{not json}\n").unwrap();
        ndjson::append_json_line(&queue, &request).unwrap();

        assert_eq!(dispatcher.poll_once().await, 1);
        let answers = responses(&layout, Service::Editor);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].id, request.id);
        assert_eq!(answers[0].status, ResponseStatus::Error);
    }

    #[tokio::test]
    async fn non_utf8_line_does_not_wedge_the_queue() {
        let temp = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(temp.path(), temp.path());
        let layout = BridgeLayout::new(temp.path());

        let mut payload = Map::new();
        payload.insert("path".into(), json!("/nowhere/at/all"));
        let request = BridgeRequest::new(Service::Editor, "open", payload, 1000, Priority::Normal);
        let queue = layout.queue_file(Service::Editor);
        fs::write(&queue, b"\xff\xfe garbage\n").unwrap();
        ndjson::append_json_line(&queue, &request).unwrap();

        assert_eq!(dispatcher.poll_once().await, 1);
        assert_eq!(fs::metadata(&queue).unwrap().len(), 0);
        let answers = responses(&layout, Service::Editor);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].id, request.id);

        assert_eq!(dispatcher.poll_once().await, 0);
    }

    #[tokio::test]
    async fn idle_cycle_answers_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(temp.path(), temp.path());
        assert_eq!(dispatcher.poll_once().await, 0);
        assert_eq!(dispatcher.services(), Service::ALL.to_vec());
    }
}
