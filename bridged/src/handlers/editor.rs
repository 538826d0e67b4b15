//! `editor/open`: open a container path in the host editor.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use hostbridge_common::{
    BridgeError, BridgeRequest, BridgeResponse, BridgeResult, EditorConfig, PathTranslator,
    Service,
};

use super::{into_response, unknown_action};
use crate::host_command::CommandRunner;

pub struct EditorHandler {
    command: String,
    translator: Option<PathTranslator>,
    runner: Arc<dyn CommandRunner>,
}

impl EditorHandler {
    pub fn new(
        config: &EditorConfig,
        translator: PathTranslator,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            command: config.command.clone(),
            translator: config.path_translation.then_some(translator),
            runner,
        }
    }

    pub async fn handle(&mut self, request: &BridgeRequest) -> BridgeResponse {
        info!(
            "Editor request: {} {}",
            request.action,
            request.payload_str("path").unwrap_or("<none>")
        );

        if request.action != "open" {
            return into_response(
                Service::Editor,
                request.id,
                Err(unknown_action(Service::Editor, request)),
            );
        }

        let requested = match request.require_str("path") {
            Ok(path) => path,
            Err(err) => return into_response(Service::Editor, request.id, Err(err)),
        };

        let host_path = self.host_path(requested);
        info!("Translated path: {} -> {}", requested, host_path.display());

        let outcome = self.open(request, &host_path).await;
        let response = into_response(Service::Editor, request.id, outcome);
        if response.data.is_some() {
            response
        } else {
            response.with_data(json!({ "path": host_path }))
        }
    }

    fn host_path(&self, requested: &str) -> PathBuf {
        match &self.translator {
            Some(translator) => translator.translate(requested),
            None => PathBuf::from(requested),
        }
    }

    async fn open(&self, request: &BridgeRequest, host_path: &Path) -> BridgeResult<BridgeResponse> {
        if !host_path.exists() {
            return Err(BridgeError::PathMissing(host_path.to_path_buf()));
        }

        if self.runner.resolve(&self.command).is_none() {
            return Err(BridgeError::CommandUnavailable {
                role: "Editor",
                command: self.command.clone(),
            });
        }

        let args = vec![host_path.to_string_lossy().into_owned()];
        self.runner.run(&self.command, &args).await?;
        info!("Editor opened successfully: {}", host_path.display());

        Ok(BridgeResponse::success(request.id, "Editor opened successfully")
            .with_data(json!({ "path": host_path })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_command::testing::RecordingRunner;
    use hostbridge_common::{Priority, ResponseStatus, ServicesConfig};
    use serde_json::Map;

    fn editor_config() -> EditorConfig {
        ServicesConfig::default().editor.unwrap()
    }

    fn open_request(path: &str) -> BridgeRequest {
        let mut payload = Map::new();
        payload.insert("path".into(), json!(path));
        BridgeRequest::new(Service::Editor, "open", payload, 1000, Priority::Normal)
    }

    #[tokio::test]
    async fn missing_host_path_is_an_error_naming_the_translated_path() {
        let project = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::default();
        let mut handler = EditorHandler::new(
            &editor_config(),
            PathTranslator::new(project.path()),
            Arc::new(runner.clone()),
        );

        let response = handler.handle(&open_request("/workspace/main/nope.rs")).await;

        let expected = project.path().join("nope.rs");
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.message.contains(&expected.display().to_string()));
        assert_eq!(response.data_value("path"), Some(&json!(expected)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn existing_path_is_opened_with_the_editor() {
        let project = tempfile::tempdir().unwrap();
        std::fs::create_dir(project.path().join("src")).unwrap();
        let runner = RecordingRunner::default();
        let mut handler = EditorHandler::new(
            &editor_config(),
            PathTranslator::new(project.path()),
            Arc::new(runner.clone()),
        );

        let response = handler.handle(&open_request("/workspace/main/src")).await;

        let host = project.path().join("src");
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.data_value("path"), Some(&json!(host)));
        assert_eq!(
            runner.calls(),
            vec![("code".to_string(), vec![host.display().to_string()])]
        );
    }

    #[tokio::test]
    async fn unresolvable_editor_command_is_reported() {
        let project = tempfile::tempdir().unwrap();
        let runner = RecordingRunner {
            missing: vec!["code".into()],
            ..Default::default()
        };
        let mut handler = EditorHandler::new(
            &editor_config(),
            PathTranslator::new(project.path()),
            Arc::new(runner.clone()),
        );

        let response = handler.handle(&open_request("/workspace/main")).await;

        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.message.contains("not found on PATH"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn translation_can_be_disabled() {
        let project = tempfile::tempdir().unwrap();
        let mut config = editor_config();
        config.path_translation = false;
        let mut handler = EditorHandler::new(
            &config,
            PathTranslator::new("/elsewhere"),
            Arc::new(RecordingRunner::default()),
        );

        let raw = project.path().display().to_string();
        let response = handler.handle(&open_request(&raw)).await;
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.data_value("path"), Some(&json!(project.path())));
    }

    #[tokio::test]
    async fn unknown_action_and_missing_path_are_errors() {
        let mut handler = EditorHandler::new(
            &editor_config(),
            PathTranslator::new("/host"),
            Arc::new(RecordingRunner::default()),
        );

        let mut request = open_request("/workspace/main");
        request.action = "close".into();
        let response = handler.handle(&request).await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.message, "Unknown editor action: close");

        let mut request = open_request("/workspace/main");
        request.payload.clear();
        let response = handler.handle(&request).await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(response.message.contains("'path'"));
    }
}
