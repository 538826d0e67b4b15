//! Per-service request handlers.
//!
//! The set of services is closed, so handlers are variants of one enum and
//! the registry is a map built once at startup from `services.json`.

mod audio;
mod editor;
mod speech;

pub use audio::AudioHandler;
pub use editor::EditorHandler;
pub use speech::SpeechHandler;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use hostbridge_common::{
    BridgeError, BridgeRequest, BridgeResponse, BridgeResult, PathTranslator, Service,
    ServicesConfig,
};

use crate::host_command::CommandRunner;

pub enum ServiceHandler {
    Editor(EditorHandler),
    Audio(AudioHandler),
    Speech(SpeechHandler),
}

impl ServiceHandler {
    pub fn service(&self) -> Service {
        match self {
            ServiceHandler::Editor(_) => Service::Editor,
            ServiceHandler::Audio(_) => Service::Audio,
            ServiceHandler::Speech(_) => Service::Speech,
        }
    }

    /// Never fails: handler errors come back as `error` responses.
    pub async fn handle(&mut self, request: &BridgeRequest) -> BridgeResponse {
        match self {
            ServiceHandler::Editor(handler) => handler.handle(request).await,
            ServiceHandler::Audio(handler) => handler.handle(request).await,
            ServiceHandler::Speech(handler) => handler.handle(request).await,
        }
    }
}

/// Options that come from the daemon's command line rather than `services.json`.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    pub translator: PathTranslator,
    pub speech_max_age: Duration,
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<Service, ServiceHandler>,
}

impl HandlerRegistry {
    /// One handler per enabled service in `config`.
    pub fn from_config(
        config: &ServicesConfig,
        options: &HandlerOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let mut registry = Self::default();

        if let Some(editor) = config.editor.as_ref().filter(|c| c.settings.enabled) {
            registry.register(ServiceHandler::Editor(EditorHandler::new(
                editor,
                options.translator.clone(),
                runner.clone(),
            )));
        }
        if let Some(audio) = config.audio.as_ref().filter(|c| c.settings.enabled) {
            registry.register(ServiceHandler::Audio(AudioHandler::new(
                audio,
                runner.clone(),
            )));
        }
        if let Some(speech) = config.speech.as_ref().filter(|c| c.settings.enabled) {
            registry.register(ServiceHandler::Speech(SpeechHandler::new(
                speech,
                options.speech_max_age,
                runner,
            )));
        }

        for service in Service::ALL {
            if !registry.handlers.contains_key(&service) {
                info!("Service {} is disabled; its queue will not be polled", service);
            }
        }

        registry
    }

    pub fn register(&mut self, handler: ServiceHandler) {
        self.handlers.insert(handler.service(), handler);
    }

    pub fn get_mut(&mut self, service: Service) -> Option<&mut ServiceHandler> {
        self.handlers.get_mut(&service)
    }

    pub fn services(&self) -> Vec<Service> {
        self.handlers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Convert a handler outcome into the response that gets written back.
pub(crate) fn into_response(
    service: Service,
    id: Uuid,
    outcome: BridgeResult<BridgeResponse>,
) -> BridgeResponse {
    match outcome {
        Ok(response) => response,
        Err(err) => {
            error!("{} request {} failed: {}", service, id, err);
            BridgeResponse::error(id, err.to_string())
        }
    }
}

pub(crate) fn unknown_action(service: Service, request: &BridgeRequest) -> BridgeError {
    BridgeError::UnknownAction {
        service,
        action: request.action.clone(),
    }
}
