//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use lumen_config::{
    ChatProviderConfig, Config, CorsConfig, HealthConfig, ImageGenConfig, ServerConfig, TaskProviderConfig,
};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal defaults with fast polling
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig::default(),
                    cors: None,
                },
                imagegen: ImageGenConfig {
                    task: TaskProviderConfig {
                        poll_interval: "10ms".to_owned(),
                        timeout: "100ms".to_owned(),
                        ..TaskProviderConfig::default()
                    },
                    ..ImageGenConfig::default()
                },
                telemetry: None,
            },
        }
    }

    /// Point the chat provider at a mock backend
    pub fn with_chat_provider(mut self, base_url: &str, api_key: &str) -> Self {
        self.config.imagegen.chat = ChatProviderConfig {
            api_key: Some(SecretString::from(api_key.to_owned())),
            base_url: Some(base_url.to_owned()),
            ..ChatProviderConfig::default()
        };
        self
    }

    /// Point the task provider at a mock backend
    pub fn with_task_provider(mut self, base_url: &str, api_key: &str) -> Self {
        self.config.imagegen.task.api_key = Some(SecretString::from(api_key.to_owned()));
        self.config.imagegen.task.base_url = Some(base_url.to_owned());
        self
    }

    /// Point both providers at a mock backend without configuring keys
    pub fn with_keyless_providers(mut self, base_url: &str) -> Self {
        self.config.imagegen.chat.base_url = Some(base_url.to_owned());
        self.config.imagegen.task.base_url = Some(base_url.to_owned());
        self
    }

    /// Override the polling cadence, e.g. ("5ms", "50ms")
    pub fn with_polling(mut self, interval: &str, timeout: &str) -> Self {
        interval.clone_into(&mut self.config.imagegen.task.poll_interval);
        timeout.clone_into(&mut self.config.imagegen.task.timeout);
        self
    }

    pub fn with_cors(mut self, config: CorsConfig) -> Self {
        self.config.server.cors = Some(config);
        self
    }

    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Validate and return the config
    pub fn build(self) -> Config {
        self.config.validate().expect("valid test config");
        self.config
    }
}
