use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the reserved model is blank or the polling
    /// durations are invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_imagegen_config()?;
        self.validate_telemetry_config()?;
        self.warn_missing_keys();
        Ok(())
    }

    /// Validate generation provider configuration
    fn validate_imagegen_config(&self) -> anyhow::Result<()> {
        let imagegen = &self.imagegen;

        if imagegen.reserved_model.trim().is_empty() {
            anyhow::bail!("imagegen.reserved_model must not be empty");
        }

        if imagegen.chat.default_model.trim().is_empty() {
            anyhow::bail!("imagegen.chat.default_model must not be empty");
        }

        let interval = imagegen.task.poll_interval()?;
        let timeout = imagegen.task.timeout()?;

        if interval > timeout {
            anyhow::bail!("imagegen.task.poll_interval ({interval:?}) must not exceed imagegen.task.timeout ({timeout:?})");
        }

        Ok(())
    }

    fn validate_telemetry_config(&self) -> anyhow::Result<()> {
        let Some(otlp) = self.telemetry.as_ref().and_then(|t| t.otlp.as_ref()) else {
            return Ok(());
        };

        otlp.export_interval()?;

        if !(0.0..=1.0).contains(&otlp.sampling_rate) {
            anyhow::bail!("telemetry.otlp.sampling_rate must be between 0.0 and 1.0");
        }

        Ok(())
    }

    /// Keys may still arrive per request, so a missing key only warrants a warning
    fn warn_missing_keys(&self) {
        if self.imagegen.chat.api_key().is_none() {
            tracing::warn!("no API key configured for the chat provider; requests must supply one");
        }

        if self.imagegen.task.api_key().is_none() {
            tracing::warn!("no API key configured for the task provider; requests must supply one");
        }
    }
}
