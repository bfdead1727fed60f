use crate::stack_trace::DEFAULT_MAX_STACK_BYTES;
use crate::telemetry_sink::{JsonLinesProvider, TelemetryTarget, DEFAULT_QUEUE_CAPACITY};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Config file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "loghook.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HookConfig {
    pub project_id: String,
    /// Remote log stream; empty disables remote logging.
    #[serde(default)]
    pub log_name: String,
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InstanceConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zone: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_target")]
    pub log_target: String,
    #[serde(default = "default_error_target")]
    pub error_target: String,
    #[serde(default = "default_max_stack_bytes")]
    pub max_stack_bytes: usize,
    /// Entries buffered per sink before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_log_target() -> String {
    "stdout".to_string()
}

fn default_error_target() -> String {
    "stderr".to_string()
}

fn default_max_stack_bytes() -> usize {
    DEFAULT_MAX_STACK_BYTES
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            log_target: default_log_target(),
            error_target: default_error_target(),
            max_stack_bytes: default_max_stack_bytes(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl HookConfig {
    /// Remote logging is only wired up when a log stream is named.
    pub fn remote_enabled(&self) -> bool {
        !self.log_name.trim().is_empty()
    }

    pub fn provider(&self) -> Result<JsonLinesProvider, figment::Error> {
        let log_target = self
            .output
            .log_target
            .parse::<TelemetryTarget>()
            .map_err(|e| figment::Error::from(e.to_string()))?;
        let error_target = self
            .output
            .error_target
            .parse::<TelemetryTarget>()
            .map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(JsonLinesProvider::new(log_target, error_target)
            .with_queue_capacity(self.output.queue_capacity))
    }
}

#[derive(Serialize)]
struct HookConfigDefaults {
    log_name: String,
    instance: InstanceConfig,
    output: OutputConfig,
}

/// Load configuration: defaults, then the TOML file, then `LOGHOOK_*` env.
pub fn load_config(path: Option<&str>) -> Result<HookConfig, figment::Error> {
    let figment = Figment::from(Serialized::defaults(HookConfigDefaults {
        log_name: String::new(),
        instance: InstanceConfig::default(),
        output: OutputConfig::default(),
    }))
    .merge(Toml::file(path.unwrap_or(DEFAULT_CONFIG_FILE)))
    .merge(Env::prefixed("LOGHOOK_").split("__"));

    let config: HookConfig = figment.extract()?;

    if config.project_id.trim().is_empty() {
        return Err(figment::Error::from("project_id must be set"));
    }

    Ok(config)
}
