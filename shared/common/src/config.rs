use std::env;

const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Connection details for the downstream flow execution API.
#[derive(Clone, Debug)]
pub struct LangflowConfig {
    pub api_url: String,
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl LangflowConfig {
    /// Non-streaming run URL for the configured flow.
    pub fn run_url(&self) -> String {
        format!("{}/api/v1/run/{}?stream=false", self.api_url, self.endpoint)
    }
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub max_body_bytes: usize,
    pub langflow: LangflowConfig,
}

impl ServiceConfig {
    pub fn from_env(service_name: &str, default_port: u16) -> Result<Self, ConfigError> {
        Self::from_lookup(service_name, default_port, |key| env::var(key).ok())
    }

    /// Builds the config from any key/value source.  Blank values count as
    /// unset.
    pub fn from_lookup<F>(
        service_name: &str,
        default_port: u16,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("{} is not a valid port", raw),
            })?,
            None => default_port,
        };

        let max_body_bytes = match get("MAX_BODY_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "MAX_BODY_BYTES".to_string(),
                    message: format!("{} is not a positive byte count", raw),
                })?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let log_level = get("RUST_LOG")
            .or_else(|| get("LOG_LEVEL").map(|level| level.to_ascii_lowercase()))
            .unwrap_or_else(|| "info".to_string());

        let langflow = LangflowConfig {
            api_url: required("LANGFLOW_API_URL")?.trim_end_matches('/').to_string(),
            endpoint: required("LANGFLOW_ENDPOINT")?,
            api_key: get("LANGFLOW_API_KEY"),
        };

        Ok(Self {
            service_name: service_name.to_string(),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            log_level,
            max_body_bytes,
            langflow,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
