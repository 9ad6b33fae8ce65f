use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct MishwarConfig {
    pub service: ServiceConfig,
    pub maps: MapsConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub region: RegionConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

/// Geocoding provider settings. The API key is not part of the file;
/// it is read from `GOOGLE_MAPS_API_KEY` at client construction.
#[derive(Debug, Deserialize, Clone)]
pub struct MapsConfig {
    pub base_url: String,
    pub language: String,
    pub region_bias: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

/// Chat-completion provider settings. The API key comes from
/// `OPENAI_API_KEY` at client construction.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

/// Region-restricted mode: when enabled, every resolved location
/// (origin at creation, destination, manual origin) must carry an
/// address component matching one of the two labels.
#[derive(Debug, Deserialize, Clone)]
pub struct RegionConfig {
    pub restricted: bool,
    pub name_ar: String,
    pub name_en: String,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            restricted: false,
            name_ar: "منطقة الرياض".to_string(),
            name_en: "Riyadh".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub sweep_interval_minutes: u64,
    pub idle_ttl_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_minutes: 15,
            idle_ttl_minutes: 120,
        }
    }
}

impl MishwarConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
