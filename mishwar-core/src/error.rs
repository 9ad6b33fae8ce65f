use thiserror::Error;

#[derive(Error, Debug)]
pub enum MishwarError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Geocoding error: {0}")]
    Geocode(#[from] crate::geocode::GeocodeError),

    #[error("Extraction error: {0}")]
    Extract(#[from] crate::extract::ExtractError),
}
