pub mod config;
pub mod dialogue;
pub mod error;
pub mod extract;
pub mod geocode;
pub mod models;
pub mod store;

pub use config::MishwarConfig;
pub use dialogue::{render_summary, DialogueEngine, Opening};
pub use error::MishwarError;
pub use extract::{ExtractError, ExtractorConfig, OpenAiExtractor, PlaceExtractor};
pub use geocode::{
    GeocodeConfig, GeocodeError, GoogleGeocodeClient, LocationResolver, RegionFilter,
};
pub use models::{AudioPreference, Coordinates, Session, Step};
pub use store::{SessionHandle, SessionStore};
