pub mod session;

pub use session::{AudioPreference, Coordinates, Session, Step};
