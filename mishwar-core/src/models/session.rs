use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Latitude/longitude pair captured when the session is opened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// The dialogue states, in the order the booking flow walks them.
/// The only branch is at `AskAudio`: a Quran answer detours through
/// `AskReciter`, everything else goes straight to `Summary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    AskDestination,
    AskStart,
    AskTime,
    AskCar,
    AskAudio,
    AskReciter,
    Summary,
    Confirmed,
    Canceled,
}

impl Step {
    /// Position in the forward order. `Confirmed` and `Canceled` share
    /// the final phase; transitions must never decrease this value.
    pub fn phase(&self) -> u8 {
        match self {
            Step::AskDestination => 0,
            Step::AskStart => 1,
            Step::AskTime => 2,
            Step::AskCar => 3,
            Step::AskAudio => 4,
            Step::AskReciter => 5,
            Step::Summary => 6,
            Step::Confirmed | Step::Canceled => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Confirmed | Step::Canceled)
    }
}

/// In-ride audio choice. Anything that is not a Quran request is kept
/// as the user's raw wording (music, silence, whatever they typed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AudioPreference {
    Quran,
    Other(String),
}

/// One user's in-progress booking dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub step: Step,
    pub origin: Option<Coordinates>,
    pub origin_name: Option<String>,
    pub destination_name: Option<String>,
    pub departure_time: Option<String>,
    pub vehicle_type: Option<String>,
    pub audio: Option<AudioPreference>,
    pub reciter: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new(origin: Option<Coordinates>, origin_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            step: Step::AskDestination,
            origin,
            origin_name,
            destination_name: None,
            departure_time: None,
            vehicle_type: None,
            audio: None,
            reciter: None,
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_phases_are_monotone_in_declaration_order() {
        let order = [
            Step::AskDestination,
            Step::AskStart,
            Step::AskTime,
            Step::AskCar,
            Step::AskAudio,
            Step::AskReciter,
            Step::Summary,
            Step::Confirmed,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].phase() < pair[1].phase());
        }
        assert_eq!(Step::Confirmed.phase(), Step::Canceled.phase());
    }

    #[test]
    fn test_only_confirmed_and_canceled_are_terminal() {
        assert!(Step::Confirmed.is_terminal());
        assert!(Step::Canceled.is_terminal());
        assert!(!Step::Summary.is_terminal());
        assert!(!Step::AskDestination.is_terminal());
    }

    #[test]
    fn test_step_serializes_snake_case() {
        let json = serde_json::to_string(&Step::AskDestination).unwrap();
        assert_eq!(json, "\"ask_destination\"");
        let back: Step = serde_json::from_str("\"ask_reciter\"").unwrap();
        assert_eq!(back, Step::AskReciter);
    }

    #[test]
    fn test_new_session_starts_at_ask_destination() {
        let s = Session::new(
            Some(Coordinates { lat: 26.4, lng: 50.1 }),
            Some("الخبر".to_string()),
        );
        assert_eq!(s.step, Step::AskDestination);
        assert!(s.destination_name.is_none());
        assert!(s.audio.is_none());
        assert_eq!(s.created_at, s.last_active_at);
    }
}
