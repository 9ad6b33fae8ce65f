//! Dialogue engine — the booking-intake state machine
//!
//! Walks a session through the fixed question order
//! destination → origin → time → vehicle → audio (→ reciter) → summary,
//! then confirms or cancels. Location resolution failures keep the
//! session in place and ask the user to retry; nothing here returns an
//! error to the caller.

use std::sync::Arc;

use crate::config::MishwarConfig;
use crate::error::MishwarError;
use crate::extract::{ExtractorConfig, OpenAiExtractor, PlaceExtractor};
use crate::geocode::{GeocodeConfig, GoogleGeocodeClient, LocationResolver, RegionFilter};
use crate::models::{AudioPreference, Coordinates, Session, Step};

/// User-facing message texts. The dialogue speaks Arabic, matching the
/// market the service runs in.
pub mod messages {
    use crate::geocode::RegionFilter;

    pub const NEED_COORDINATES: &str =
        "لا أستطيع تحديد موقعك. الرجاء إرسال الإحداثيات أولاً.";
    pub const GREETING: &str = "مرحباً! إلى أين تريد الذهاب اليوم؟";
    pub const ASK_TIME: &str = "متى تريد الانطلاق؟";
    pub const ASK_CAR: &str = "ما نوع السيارة التي تفضلها؟ عادية أم VIP؟";
    pub const ASK_AUDIO: &str =
        "هل تود الاستماع إلى شيء أثناء الرحلة؟ يمكنك اختيار القرآن الكريم، الموسيقى، أو الصمت.";
    pub const ASK_RECITER: &str = "هل لديك قارئ مفضل أو نوع تلاوة تفضله؟";
    pub const CONFIRMED: &str = "تم تأكيد الحجز! ستصلك السيارة في الوقت المحدد.";
    pub const CANCELED: &str = "تم إلغاء الحجز بناءً على طلبك.";
    pub const SESSION_CLOSED: &str = "هذه الجلسة منتهية. أرسل إحداثياتك لبدء حجز جديد.";
    pub const MISSING_DESTINATION: &str = "لم أفهم الوجهة. إلى أين تريد الذهاب؟";
    pub const EXTRACTION_RETRY: &str =
        "عذراً، لم أستطع فهم الوجهة الآن. هل يمكنك إعادة صياغتها؟";
    pub const CONFIRM_PROMPT: &str = "هل تريد تأكيد الحجز بهذه التفاصيل؟";
    /// Origin shown when reverse geocoding gave nothing usable.
    pub const FALLBACK_ORIGIN: &str = "موقعك الحالي";
    /// Placeholder for a summary field that was never filled.
    pub const UNSET_FIELD: &str = "غير محدد";

    pub fn ask_start(origin: &str) -> String {
        format!(
            "هل تريد أن نأخذك من موقعك الحالي ({})، أم تفضل الانطلاق من مكان آخر؟",
            origin
        )
    }

    pub fn region_decline(filter: &RegionFilter) -> String {
        format!("عذراً، خدمتنا متاحة حالياً داخل {} فقط.", filter.name_ar)
    }

    pub fn retry_destination(filter: &RegionFilter) -> String {
        format!(
            "لم أجد هذه الوجهة داخل {}. هل يمكنك توضيح اسم المكان؟",
            filter.name_ar
        )
    }

    pub fn retry_origin(filter: &RegionFilter) -> String {
        format!(
            "لم أتمكن من تحديد نقطة الانطلاق داخل {}. حاول كتابة اسم المكان بدقة أكبر.",
            filter.name_ar
        )
    }
}

const CURRENT_LOCATION_SYNONYMS: [&str; 3] = ["موقعي", "موقعي الحالي", "الموقع الحالي"];
const QURAN_SYNONYMS: [&str; 3] = ["القرآن", "قرآن", "quran"];
const AFFIRMATIVE_SYNONYMS: [&str; 5] = ["نعم", "أجل", "أكيد", "نوافق", "yes"];

fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Render the booking summary followed by the confirmation prompt.
/// Pure function of the session; identical state renders identical text.
pub fn render_summary(session: &Session) -> String {
    let origin = session.origin_name.as_deref().unwrap_or(messages::UNSET_FIELD);
    let destination = session
        .destination_name
        .as_deref()
        .unwrap_or(messages::UNSET_FIELD);
    let time = session
        .departure_time
        .as_deref()
        .unwrap_or(messages::UNSET_FIELD);
    let car = session
        .vehicle_type
        .as_deref()
        .unwrap_or(messages::UNSET_FIELD);

    let mut summary = format!(
        "رحلتك من {} إلى {} في الساعة {} بسيارة {}",
        origin, destination, time, car
    );

    if session.audio == Some(AudioPreference::Quran) {
        summary.push_str("، مع تلاوة قرآنية");
        if let Some(reciter) = &session.reciter {
            summary.push_str(&format!(" بصوت {}", reciter));
        }
    }

    summary.push_str(". ");
    summary.push_str(messages::CONFIRM_PROMPT);
    summary
}

/// Outcome of trying to open a session from a coordinate pair.
pub enum Opening {
    Accepted { session: Session, greeting: String },
    Declined { message: String },
}

pub struct DialogueEngine {
    resolver: Arc<dyn LocationResolver>,
    extractor: Arc<dyn PlaceExtractor>,
    region: Option<RegionFilter>,
}

impl DialogueEngine {
    pub fn new(
        resolver: Arc<dyn LocationResolver>,
        extractor: Arc<dyn PlaceExtractor>,
        region: Option<RegionFilter>,
    ) -> Self {
        Self {
            resolver,
            extractor,
            region,
        }
    }

    pub fn region(&self) -> Option<&RegionFilter> {
        self.region.as_ref()
    }

    /// Wire an engine to the real collaborator clients from configuration.
    /// API keys come from the environment; a missing key fails here,
    /// before the server starts taking traffic.
    pub fn from_config(config: &MishwarConfig) -> Result<Self, MishwarError> {
        let resolver = GoogleGeocodeClient::with_base_url(
            GeocodeConfig::from_maps_config(&config.maps),
            config.maps.base_url.clone(),
        )?;
        let extractor = OpenAiExtractor::with_base_url(
            ExtractorConfig::from_llm_config(&config.llm),
            config.llm.base_url.clone(),
        )?;
        let region = config
            .region
            .restricted
            .then(|| RegionFilter::from_config(&config.region));

        Ok(Self::new(Arc::new(resolver), Arc::new(extractor), region))
    }

    /// Open a session at the given coordinates.
    ///
    /// Unrestricted mode always accepts: the origin name is reverse
    /// geocoded best-effort, with a generic placeholder when the lookup
    /// gives nothing. Region-restricted mode requires the coordinates to
    /// reverse-geocode inside the region, otherwise no session exists.
    pub async fn open_session(&self, lat: f64, lng: f64) -> Opening {
        match &self.region {
            None => {
                let origin_name = match self.resolver.resolve_reverse(lat, lng, None).await {
                    Ok(Some(address)) => address,
                    Ok(None) => messages::FALLBACK_ORIGIN.to_string(),
                    Err(e) => {
                        tracing::warn!(error = %e, "reverse geocoding failed, using placeholder origin");
                        messages::FALLBACK_ORIGIN.to_string()
                    }
                };
                let session = Session::new(Some(Coordinates { lat, lng }), Some(origin_name));
                tracing::info!(session_id = %session.id, "session opened");
                Opening::Accepted {
                    session,
                    greeting: messages::GREETING.to_string(),
                }
            }
            Some(filter) => {
                let resolved = match self.resolver.resolve_reverse(lat, lng, Some(filter)).await {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        tracing::warn!(error = %e, "reverse geocoding failed during region check");
                        None
                    }
                };
                match resolved {
                    Some(address) => {
                        let session =
                            Session::new(Some(Coordinates { lat, lng }), Some(address));
                        tracing::info!(session_id = %session.id, "session opened in region");
                        Opening::Accepted {
                            session,
                            greeting: messages::GREETING.to_string(),
                        }
                    }
                    None => {
                        tracing::info!(lat, lng, "session refused: coordinates outside region");
                        Opening::Declined {
                            message: messages::region_decline(filter),
                        }
                    }
                }
            }
        }
    }

    /// Apply one user turn, mutating the session and returning the bot
    /// reply. Steps only ever move forward; a failed location resolution
    /// answers with guidance and leaves the step unchanged.
    pub async fn advance(&self, session: &mut Session, input: &str) -> String {
        session.touch();

        match session.step {
            Step::AskDestination => self.handle_destination(session, input).await,
            Step::AskStart => self.handle_start(session, input).await,
            Step::AskTime => {
                session.departure_time = Some(input.to_string());
                session.step = Step::AskCar;
                messages::ASK_CAR.to_string()
            }
            Step::AskCar => {
                session.vehicle_type = Some(input.to_string());
                session.step = Step::AskAudio;
                messages::ASK_AUDIO.to_string()
            }
            Step::AskAudio => {
                if QURAN_SYNONYMS.contains(&normalize(input).as_str()) {
                    session.audio = Some(AudioPreference::Quran);
                    session.step = Step::AskReciter;
                    messages::ASK_RECITER.to_string()
                } else {
                    session.audio = Some(AudioPreference::Other(input.to_string()));
                    session.step = Step::Summary;
                    render_summary(session)
                }
            }
            Step::AskReciter => {
                session.reciter = Some(input.to_string());
                session.step = Step::Summary;
                render_summary(session)
            }
            Step::Summary => {
                if AFFIRMATIVE_SYNONYMS.contains(&normalize(input).as_str()) {
                    session.step = Step::Confirmed;
                    tracing::info!(session_id = %session.id, "booking confirmed");
                    messages::CONFIRMED.to_string()
                } else {
                    session.step = Step::Canceled;
                    tracing::info!(session_id = %session.id, "booking canceled");
                    messages::CANCELED.to_string()
                }
            }
            Step::Confirmed | Step::Canceled => messages::SESSION_CLOSED.to_string(),
        }
    }

    async fn handle_destination(&self, session: &mut Session, input: &str) -> String {
        if input.trim().is_empty() {
            return messages::MISSING_DESTINATION.to_string();
        }

        let candidate = match self.extractor.extract_place_name(input).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(error = %e, "destination extraction failed");
                return messages::EXTRACTION_RETRY.to_string();
            }
        };

        let destination = match &self.region {
            None => candidate,
            Some(filter) => {
                match self.resolver.resolve_forward(&candidate, Some(filter)).await {
                    Ok(Some(address)) => address,
                    Ok(None) => return messages::retry_destination(filter),
                    Err(e) => {
                        tracing::warn!(error = %e, "destination resolution failed");
                        return messages::retry_destination(filter);
                    }
                }
            }
        };

        session.destination_name = Some(destination);
        session.step = Step::AskStart;
        messages::ask_start(
            session
                .origin_name
                .as_deref()
                .unwrap_or(messages::FALLBACK_ORIGIN),
        )
    }

    async fn handle_start(&self, session: &mut Session, input: &str) -> String {
        if CURRENT_LOCATION_SYNONYMS.contains(&normalize(input).as_str()) {
            // keep the origin resolved when the session opened
        } else {
            match &self.region {
                None => session.origin_name = Some(input.to_string()),
                Some(filter) => {
                    match self.resolver.resolve_forward(input, Some(filter)).await {
                        Ok(Some(address)) => session.origin_name = Some(address),
                        Ok(None) => return messages::retry_origin(filter),
                        Err(e) => {
                            tracing::warn!(error = %e, "origin resolution failed");
                            return messages::retry_origin(filter);
                        }
                    }
                }
            }
        }

        session.step = Step::AskTime;
        messages::ASK_TIME.to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
