use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Geo ---

/// Haversine great-circle distance between two lat/lng points in meters.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

// --- Sport ---

/// A sport tag. Lowercased on construction so "Tennis" and "tennis" are
/// the same search-area tuple and the same court tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sport(String);

impl Sport {
    pub fn new(tag: &str) -> Self {
        Self(tag.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VerificationStatus::Pending),
            "verified" => Some(VerificationStatus::Verified),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    UserSuggestion,
    GooglePlaces,
    Manual,
}

impl DiscoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoverySource::UserSuggestion => "user_suggestion",
            DiscoverySource::GooglePlaces => "google_places",
            DiscoverySource::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user_suggestion" => Some(DiscoverySource::UserSuggestion),
            "google_places" => Some(DiscoverySource::GooglePlaces),
            "manual" => Some(DiscoverySource::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a court has lights. `Unknown` means never verified, distinct
/// from a verified "no lights".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lighting {
    Yes,
    No,
    #[default]
    Unknown,
}

impl Lighting {
    pub fn as_sql(&self) -> Option<bool> {
        match self {
            Lighting::Yes => Some(true),
            Lighting::No => Some(false),
            Lighting::Unknown => None,
        }
    }

    pub fn from_sql(value: Option<bool>) -> Self {
        match value {
            Some(true) => Lighting::Yes,
            Some(false) => Lighting::No,
            None => Lighting::Unknown,
        }
    }
}

/// A verification-gated attribute. `Unknown` means discovery never checked
/// it (the original stores a `'?'` sentinel); `Absent` means it was
/// verified to have no value. Downstream display depends on the
/// distinction, so the two must not collapse.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum Verified<T> {
    #[default]
    Unknown,
    Absent,
    Known(T),
}

impl<T> Verified<T> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Verified::Unknown)
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Verified::Known(v) => Some(v),
            _ => None,
        }
    }
}

// --- Court ---

/// Structured opening hours carried over from the provider. Periods stay
/// opaque JSON; nothing in the pipeline interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
    #[serde(default)]
    pub open_now: Option<bool>,
    #[serde(default)]
    pub periods: Option<serde_json::Value>,
    #[serde(default)]
    pub weekday_text: Option<Vec<String>>,
}

/// Provider photo reference plus dimensions. Never bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub reference: String,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
}

/// Canonical directory entity: one physical sports-court venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Court {
    pub id: Uuid,
    pub name: String,
    pub sport_types: Vec<Sport>,
    pub address: Option<String>,
    /// Both present or both absent, enforced at the data layer.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub surface_type: Verified<String>,
    pub lighting: Lighting,
    pub court_count: Option<i32>,
    /// Unique across all courts when non-null; the tier-1 dedup key.
    pub external_place_id: Option<String>,
    pub external_rating: Option<f64>,
    pub external_rating_count: Option<i32>,
    pub phone_number: Option<String>,
    pub website_url: Option<String>,
    pub opening_hours: Option<OpeningHours>,
    pub price_level: Option<i32>,
    pub photos: Vec<PhotoRef>,
    pub verification_status: VerificationStatus,
    pub discovery_source: DiscoverySource,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Court {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Coalesce-on-write merge of enrichment fields from a discovery
    /// candidate. Only overwrites a field when the candidate supplies a
    /// value. Name, address, coordinates, verification status, and
    /// identity are never touched here.
    pub fn apply_enrichment(&mut self, candidate: &NormalizedCourt, now: DateTime<Utc>) {
        if let Some(rating) = candidate.external_rating {
            self.external_rating = Some(rating);
        }
        if let Some(count) = candidate.external_rating_count {
            self.external_rating_count = Some(count);
        }
        if let Some(phone) = &candidate.phone_number {
            self.phone_number = Some(phone.clone());
        }
        if let Some(website) = &candidate.website_url {
            self.website_url = Some(website.clone());
        }
        if let Some(hours) = &candidate.opening_hours {
            self.opening_hours = Some(hours.clone());
        }
        if let Some(level) = candidate.price_level {
            self.price_level = Some(level);
        }
        if !candidate.photos.is_empty() {
            self.photos = candidate.photos.clone();
        }
        self.updated_at = now;
    }
}

/// A provider result that passed the filter, normalized into the court
/// attribute shape but not yet persisted or deduplicated.
#[derive(Debug, Clone)]
pub struct NormalizedCourt {
    pub name: String,
    pub sport: Sport,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub external_place_id: Option<String>,
    pub external_rating: Option<f64>,
    pub external_rating_count: Option<i32>,
    pub phone_number: Option<String>,
    pub website_url: Option<String>,
    pub opening_hours: Option<OpeningHours>,
    pub price_level: Option<i32>,
    pub photos: Vec<PhotoRef>,
}

impl NormalizedCourt {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Materialize a brand-new Court from this candidate.
    /// Surface, lighting, and count start in their unverified states.
    pub fn into_court(self, now: DateTime<Utc>) -> Court {
        Court {
            id: Uuid::new_v4(),
            name: self.name,
            sport_types: vec![self.sport],
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            surface_type: Verified::Unknown,
            lighting: Lighting::Unknown,
            court_count: None,
            external_place_id: self.external_place_id,
            external_rating: self.external_rating,
            external_rating_count: self.external_rating_count,
            phone_number: self.phone_number,
            website_url: self.website_url,
            opening_hours: self.opening_hours,
            price_level: self.price_level,
            photos: self.photos,
            verification_status: VerificationStatus::Pending,
            discovery_source: DiscoverySource::GooglePlaces,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// --- Search areas ---

/// Natural key of the recency cache: "have we searched exactly this box
/// for this sport."
#[derive(Debug, Clone, PartialEq)]
pub struct SearchAreaKey {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: i32,
    pub sport: Sport,
}

/// Recency-cache row for one search-area tuple.
#[derive(Debug, Clone)]
pub struct SearchArea {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: i32,
    pub sport: Sport,
    pub last_discovered_at: DateTime<Utc>,
    /// Count from the most recent completed pass; None until one finishes.
    pub total_found: Option<i32>,
}

/// Aggregated (lat, lng) group from search-area history, feeding the
/// scheduler's adaptive fan-out.
#[derive(Debug, Clone)]
pub struct PopularArea {
    pub latitude: f64,
    pub longitude: f64,
    pub search_count: i64,
    pub avg_radius_m: f64,
    pub last_discovered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn haversine_sf_to_oakland() {
        // ~13.4 km
        let dist = haversine_m(37.7749, -122.4194, 37.8044, -122.2712);
        assert!(dist > 12_000.0 && dist < 15_000.0, "got {dist}");
    }

    #[test]
    fn haversine_same_point_is_zero() {
        let dist = haversine_m(44.9778, -93.265, 44.9778, -93.265);
        assert!(dist.abs() < 1e-9);
    }

    #[test]
    fn haversine_hundred_meters_scale() {
        // One ten-thousandth of a degree of latitude is about 11 m.
        let dist = haversine_m(40.0, -74.0, 40.0009, -74.0);
        assert!(dist > 90.0 && dist < 110.0, "got {dist}");
    }

    #[test]
    fn sport_is_lowercased() {
        assert_eq!(Sport::new("Tennis"), Sport::new("tennis"));
        assert_eq!(Sport::new(" Pickleball ").as_str(), "pickleball");
    }

    #[test]
    fn lighting_sql_round_trip() {
        assert_eq!(Lighting::from_sql(Lighting::Yes.as_sql()), Lighting::Yes);
        assert_eq!(Lighting::from_sql(Lighting::No.as_sql()), Lighting::No);
        assert_eq!(Lighting::from_sql(None), Lighting::Unknown);
    }

    fn candidate(name: &str) -> NormalizedCourt {
        NormalizedCourt {
            name: name.to_string(),
            sport: Sport::new("tennis"),
            address: Some("1 Main St".to_string()),
            latitude: Some(40.0),
            longitude: Some(-74.0),
            external_place_id: Some("p1".to_string()),
            external_rating: Some(4.5),
            external_rating_count: Some(10),
            phone_number: None,
            website_url: Some("https://courts.example".to_string()),
            opening_hours: None,
            price_level: None,
            photos: vec![],
        }
    }

    #[test]
    fn enrichment_merge_coalesces_and_preserves_identity() {
        let now = Utc::now();
        let mut court = candidate("Riverside Courts").into_court(now);
        court.name = "Riverside Courts (Old Name)".to_string();
        court.phone_number = Some("(555) 010-0000".to_string());
        court.external_rating = Some(3.9);

        let mut update = candidate("Riverside Courts");
        update.external_rating = Some(4.8);
        update.phone_number = None; // candidate has no phone: keep existing
        update.website_url = None; // likewise

        let later = now + chrono::Duration::hours(1);
        court.apply_enrichment(&update, later);

        assert_eq!(court.name, "Riverside Courts (Old Name)");
        assert_eq!(court.external_rating, Some(4.8));
        assert_eq!(court.phone_number.as_deref(), Some("(555) 010-0000"));
        assert_eq!(court.website_url.as_deref(), Some("https://courts.example"));
        assert_eq!(court.verification_status, VerificationStatus::Pending);
        assert_eq!(court.updated_at, later);
        assert_eq!(court.created_at, now);
    }

    #[test]
    fn new_court_starts_unverified() {
        let court = candidate("Club").into_court(Utc::now());
        assert!(court.surface_type.is_unknown());
        assert_eq!(court.lighting, Lighting::Unknown);
        assert_eq!(court.court_count, None);
        assert_eq!(court.verification_status, VerificationStatus::Pending);
        assert_eq!(court.discovery_source, DiscoverySource::GooglePlaces);
    }
}
