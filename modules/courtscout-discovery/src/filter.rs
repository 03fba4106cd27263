//! Classification of raw provider results into plausible court candidates.
//!
//! Pure functions: no I/O, no state. Rules are evaluated in order and the
//! first match wins; the blacklist always takes precedence over sport
//! keywords, so "Ace Tennis Pro Shop" stays out of the directory.

use courtscout_common::{NormalizedCourt, OpeningHours, PhotoRef, Sport};
use places_client::RawPlaceDetails;

/// Substrings that mark a business as something other than a playable
/// venue, matched against the lowercased name+address. Space-prefixed
/// entries avoid tripping on words that merely contain them
/// ("Bishop Park", "Restoration Green").
const BLACKLIST_TERMS: &[&str] = &[
    // retail
    " shop",
    " store",
    "retail",
    "outlet",
    // corporate entities
    " inc.",
    " llc",
    " corp",
    " ltd",
    "gmbh",
    // domain-like names
    ".com",
    ".net",
    ".org",
    // manufacturing / distribution
    "warehouse",
    "wholesale",
    "factory",
    "manufactur",
    "distribut",
    " supply",
    " supplies",
    // generic education
    "tutoring",
    "learning center",
    "driving school",
    "preschool",
    "daycare",
    "childcare",
    // generic services
    "repair",
    "plumbing",
    "roofing",
    "salon",
    "dental",
    "law office",
    "insurance",
    // real estate
    "realty",
    "real estate",
    "apartment",
    "mortgage",
];

/// Provider category tags that disqualify a place outright.
const EXCLUDED_CATEGORIES: &[&str] = &[
    "clothing_store",
    "sporting_goods_store",
    "store",
    "shoe_store",
    "electronics_store",
    "shopping_mall",
    "department_store",
    "insurance_agency",
    "finance",
    "real_estate_agency",
];

/// Provider category tags that make a place plausible as a court venue.
const RELEVANT_CATEGORIES: &[&str] = &[
    "establishment",
    "point_of_interest",
    "park",
    "gym",
    "sports_complex",
    "stadium",
    "school",
    "university",
    "recreation",
    "tourist_attraction",
];

/// Sport and venue keywords accepted in a place name.
const NAME_KEYWORDS: &[&str] = &[
    "tennis",
    "pickleball",
    "basketball",
    "volleyball",
    "badminton",
    "squash",
    "racquetball",
    "court",
    "courts",
    "club",
    "center",
    "centre",
    "complex",
    "facility",
    "park",
    "recreation",
    "sports",
    "athletic",
    "country club",
    "racquet",
    "racket",
];

#[derive(Debug)]
pub enum Classified {
    Accepted(NormalizedCourt),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    PermanentlyClosed,
    BlacklistedTerm(String),
    ExcludedCategory(String),
    NotCourtLike,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::PermanentlyClosed => write!(f, "permanently closed"),
            RejectReason::BlacklistedTerm(term) => write!(f, "blacklisted term '{term}'"),
            RejectReason::ExcludedCategory(cat) => write!(f, "excluded category '{cat}'"),
            RejectReason::NotCourtLike => write!(f, "no court-like keyword or category"),
        }
    }
}

/// Classify one place-details result for a sport. Rules in order, first
/// match wins.
pub fn classify(details: &RawPlaceDetails, sport: &Sport) -> Classified {
    // 1. Closed businesses are never candidates.
    if details.permanently_closed() {
        return Classified::Rejected(RejectReason::PermanentlyClosed);
    }

    // 2. Blacklist over combined name+address, ahead of any acceptance rule.
    let haystack = format!(
        "{} {}",
        details.name,
        details.formatted_address.as_deref().unwrap_or("")
    )
    .to_lowercase();
    if let Some(term) = BLACKLIST_TERMS.iter().find(|t| haystack.contains(*t)) {
        return Classified::Rejected(RejectReason::BlacklistedTerm(term.trim().to_string()));
    }

    // 3. Category exclusions.
    if let Some(cat) = details
        .types
        .iter()
        .find(|t| EXCLUDED_CATEGORIES.contains(&t.as_str()))
    {
        return Classified::Rejected(RejectReason::ExcludedCategory(cat.clone()));
    }

    // 4. Acceptance: keyword in name, relevant category, or park.
    let name = details.name.to_lowercase();
    let keyword_match = NAME_KEYWORDS.iter().any(|k| name.contains(k));
    let category_match = details
        .types
        .iter()
        .any(|t| RELEVANT_CATEGORIES.contains(&t.as_str()));
    let is_park = details.types.iter().any(|t| t == "park") || name.contains("park");

    if keyword_match || category_match || is_park {
        Classified::Accepted(normalize(details, sport))
    } else {
        Classified::Rejected(RejectReason::NotCourtLike)
    }
}

/// Map provider fields onto the court attribute shape. Coordinates come
/// from a single geometry source, so they are both present or both
/// absent by construction.
fn normalize(details: &RawPlaceDetails, sport: &Sport) -> NormalizedCourt {
    let location = details.geometry.as_ref().map(|g| g.location);
    NormalizedCourt {
        name: details.name.clone(),
        sport: sport.clone(),
        address: details.formatted_address.clone(),
        latitude: location.map(|l| l.lat),
        longitude: location.map(|l| l.lng),
        external_place_id: Some(details.place_id.clone()),
        external_rating: details.rating,
        external_rating_count: details.user_ratings_total,
        phone_number: details.formatted_phone_number.clone(),
        website_url: details.website.clone(),
        opening_hours: details.opening_hours.as_ref().map(|h| OpeningHours {
            open_now: h.open_now,
            periods: h.periods.clone(),
            weekday_text: h.weekday_text.clone(),
        }),
        price_level: details.price_level,
        photos: details
            .photos
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|p| PhotoRef {
                reference: p.photo_reference.clone(),
                width: p.width,
                height: p.height,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use places_client::{Geometry, LatLng};

    fn details(name: &str, types: &[&str]) -> RawPlaceDetails {
        RawPlaceDetails {
            place_id: "p1".to_string(),
            name: name.to_string(),
            formatted_address: Some("123 Example Ave".to_string()),
            geometry: Some(Geometry {
                location: LatLng { lat: 40.789, lng: -73.961 },
            }),
            types: types.iter().map(|t| t.to_string()).collect(),
            business_status: Some("OPERATIONAL".to_string()),
            rating: Some(4.2),
            user_ratings_total: Some(87),
            formatted_phone_number: None,
            website: None,
            opening_hours: None,
            price_level: None,
            photos: None,
        }
    }

    fn tennis() -> Sport {
        Sport::new("tennis")
    }

    #[test]
    fn park_tennis_courts_accepted() {
        let result = classify(&details("Central Park Tennis Courts", &["park"]), &tennis());
        match result {
            Classified::Accepted(court) => {
                assert_eq!(court.name, "Central Park Tennis Courts");
                assert_eq!(court.external_place_id.as_deref(), Some("p1"));
            }
            Classified::Rejected(reason) => panic!("should accept: {reason}"),
        }
    }

    #[test]
    fn pro_shop_rejected_despite_sport_keyword() {
        let result = classify(&details("Ace Tennis Pro Shop", &["store"]), &tennis());
        match result {
            Classified::Rejected(RejectReason::BlacklistedTerm(term)) => {
                assert_eq!(term, "shop");
            }
            other => panic!("expected blacklist rejection, got {other:?}"),
        }
    }

    #[test]
    fn blacklist_checked_before_categories() {
        // Address carries the blacklist term; types would be excluded too,
        // but the blacklist fires first.
        let mut d = details("Riverside Racquet", &["sporting_goods_store"]);
        d.formatted_address = Some("Unit 4, Retail Park".to_string());
        match classify(&d, &tennis()) {
            Classified::Rejected(RejectReason::BlacklistedTerm(_)) => {}
            other => panic!("expected blacklist rejection, got {other:?}"),
        }
    }

    #[test]
    fn excluded_category_rejected() {
        let d = details("Grand Slam", &["sporting_goods_store"]);
        match classify(&d, &tennis()) {
            Classified::Rejected(RejectReason::ExcludedCategory(cat)) => {
                assert_eq!(cat, "sporting_goods_store");
            }
            other => panic!("expected category rejection, got {other:?}"),
        }
    }

    #[test]
    fn permanently_closed_rejected_first() {
        let mut d = details("Central Park Tennis Courts", &["park"]);
        d.business_status = Some("CLOSED_PERMANENTLY".to_string());
        match classify(&d, &tennis()) {
            Classified::Rejected(RejectReason::PermanentlyClosed) => {}
            other => panic!("expected closed rejection, got {other:?}"),
        }
    }

    #[test]
    fn relevant_category_accepts_without_name_keyword() {
        let d = details("Willowbrook Rec Dept", &["gym"]);
        assert!(matches!(classify(&d, &tennis()), Classified::Accepted(_)));
    }

    #[test]
    fn park_in_name_accepts_without_category() {
        let mut d = details("Overpeck Park", &[]);
        d.types.clear();
        assert!(matches!(classify(&d, &tennis()), Classified::Accepted(_)));
    }

    #[test]
    fn unrelated_business_rejected() {
        let mut d = details("Luigi's Trattoria", &["restaurant", "food"]);
        d.formatted_address = Some("9 Via Roma".to_string());
        match classify(&d, &tennis()) {
            Classified::Rejected(RejectReason::NotCourtLike) => {}
            other => panic!("expected not-court-like rejection, got {other:?}"),
        }
    }

    #[test]
    fn normalization_carries_enrichment_and_coordinates() {
        let mut d = details("Harbor Tennis Club", &["establishment"]);
        d.formatted_phone_number = Some("(555) 321-7654".to_string());
        d.website = Some("https://harbortennis.example".to_string());
        d.price_level = Some(2);
        match classify(&d, &tennis()) {
            Classified::Accepted(court) => {
                assert_eq!(court.coordinates(), Some((40.789, -73.961)));
                assert_eq!(court.phone_number.as_deref(), Some("(555) 321-7654"));
                assert_eq!(court.price_level, Some(2));
                assert_eq!(court.sport, tennis());
            }
            Classified::Rejected(reason) => panic!("should accept: {reason}"),
        }
    }

    #[test]
    fn missing_geometry_leaves_both_coordinates_absent() {
        let mut d = details("Harbor Tennis Club", &["establishment"]);
        d.geometry = None;
        match classify(&d, &tennis()) {
            Classified::Accepted(court) => {
                assert_eq!(court.latitude, None);
                assert_eq!(court.longitude, None);
            }
            Classified::Rejected(reason) => panic!("should accept: {reason}"),
        }
    }
}
