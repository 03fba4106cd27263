use serde::{Deserialize, Serialize};

/// Envelope for the text-search endpoint.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub results: Vec<RawPlace>,
}

/// Envelope for the place-details endpoint.
#[derive(Debug, Deserialize)]
pub struct DetailsResponse {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    pub result: Option<RawPlaceDetails>,
}

/// A single result from text search. Only the fields the discovery
/// pipeline depends on; everything else in the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlace {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub business_status: Option<String>,
}

/// The enriched object from place details.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaceDetails {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub business_status: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub user_ratings_total: Option<i32>,
    #[serde(default)]
    pub formatted_phone_number: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<RawOpeningHours>,
    #[serde(default)]
    pub price_level: Option<i32>,
    #[serde(default)]
    pub photos: Option<Vec<RawPhoto>>,
}

impl RawPlaceDetails {
    pub fn permanently_closed(&self) -> bool {
        self.business_status.as_deref() == Some("CLOSED_PERMANENTLY")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Opening hours as the provider reports them. Periods are carried
/// opaquely; only the open-now flag and weekday text are interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOpeningHours {
    #[serde(default)]
    pub open_now: Option<bool>,
    #[serde(default)]
    pub periods: Option<serde_json::Value>,
    #[serde(default)]
    pub weekday_text: Option<Vec<String>>,
}

/// Photo reference only, never bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPhoto {
    pub photo_reference: String,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_deserializes_minimal_result() {
        let body = r#"{
            "status": "OK",
            "results": [
                {"place_id": "abc123", "name": "Riverside Tennis Club"}
            ]
        }"#;
        let resp: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.status, "OK");
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.results[0].place_id, "abc123");
        assert!(resp.results[0].geometry.is_none());
        assert!(resp.results[0].types.is_empty());
    }

    #[test]
    fn zero_results_has_empty_list() {
        let body = r#"{"status": "ZERO_RESULTS", "results": []}"#;
        let resp: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.status, "ZERO_RESULTS");
        assert!(resp.results.is_empty());
    }

    #[test]
    fn details_response_deserializes_enriched_fields() {
        let body = r#"{
            "status": "OK",
            "result": {
                "place_id": "xyz",
                "name": "Central Park Tennis Courts",
                "formatted_address": "93rd St, New York, NY",
                "geometry": {"location": {"lat": 40.789, "lng": -73.961}},
                "types": ["park", "point_of_interest"],
                "business_status": "OPERATIONAL",
                "rating": 4.7,
                "user_ratings_total": 412,
                "formatted_phone_number": "(212) 555-0100",
                "website": "https://example.org",
                "opening_hours": {
                    "open_now": true,
                    "weekday_text": ["Monday: 6:00 AM - 10:00 PM"]
                },
                "price_level": 1,
                "photos": [{"photo_reference": "ref1", "width": 400, "height": 300}]
            }
        }"#;
        let resp: DetailsResponse = serde_json::from_str(body).unwrap();
        let details = resp.result.unwrap();
        assert_eq!(details.name, "Central Park Tennis Courts");
        assert_eq!(details.geometry.as_ref().unwrap().location.lat, 40.789);
        assert_eq!(details.user_ratings_total, Some(412));
        assert_eq!(details.photos.as_ref().unwrap()[0].photo_reference, "ref1");
        assert!(!details.permanently_closed());
    }

    #[test]
    fn closed_permanently_flag() {
        let body = r#"{"place_id": "p", "name": "Old Club", "business_status": "CLOSED_PERMANENTLY"}"#;
        let details: RawPlaceDetails = serde_json::from_str(body).unwrap();
        assert!(details.permanently_closed());
    }
}
