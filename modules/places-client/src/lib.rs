pub mod error;
pub mod types;

pub use error::{PlacesError, Result};
pub use types::{
    DetailsResponse, Geometry, LatLng, RawOpeningHours, RawPhoto, RawPlace, RawPlaceDetails,
    SearchResponse,
};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";

/// Field mask for place details. Requesting only what the pipeline
/// normalizes keeps the per-call billing tier down.
const DETAILS_FIELDS: &str = "place_id,name,formatted_address,geometry,types,business_status,\
rating,user_ratings_total,formatted_phone_number,website,opening_hours,price_level,photos";

/// Client for the Google Places JSON API (text search + place details).
///
/// Constructed with an optional API key; calls fail with
/// [`PlacesError::MissingCredential`] when no key is configured, so callers
/// can defer the configuration check to job start.
pub struct PlacesClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl PlacesClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or(PlacesError::MissingCredential)
    }

    /// Text search biased to a location + radius. `ZERO_RESULTS` is an
    /// empty list, not an error; any other non-OK status is an error
    /// carrying the upstream status string.
    pub async fn search_by_text(
        &self,
        query: &str,
        latitude: f64,
        longitude: f64,
        radius_m: u32,
    ) -> Result<Vec<RawPlace>> {
        let key = self.key()?;
        let url = format!("{BASE_URL}/textsearch/json");
        let location = format!("{latitude},{longitude}");
        let radius = radius_m.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("query", query),
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("key", key),
            ])
            .send()
            .await?;

        let http_status = resp.status();
        if !http_status.is_success() {
            return Err(PlacesError::Api {
                status: http_status.to_string(),
            });
        }

        let body: SearchResponse = resp.json().await?;
        match body.status.as_str() {
            "OK" => {
                tracing::debug!(query, count = body.results.len(), "Text search returned results");
                Ok(body.results)
            }
            "ZERO_RESULTS" => {
                tracing::debug!(query, "Text search returned zero results");
                Ok(Vec::new())
            }
            other => {
                tracing::warn!(
                    query,
                    status = other,
                    error = body.error_message.as_deref().unwrap_or(""),
                    "Text search failed"
                );
                Err(PlacesError::Api {
                    status: other.to_string(),
                })
            }
        }
    }

    /// Fetch the enriched details object for one place.
    pub async fn place_details(&self, place_id: &str) -> Result<RawPlaceDetails> {
        let key = self.key()?;
        let url = format!("{BASE_URL}/details/json");

        let resp = self
            .client
            .get(&url)
            .query(&[("place_id", place_id), ("fields", DETAILS_FIELDS), ("key", key)])
            .send()
            .await?;

        let http_status = resp.status();
        if !http_status.is_success() {
            return Err(PlacesError::Api {
                status: http_status.to_string(),
            });
        }

        let body: DetailsResponse = resp.json().await?;
        match body.status.as_str() {
            "OK" => body.result.ok_or_else(|| {
                PlacesError::Parse("OK details response missing result object".to_string())
            }),
            other => {
                tracing::warn!(place_id, status = other, "Place details failed");
                Err(PlacesError::Api {
                    status: other.to_string(),
                })
            }
        }
    }
}
