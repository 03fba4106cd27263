use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use courtscout_common::{haversine_m, Court, Lighting, Sport, Verified};
use courtscout_common::{DiscoverySource, VerificationStatus};

const COURT_COLUMNS: &str = "id, name, sport_types, address, latitude, longitude, surface_type, \
lighting, court_count, external_place_id, external_rating, external_rating_count, phone_number, \
website_url, opening_hours, price_level, photos, verification_status, discovery_source, \
created_by, created_at, updated_at";

/// Court repository over Postgres.
#[derive(Clone)]
pub struct PgCourtStore {
    pool: PgPool,
}

impl PgCourtStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new court. Returns false when a concurrent writer already
    /// claimed the same external place id, which is an expected outcome, not an
    /// error (the next pass merges into the winner).
    pub async fn insert(&self, court: &Court) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO courts (id, name, sport_types, address, latitude, longitude,
                surface_type, lighting, court_count, external_place_id, external_rating,
                external_rating_count, phone_number, website_url, opening_hours, price_level,
                photos, verification_status, discovery_source, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            ON CONFLICT (external_place_id) WHERE external_place_id IS NOT NULL DO NOTHING
            "#,
        )
        .bind(court.id)
        .bind(&court.name)
        .bind(sports_to_sql(&court.sport_types))
        .bind(&court.address)
        .bind(court.latitude)
        .bind(court.longitude)
        .bind(surface_to_sql(&court.surface_type))
        .bind(court.lighting.as_sql())
        .bind(court.court_count)
        .bind(&court.external_place_id)
        .bind(court.external_rating)
        .bind(court.external_rating_count)
        .bind(&court.phone_number)
        .bind(&court.website_url)
        .bind(json_opt(&court.opening_hours)?)
        .bind(court.price_level)
        .bind(json_opt(&court.photos)?)
        .bind(court.verification_status.as_str())
        .bind(court.discovery_source.as_str())
        .bind(&court.created_by)
        .bind(court.created_at)
        .bind(court.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Persist the enrichment fields of an already-merged court.
    /// Name, address, coordinates, and verification status stay untouched.
    pub async fn update_enrichment(&self, court: &Court) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE courts
            SET external_rating = $2,
                external_rating_count = $3,
                phone_number = $4,
                website_url = $5,
                opening_hours = $6,
                price_level = $7,
                photos = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(court.id)
        .bind(court.external_rating)
        .bind(court.external_rating_count)
        .bind(&court.phone_number)
        .bind(&court.website_url)
        .bind(json_opt(&court.opening_hours)?)
        .bind(court.price_level)
        .bind(json_opt(&court.photos)?)
        .bind(court.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_external_id(&self, external_place_id: &str) -> Result<Option<Court>> {
        let row = sqlx::query(&format!(
            "SELECT {COURT_COLUMNS} FROM courts WHERE external_place_id = $1"
        ))
        .bind(external_place_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_court).transpose()
    }

    /// Case-insensitive name lookup, restricted to geocoded courts;
    /// the tier-2 dedup candidate set.
    pub async fn find_by_name_ci(&self, name: &str) -> Result<Vec<Court>> {
        let rows = sqlx::query(&format!(
            "SELECT {COURT_COLUMNS} FROM courts \
             WHERE LOWER(name) = LOWER($1) AND latitude IS NOT NULL"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_court).collect()
    }

    /// All geocoded courts within `radius_m` of a point. Bounding-box
    /// prefilter in SQL, haversine refinement here.
    pub async fn find_in_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Result<Vec<Court>> {
        let (lat_delta, lng_delta) = bounding_deltas(latitude, radius_m);

        let rows = sqlx::query(&format!(
            "SELECT {COURT_COLUMNS} FROM courts \
             WHERE latitude BETWEEN $1 AND $2 AND longitude BETWEEN $3 AND $4"
        ))
        .bind(latitude - lat_delta)
        .bind(latitude + lat_delta)
        .bind(longitude - lng_delta)
        .bind(longitude + lng_delta)
        .fetch_all(&self.pool)
        .await?;

        let mut courts = Vec::new();
        for row in rows {
            let court = row_to_court(row)?;
            if let Some((lat, lng)) = court.coordinates() {
                if haversine_m(latitude, longitude, lat, lng) <= radius_m {
                    courts.push(court);
                }
            }
        }
        Ok(courts)
    }
}

/// Degree half-widths of a bounding box that encloses a `radius_m`
/// circle at the given latitude. One degree of latitude is ~111,320 m;
/// a degree of longitude shrinks by cos(latitude), clamped so the
/// pole-adjacent case degenerates to a wide box instead of dividing
/// by zero.
fn bounding_deltas(latitude: f64, radius_m: f64) -> (f64, f64) {
    let lat_delta = radius_m / 111_320.0;
    let lng_delta = radius_m / (111_320.0 * latitude.to_radians().cos().abs().max(1e-6));
    (lat_delta, lng_delta)
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

fn sports_to_sql(sports: &[Sport]) -> Vec<String> {
    sports.iter().map(|s| s.as_str().to_string()).collect()
}

/// The original stores `'?'` for "unknown, not yet verified" and SQL NULL
/// for "verified absent". Preserved as-is.
fn surface_to_sql(surface: &Verified<String>) -> Option<String> {
    match surface {
        Verified::Unknown => Some("?".to_string()),
        Verified::Absent => None,
        Verified::Known(v) => Some(v.clone()),
    }
}

fn surface_from_sql(value: Option<String>) -> Verified<String> {
    match value.as_deref() {
        None => Verified::Absent,
        Some("?") => Verified::Unknown,
        Some(v) => Verified::Known(v.to_string()),
    }
}

fn json_opt<T: serde::Serialize>(value: &T) -> Result<Option<serde_json::Value>> {
    let json = serde_json::to_value(value)?;
    Ok(if json.is_null() { None } else { Some(json) })
}

fn row_to_court(row: sqlx::postgres::PgRow) -> Result<Court> {
    let sport_tags: Vec<String> = row.get("sport_types");
    let opening_hours: Option<serde_json::Value> = row.get("opening_hours");
    let photos: Option<serde_json::Value> = row.get("photos");
    let verification: String = row.get("verification_status");
    let source: String = row.get("discovery_source");

    Ok(Court {
        id: row.get::<Uuid, _>("id"),
        name: row.get("name"),
        sport_types: sport_tags.iter().map(|t| Sport::new(t)).collect(),
        address: row.get("address"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        surface_type: surface_from_sql(row.get("surface_type")),
        lighting: Lighting::from_sql(row.get("lighting")),
        court_count: row.get("court_count"),
        external_place_id: row.get("external_place_id"),
        external_rating: row.get("external_rating"),
        external_rating_count: row.get("external_rating_count"),
        phone_number: row.get("phone_number"),
        website_url: row.get("website_url"),
        opening_hours: opening_hours.map(serde_json::from_value).transpose()?,
        price_level: row.get("price_level"),
        photos: photos
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default(),
        verification_status: VerificationStatus::parse(&verification)
            .ok_or_else(|| anyhow::anyhow!("unknown verification_status '{verification}'"))?,
        discovery_source: DiscoverySource::parse(&source)
            .ok_or_else(|| anyhow::anyhow!("unknown discovery_source '{source}'"))?,
        created_by: row.get("created_by"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_sentinel_round_trip() {
        assert_eq!(surface_from_sql(Some("?".to_string())), Verified::Unknown);
        assert_eq!(surface_from_sql(None), Verified::Absent);
        assert_eq!(
            surface_from_sql(Some("clay".to_string())),
            Verified::Known("clay".to_string())
        );
        assert_eq!(surface_to_sql(&Verified::Unknown).as_deref(), Some("?"));
        assert_eq!(surface_to_sql(&Verified::Absent), None);
    }

    #[test]
    fn bounding_deltas_at_equator_are_symmetric() {
        let (lat_delta, lng_delta) = bounding_deltas(0.0, 1_000.0);
        assert!((lat_delta - lng_delta).abs() < 1e-12);
        // ~0.009 degrees per kilometer.
        assert!((lat_delta - 0.008983).abs() < 1e-4, "got {lat_delta}");
    }

    #[test]
    fn bounding_deltas_widen_longitude_at_high_latitude() {
        // cos(60°) = 0.5, so a degree of longitude covers half the meters.
        let (lat_delta, lng_delta) = bounding_deltas(60.0, 1_000.0);
        assert!((lng_delta / lat_delta - 2.0).abs() < 1e-9);
    }

    #[test]
    fn bounding_deltas_near_pole_stay_finite() {
        let (_, lng_delta) = bounding_deltas(90.0, 1_000.0);
        assert!(lng_delta.is_finite());
        // The clamp turns the box into an effectively global longitude
        // span rather than a division by zero.
        assert!(lng_delta > 360.0);
    }
}
