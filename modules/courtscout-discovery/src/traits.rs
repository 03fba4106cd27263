// Trait abstractions for the discovery pipeline's dependencies.
//
// PlaceSearcher puts the external places provider behind one trait.
// CourtStore and SearchAreaStore cover the persistent collaborators.
//
// These enable deterministic testing with the in-memory fakes in
// `testing`: no network, no database, no Docker. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use courtscout_common::{Court, PopularArea, SearchArea, SearchAreaKey};
use places_client::{PlacesClient, RawPlace, RawPlaceDetails};

// ---------------------------------------------------------------------------
// PlaceSearcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PlaceSearcher: Send + Sync {
    /// Text search biased to a location + radius. Zero results is an
    /// empty list, not an error.
    async fn search_by_text(
        &self,
        query: &str,
        latitude: f64,
        longitude: f64,
        radius_m: u32,
    ) -> places_client::Result<Vec<RawPlace>>;

    /// Fetch the enriched details object for one place.
    async fn place_details(&self, place_id: &str) -> places_client::Result<RawPlaceDetails>;
}

#[async_trait]
impl PlaceSearcher for PlacesClient {
    async fn search_by_text(
        &self,
        query: &str,
        latitude: f64,
        longitude: f64,
        radius_m: u32,
    ) -> places_client::Result<Vec<RawPlace>> {
        PlacesClient::search_by_text(self, query, latitude, longitude, radius_m).await
    }

    async fn place_details(&self, place_id: &str) -> places_client::Result<RawPlaceDetails> {
        PlacesClient::place_details(self, place_id).await
    }
}

// ---------------------------------------------------------------------------
// CourtStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CourtStore: Send + Sync {
    /// Insert a new court. Returns false when a concurrent writer already
    /// claimed the same external place id (an "already exists" outcome).
    async fn insert(&self, court: &Court) -> Result<bool>;

    /// Persist enrichment fields of a merged court; identity fields are
    /// never written by this path.
    async fn update_enrichment(&self, court: &Court) -> Result<()>;

    /// Tier-1 dedup lookup.
    async fn find_by_external_id(&self, external_place_id: &str) -> Result<Option<Court>>;

    /// Tier-2 candidate set: case-insensitive name match, geocoded only.
    async fn find_by_name_ci(&self, name: &str) -> Result<Vec<Court>>;

    /// All geocoded courts within a radius of a point.
    async fn find_in_radius(&self, latitude: f64, longitude: f64, radius_m: f64)
        -> Result<Vec<Court>>;
}

#[async_trait]
impl CourtStore for courtscout_store::PgCourtStore {
    async fn insert(&self, court: &Court) -> Result<bool> {
        courtscout_store::PgCourtStore::insert(self, court).await
    }

    async fn update_enrichment(&self, court: &Court) -> Result<()> {
        courtscout_store::PgCourtStore::update_enrichment(self, court).await
    }

    async fn find_by_external_id(&self, external_place_id: &str) -> Result<Option<Court>> {
        courtscout_store::PgCourtStore::find_by_external_id(self, external_place_id).await
    }

    async fn find_by_name_ci(&self, name: &str) -> Result<Vec<Court>> {
        courtscout_store::PgCourtStore::find_by_name_ci(self, name).await
    }

    async fn find_in_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Result<Vec<Court>> {
        courtscout_store::PgCourtStore::find_in_radius(self, latitude, longitude, radius_m).await
    }
}

// ---------------------------------------------------------------------------
// SearchAreaStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SearchAreaStore: Send + Sync {
    async fn find_by_key(&self, key: &SearchAreaKey) -> Result<Option<SearchArea>>;

    /// Insert-or-touch: refresh the timestamp, keep any prior result count.
    async fn touch(&self, key: &SearchAreaKey, now: DateTime<Utc>) -> Result<()>;

    /// Record a completed pass (success or failure) with its result count.
    async fn complete(&self, key: &SearchAreaKey, count: i32, now: DateTime<Utc>) -> Result<()>;

    async fn popular(
        &self,
        since: DateTime<Utc>,
        min_searches: i64,
        limit: i64,
    ) -> Result<Vec<PopularArea>>;

    /// Delete rows untouched since the cutoff. Returns rows removed.
    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
impl SearchAreaStore for courtscout_store::PgSearchAreaStore {
    async fn find_by_key(&self, key: &SearchAreaKey) -> Result<Option<SearchArea>> {
        courtscout_store::PgSearchAreaStore::find_by_key(self, key).await
    }

    async fn touch(&self, key: &SearchAreaKey, now: DateTime<Utc>) -> Result<()> {
        courtscout_store::PgSearchAreaStore::touch(self, key, now).await
    }

    async fn complete(&self, key: &SearchAreaKey, count: i32, now: DateTime<Utc>) -> Result<()> {
        courtscout_store::PgSearchAreaStore::complete(self, key, count, now).await
    }

    async fn popular(
        &self,
        since: DateTime<Utc>,
        min_searches: i64,
        limit: i64,
    ) -> Result<Vec<PopularArea>> {
        courtscout_store::PgSearchAreaStore::popular(self, since, min_searches, limit).await
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        courtscout_store::PgSearchAreaStore::delete_stale(self, cutoff).await
    }
}
