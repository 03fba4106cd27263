//! In-memory fakes for the pipeline's collaborators. Deterministic,
//! synchronous under the hood, and good enough to exercise every path
//! the real provider and database would.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use courtscout_common::{haversine_m, Court, PopularArea, SearchArea, SearchAreaKey};
use places_client::{PlacesError, RawPlace, RawPlaceDetails};

use crate::traits::{CourtStore, PlaceSearcher, SearchAreaStore};

// ---------------------------------------------------------------------------
// MockPlaces
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockPlaces {
    searches: Mutex<HashMap<String, Vec<RawPlace>>>,
    details: Mutex<HashMap<String, RawPlaceDetails>>,
    search_error: Mutex<Option<PlacesError>>,
    details_error: Mutex<Option<PlacesError>>,
    search_calls: AtomicU32,
    details_calls: AtomicU32,
}

fn clone_error(err: &PlacesError) -> PlacesError {
    match err {
        PlacesError::MissingCredential => PlacesError::MissingCredential,
        PlacesError::Api { status } => PlacesError::Api { status: status.clone() },
        PlacesError::Network(msg) => PlacesError::Network(msg.clone()),
        PlacesError::Parse(msg) => PlacesError::Parse(msg.clone()),
    }
}

impl MockPlaces {
    /// Map an exact query string to its search results. Unmapped queries
    /// return empty, mirroring a ZERO_RESULTS response.
    pub fn add_search(&self, query: &str, places: Vec<RawPlace>) {
        self.searches.lock().unwrap().insert(query.to_string(), places);
    }

    pub fn add_details(&self, details: RawPlaceDetails) {
        self.details.lock().unwrap().insert(details.place_id.clone(), details);
    }

    pub fn fail_searches(&self, err: PlacesError) {
        *self.search_error.lock().unwrap() = Some(err);
    }

    pub fn fail_details(&self, err: PlacesError) {
        *self.details_error.lock().unwrap() = Some(err);
    }

    pub fn search_calls(&self) -> u32 {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn details_calls(&self) -> u32 {
        self.details_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaceSearcher for MockPlaces {
    async fn search_by_text(
        &self,
        query: &str,
        _latitude: f64,
        _longitude: f64,
        _radius_m: u32,
    ) -> places_client::Result<Vec<RawPlace>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.search_error.lock().unwrap().as_ref() {
            return Err(clone_error(err));
        }
        Ok(self.searches.lock().unwrap().get(query).cloned().unwrap_or_default())
    }

    async fn place_details(&self, place_id: &str) -> places_client::Result<RawPlaceDetails> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.details_error.lock().unwrap().as_ref() {
            return Err(clone_error(err));
        }
        self.details
            .lock()
            .unwrap()
            .get(place_id)
            .cloned()
            .ok_or_else(|| PlacesError::Api { status: "NOT_FOUND".to_string() })
    }
}

// ---------------------------------------------------------------------------
// MemoryCourtStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCourtStore {
    courts: Mutex<Vec<Court>>,
    /// External ids excluded from lookups while still enforcing the
    /// insert-time uniqueness conflict, for racing-writer scenarios.
    hidden: Mutex<HashSet<String>>,
    fail_next_insert: AtomicBool,
}

impl MemoryCourtStore {
    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    pub fn hide_from_lookups(&self, external_place_id: &str) {
        self.hidden.lock().unwrap().insert(external_place_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.courts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_hidden(&self, court: &Court) -> bool {
        court
            .external_place_id
            .as_ref()
            .is_some_and(|id| self.hidden.lock().unwrap().contains(id))
    }
}

#[async_trait]
impl CourtStore for MemoryCourtStore {
    async fn insert(&self, court: &Court) -> Result<bool> {
        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("injected insert failure"));
        }
        let mut courts = self.courts.lock().unwrap();
        if let Some(id) = &court.external_place_id {
            if courts.iter().any(|c| c.external_place_id.as_ref() == Some(id)) {
                return Ok(false);
            }
        }
        courts.push(court.clone());
        Ok(true)
    }

    async fn update_enrichment(&self, court: &Court) -> Result<()> {
        let mut courts = self.courts.lock().unwrap();
        match courts.iter_mut().find(|c| c.id == court.id) {
            Some(existing) => {
                *existing = court.clone();
                Ok(())
            }
            None => Err(anyhow!("court {} not found", court.id)),
        }
    }

    async fn find_by_external_id(&self, external_place_id: &str) -> Result<Option<Court>> {
        let courts = self.courts.lock().unwrap();
        Ok(courts
            .iter()
            .find(|c| {
                c.external_place_id.as_deref() == Some(external_place_id) && !self.is_hidden(c)
            })
            .cloned())
    }

    async fn find_by_name_ci(&self, name: &str) -> Result<Vec<Court>> {
        let courts = self.courts.lock().unwrap();
        Ok(courts
            .iter()
            .filter(|c| {
                c.name.eq_ignore_ascii_case(name)
                    && c.coordinates().is_some()
                    && !self.is_hidden(c)
            })
            .cloned()
            .collect())
    }

    async fn find_in_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Result<Vec<Court>> {
        let courts = self.courts.lock().unwrap();
        Ok(courts
            .iter()
            .filter(|c| {
                c.coordinates()
                    .is_some_and(|(lat, lng)| haversine_m(latitude, longitude, lat, lng) <= radius_m)
            })
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemorySearchAreaStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySearchAreaStore {
    areas: Mutex<Vec<SearchArea>>,
}

fn matches_key(area: &SearchArea, key: &SearchAreaKey) -> bool {
    area.latitude == key.latitude
        && area.longitude == key.longitude
        && area.radius_m == key.radius_m
        && area.sport == key.sport
}

impl MemorySearchAreaStore {
    pub fn get(&self, key: &SearchAreaKey) -> Option<SearchArea> {
        let areas = self.areas.lock().unwrap();
        areas.iter().find(|a| matches_key(a, key)).cloned()
    }

    pub fn seed_completed(&self, key: &SearchAreaKey, total_found: i32) {
        self.upsert(key, Some(total_found), Utc::now());
    }

    /// Shift a tuple's timestamp into the past.
    pub fn backdate(&self, key: &SearchAreaKey, by: Duration) {
        let mut areas = self.areas.lock().unwrap();
        if let Some(area) = areas.iter_mut().find(|a| matches_key(a, key)) {
            area.last_discovered_at -= by;
        }
    }

    fn upsert(&self, key: &SearchAreaKey, total_found: Option<i32>, now: DateTime<Utc>) {
        let mut areas = self.areas.lock().unwrap();
        match areas.iter_mut().find(|a| matches_key(a, key)) {
            Some(area) => {
                area.last_discovered_at = now;
                if total_found.is_some() {
                    area.total_found = total_found;
                }
            }
            None => areas.push(SearchArea {
                latitude: key.latitude,
                longitude: key.longitude,
                radius_m: key.radius_m,
                sport: key.sport.clone(),
                last_discovered_at: now,
                total_found,
            }),
        }
    }
}

#[async_trait]
impl SearchAreaStore for MemorySearchAreaStore {
    async fn find_by_key(&self, key: &SearchAreaKey) -> Result<Option<SearchArea>> {
        Ok(self.get(key))
    }

    async fn touch(&self, key: &SearchAreaKey, now: DateTime<Utc>) -> Result<()> {
        self.upsert(key, None, now);
        Ok(())
    }

    async fn complete(&self, key: &SearchAreaKey, count: i32, now: DateTime<Utc>) -> Result<()> {
        self.upsert(key, Some(count), now);
        Ok(())
    }

    async fn popular(
        &self,
        since: DateTime<Utc>,
        min_searches: i64,
        limit: i64,
    ) -> Result<Vec<PopularArea>> {
        let areas = self.areas.lock().unwrap();
        let mut groups: HashMap<(u64, u64), PopularArea> = HashMap::new();
        let mut radius_sums: HashMap<(u64, u64), f64> = HashMap::new();
        for area in areas.iter().filter(|a| a.last_discovered_at >= since) {
            let bucket = (area.latitude.to_bits(), area.longitude.to_bits());
            let entry = groups.entry(bucket).or_insert(PopularArea {
                latitude: area.latitude,
                longitude: area.longitude,
                search_count: 0,
                avg_radius_m: 0.0,
                last_discovered_at: area.last_discovered_at,
            });
            entry.search_count += 1;
            entry.last_discovered_at = entry.last_discovered_at.max(area.last_discovered_at);
            *radius_sums.entry(bucket).or_insert(0.0) += f64::from(area.radius_m);
        }

        let mut popular: Vec<PopularArea> = groups
            .into_iter()
            .map(|(bucket, mut area)| {
                area.avg_radius_m = radius_sums[&bucket] / area.search_count as f64;
                area
            })
            .filter(|a| a.search_count >= min_searches)
            .collect();
        popular.sort_by(|a, b| {
            b.search_count
                .cmp(&a.search_count)
                .then(b.last_discovered_at.cmp(&a.last_discovered_at))
        });
        popular.truncate(limit as usize);
        Ok(popular)
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut areas = self.areas.lock().unwrap();
        let before = areas.len();
        areas.retain(|a| a.last_discovered_at >= cutoff);
        Ok((before - areas.len()) as u64)
    }
}
