//! One discovery pass over a search-area tuple.
//!
//! The runner fans out provider text searches for the sport's phrases,
//! deduplicates the raw results within the pass, fetches details for
//! each unique candidate, classifies, and persists through the
//! deduplicator. Provider errors fail the whole job (the queue retries);
//! a single candidate's persistence failure only dents the counts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use courtscout_common::SearchAreaKey;

use crate::dedupe::{Deduplicator, PersistOutcome};
use crate::error::DiscoveryError;
use crate::filter::{classify, Classified};
use crate::queue::{DiscoveryJobData, JobProcessor, ProgressSink};
use crate::terms::search_terms;
use crate::tracker::SearchAreaTracker;
use crate::traits::PlaceSearcher;

/// Pause between consecutive place-details fetches, to stay friendly to
/// provider rate limits.
pub const DETAIL_FETCH_DELAY: Duration = Duration::from_millis(100);

/// Tally of a single discovery pass.
#[derive(Debug, Default, Clone)]
pub struct DiscoveryOutcome {
    pub skipped: bool,
    pub cached_total_found: Option<i32>,
    pub cached_last_discovered_at: Option<DateTime<Utc>>,
    pub terms_searched: usize,
    pub raw_results: usize,
    pub unique_results: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub inserted: usize,
    pub merged: usize,
    pub candidate_failures: usize,
    pub elapsed: Duration,
}

impl DiscoveryOutcome {
    /// Courts that made it into the directory this pass.
    pub fn persisted(&self) -> usize {
        self.inserted + self.merged
    }
}

impl std::fmt::Display for DiscoveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.skipped {
            return write!(
                f,
                "skipped (area fresh, cached count {})",
                self.cached_total_found
                    .map_or_else(|| "unknown".to_string(), |n| n.to_string())
            );
        }
        write!(
            f,
            "{} terms, {} raw, {} unique, {} accepted, {} rejected, {} inserted, {} merged, {} candidate failures in {} ms",
            self.terms_searched,
            self.raw_results,
            self.unique_results,
            self.accepted,
            self.rejected,
            self.inserted,
            self.merged,
            self.candidate_failures,
            self.elapsed.as_millis(),
        )
    }
}

pub struct DiscoveryRunner {
    places: Arc<dyn PlaceSearcher>,
    dedupe: Deduplicator,
    tracker: SearchAreaTracker,
    detail_delay: Duration,
}

impl DiscoveryRunner {
    pub fn new(
        places: Arc<dyn PlaceSearcher>,
        dedupe: Deduplicator,
        tracker: SearchAreaTracker,
    ) -> Self {
        Self { places, dedupe, tracker, detail_delay: DETAIL_FETCH_DELAY }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn without_delay(mut self) -> Self {
        self.detail_delay = Duration::ZERO;
        self
    }

    pub async fn run(
        &self,
        data: &DiscoveryJobData,
        progress: &dyn ProgressSink,
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        let key = SearchAreaKey {
            latitude: data.latitude,
            longitude: data.longitude,
            radius_m: data.radius_m,
            sport: data.sport.clone(),
        };

        let started = Instant::now();
        let fresh = self
            .tracker
            .is_fresh(&key, SearchAreaTracker::default_fresh_window())
            .await
            .map_err(DiscoveryError::Store)?;
        progress.set(10);

        if fresh {
            let cached = self.tracker.cached(&key).await.map_err(DiscoveryError::Store)?;
            let outcome = DiscoveryOutcome {
                skipped: true,
                cached_total_found: cached.as_ref().and_then(|a| a.total_found),
                cached_last_discovered_at: cached.map(|a| a.last_discovered_at),
                elapsed: started.elapsed(),
                ..DiscoveryOutcome::default()
            };
            info!(
                sport = key.sport.as_str(),
                latitude = key.latitude,
                longitude = key.longitude,
                "Search area fresh; {outcome}"
            );
            progress.set(100);
            return Ok(outcome);
        }

        self.tracker
            .record_in_progress(&key)
            .await
            .map_err(DiscoveryError::Store)?;
        progress.set(25);

        match self.run_pass(data, progress).await {
            Ok(mut outcome) => {
                outcome.elapsed = started.elapsed();
                self.tracker
                    .record_completion(&key, outcome.persisted() as i32)
                    .await
                    .map_err(DiscoveryError::Store)?;
                progress.set(100);
                info!(
                    sport = key.sport.as_str(),
                    latitude = key.latitude,
                    longitude = key.longitude,
                    "Discovery pass finished: {outcome}"
                );
                Ok(outcome)
            }
            Err(err) => {
                // Keep the area stamped so an immediate re-enqueue of the
                // same tuple does not hammer the provider again.
                if let Err(store_err) = self.tracker.record_completion(&key, 0).await {
                    warn!(error = %store_err, "Failed to record aborted pass");
                }
                Err(err)
            }
        }
    }

    async fn run_pass(
        &self,
        data: &DiscoveryJobData,
        progress: &dyn ProgressSink,
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        let mut outcome = DiscoveryOutcome::default();

        let terms = search_terms(&data.sport);
        let mut raw = Vec::new();
        for term in &terms {
            let places = self
                .places
                .search_by_text(term, data.latitude, data.longitude, data.radius_m as u32)
                .await?;
            debug!(term = term.as_str(), results = places.len(), "Text search done");
            raw.extend(places);
        }
        outcome.terms_searched = terms.len();
        outcome.raw_results = raw.len();

        // The same venue surfaces under several phrases; keep first
        // occurrence order while dropping repeats.
        let mut seen = std::collections::HashSet::new();
        let candidates: Vec<_> = raw
            .into_iter()
            .filter(|p| seen.insert(p.place_id.clone()))
            .collect();
        outcome.unique_results = candidates.len();
        progress.set(40);

        let total = candidates.len();
        for (i, candidate) in candidates.into_iter().enumerate() {
            if i > 0 && !self.detail_delay.is_zero() {
                tokio::time::sleep(self.detail_delay).await;
            }

            let details = self.places.place_details(&candidate.place_id).await?;
            match classify(&details, &data.sport) {
                Classified::Rejected(reason) => {
                    outcome.rejected += 1;
                    debug!(name = details.name.as_str(), %reason, "Candidate rejected");
                }
                Classified::Accepted(normalized) => {
                    outcome.accepted += 1;
                    match self.dedupe.apply(normalized).await {
                        Ok(PersistOutcome::Inserted) => outcome.inserted += 1,
                        Ok(PersistOutcome::Merged) => outcome.merged += 1,
                        Ok(PersistOutcome::AlreadyExists) => {
                            debug!(
                                place_id = candidate.place_id.as_str(),
                                "Lost insert race; court already stored"
                            );
                        }
                        Err(err) => {
                            outcome.candidate_failures += 1;
                            warn!(
                                place_id = candidate.place_id.as_str(),
                                error = %err,
                                "Failed to persist candidate"
                            );
                        }
                    }
                }
            }
            progress.set(60 + ((i + 1) * 30 / total.max(1)) as u8);
        }

        Ok(outcome)
    }
}

/// Adapter that lets the queue drive discovery passes.
pub struct DiscoveryJobProcessor {
    runner: DiscoveryRunner,
}

impl DiscoveryJobProcessor {
    pub fn new(runner: DiscoveryRunner) -> Self {
        Self { runner }
    }
}

#[async_trait::async_trait]
impl JobProcessor for DiscoveryJobProcessor {
    async fn process(
        &self,
        data: &DiscoveryJobData,
        progress: &dyn ProgressSink,
    ) -> Result<(), DiscoveryError> {
        self.runner.run(data, progress).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryCourtStore, MemorySearchAreaStore, MockPlaces};
    use crate::traits::CourtStore;
    use courtscout_common::Sport;
    use places_client::{Geometry, LatLng, PlacesError, RawPlace, RawPlaceDetails};
    use std::sync::Mutex;

    fn raw(place_id: &str, name: &str) -> RawPlace {
        RawPlace {
            place_id: place_id.to_string(),
            name: name.to_string(),
            formatted_address: None,
            geometry: None,
            types: vec![],
            business_status: None,
        }
    }

    fn details(place_id: &str, name: &str, types: &[&str]) -> RawPlaceDetails {
        RawPlaceDetails {
            place_id: place_id.to_string(),
            name: name.to_string(),
            formatted_address: Some("12 River Rd".to_string()),
            geometry: Some(Geometry {
                location: LatLng { lat: 40.001, lng: -74.001 },
            }),
            types: types.iter().map(|t| t.to_string()).collect(),
            business_status: Some("OPERATIONAL".to_string()),
            rating: Some(4.4),
            user_ratings_total: Some(31),
            formatted_phone_number: None,
            website: None,
            opening_hours: None,
            price_level: None,
            photos: None,
        }
    }

    fn job() -> DiscoveryJobData {
        DiscoveryJobData {
            latitude: 40.0,
            longitude: -74.0,
            radius_m: 5_000,
            sport: Sport::new("tennis"),
        }
    }

    struct Harness {
        places: Arc<MockPlaces>,
        courts: Arc<MemoryCourtStore>,
        areas: Arc<MemorySearchAreaStore>,
        runner: DiscoveryRunner,
    }

    fn harness() -> Harness {
        let places = Arc::new(MockPlaces::default());
        let courts = Arc::new(MemoryCourtStore::default());
        let areas = Arc::new(MemorySearchAreaStore::default());
        let runner = DiscoveryRunner::new(
            places.clone(),
            Deduplicator::new(courts.clone()),
            SearchAreaTracker::new(areas.clone()),
        )
        .without_delay();
        Harness { places, courts, areas, runner }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<u8>>);

    impl ProgressSink for RecordingSink {
        fn set(&self, pct: u8) {
            self.0.lock().unwrap().push(pct);
        }
    }

    #[tokio::test]
    async fn full_pass_dedups_classifies_and_persists() {
        let h = harness();
        // Same venue returned by two phrases, plus a shop to reject.
        h.places
            .add_search("tennis court", vec![raw("p1", "Harbor Tennis Club"), raw("p2", "Ace Pro Shop")]);
        h.places.add_search("tennis club", vec![raw("p1", "Harbor Tennis Club")]);
        h.places
            .add_details(details("p1", "Harbor Tennis Club", &["establishment"]));
        h.places.add_details(details("p2", "Ace Pro Shop", &["store"]));

        let sink = RecordingSink::default();
        let outcome = h.runner.run(&job(), &sink).await.unwrap();

        assert!(!outcome.skipped);
        assert_eq!(outcome.terms_searched, 3);
        assert_eq!(outcome.raw_results, 3);
        assert_eq!(outcome.unique_results, 2);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.merged, 0);
        assert_eq!(outcome.persisted(), 1);

        let stored = h.courts.find_by_external_id("p1").await.unwrap();
        assert!(stored.is_some());

        // Completion recorded with the persisted count.
        let area = h.areas.get(&key_of(&job()));
        assert_eq!(area.unwrap().total_found, Some(1));

        let milestones = sink.0.lock().unwrap().clone();
        assert_eq!(milestones.first(), Some(&10));
        assert_eq!(milestones.last(), Some(&100));
        assert!(milestones.windows(2).all(|w| w[0] <= w[1]));
    }

    fn key_of(data: &DiscoveryJobData) -> SearchAreaKey {
        SearchAreaKey {
            latitude: data.latitude,
            longitude: data.longitude,
            radius_m: data.radius_m,
            sport: data.sport.clone(),
        }
    }

    #[tokio::test]
    async fn fresh_area_skips_without_touching_the_provider() {
        let h = harness();
        let k = key_of(&job());
        h.areas.seed_completed(&k, 9);

        let outcome = h.runner.run(&job(), &crate::queue::NoProgress).await.unwrap();
        assert!(outcome.skipped);
        assert_eq!(outcome.cached_total_found, Some(9));
        assert!(outcome.cached_last_discovered_at.is_some());
        assert_eq!(h.places.search_calls(), 0);
    }

    #[tokio::test]
    async fn second_run_right_after_the_first_is_skipped() {
        let h = harness();
        h.places.add_search("tennis court", vec![raw("p1", "Harbor Tennis Club")]);
        h.places
            .add_details(details("p1", "Harbor Tennis Club", &["establishment"]));

        let first = h.runner.run(&job(), &crate::queue::NoProgress).await.unwrap();
        assert!(!first.skipped);
        let second = h.runner.run(&job(), &crate::queue::NoProgress).await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.cached_total_found, Some(1));
    }

    #[tokio::test]
    async fn provider_search_failure_fails_the_job_but_stamps_the_area() {
        let h = harness();
        h.places.fail_searches(PlacesError::Api { status: "OVER_QUERY_LIMIT".to_string() });

        let err = h.runner.run(&job(), &crate::queue::NoProgress).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Provider(_)));
        assert!(err.retryable());

        // Aborted pass still records a zero-count completion.
        let area = h.areas.get(&key_of(&job())).unwrap();
        assert_eq!(area.total_found, Some(0));
    }

    #[tokio::test]
    async fn rediscovered_court_merges_instead_of_duplicating() {
        let h = harness();
        h.places.add_search("tennis court", vec![raw("p1", "Harbor Tennis Club")]);
        let mut d = details("p1", "Harbor Tennis Club", &["establishment"]);
        d.formatted_phone_number = Some("(555) 777-2222".to_string());
        h.places.add_details(d);

        let first = h.runner.run(&job(), &crate::queue::NoProgress).await.unwrap();
        assert_eq!(first.inserted, 1);

        // Expire the freshness stamp so the second pass actually runs.
        h.areas.backdate(&key_of(&job()), chrono::Duration::days(8));
        let second = h.runner.run(&job(), &crate::queue::NoProgress).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.merged, 1);

        let stored = h.courts.find_by_external_id("p1").await.unwrap().unwrap();
        assert_eq!(stored.phone_number.as_deref(), Some("(555) 777-2222"));
    }

    #[tokio::test]
    async fn candidate_persistence_failure_does_not_fail_the_pass() {
        let h = harness();
        h.places.add_search(
            "tennis court",
            vec![raw("p1", "Harbor Tennis Club"), raw("p2", "Dockside Courts")],
        );
        h.places
            .add_details(details("p1", "Harbor Tennis Club", &["establishment"]));
        h.places.add_details(details("p2", "Dockside Courts", &["park"]));
        h.courts.fail_next_insert();

        let outcome = h.runner.run(&job(), &crate::queue::NoProgress).await.unwrap();
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.candidate_failures, 1);
        assert_eq!(outcome.inserted, 1);
        // Completion count reflects only what was actually persisted.
        assert_eq!(h.areas.get(&key_of(&job())).unwrap().total_found, Some(1));
    }

    #[test]
    fn outcome_display_reads_like_a_summary() {
        let outcome = DiscoveryOutcome {
            terms_searched: 3,
            raw_results: 12,
            unique_results: 8,
            accepted: 5,
            rejected: 3,
            inserted: 4,
            merged: 1,
            ..DiscoveryOutcome::default()
        };
        let line = outcome.to_string();
        assert!(line.contains("8 unique"));
        assert!(line.contains("4 inserted"));

        let skipped = DiscoveryOutcome {
            skipped: true,
            cached_total_found: Some(7),
            ..DiscoveryOutcome::default()
        };
        assert!(skipped.to_string().contains("cached count 7"));
    }
}
