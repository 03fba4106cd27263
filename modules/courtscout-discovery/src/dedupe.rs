//! Two-tier identity resolution for discovered courts.
//!
//! Tier 1: exact external-place-id match, authoritative and cheap.
//! Tier 2: case-insensitive name equality within 100 m great-circle
//! distance. This compensates for provider re-indexing of place ids and for
//! independent discovery of the same physical court. The 100 m bound
//! keeps two same-named branches of a chain from merging.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use courtscout_common::{haversine_m, Court, NormalizedCourt};

use crate::traits::CourtStore;

/// Tier-2 proximity bound in meters.
pub const PROXIMITY_THRESHOLD_M: f64 = 100.0;

#[derive(Debug)]
pub enum ResolveAction {
    Insert,
    Merge { existing: Court },
}

/// What actually happened when a candidate was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted,
    Merged,
    /// A concurrent writer claimed the same external id between resolve
    /// and insert. Expected under racing jobs; the next pass merges.
    AlreadyExists,
}

pub struct Deduplicator {
    courts: Arc<dyn CourtStore>,
}

impl Deduplicator {
    pub fn new(courts: Arc<dyn CourtStore>) -> Self {
        Self { courts }
    }

    /// Decide whether a candidate is a new court or an update to a stored
    /// one. Re-executed per candidate; no locking (see DESIGN notes on
    /// the concurrent-insert race).
    pub async fn resolve(&self, candidate: &NormalizedCourt) -> Result<ResolveAction> {
        // Tier 1: external id is authoritative regardless of name/location.
        if let Some(external_id) = &candidate.external_place_id {
            if let Some(existing) = self.courts.find_by_external_id(external_id).await? {
                return Ok(ResolveAction::Merge { existing });
            }
        }

        // Tier 2: same name (case-insensitive) within 100 m. Nearest wins.
        if let Some((lat, lng)) = candidate.coordinates() {
            let same_named = self.courts.find_by_name_ci(&candidate.name).await?;
            let nearest = same_named
                .into_iter()
                .filter_map(|court| {
                    court
                        .coordinates()
                        .map(|(clat, clng)| (haversine_m(lat, lng, clat, clng), court))
                })
                .filter(|(dist, _)| *dist <= PROXIMITY_THRESHOLD_M)
                .min_by(|(a, _), (b, _)| a.total_cmp(b));

            if let Some((dist, existing)) = nearest {
                debug!(
                    name = candidate.name.as_str(),
                    distance_m = dist,
                    "Proximity match against stored court"
                );
                return Ok(ResolveAction::Merge { existing });
            }
        }

        Ok(ResolveAction::Insert)
    }

    /// Resolve and persist one candidate. Merges only touch enrichment
    /// fields (coalesce-on-write); inserts persist the full normalized
    /// record with created/updated stamps.
    pub async fn apply(&self, candidate: NormalizedCourt) -> Result<PersistOutcome> {
        let now = Utc::now();
        match self.resolve(&candidate).await? {
            ResolveAction::Merge { mut existing } => {
                existing.apply_enrichment(&candidate, now);
                self.courts.update_enrichment(&existing).await?;
                Ok(PersistOutcome::Merged)
            }
            ResolveAction::Insert => {
                let court = candidate.into_court(now);
                if self.courts.insert(&court).await? {
                    Ok(PersistOutcome::Inserted)
                } else {
                    Ok(PersistOutcome::AlreadyExists)
                }
            }
        }
    }
}
