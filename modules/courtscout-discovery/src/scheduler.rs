//! Time-driven fan-out: three independent timers feeding the job queue.
//!
//! 1. Popular-area refresh (6 h): re-discover coordinates the tracker has
//!    seen searched recently, across every supported sport.
//! 2. Major-city sweep (daily): low-priority jobs for a fixed seed list,
//!    delayed at enqueue time so the daily burst trickles in.
//! 3. Stale purge (weekly): drop tracker rows untouched for 90 days.
//!
//! Constructed once at process start with its collaborators injected;
//! no ambient global state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use courtscout_common::Sport;

use crate::queue::{DiscoveryJobData, JobPriority, JobQueue};
use crate::terms::{CITY_RADIUS_M, MAJOR_CITIES, SUPPORTED_SPORTS};
use crate::tracker::{
    SearchAreaTracker, POPULAR_LIMIT, POPULAR_MIN_SEARCHES, POPULAR_SINCE_DAYS, STALE_AFTER_DAYS,
};

pub const POPULAR_REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
pub const CITY_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const STALE_PURGE_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Fixed enqueue-time offset for the low-priority city sweep.
pub const LOW_PRIORITY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct TimerStatus {
    pub name: &'static str,
    pub next_fire: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub running: bool,
    pub timers: Vec<TimerStatus>,
}

struct Timer {
    name: &'static str,
    interval: Duration,
    next_fire: Mutex<Option<DateTime<Utc>>>,
    /// Re-entrancy guard: a firing still in flight makes the next one skip.
    busy: AtomicBool,
}

impl Timer {
    fn new(name: &'static str, interval: Duration) -> Self {
        Self {
            name,
            interval,
            next_fire: Mutex::new(None),
            busy: AtomicBool::new(false),
        }
    }

    fn status(&self) -> TimerStatus {
        let next_fire = *self.next_fire.lock().unwrap_or_else(|e| e.into_inner());
        TimerStatus { name: self.name, next_fire }
    }

    fn clear(&self) {
        *self.next_fire.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.busy.store(false, Ordering::SeqCst);
    }
}

pub struct DiscoveryScheduler {
    queue: Arc<JobQueue>,
    tracker: Arc<SearchAreaTracker>,
    running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    popular_timer: Arc<Timer>,
    city_timer: Arc<Timer>,
    purge_timer: Arc<Timer>,
}

impl DiscoveryScheduler {
    pub fn new(queue: Arc<JobQueue>, tracker: Arc<SearchAreaTracker>) -> Self {
        Self {
            queue,
            tracker,
            running: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            popular_timer: Arc::new(Timer::new("popular-area-refresh", POPULAR_REFRESH_INTERVAL)),
            city_timer: Arc::new(Timer::new("major-city-sweep", CITY_SWEEP_INTERVAL)),
            purge_timer: Arc::new(Timer::new("stale-area-purge", STALE_PURGE_INTERVAL)),
        }
    }

    /// Spawn the three timer loops. Calling on an already-running
    /// scheduler is a logged no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running; ignoring start");
            return;
        }
        info!("Starting discovery scheduler");
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());

        let me = self.clone();
        tasks.push(tokio::spawn(async move {
            me.timer_loop(me.popular_timer.clone(), |s| async move {
                s.refresh_popular_areas().await;
            })
            .await;
        }));

        let me = self.clone();
        tasks.push(tokio::spawn(async move {
            me.timer_loop(me.city_timer.clone(), |s| async move {
                s.sweep_major_cities();
            })
            .await;
        }));

        let me = self.clone();
        tasks.push(tokio::spawn(async move {
            me.timer_loop(me.purge_timer.clone(), |s| async move {
                s.purge_stale_areas().await;
            })
            .await;
        }));
    }

    /// Cancel all timers and clear bookkeeping. No-op when not running.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping discovery scheduler");
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
        self.popular_timer.clear();
        self.city_timer.clear();
        self.purge_timer.clear();
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.running.load(Ordering::SeqCst),
            timers: vec![
                self.popular_timer.status(),
                self.city_timer.status(),
                self.purge_timer.status(),
            ],
        }
    }

    async fn timer_loop<F, Fut>(self: &Arc<Self>, timer: Arc<Timer>, handler: F)
    where
        F: Fn(Arc<Self>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        loop {
            {
                let mut next = timer.next_fire.lock().unwrap_or_else(|e| e.into_inner());
                *next = Utc::now()
                    .checked_add_signed(
                        chrono::Duration::from_std(timer.interval)
                            .unwrap_or_else(|_| chrono::Duration::zero()),
                    );
            }
            tokio::time::sleep(timer.interval).await;
            if timer.busy.swap(true, Ordering::SeqCst) {
                warn!(timer = timer.name, "Previous firing still running; skipping");
                continue;
            }
            handler(self.clone()).await;
            timer.busy.store(false, Ordering::SeqCst);
        }
    }

    /// Enqueue a normal-priority job per popular area and sport, using
    /// each area's historical average radius.
    pub async fn refresh_popular_areas(&self) {
        let areas = match self
            .tracker
            .popular_areas(POPULAR_SINCE_DAYS, POPULAR_MIN_SEARCHES, POPULAR_LIMIT)
            .await
        {
            Ok(areas) => areas,
            Err(err) => {
                error!(error = %err, "Failed to load popular areas");
                return;
            }
        };
        let mut enqueued = 0usize;
        for area in &areas {
            for sport in SUPPORTED_SPORTS {
                self.queue.enqueue(
                    DiscoveryJobData {
                        latitude: area.latitude,
                        longitude: area.longitude,
                        radius_m: area.avg_radius_m.round() as i32,
                        sport: Sport::new(sport),
                    },
                    JobPriority::Normal,
                    None,
                );
                enqueued += 1;
            }
        }
        info!(areas = areas.len(), jobs = enqueued, "Popular-area refresh enqueued");
    }

    /// Enqueue a delayed low-priority job per seed city and sport.
    pub fn sweep_major_cities(&self) {
        let mut enqueued = 0usize;
        for city in MAJOR_CITIES {
            for sport in SUPPORTED_SPORTS {
                self.queue.enqueue(
                    DiscoveryJobData {
                        latitude: city.latitude,
                        longitude: city.longitude,
                        radius_m: CITY_RADIUS_M,
                        sport: Sport::new(sport),
                    },
                    JobPriority::Low,
                    Some(LOW_PRIORITY_DELAY),
                );
                enqueued += 1;
            }
        }
        info!(cities = MAJOR_CITIES.len(), jobs = enqueued, "Major-city sweep enqueued");
    }

    pub async fn purge_stale_areas(&self) {
        match self.tracker.purge_stale(STALE_AFTER_DAYS).await {
            Ok(removed) => info!(removed, "Purged stale search areas"),
            Err(err) => error!(error = %err, "Failed to purge stale search areas"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{JobStatus, QueueConfig};
    use crate::testing::MemorySearchAreaStore;
    use courtscout_common::SearchAreaKey;

    fn scheduler() -> (Arc<DiscoveryScheduler>, Arc<JobQueue>, Arc<MemorySearchAreaStore>) {
        let queue = Arc::new(JobQueue::new(QueueConfig::default()));
        let store = Arc::new(MemorySearchAreaStore::default());
        let tracker = Arc::new(SearchAreaTracker::new(store.clone()));
        let sched = Arc::new(DiscoveryScheduler::new(queue.clone(), tracker));
        (sched, queue, store)
    }

    fn area_key(lat: f64, lng: f64, sport: &str) -> SearchAreaKey {
        SearchAreaKey {
            latitude: lat,
            longitude: lng,
            radius_m: 5_000,
            sport: Sport::new(sport),
        }
    }

    #[tokio::test]
    async fn city_sweep_enqueues_delayed_low_priority_jobs() {
        let (sched, queue, _) = scheduler();
        sched.sweep_major_cities();

        assert_eq!(queue.pending(), MAJOR_CITIES.len() * SUPPORTED_SPORTS.len());

        // Spot-check one job: low priority, held back by the fixed delay.
        let handle = queue.enqueue(
            DiscoveryJobData {
                latitude: 0.0,
                longitude: 0.0,
                radius_m: 1,
                sport: Sport::new("tennis"),
            },
            JobPriority::Low,
            Some(LOW_PRIORITY_DELAY),
        );
        let snap = handle.snapshot().unwrap();
        assert_eq!(snap.status, JobStatus::Delayed);
    }

    #[tokio::test]
    async fn popular_refresh_enqueues_per_area_and_sport() {
        let (sched, queue, store) = scheduler();
        store.seed_completed(&area_key(40.0, -74.0, "tennis"), 5);
        store.seed_completed(&area_key(34.05, -118.24, "pickleball"), 2);

        sched.refresh_popular_areas().await;
        assert_eq!(queue.pending(), 2 * SUPPORTED_SPORTS.len());
    }

    #[tokio::test]
    async fn purge_drops_only_old_areas() {
        let (sched, _, store) = scheduler();
        let old = area_key(40.0, -74.0, "tennis");
        store.seed_completed(&old, 1);
        store.backdate(&old, chrono::Duration::days(120));
        store.seed_completed(&area_key(34.05, -118.24, "tennis"), 1);

        sched.purge_stale_areas().await;
        assert!(store.get(&old).is_none());
        assert!(store.get(&area_key(34.05, -118.24, "tennis")).is_some());
    }

    #[tokio::test]
    async fn start_twice_is_a_warned_noop_and_stop_clears() {
        let (sched, _, _) = scheduler();
        assert!(!sched.status().running);

        sched.start();
        assert!(sched.status().running);
        let names: Vec<_> = sched.status().timers.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["popular-area-refresh", "major-city-sweep", "stale-area-purge"]
        );

        // Second start changes nothing.
        sched.start();
        assert!(sched.status().running);

        sched.stop();
        assert!(!sched.status().running);
        assert!(sched.status().timers.iter().all(|t| t.next_fire.is_none()));

        // Stopping again is harmless.
        sched.stop();
    }

    #[tokio::test]
    async fn timers_publish_next_fire_estimates() {
        let (sched, _, _) = scheduler();
        sched.start();

        // Spawned loops set their next-fire stamp before first sleeping.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let status = sched.status();
        for timer in &status.timers {
            let next = timer.next_fire.expect("estimate published");
            assert!(next > Utc::now());
        }
        sched.stop();
    }
}
