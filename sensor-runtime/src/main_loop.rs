use std::sync::Arc;
use std::time::{Duration, Instant};

use common::types::CycleReport;
use common::wire::Subscription;

use crate::batch::BatchRunner;
use crate::clock::Clock;
use crate::orion_client::ContextStore;

/// Wait before the next cycle so that cycle *starts* stay `interval` apart.
pub fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

pub struct Scheduler {
    runner: BatchRunner,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runner: BatchRunner, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            runner,
            clock,
            interval,
        }
    }

    /// Runs one batch, then waits out the rest of the interval.
    pub async fn tick(&self) -> CycleReport {
        self.tick_from(self.clock.now()).await.0
    }

    /// Runs the cycle scheduled at `started` and sleeps until `started +
    /// interval`. Returns the report and the scheduled start of the next
    /// cycle, which stays on the `started + k * interval` grid unless the
    /// batch overran.
    async fn tick_from(&self, started: Instant) -> (CycleReport, Instant) {
        tracing::info!(
            "=== Update cycle started at {} ===",
            common::types::utc_timestamp(chrono::Utc::now())
        );

        let report = self.runner.run_once().await;

        let now = self.clock.now();
        let wait = next_delay(self.interval, now.saturating_duration_since(started));
        tracing::info!(
            "=== Cycle complete: {}/{} successful ({} created, {} updated, {} unavailable, {} failed) in {:.1}s | Next update in {:.1}s ===",
            report.succeeded,
            report.attempted,
            report.created,
            report.updated,
            report.skipped,
            report.failed,
            report.elapsed.as_secs_f64(),
            wait.as_secs_f64()
        );

        self.clock.sleep(wait).await;
        let next = if wait.is_zero() { now } else { started + self.interval };
        (report, next)
    }

    pub async fn run(&self) {
        tracing::info!(
            "Starting periodic update every {} seconds",
            self.interval.as_secs()
        );
        let mut started = self.clock.now();
        loop {
            started = self.tick_from(started).await.1;
        }
    }
}

/// Registers the standing subscription. Failure is logged and ignored.
pub async fn register_subscription(store: &dyn ContextStore, subscription: &Subscription) -> bool {
    match store.create_subscription(subscription).await {
        Ok(()) => {
            tracing::info!("Subscription created");
            true
        }
        Err(e) => {
            tracing::error!("Subscription failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use common::types::{AttributeSet, Coordinates, EntityKind, TrackedEntity};

    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::error::SourceError;
    use crate::reconcile::fake::{Fault, FakeStore};
    use crate::source::EntitySource;

    #[test]
    fn wait_subtracts_batch_time() {
        assert_eq!(
            next_delay(Duration::from_secs(300), Duration::from_secs(40)),
            Duration::from_secs(260)
        );
    }

    #[test]
    fn wait_floors_at_zero() {
        assert_eq!(
            next_delay(Duration::from_secs(300), Duration::from_secs(300)),
            Duration::ZERO
        );
        assert_eq!(
            next_delay(Duration::from_secs(300), Duration::from_secs(420)),
            Duration::ZERO
        );
    }

    /// Takes a fixed amount of clock time per fetch.
    struct SlowSource {
        clock: Arc<ManualClock>,
        cost: Duration,
    }

    #[async_trait]
    impl EntitySource for SlowSource {
        async fn fetch(&self, _: &TrackedEntity) -> Result<AttributeSet, SourceError> {
            self.clock.advance(self.cost);
            Ok(AttributeSet::new())
        }
    }

    fn entities(n: usize) -> Arc<[TrackedEntity]> {
        (0..n)
            .map(|i| TrackedEntity {
                id: format!("ParkingSpot:{}", i),
                name: format!("Spot {}", i),
                kind: EntityKind::ParkingSpot,
                coordinates: Coordinates { lat: 0.0, lon: 0.0 },
            })
            .collect()
    }

    fn scheduler(clock: Arc<ManualClock>, cost: Duration, n: usize) -> Scheduler {
        let source = Arc::new(SlowSource {
            clock: clock.clone(),
            cost,
        });
        let runner = BatchRunner::new(
            entities(n),
            source,
            Arc::new(FakeStore::default()),
            clock.clone(),
            Duration::ZERO,
        );
        Scheduler::new(runner, clock, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn tick_compensates_for_batch_duration() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = scheduler(clock.clone(), Duration::from_secs(10), 4);

        let report = scheduler.tick().await;

        assert_eq!(report.attempted, 4);
        assert_eq!(report.elapsed, Duration::from_secs(40));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(260)]);
    }

    #[tokio::test]
    async fn cycle_starts_stay_evenly_spaced() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = scheduler(clock.clone(), Duration::from_secs(25), 3);

        let origin = clock.now();
        for cycle in 1..=3u32 {
            scheduler.tick().await;
            assert_eq!(clock.now() - origin, Duration::from_secs(300) * cycle);
        }
    }

    #[tokio::test]
    async fn timer_overshoot_does_not_accumulate() {
        let clock = Arc::new(ManualClock::new());
        clock.set_overshoot(Duration::from_secs(2));
        let scheduler = scheduler(clock.clone(), Duration::from_secs(25), 3);

        let origin = clock.now();
        let mut started = origin;
        for cycle in 1..=4u32 {
            let (report, next) = scheduler.tick_from(started).await;
            assert_eq!(report.elapsed, Duration::from_secs(75));
            assert_eq!(next - origin, Duration::from_secs(300) * cycle);
            assert_eq!(
                clock.now() - origin,
                Duration::from_secs(300) * cycle + Duration::from_secs(2)
            );
            started = next;
        }
    }

    #[tokio::test]
    async fn overlong_batch_starts_next_cycle_immediately() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = scheduler(clock.clone(), Duration::from_secs(200), 2);

        scheduler.tick().await;

        assert_eq!(clock.sleeps(), vec![Duration::ZERO]);
    }

    #[tokio::test]
    async fn subscription_failure_is_not_fatal() {
        let store = FakeStore::default();
        *store.subscription_fault.lock().unwrap() = Some(Fault::Status(500));
        let sub = Subscription::weather_changes("http://ql:8668/v2/notify");

        assert!(!register_subscription(&store, &sub).await);

        *store.subscription_fault.lock().unwrap() = None;
        assert!(register_subscription(&store, &sub).await);
        assert_eq!(*store.subscriptions.lock().unwrap(), 1);
    }
}
