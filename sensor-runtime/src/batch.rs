use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use common::types::{CycleReport, FailureReason, TrackedEntity, UpsertOutcome};
use futures_util::FutureExt;

use crate::clock::Clock;
use crate::orion_client::ContextStore;
use crate::reconcile::upsert;
use crate::source::EntitySource;

/// Result of processing one entity, before tallying.
#[derive(Debug)]
enum EntityResult {
    Upserted(UpsertOutcome),
    SourceUnavailable,
}

/// One pass over the configured entities, in declaration order.
pub struct BatchRunner {
    entities: Arc<[TrackedEntity]>,
    source: Arc<dyn EntitySource>,
    store: Arc<dyn ContextStore>,
    clock: Arc<dyn Clock>,
    pacing: Duration,
}

impl BatchRunner {
    pub fn new(
        entities: Arc<[TrackedEntity]>,
        source: Arc<dyn EntitySource>,
        store: Arc<dyn ContextStore>,
        clock: Arc<dyn Clock>,
        pacing: Duration,
    ) -> Self {
        Self {
            entities,
            source,
            store,
            clock,
            pacing,
        }
    }

    pub async fn run_once(&self) -> CycleReport {
        let started = self.clock.now();
        let mut report = CycleReport::default();

        for (i, entity) in self.entities.iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                self.clock.sleep(self.pacing).await;
            }

            let result = AssertUnwindSafe(self.process(entity))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!("[batch] {} panicked while reconciling", entity.id);
                    EntityResult::Upserted(UpsertOutcome::Failed(FailureReason::Internal(
                        "panicked while reconciling".into(),
                    )))
                });

            match result {
                EntityResult::Upserted(outcome) => report.record(&outcome),
                EntityResult::SourceUnavailable => report.record_skipped(),
            }
        }

        report.elapsed = self.clock.now().saturating_duration_since(started);
        report
    }

    async fn process(&self, entity: &TrackedEntity) -> EntityResult {
        let attrs = match self.source.fetch(entity).await {
            Ok(attrs) => attrs,
            Err(e) => {
                tracing::warn!("[source] {} ({}) unavailable: {}", entity.id, entity.name, e);
                return EntityResult::SourceUnavailable;
            }
        };

        let outcome = upsert(self.store.as_ref(), entity, &attrs).await;
        match &outcome {
            UpsertOutcome::Created => tracing::info!("[created] {} - {}", entity.id, attrs),
            UpsertOutcome::Updated => tracing::info!("[updated] {} - {}", entity.id, attrs),
            UpsertOutcome::Failed(reason) => {
                tracing::warn!("[error] failed to update {}: {}", entity.id, reason);
                tracing::debug!(
                    "Payload sent for {}: {}",
                    entity.id,
                    serde_json::to_string(&attrs).unwrap_or_default()
                );
            }
        }

        EntityResult::Upserted(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use common::types::{AttributeSet, Coordinates, EntityKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::error::SourceError;
    use crate::reconcile::fake::{Fault, FakeStore};
    use crate::source::ParkingSource;

    fn entity(id: &str, kind: EntityKind) -> TrackedEntity {
        TrackedEntity {
            id: id.into(),
            name: id.into(),
            kind,
            coordinates: Coordinates {
                lat: 52.14,
                lon: 11.64,
            },
        }
    }

    /// Weather always unavailable, parking synthesized, one id panics.
    struct ScriptedSource {
        parking: ParkingSource,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                parking: ParkingSource::with_rng(StdRng::seed_from_u64(3)),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EntitySource for ScriptedSource {
        async fn fetch(&self, entity: &TrackedEntity) -> Result<AttributeSet, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if entity.id == "Boom" {
                panic!("source blew up");
            }
            match entity.kind {
                EntityKind::WeatherSensor => Err(SourceError::Transport("timeout".into())),
                EntityKind::ParkingSpot => self.parking.fetch(entity).await,
            }
        }
    }

    fn runner(
        entities: Vec<TrackedEntity>,
        source: Arc<ScriptedSource>,
        store: Arc<FakeStore>,
        clock: Arc<ManualClock>,
    ) -> BatchRunner {
        BatchRunner::new(
            entities.into(),
            source,
            store,
            clock,
            Duration::from_millis(500),
        )
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_batch() {
        let entities = vec![
            entity("Sensor:Weather:NorthPark", EntityKind::WeatherSensor),
            entity("Boom", EntityKind::ParkingSpot),
            entity("ParkingSpot:ScienceHarbor", EntityKind::ParkingSpot),
            entity("ParkingSpot:NorthPark", EntityKind::ParkingSpot),
        ];
        let source = Arc::new(ScriptedSource::new());
        let store = Arc::new(FakeStore::default());
        let clock = Arc::new(ManualClock::new());

        let report = runner(entities, source.clone(), store.clone(), clock)
            .run_once()
            .await;

        assert_eq!(report.attempted, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.created, 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        // unavailable source never reaches the store
        assert_eq!(
            store.patches(),
            vec!["ParkingSpot:ScienceHarbor", "ParkingSpot:NorthPark"]
        );
    }

    #[tokio::test]
    async fn rejected_updates_are_counted_and_batch_continues() {
        let entities = vec![
            entity("ParkingSpot:ScienceHarbor", EntityKind::ParkingSpot),
            entity("ParkingSpot:FacultyCS", EntityKind::ParkingSpot),
        ];
        let store = Arc::new(FakeStore::with_patch_fault(Fault::Status(500)));
        let clock = Arc::new(ManualClock::new());

        let report = runner(entities, Arc::new(ScriptedSource::new()), store.clone(), clock)
            .run_once()
            .await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.succeeded, 0);
        assert_eq!(store.patches().len(), 2);
        assert!(store.creates().is_empty());
    }

    #[tokio::test]
    async fn pacing_sleeps_between_entities_only() {
        let entities = vec![
            entity("ParkingSpot:A", EntityKind::ParkingSpot),
            entity("ParkingSpot:B", EntityKind::ParkingSpot),
            entity("ParkingSpot:C", EntityKind::ParkingSpot),
        ];
        let clock = Arc::new(ManualClock::new());

        let report = runner(
            entities,
            Arc::new(ScriptedSource::new()),
            Arc::new(FakeStore::default()),
            clock.clone(),
        )
        .run_once()
        .await;

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(500); 2]);
        assert_eq!(report.elapsed, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn second_cycle_updates_what_the_first_created() {
        let entities = vec![
            entity("ParkingSpot:A", EntityKind::ParkingSpot),
            entity("ParkingSpot:B", EntityKind::ParkingSpot),
        ];
        let store = Arc::new(FakeStore::default());
        let runner = runner(
            entities,
            Arc::new(ScriptedSource::new()),
            store.clone(),
            Arc::new(ManualClock::new()),
        );

        let first = runner.run_once().await;
        let second = runner.run_once().await;

        assert_eq!((first.created, first.updated), (2, 0));
        assert_eq!((second.created, second.updated), (0, 2));
        assert_eq!(store.creates().len(), 2);
    }
}
