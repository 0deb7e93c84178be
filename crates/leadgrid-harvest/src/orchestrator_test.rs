use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use leadgrid_places::{NearbyPage, PlaceDetails, PlacesError};

use super::*;
use crate::state::RunStatus;
use crate::throttle::FakeClock;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StubInner {
    nearby_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    /// 0-based nearby call index that returns an error.
    fail_nearby_call: Option<usize>,
    /// Every nearby page is empty.
    empty_results: bool,
    /// Every nearby page carries a continuation token and fresh unique hits.
    always_token: bool,
    /// Hits per nearby page when `always_token` is set.
    page_size: usize,
    /// All detail lookups fail.
    fail_details: bool,
    /// Geocoding fails.
    fail_geocode: bool,
    /// Raise the flag after serving this 0-based nearby call (simulated
    /// operator cancel mid-run).
    cancel_when_served: Mutex<Option<(usize, CancelFlag)>>,
}

#[derive(Clone, Default)]
struct StubProvider(Arc<StubInner>);

impl StubProvider {
    fn rotating() -> Self {
        Self::default()
    }

    fn nearby_calls(&self) -> usize {
        self.0.nearby_calls.load(Ordering::SeqCst)
    }

    fn detail_calls(&self) -> usize {
        self.0.detail_calls.load(Ordering::SeqCst)
    }
}

fn hit(place_id: &str, name: &str) -> leadgrid_places::PlaceSummary {
    leadgrid_places::PlaceSummary {
        place_id: place_id.to_owned(),
        name: name.to_owned(),
        vicinity: None,
        rating: None,
        user_ratings_total: None,
        raw: serde_json::Value::Null,
    }
}

impl PlaceSource for StubProvider {
    fn geocode(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<(f64, f64), PlacesError>> + Send {
        let result = if self.0.fail_geocode {
            Err(PlacesError::Geocode {
                query: query.to_owned(),
            })
        } else {
            Ok((40.0, -74.0))
        };
        std::future::ready(result)
    }

    fn nearby_page(
        &self,
        _lat: f64,
        _lng: f64,
        _radius_m: u32,
        _keyword: &str,
        _page_token: Option<&str>,
    ) -> impl Future<Output = Result<NearbyPage, PlacesError>> + Send {
        let n = self.0.nearby_calls.fetch_add(1, Ordering::SeqCst);

        let result = if self.0.fail_nearby_call == Some(n) {
            Err(PlacesError::ApiStatus {
                status: "UNKNOWN_ERROR".to_owned(),
                context: format!("stub call {n}"),
            })
        } else if self.0.empty_results {
            Ok(NearbyPage {
                places: vec![],
                next_page_token: None,
            })
        } else if self.0.always_token {
            let places = (0..self.0.page_size)
                .map(|i| hit(&format!("pg-{n}-{i}"), "Paged Biz"))
                .collect();
            Ok(NearbyPage {
                places,
                next_page_token: Some("more".to_owned()),
            })
        } else {
            // Two hits per point drawn from three recurring provider ids.
            let ids = ["p1", "p2", "p3"];
            let names = ["Bean There", "Grind House", "Third Rail"];
            let a = n % 3;
            let b = (n + 1) % 3;
            Ok(NearbyPage {
                places: vec![hit(ids[a], names[a]), hit(ids[b], names[b])],
                next_page_token: None,
            })
        };

        let mut guard = self.0.cancel_when_served.lock().unwrap();
        if let Some((threshold, flag)) = guard.as_ref() {
            if n == *threshold {
                flag.cancel();
                *guard = None;
            }
        }
        drop(guard);

        std::future::ready(result)
    }

    fn place_details(
        &self,
        place_id: &str,
    ) -> impl Future<Output = Result<PlaceDetails, PlacesError>> + Send {
        self.0.detail_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.0.fail_details {
            Err(PlacesError::ApiStatus {
                status: "NOT_FOUND".to_owned(),
                context: format!("stub details {place_id}"),
            })
        } else {
            Ok(PlaceDetails {
                name: Some(format!("Detail {place_id}")),
                formatted_address: Some("1 Main St".to_owned()),
                formatted_phone_number: Some("(609) 555-0101".to_owned()),
                website: Some("https://example.com".to_owned()),
                rating: Some(4.0),
                user_ratings_total: Some(10),
            })
        };
        std::future::ready(result)
    }
}

#[derive(Clone, Default)]
struct RecordingExporter {
    /// Row count of each export call.
    calls: Arc<Mutex<Vec<usize>>>,
}

impl Exporter for RecordingExporter {
    fn export(
        &self,
        records: &[EnrichedRecord],
        destination: &str,
    ) -> Result<PathBuf, ExportError> {
        self.calls.lock().unwrap().push(records.len());
        Ok(PathBuf::from(format!("/exports/{destination}.csv")))
    }
}

#[derive(Clone, Default)]
struct FailingExporter;

impl Exporter for FailingExporter {
    fn export(&self, _: &[EnrichedRecord], destination: &str) -> Result<PathBuf, ExportError> {
        Err(ExportError::Io {
            path: format!("/exports/{destination}.csv"),
            source: std::io::Error::other("disk full"),
        })
    }
}

fn request() -> HarvestRequest {
    HarvestRequest {
        center: CenterQuery::Coords {
            lat: 40.0,
            lng: -74.0,
        },
        radius_km: 5.0,
        density: Density::Low,
        search_term: "coffee shop".to_owned(),
    }
}

fn harvester<P: PlaceSource, E: Exporter>(
    provider: P,
    exporter: E,
    checkpoint_dir: &std::path::Path,
    limits: HarvestLimits,
) -> Harvester<P, FakeClock, E> {
    Harvester::new(
        provider,
        FakeClock::default(),
        exporter,
        CheckpointStore::new(checkpoint_dir),
        limits,
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn end_to_end_dedups_enriches_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let provider = StubProvider::rotating();
    let exporter = RecordingExporter::default();
    let h = harvester(
        provider.clone(),
        exporter.clone(),
        dir.path(),
        HarvestLimits::default(),
    );

    let registry = RunRegistry::new();
    let run_id = registry.submit();
    let outcome = h
        .run(&registry, run_id, &request(), "key-e2e", &CancelFlag::new())
        .await
        .expect("run completes");

    // 3x3 grid, 2 hits per point, 3 distinct provider ids recurring.
    assert_eq!(provider.nearby_calls(), 9);
    assert_eq!(outcome.unique_candidates, 3);
    assert_eq!(provider.detail_calls(), 3);
    assert_eq!(outcome.record_count, 3);
    assert_eq!(outcome.api_calls, 12);
    assert_eq!(*exporter.calls.lock().unwrap(), vec![3]);

    let state = registry.snapshot(run_id).unwrap();
    assert_eq!(state.status, RunStatus::Completed);
    assert!((state.progress_percent - 100.0).abs() < f64::EPSILON);
    assert_eq!(state.outcome.as_ref().unwrap().record_count, 3);

    // Checkpoint is cleared only on success — and it was.
    let store = CheckpointStore::new(dir.path());
    assert!(store.load("key-e2e").unwrap().is_none());
}

#[tokio::test]
async fn empty_results_jump_to_completion_without_division_errors() {
    let dir = tempfile::tempdir().unwrap();
    let provider = StubProvider(Arc::new(StubInner {
        empty_results: true,
        ..StubInner::default()
    }));
    let exporter = RecordingExporter::default();
    let h = harvester(
        provider.clone(),
        exporter.clone(),
        dir.path(),
        HarvestLimits::default(),
    );

    let registry = RunRegistry::new();
    let run_id = registry.submit();
    let outcome = h
        .run(&registry, run_id, &request(), "key-empty", &CancelFlag::new())
        .await
        .expect("run completes");

    assert_eq!(outcome.unique_candidates, 0);
    assert_eq!(outcome.record_count, 0);
    assert_eq!(provider.detail_calls(), 0);
    assert_eq!(*exporter.calls.lock().unwrap(), vec![0]);

    let state = registry.snapshot(run_id).unwrap();
    assert_eq!(state.status, RunStatus::Completed);
    assert!((state.progress_percent - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn a_failed_grid_point_contributes_zero_results_and_the_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let provider = StubProvider(Arc::new(StubInner {
        fail_nearby_call: Some(4),
        ..StubInner::default()
    }));
    let exporter = RecordingExporter::default();
    let h = harvester(
        provider.clone(),
        exporter.clone(),
        dir.path(),
        HarvestLimits::default(),
    );

    let registry = RunRegistry::new();
    let run_id = registry.submit();
    let outcome = h
        .run(&registry, run_id, &request(), "key-ptfail", &CancelFlag::new())
        .await
        .expect("per-point failure is not fatal");

    // All 9 points attempted; the failed one yields nothing but the other
    // eight still surface all three recurring ids.
    assert_eq!(provider.nearby_calls(), 9);
    assert_eq!(outcome.unique_candidates, 3);
    assert_eq!(registry.snapshot(run_id).unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn enrichment_failures_become_empty_records_not_omissions() {
    let dir = tempfile::tempdir().unwrap();
    let provider = StubProvider(Arc::new(StubInner {
        fail_details: true,
        ..StubInner::default()
    }));
    let exporter = RecordingExporter::default();
    let h = harvester(
        provider.clone(),
        exporter.clone(),
        dir.path(),
        HarvestLimits::default(),
    );

    let registry = RunRegistry::new();
    let run_id = registry.submit();
    let outcome = h
        .run(&registry, run_id, &request(), "key-enrich", &CancelFlag::new())
        .await
        .expect("enrichment failures are not fatal");

    // Record count still equals the unique-candidate count.
    assert_eq!(outcome.unique_candidates, 3);
    assert_eq!(outcome.record_count, 3);
    assert_eq!(provider.detail_calls(), 3);
    assert_eq!(*exporter.calls.lock().unwrap(), vec![3]);
}

#[tokio::test]
async fn pagination_stops_at_the_per_point_cap() {
    let dir = tempfile::tempdir().unwrap();
    let provider = StubProvider(Arc::new(StubInner {
        always_token: true,
        page_size: 2,
        ..StubInner::default()
    }));
    let exporter = RecordingExporter::default();
    let limits = HarvestLimits {
        max_results_per_point: 4,
        ..HarvestLimits::default()
    };
    let h = harvester(provider.clone(), exporter, dir.path(), limits);

    let registry = RunRegistry::new();
    let run_id = registry.submit();
    let outcome = h
        .run(&registry, run_id, &request(), "key-cap", &CancelFlag::new())
        .await
        .expect("run completes");

    // 2 hits/page, cap 4 → exactly 2 pages per point, 9 points.
    assert_eq!(provider.nearby_calls(), 18);
    // Every stub hit is unique, so 4 per point survive dedup.
    assert_eq!(outcome.unique_candidates, 36);
}

#[tokio::test]
async fn cancellation_fails_the_run_and_preserves_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancelFlag::new();
    let provider = StubProvider(Arc::new(StubInner {
        cancel_when_served: Mutex::new(Some((4, cancel.clone()))),
        ..StubInner::default()
    }));
    let exporter = RecordingExporter::default();
    let h = harvester(
        provider.clone(),
        exporter.clone(),
        dir.path(),
        HarvestLimits::default(),
    );

    let registry = RunRegistry::new();
    let run_id = registry.submit();
    let err = h
        .run(&registry, run_id, &request(), "key-resume", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Cancelled));

    let state = registry.snapshot(run_id).unwrap();
    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.status_message, "cancelled");

    // 5 points finished before the flag was honored; export never ran.
    assert_eq!(provider.nearby_calls(), 5);
    assert!(exporter.calls.lock().unwrap().is_empty());

    let store = CheckpointStore::new(dir.path());
    let cp = store.load("key-resume").unwrap().expect("checkpoint kept");
    assert_eq!(cp.next_grid_index, 5);
    assert_eq!(cp.raw_results.len(), 10);
}

#[tokio::test]
async fn resume_searches_only_the_remaining_points() {
    let dir = tempfile::tempdir().unwrap();
    let registry = RunRegistry::new();

    // First run: cancelled after 5 of 9 points.
    let cancel = CancelFlag::new();
    let first = StubProvider(Arc::new(StubInner {
        cancel_when_served: Mutex::new(Some((4, cancel.clone()))),
        ..StubInner::default()
    }));
    let h1 = harvester(
        first,
        RecordingExporter::default(),
        dir.path(),
        HarvestLimits::default(),
    );
    let run1 = registry.submit();
    let err = h1
        .run(&registry, run1, &request(), "key-resume2", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Cancelled));

    // Second run with the same key: points 0-4 must not be re-queried.
    let second = StubProvider::rotating();
    let exporter = RecordingExporter::default();
    let h2 = harvester(
        second.clone(),
        exporter.clone(),
        dir.path(),
        HarvestLimits::default(),
    );
    let run2 = registry.submit();
    let outcome = h2
        .run(&registry, run2, &request(), "key-resume2", &CancelFlag::new())
        .await
        .expect("resumed run completes");

    assert_eq!(second.nearby_calls(), 4, "only points 5..9 are searched");
    assert_eq!(outcome.unique_candidates, 3);
    assert_eq!(outcome.record_count, 3);
    // 5 + 4 nearby calls plus 3 detail calls, carried across the resume.
    assert_eq!(outcome.api_calls, 12);
    assert_eq!(*exporter.calls.lock().unwrap(), vec![3]);
    assert_eq!(registry.snapshot(run2).unwrap().status, RunStatus::Completed);

    let store = CheckpointStore::new(dir.path());
    assert!(store.load("key-resume2").unwrap().is_none());
}

#[tokio::test]
async fn export_failure_keeps_the_checkpoint_for_an_export_only_resume() {
    let dir = tempfile::tempdir().unwrap();
    let registry = RunRegistry::new();

    let first = StubProvider::rotating();
    let h1 = harvester(
        first.clone(),
        FailingExporter,
        dir.path(),
        HarvestLimits::default(),
    );
    let run1 = registry.submit();
    let err = h1
        .run(&registry, run1, &request(), "key-export", &CancelFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Export(_)));
    assert_eq!(registry.snapshot(run1).unwrap().status, RunStatus::Failed);

    // All data was gathered before the export attempt.
    let store = CheckpointStore::new(dir.path());
    let cp = store.load("key-export").unwrap().expect("checkpoint kept");
    assert_eq!(cp.next_grid_index, 9);
    assert_eq!(cp.processed_place_ids.len(), 3);
    assert_eq!(cp.enriched_records.len(), 3);

    // Resubmission with the same key re-exports without touching the provider.
    let second = StubProvider::rotating();
    let exporter = RecordingExporter::default();
    let h2 = harvester(
        second.clone(),
        exporter.clone(),
        dir.path(),
        HarvestLimits::default(),
    );
    let run2 = registry.submit();
    let outcome = h2
        .run(&registry, run2, &request(), "key-export", &CancelFlag::new())
        .await
        .expect("export-only resume completes");

    assert_eq!(second.nearby_calls(), 0);
    assert_eq!(second.detail_calls(), 0);
    assert_eq!(outcome.record_count, 3);
    assert_eq!(*exporter.calls.lock().unwrap(), vec![3]);
}

#[tokio::test]
async fn geocoding_failure_is_fatal_with_no_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let provider = StubProvider(Arc::new(StubInner {
        fail_geocode: true,
        ..StubInner::default()
    }));
    let h = harvester(
        provider,
        RecordingExporter::default(),
        dir.path(),
        HarvestLimits::default(),
    );

    let registry = RunRegistry::new();
    let run_id = registry.submit();
    let mut req = request();
    req.center = CenterQuery::Query("nowhere at all".to_owned());

    let err = h
        .run(&registry, run_id, &req, "key-geo", &CancelFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Geocode { .. }));
    assert_eq!(registry.snapshot(run_id).unwrap().status, RunStatus::Failed);

    let store = CheckpointStore::new(dir.path());
    assert!(store.load("key-geo").unwrap().is_none(), "no progress to keep");
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[test]
fn center_query_parses_coordinate_pairs() {
    assert_eq!(
        CenterQuery::parse("40.0,-74.0"),
        CenterQuery::Coords {
            lat: 40.0,
            lng: -74.0
        }
    );
    assert_eq!(
        CenterQuery::parse(" 40 , -74 "),
        CenterQuery::Coords {
            lat: 40.0,
            lng: -74.0
        }
    );
}

#[test]
fn center_query_falls_back_to_free_text() {
    assert_eq!(
        CenterQuery::parse("Trenton, NJ"),
        CenterQuery::Query("Trenton, NJ".to_owned())
    );
    assert_eq!(
        CenterQuery::parse("Berlin"),
        CenterQuery::Query("Berlin".to_owned())
    );
}

#[test]
fn export_destination_replaces_spaces() {
    assert_eq!(export_destination("coffee shop"), "coffee_shop_businesses");
    assert_eq!(export_destination("  bakery "), "bakery_businesses");
}

#[test]
fn point_radius_is_the_grid_spacing_with_a_floor() {
    // Low density: half = 1 → spacing equals the full radius.
    assert_eq!(point_radius_m(5.0, Density::Low), 5_000);
    // High density: half = 3.
    assert_eq!(point_radius_m(6.0, Density::High), 2_000);
    // Degenerate zero radius still searches something.
    assert_eq!(point_radius_m(0.0, Density::Medium), 500);
}

#[test]
fn phase_progress_handles_empty_phases() {
    assert!((phase_progress(0, 0, 0.0) - 50.0).abs() < f64::EPSILON);
    assert!((phase_progress(0, 0, 50.0) - 100.0).abs() < f64::EPSILON);
    assert!((phase_progress(3, 9, 0.0) - (50.0 / 3.0)).abs() < 1e-9);
    assert!((phase_progress(9, 9, 0.0) - 50.0).abs() < f64::EPSILON);
    assert!((phase_progress(12, 9, 0.0) - 50.0).abs() < f64::EPSILON, "overshoot clamped");
}
