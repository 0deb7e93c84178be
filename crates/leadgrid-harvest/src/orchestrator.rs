//! The geo-grid harvest run driver.
//!
//! One run executes two strictly sequential phases — grid search, then
//! enrichment — under a shared per-run call pacer, writing a checkpoint after
//! every unit of work. The provider enforces a global call-rate ceiling per
//! credential, so fanning out across grid points or candidates would only add
//! coordination cost; sequential is the policy, not a limitation.

use std::path::PathBuf;
use std::time::Duration;

use leadgrid_places::{PlaceSummary, PlacesError};
use thiserror::Error;
use uuid::Uuid;

use crate::checkpoint::{CheckpointError, CheckpointStore, RunCheckpoint};
use crate::dedup::dedup_first_seen;
use crate::export::{ExportError, Exporter};
use crate::grid::{generate_grid, Density, GridPoint};
use crate::provider::PlaceSource;
use crate::records::EnrichedRecord;
use crate::state::{CancelFlag, RunOutcome, RunRegistry, StateError};
use crate::throttle::{Clock, Pacer};

#[derive(Debug, Error)]
pub enum HarvestError {
    /// The center query could not be resolved. Fatal: no progress exists yet.
    #[error("geocoding \"{query}\" failed: {source}")]
    Geocode {
        query: String,
        #[source]
        source: PlacesError,
    },

    /// Export failed. The checkpoint is preserved so a resubmission with the
    /// same key resumes at export only.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    /// The run's cancel flag was raised.
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    State(#[from] StateError),
}

/// Where to search: an explicit coordinate or a free-text query for the
/// geocoder.
#[derive(Debug, Clone, PartialEq)]
pub enum CenterQuery {
    Coords { lat: f64, lng: f64 },
    Query(String),
}

impl CenterQuery {
    /// Parses `"lat,lng"` into coordinates; anything else becomes a geocoder
    /// query.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        if let Some((lat_s, lng_s)) = input.split_once(',') {
            if let (Ok(lat), Ok(lng)) = (lat_s.trim().parse::<f64>(), lng_s.trim().parse::<f64>())
            {
                return CenterQuery::Coords { lat, lng };
            }
        }
        CenterQuery::Query(input.to_owned())
    }
}

/// Caller-supplied parameters for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    pub center: CenterQuery,
    pub radius_km: f64,
    pub density: Density,
    pub search_term: String,
}

/// Pacing and volume limits, normally lifted from `AppConfig`.
#[derive(Debug, Clone)]
pub struct HarvestLimits {
    pub min_call_interval_ms: u64,
    pub inter_point_delay_ms: u64,
    pub max_results_per_point: usize,
}

impl Default for HarvestLimits {
    fn default() -> Self {
        Self {
            min_call_interval_ms: 2_000,
            inter_point_delay_ms: 5_000,
            max_results_per_point: 60,
        }
    }
}

/// Final result of a successful run.
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub record_count: usize,
    pub export_path: PathBuf,
    pub unique_candidates: usize,
    pub api_calls: u64,
}

/// Drives harvest runs against a provider, clock, and exporter.
///
/// One `Harvester` can serve many runs; all per-run mutable state (pacer
/// timestamps, call counters, checkpoint) lives in the run itself, so
/// concurrent runs with distinct checkpoint keys do not share anything.
pub struct Harvester<P, C, E> {
    provider: P,
    clock: C,
    exporter: E,
    checkpoints: CheckpointStore,
    limits: HarvestLimits,
}

impl<P: PlaceSource, C: Clock, E: Exporter> Harvester<P, C, E> {
    pub fn new(
        provider: P,
        clock: C,
        exporter: E,
        checkpoints: CheckpointStore,
        limits: HarvestLimits,
    ) -> Self {
        Self {
            provider,
            clock,
            exporter,
            checkpoints,
            limits,
        }
    }

    /// Executes one run end to end and records its terminal state in the
    /// registry.
    ///
    /// # Errors
    ///
    /// Propagates the failure after marking the run FAILED; see
    /// [`HarvestError`] for which failures preserve the checkpoint.
    pub async fn run(
        &self,
        registry: &RunRegistry,
        run_id: Uuid,
        request: &HarvestRequest,
        checkpoint_key: &str,
        cancel: &CancelFlag,
    ) -> Result<HarvestOutcome, HarvestError> {
        match self
            .run_inner(registry, run_id, request, checkpoint_key, cancel)
            .await
        {
            Ok(outcome) => {
                registry.complete(
                    run_id,
                    RunOutcome {
                        record_count: outcome.record_count,
                        export_path: outcome.export_path.clone(),
                    },
                )?;
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(%run_id, error = %e, "harvest run failed");
                if let Err(state_err) = registry.fail(run_id, e.to_string()) {
                    tracing::warn!(%run_id, error = %state_err, "could not record failure");
                }
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        registry: &RunRegistry,
        run_id: Uuid,
        request: &HarvestRequest,
        checkpoint_key: &str,
        cancel: &CancelFlag,
    ) -> Result<HarvestOutcome, HarvestError> {
        registry.update_progress(run_id, 0.0, "starting")?;

        let mut cp = match self.load_checkpoint(checkpoint_key) {
            Some(cp) => {
                tracing::info!(
                    %run_id,
                    key = checkpoint_key,
                    next_grid_index = cp.next_grid_index,
                    processed = cp.processed_place_ids.len(),
                    "resuming from checkpoint"
                );
                cp
            }
            None => {
                let center = self.resolve_center(&request.center, cancel).await?;
                let grid = generate_grid(center, request.radius_km, request.density);
                tracing::info!(
                    %run_id,
                    lat = center.lat,
                    lng = center.lng,
                    points = grid.len(),
                    "starting fresh run"
                );
                RunCheckpoint::fresh(center, grid)
            }
        };

        let mut pacer = Pacer::restore(self.limits.min_call_interval_ms, cp.last_call_unix_ms);

        self.grid_phase(registry, run_id, request, checkpoint_key, cancel, &mut cp, &mut pacer)
            .await?;

        let candidates = dedup_first_seen(&cp.raw_results);
        tracing::info!(
            %run_id,
            raw = cp.raw_results.len(),
            unique = candidates.len(),
            "deduplicated raw results"
        );

        self.enrichment_phase(
            registry,
            run_id,
            &candidates,
            checkpoint_key,
            cancel,
            &mut cp,
            &mut pacer,
        )
        .await?;

        let destination = export_destination(&request.search_term);
        let export_path = self.exporter.export(&cp.enriched_records, &destination)?;
        tracing::info!(%run_id, path = %export_path.display(), "exported records");

        // Data is safely exported; only now may the checkpoint go away.
        if let Err(e) = self.checkpoints.clear(checkpoint_key) {
            tracing::warn!(key = checkpoint_key, error = %e, "could not clear checkpoint");
        }

        Ok(HarvestOutcome {
            record_count: cp.enriched_records.len(),
            export_path,
            unique_candidates: candidates.len(),
            api_calls: cp.api_call_count,
        })
    }

    async fn resolve_center(
        &self,
        center: &CenterQuery,
        cancel: &CancelFlag,
    ) -> Result<GridPoint, HarvestError> {
        match center {
            CenterQuery::Coords { lat, lng } => Ok(GridPoint {
                lat: *lat,
                lng: *lng,
            }),
            CenterQuery::Query(query) => {
                check_cancel(cancel)?;
                let (lat, lng) =
                    self.provider
                        .geocode(query)
                        .await
                        .map_err(|source| HarvestError::Geocode {
                            query: query.clone(),
                            source,
                        })?;
                Ok(GridPoint { lat, lng })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn grid_phase(
        &self,
        registry: &RunRegistry,
        run_id: Uuid,
        request: &HarvestRequest,
        checkpoint_key: &str,
        cancel: &CancelFlag,
        cp: &mut RunCheckpoint,
        pacer: &mut Pacer,
    ) -> Result<(), HarvestError> {
        let total = cp.grid_points.len();
        registry.update_progress(
            run_id,
            phase_progress(cp.next_grid_index, total, 0.0),
            format!("searched {}/{total} grid points", cp.next_grid_index),
        )?;

        let radius_m = point_radius_m(request.radius_km, request.density);
        let mut first = true;

        while cp.next_grid_index < total {
            let index = cp.next_grid_index;
            let point = cp.grid_points[index];

            if !first && self.limits.inter_point_delay_ms > 0 {
                check_cancel(cancel)?;
                self.clock
                    .sleep(Duration::from_millis(self.limits.inter_point_delay_ms))
                    .await;
            }
            first = false;

            let hits = self
                .search_point(point, index, radius_m, &request.search_term, cancel, cp, pacer)
                .await?;
            tracing::debug!(%run_id, point_index = index, hits = hits.len(), "grid point searched");
            cp.raw_results.extend(hits);

            cp.next_grid_index = index + 1;
            cp.last_call_unix_ms = pacer.last_call_ms();
            self.save_best_effort(checkpoint_key, cp);

            registry.update_progress(
                run_id,
                phase_progress(cp.next_grid_index, total, 0.0),
                format!("searched {}/{total} grid points", cp.next_grid_index),
            )?;
        }

        Ok(())
    }

    /// Paginated nearby search for one grid point, capped at
    /// `max_results_per_point` accumulated hits.
    ///
    /// Any page failure logs, stops paging for this point only, and returns
    /// whatever was accumulated — the run continues and the checkpoint still
    /// advances past the point.
    #[allow(clippy::too_many_arguments)]
    async fn search_point(
        &self,
        point: GridPoint,
        point_index: usize,
        radius_m: u32,
        keyword: &str,
        cancel: &CancelFlag,
        cp: &mut RunCheckpoint,
        pacer: &mut Pacer,
    ) -> Result<Vec<PlaceSummary>, HarvestError> {
        let mut accumulated: Vec<PlaceSummary> = Vec::new();
        let mut token: Option<String> = None;

        loop {
            check_cancel(cancel)?;
            pacer.wait_turn(&self.clock).await;
            cp.api_call_count += 1;

            let page = match self
                .provider
                .nearby_page(point.lat, point.lng, radius_m, keyword, token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        point_index,
                        error = %e,
                        partial = accumulated.len(),
                        "nearby search page failed; keeping partial results"
                    );
                    break;
                }
            };

            accumulated.extend(page.places);
            if accumulated.len() >= self.limits.max_results_per_point {
                accumulated.truncate(self.limits.max_results_per_point);
                break;
            }
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(accumulated)
    }

    #[allow(clippy::too_many_arguments)]
    async fn enrichment_phase(
        &self,
        registry: &RunRegistry,
        run_id: Uuid,
        candidates: &[PlaceSummary],
        checkpoint_key: &str,
        cancel: &CancelFlag,
        cp: &mut RunCheckpoint,
        pacer: &mut Pacer,
    ) -> Result<(), HarvestError> {
        let total = candidates.len();
        let mut done = cp.processed_place_ids.len();
        registry.update_progress(
            run_id,
            phase_progress(done, total, 50.0),
            format!("enriched {done}/{total} candidates"),
        )?;

        for candidate in candidates {
            if cp.processed_place_ids.contains(&candidate.place_id) {
                continue;
            }

            check_cancel(cancel)?;
            pacer.wait_turn(&self.clock).await;
            cp.api_call_count += 1;

            let record = match self.provider.place_details(&candidate.place_id).await {
                Ok(details) => EnrichedRecord::from_details(&candidate.place_id, details),
                Err(e) => {
                    tracing::warn!(
                        place_id = %candidate.place_id,
                        error = %e,
                        "enrichment failed; recording empty fields"
                    );
                    EnrichedRecord::empty(&candidate.place_id)
                }
            };

            cp.enriched_records.push(record);
            cp.processed_place_ids.insert(candidate.place_id.clone());
            cp.last_call_unix_ms = pacer.last_call_ms();
            self.save_best_effort(checkpoint_key, cp);

            done += 1;
            registry.update_progress(
                run_id,
                phase_progress(done, total, 50.0),
                format!("enriched {done}/{total} candidates"),
            )?;
        }

        Ok(())
    }

    /// Checkpoint persistence is best-effort: a failed write is logged and the
    /// run continues in memory. A crash before the next successful write loses
    /// the unsaved progress, nothing more.
    fn save_best_effort(&self, key: &str, cp: &RunCheckpoint) {
        if let Err(e) = self.checkpoints.save(key, cp) {
            tracing::warn!(key, error = %e, "checkpoint write failed; continuing in memory");
        }
    }

    /// A corrupt checkpoint is logged and treated as absent rather than
    /// wedging the run key forever.
    fn load_checkpoint(&self, key: &str) -> Option<RunCheckpoint> {
        match self.checkpoints.load(key) {
            Ok(found) => found,
            Err(e @ CheckpointError::Serialize(_)) => {
                tracing::warn!(key, error = %e, "checkpoint unreadable; starting fresh");
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "checkpoint load failed; starting fresh");
                None
            }
        }
    }
}

fn check_cancel(cancel: &CancelFlag) -> Result<(), HarvestError> {
    if cancel.is_cancelled() {
        return Err(HarvestError::Cancelled);
    }
    Ok(())
}

/// Phase progress: each phase owns half of the bar. An empty phase counts as
/// instantly complete, so zero grid points or zero candidates never divide by
/// zero.
#[allow(clippy::cast_precision_loss)]
fn phase_progress(done: usize, total: usize, base: f64) -> f64 {
    if total == 0 {
        return base + 50.0;
    }
    base + (done.min(total) as f64 / total as f64) * 50.0
}

/// Per-point search radius: the grid spacing in meters, floored at 500m so a
/// degenerate zero-radius grid still searches something.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn point_radius_m(radius_km: f64, density: Density) -> u32 {
    let half = f64::from((density.side() - 1) / 2);
    let spacing_m = radius_km * 1000.0 / half;
    spacing_m.max(500.0).round() as u32
}

/// Export file stem derived from the search term.
#[must_use]
pub fn export_destination(search_term: &str) -> String {
    format!("{}_businesses", search_term.trim().replace(' ', "_"))
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
