//! Harvest command handler.
//!
//! Wires the config, provider client, exporter, and checkpoint store into a
//! harvester and drives a single run to completion. Ctrl-C cancels
//! cooperatively: the run stops at its next pause point and keeps its
//! checkpoint so the printed key can be passed back via `--resume-key`.

use chrono::Utc;
use clap::Args;
use leadgrid_core::AppConfig;
use leadgrid_harvest::{
    checkpoint_key, CancelFlag, CenterQuery, CheckpointStore, CsvExporter, Density, HarvestLimits,
    HarvestRequest, Harvester, RunRegistry, SystemClock,
};
use leadgrid_places::PlacesClient;

#[derive(Debug, Args)]
pub(crate) struct HarvestArgs {
    /// Search center: "lat,lng" or a free-text place query to geocode.
    #[arg(long)]
    center: String,

    /// Search radius in kilometers.
    #[arg(long)]
    radius_km: f64,

    /// Grid density: low, medium, or high.
    #[arg(long, default_value = "medium")]
    density: Density,

    /// Business search term, e.g. "coffee shop".
    #[arg(long)]
    term: String,

    /// Checkpoint key printed by an earlier interrupted run; resumes it
    /// instead of starting fresh.
    #[arg(long)]
    resume_key: Option<String>,
}

/// Run one harvest end to end and print the outcome.
///
/// # Errors
///
/// Returns an error if the provider client cannot be constructed or the run
/// fails (including cancellation). A failed run's checkpoint survives, so the
/// printed key remains usable with `--resume-key`.
pub(crate) async fn run_harvest(config: &AppConfig, args: HarvestArgs) -> anyhow::Result<()> {
    let provider = PlacesClient::new(
        &config.places_api_key,
        config.request_timeout_secs,
        &config.user_agent,
    )
    .map_err(|e| anyhow::anyhow!("failed to build places client: {e}"))?;

    let limits = HarvestLimits {
        min_call_interval_ms: config.min_call_interval_ms,
        inter_point_delay_ms: config.inter_point_delay_ms,
        max_results_per_point: config.max_results_per_point,
    };

    let harvester = Harvester::new(
        provider,
        SystemClock,
        CsvExporter::new(&config.export_dir),
        CheckpointStore::new(&config.checkpoint_dir),
        limits,
    );

    let key = match args.resume_key {
        Some(ref key) => key.clone(),
        None => checkpoint_key(&args.term, Utc::now()),
    };

    let request = HarvestRequest {
        center: CenterQuery::parse(&args.center),
        radius_km: args.radius_km,
        density: args.density,
        search_term: args.term.clone(),
    };

    let registry = RunRegistry::new();
    let run_id = registry.submit();
    println!("run {run_id}");
    println!("checkpoint key: {key}");

    let cancel = CancelFlag::new();
    let ctrlc_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("cancel requested; stopping at the next pause point");
            ctrlc_flag.cancel();
        }
    });

    match harvester
        .run(&registry, run_id, &request, &key, &cancel)
        .await
    {
        Ok(outcome) => {
            println!(
                "completed: {} records ({} unique candidates, {} provider calls)",
                outcome.record_count, outcome.unique_candidates, outcome.api_calls
            );
            println!("exported to {}", outcome.export_path.display());
            Ok(())
        }
        Err(e) => {
            if let Some(state) = registry.snapshot(run_id) {
                eprintln!(
                    "failed at {:.0}%: {}",
                    state.progress_percent, state.status_message
                );
            }
            Err(e.into())
        }
    }
}
