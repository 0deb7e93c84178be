pub mod checkpoint;
pub mod dedup;
pub mod export;
pub mod grid;
pub mod orchestrator;
pub mod provider;
pub mod records;
pub mod state;
pub mod throttle;

pub use checkpoint::{checkpoint_key, CheckpointError, CheckpointStore, RunCheckpoint};
pub use dedup::dedup_first_seen;
pub use export::{CsvExporter, ExportError, Exporter};
pub use grid::{generate_grid, Density, GridPoint};
pub use orchestrator::{
    CenterQuery, HarvestError, HarvestLimits, HarvestOutcome, HarvestRequest, Harvester,
};
pub use provider::PlaceSource;
pub use records::EnrichedRecord;
pub use state::{CancelFlag, RunOutcome, RunRegistry, RunState, RunStatus, StateError};
pub use throttle::{Clock, FakeClock, Pacer, SystemClock};
