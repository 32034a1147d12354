pub mod classifier;
pub mod compression;
pub mod config;
pub mod history;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod poller;
pub mod selection;
pub mod service;
pub mod testing;

pub use classifier::{format_duration, MediaShape, Rendering, ResultPayload};
pub use compression::{estimate_size_label, estimate_size_mb, CompressionQuality};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use history::{HistoryCache, HistorySnapshot};
pub use job::{descriptor, FailureKind, Job, JobDescriptor, JobKind, JobState};
pub use orchestrator::{JobOrchestrator, OrchestratorError};
pub use selection::{PlaylistItem, PlaylistManifest, SelectionModel, SelectionSnapshot};
pub use service::{
    HttpJobService, InstagramMedia, JobParameters, JobService, JobServiceError, LivestreamStatus,
    MediaFormat, ResourceStream, Upload,
};
