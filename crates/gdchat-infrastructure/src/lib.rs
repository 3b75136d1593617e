pub mod config_service;
pub mod file_store;
pub mod paths;
pub mod transcript_exporter;

pub use crate::config_service::ConfigService;
pub use crate::file_store::FileKeyValueStore;
pub use crate::paths::GdchatPaths;
pub use crate::transcript_exporter::FileTranscriptExporter;
