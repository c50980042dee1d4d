//! Download pipeline: URL matching, per-platform extraction and file lifecycle

pub mod adapter;
pub mod cleanup;
pub mod credentials;
pub mod error;
pub mod instagram_photo;
pub mod normalize;
pub mod orchestrator;
pub mod persona;
pub mod platform;
pub mod progress;
pub mod types;
pub mod upload;
pub mod ytdlp;
pub mod ytdlp_errors;

// Re-exports for convenience
pub use cleanup::{FileLease, LeaseRegistry, SweepReport, Sweeper};
pub use error::DownloadError;
pub use orchestrator::Orchestrator;
pub use platform::{Platform, PlatformMatcher};
pub use progress::ProgressEvent;
pub use types::{DownloadRequest, DownloadResult, MediaFormat, MediaKind, VideoQuality};
pub use upload::{deliver, Delivery, FileHost, GofileHost};
pub use ytdlp::{Extractor, YtDlpExtractor};
