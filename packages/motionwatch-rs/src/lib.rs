pub mod acquisition;
pub mod classifier;
pub mod config;
pub mod debounce;
pub mod error;
pub mod mirror_buffer;
pub mod monitor;
pub mod offline;
pub mod result_pool;
pub mod source;
pub mod spectral;
pub mod supervisor;
pub mod types;

pub use types::*;
pub use classifier::{BandAnalysis, ClassificationReport, Classifier, FreezeAnalysis, StatusBoard};
pub use config::{DetectorConfig, MonitorConfig, SpectralConfig, TimingConfig};
pub use error::{MonitorError, Result, SourceError};
pub use monitor::{Monitor, MonitorHandle, MonitorOutcome, MonitorState};
pub use offline::{analyze_source, AnalysisSummary, OfflineAnalyzer};
pub use source::{CsvReplaySource, SampleSource, SyntheticSource, Tone};
pub use supervisor::{ShutdownCause, ShutdownSignal};
