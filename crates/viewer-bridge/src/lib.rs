pub mod catalog;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod messages;
pub mod source;
pub mod worker;

pub use catalog::{ModelCatalog, ModelRequest};
pub use config::{BridgeConfig, ConfigError};
pub use controller::{PipelineContext, PipelineController};
pub use dispatch::{dispatch, process_message};
pub use messages::*;
pub use source::{DirectorySource, MemorySource, ModelSource, SourceError};
pub use worker::{BridgeError, PipelineWorker, RequestId, WorkerUpdate};
