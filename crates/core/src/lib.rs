//! Storyforge Core Library
//!
//! Turns a topic, optional images or video, and a tone into short-video
//! storyboards by calling a generative model backend, with a credit ledger
//! that only charges for runs that produce a result.

pub mod assets;
pub mod config;
pub mod error;
pub mod export;
pub mod ledger;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod request;
pub mod run;
pub mod store;
pub mod transport;
pub mod types;

// Re-export commonly used items at crate root
pub use assets::{Asset, AssetKind, AssetSet};
pub use config::GeneratorConfig;
pub use error::{Result, StoryforgeError};
pub use export::{export_file_name, format_script_export, save_export};
pub use ledger::{CreditLedger, FileLedger, InMemoryLedger, Reservation};
pub use normalize::{RepairStrategy, normalize, recover_json};
pub use paths::{get_export_dir, get_ledger_path, get_root_data_dir};
pub use pipeline::GenerationSession;
pub use provider::{Provider, ProviderConfig};
pub use request::build_request;
pub use run::{GenerationRun, RunState};
pub use store::{ResultStore, StoredResult};
pub use transport::{HttpTransport, RawResponse, Transport};
pub use types::{AssetType, GenerationRequest, ScenarioMode, Scene, Script};

pub use tokio_util::sync::CancellationToken;
