pub mod cascade;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod gpu;
pub mod hook;
pub mod light;
pub mod manager;
pub mod probe;
pub mod rebase;
pub mod texture_pair;
pub mod time;
pub mod work_list;

pub use config::{LodConfig, ShadowDataConfig, ShadowSimSettings};
pub use error::{FailureCategory, ShadowDataError};
pub use manager::{FrameOutcome, ShadowBinding, ShadowData, ShadowDataStatus, ShadowFrame, ShadowUpdateParams};
