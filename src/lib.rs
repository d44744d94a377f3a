pub mod archive;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod intercept;
pub mod ledger;
pub mod record;

pub use config::NotaryConfig;
pub use error::{NotaryError, Result};
pub use ledger::{AnchorLedger, RecordId, Visibility};
pub use record::{Receipt, Recorded, Recorder, RequestSpec};
