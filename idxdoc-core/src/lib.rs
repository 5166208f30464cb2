pub mod backup;
pub mod category;
pub mod codec;
pub mod config;
pub mod error;
pub mod header;
pub mod ledger;
pub mod localize;
pub mod lock;
pub mod orchestrator;
pub mod report;
pub mod scan;

pub use error::{IdxError, Result};
