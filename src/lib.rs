pub mod activity;
pub mod cli;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod platform;
pub mod report;
pub mod store;
pub mod util;

pub use activity::{ActivityLog, Logger};
pub use error::BackupError;
pub use store::{BackupStore, Layout, Outcome};
