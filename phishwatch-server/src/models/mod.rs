//! Data models

pub mod alert;
pub mod record;
pub mod report;

pub use alert::*;
pub use record::*;
pub use report::*;
