//! Contract types shared by every layer
//!
//! - `version`: the storage-assigned write identifier
//! - `timestamp`: millisecond timestamps used for modification and expiration times

pub mod timestamp;
pub mod version;

pub use timestamp::Timestamp;
pub use version::Version;
