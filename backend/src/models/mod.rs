//! Domain models shared across services and API handlers.

pub mod key;
pub mod promote;
pub mod store;

pub use key::{KeyParseError, PackageType, StoreKey, StoreType};
pub use promote::{
    GroupPromoteRequest, GroupPromoteResult, PathsPromoteRequest, PathsPromoteResult,
    ValidationResult,
};
pub use store::{ArtifactStore, StoreSpec};
