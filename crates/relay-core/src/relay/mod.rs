// Relay modules

pub mod boundary;
pub mod common;
pub mod controller;
pub mod key_pool;
pub mod model_catalog;
pub mod retry;
pub mod state;
pub mod upstream;

pub use controller::{FragmentStream, ResilientStreamController};
pub use key_pool::{Credential, KeyPool, KeyTier};
pub use model_catalog::ModelCatalog;
pub use state::ServiceState;
