//! Credential store.
//!
//! Loads and hot-reloads the callsign → {secret, ttl, commands} mapping
//! from the external YAML document maintained by the provisioning tool.

mod handle;
mod loader;
mod records;

pub use handle::StoreHandle;
pub use loader::{load, modified_time};
pub use records::{CommandBinding, Identity, StoreSnapshot};
