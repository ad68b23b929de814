//! Daemon configuration.

mod settings;

pub use settings::{
    AuditConfig, ExecConfig, LoggingConfig, ReplayConfig, Settings, StoreConfig,
};
