//! Configuration module

mod settings;

pub use settings::{
    AgentConfig, LoggingConfig, ProviderConfig, SchedulerConfig, ServerConfig, Settings,
    StorageConfig, StoreConfig, ThrottleConfig,
};
