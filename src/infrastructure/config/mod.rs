mod settings;

pub use settings::{
    DatabaseConfig, LogFormat, LoggingConfig, OtelConfig, ServerConfig, Settings, StorageConfig, UploadConfig,
};
