use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to read the config file {}", .path.display())]
    IOError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error")]
    TOMLParseError(#[from] toml::de::Error),

    #[error("Missing mandatory setting: {key}")]
    MissingSetting { key: &'static str },

    #[error("Invalid value for {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("Invalid url for thingspeak.url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid log level: {name:?}, supported levels are trace, debug, info, warn and error")]
    InvalidLogLevel { name: String },
}
