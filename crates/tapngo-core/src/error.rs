use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Classification errors
    #[error("Invalid item label: {0}")]
    InvalidLabel(String),

    #[error("No price configured for item '{label}'")]
    PriceUnavailable { label: String },

    // Display errors
    #[error("Invalid display line {line} (max {max})")]
    InvalidLine { line: usize, max: usize },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
