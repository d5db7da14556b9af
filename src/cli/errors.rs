use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid {arg}: {value}")]
    InvalidArgument { arg: String, value: String },

    #[error("Invalid extra dimension {spec}, expected name=type")]
    InvalidExtraDim { spec: String },

    #[error("Files differ: {details}")]
    Differ { details: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lidar(#[from] lidar_tools::Error),
}
