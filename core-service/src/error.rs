use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid arguments for {action}: {message}")]
    InvalidArguments {
        action: &'static str,
        message: String,
    },

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
