/// Result alias that carries the custom [`PlayerError`] type.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Common error type for the playback engine.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// No tracks are configured. Informational only, never retried.
    #[error("the playlist is empty")]
    EmptyPlaylist,
    /// The media backend could not load or decode the active source.
    #[error("failed to load audio `{uri}` (media error code {code})")]
    MediaLoad { uri: String, code: u16 },
    /// The audio subsystem refused to build the signal path. Playback carries
    /// on without visualisation or gain control.
    #[error("audio graph unavailable: {0}")]
    GraphConstruction(String),
    /// Platform gesture policy rejected a `play()` request.
    #[error("playback was blocked until the user interacts with the page")]
    AutoplayBlocked,
    /// The durable preference store could not be read or written.
    #[error("preference store: {0}")]
    Store(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl PlayerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Errors that degrade the player instead of stopping it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EmptyPlaylist | Self::GraphConstruction(_) | Self::AutoplayBlocked
        )
    }
}

impl From<&str> for PlayerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PlayerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
