//! Error types for the sync engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and the sync run so
//! `main` can propagate with `?`.

/// Top-level error for the sync engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: mevo_core::ConfigError,
    },

    /// An HTTP client could not be built.
    #[error("client error: {source}")]
    Client {
        /// The underlying client error.
        #[from]
        source: mevo_feed::ClientError,
    },

    /// The sync run stopped.
    #[error("sync error: {source}")]
    Sync {
        /// The underlying sync error.
        #[from]
        source: mevo_core::SyncError,
    },

    /// The render queue could not report its final state.
    #[error("render error: {source}")]
    Render {
        /// The underlying render error.
        #[from]
        source: mevo_render::RenderError,
    },
}
