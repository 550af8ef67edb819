//! Errors that stop the sync orchestrator.

use mevo_render::RenderError;

/// A failure the orchestrator cannot contain to a single feed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The render queue is gone, so no feed can be reconciled.
    #[error("render error: {source}")]
    Render {
        /// The underlying render error.
        #[from]
        source: RenderError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_queue_is_the_only_fatal_error() {
        let err = SyncError::from(RenderError::QueueClosed);
        let SyncError::Render { source } = &err;
        assert_eq!(source, &RenderError::QueueClosed);
        assert!(err.to_string().starts_with("render error:"));
    }
}
