/// Convenience result type used throughout the crate.
pub type OutpaintResult<T> = Result<T, OutpaintError>;

/// Error type for the paint pipeline and its collaborator traits.
///
/// None of these cross the [`RenderManager`](crate::RenderManager) boundary as a hard failure:
/// the orchestrator turns them into aborted or skipped frames.
#[derive(thiserror::Error, Debug)]
pub enum OutpaintError {
    /// The presentation layer cannot start a frame right now (output disabled, modeset pending).
    #[error("output not ready")]
    OutputNotReady,

    /// A pixel buffer could not be allocated.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// The graphics or presentation backend rejected an operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A workspace outside the output's workspace grid.
    #[error("workspace {0} is outside the workspace grid")]
    UnknownWorkspace(crate::foundation::core::WorkspaceId),

    /// Wrapped foreign error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OutpaintError {
    /// Build an [`OutpaintError::Allocation`].
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build an [`OutpaintError::Backend`].
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Build an [`OutpaintError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// `true` for errors that are expected to clear on their own by the next frame.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OutputNotReady)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
