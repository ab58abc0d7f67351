//! Succession Render Library
//!
//! Draws the diagnostic keyframe grid (`keyframes_grid.png`). The renderer
//! plugs into the segmentation engine as a [`succession_core::DiagnosticsSink`].

pub mod glyphs;
pub mod grid_compositor;

pub use grid_compositor::GridRenderer;

/// Result type for succession-render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for succession-render operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Succession core error: {0}")]
    Core(#[from] succession_core::Error),

    #[error("Invalid grid layout: {0}")]
    InvalidGrid(String),
}
