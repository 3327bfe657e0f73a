use thiserror::Error;

/// Errors produced by the texture layout, the packer and the difference metrics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// No free region could hold the element, even after growing the canvas to its
    /// maximum size.
    #[error("no room left for a {width}x{height} element")]
    AllocationFailed { width: u32, height: u32 },
    /// No allocated element matches the provided position and size.
    #[error("no {width}x{height} element allocated at ({x}, {y})")]
    NotFound { x: u32, y: u32, width: u32, height: u32 },
    /// The inputs violate the contract of the operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
