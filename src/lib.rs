//! Texture space layout for baked lightmaps and shadowmaps.
//!
//! [`TextureLayout`] incrementally places rectangles into a growable canvas using a
//! binary tree of regions, and reclaims space by collapsing subtrees when elements are
//! removed. The [`packer`] module builds on it to spread many mappings over several
//! atlas textures, sharing the storage of mappings that are identical or close enough
//! according to the [`metrics`] module.

#[cfg(feature = "serde")]
#[macro_use]
pub extern crate serde;
pub extern crate euclid;

mod error;
mod layout;
pub mod metrics;
pub mod packer;

pub use error::LayoutError;
pub use layout::*;
pub use euclid::{point2, size2};

pub type Point = euclid::default::Point2D<u32>;
pub type Size = euclid::default::Size2D<u32>;
pub type Rectangle = euclid::default::Box2D<u32>;

/// Options to tweak the behavior of the texture layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct LayoutOptions {
    /// Round the tracked canvas size up to a power of two after each allocation.
    ///
    /// Default value: false.
    pub power_of_two: bool,
    /// Round the size of each element up to a multiple of four.
    ///
    /// Block-compressed formats work on 4x4 texel blocks, so this keeps every element
    /// on a block boundary.
    ///
    /// Default value: true.
    pub align_by_four: bool,
}

pub const DEFAULT_OPTIONS: LayoutOptions = LayoutOptions {
    power_of_two: false,
    align_by_four: true,
};

impl Default for LayoutOptions {
    fn default() -> Self {
        DEFAULT_OPTIONS
    }
}
