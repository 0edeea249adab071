//! Procedural props for block-style 3D scenes
//!
//! Builders turn a handful of [`BuildOptions`] into a merged, materialised,
//! spinning composite mesh inside a CPU-side [`Scene`].

pub mod effects;
pub mod material;
pub mod mesh;
pub mod options;
pub mod palette;
pub mod props;
pub mod scene;
pub mod texture;

pub use options::BuildOptions;
pub use palette::{color_name_to_rgb, size_name_to_scale};
pub use props::{build_couch, build_sword, CompositeObject, PropKind};
pub use scene::{Scene, SceneError};
