//! Scene collection model.
//!
//! Collections are described by fixture functions, validated once by the
//! builder and kept with their blueprint so a disconnect can restore them.

pub mod builder;
pub mod collection;
pub mod fixtures;
pub mod registry;

pub use builder::{Blueprint, CollectionBuilder, ItemDef};
pub use collection::{
    Filter, ItemRef, Scene, SceneCollection, SceneItem, Source, SourceKind, SpecialRole,
    Transform, Transition,
};
pub use registry::CollectionRegistry;
