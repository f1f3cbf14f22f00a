//! Release merging: structural paths, flattening, and the merger.

pub mod flatten;
pub mod merger;
pub mod path;

pub use flatten::{flatten, unflatten, Flattened};
pub use merger::{Merged, Merger};
pub use path::{IdValue, Path, Segment};
