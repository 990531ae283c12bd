//! Input tables and their CSV loaders

pub mod tables;
pub mod parser;

pub use parser::{TableLoader, ANCHORS_FILE, FRAMES_FILE, MOBILES_FILE};
pub use tables::{AnchorTable, Dataset, FrameTable, NodeFrames};
