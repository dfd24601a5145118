pub mod entity;
pub mod geometry;
pub mod movement;

pub use entity::{Entity, Storage, Tracked, World};
pub use geometry::{IsWithin, OuterGaps, Point, Rect};
pub use movement::{Edge, Movement};
