mod auto_tiler;
mod error;
mod events;
mod forest;
mod fork;
pub(crate) mod graph;
mod node;
mod resize;
mod stack;

pub use auto_tiler::{AutoTiler, GrabOp, WindowState};
pub use error::TilingError;
pub use events::{ForestEvent, Outcome, Request};
pub use forest::{Forest, ForestSnapshot, MonitorId, Placement, ToplevelKey, WorkspaceId};
pub use fork::{Fork, MIN_LEAF_PX};
pub use graph::{Direction, Orientation, Side};
pub use node::Node;
pub use resize::ResizeAction;
pub use stack::{Stack, StackId, StackState, TabPlacement};

pub use crate::model::geometry::OuterGaps;

/// Numeric parameters the engine reads from its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TilingSettings {
    pub outer_gap: OuterGaps,
    pub inner_gap: i32,
    pub min_leaf_px: i32,
    pub rebalance_on_detach: bool,
    pub tab_height: i32,
    pub tab_placement: TabPlacement,
    pub stack_from_left: bool,
}

impl Default for TilingSettings {
    fn default() -> Self {
        TilingSettings {
            outer_gap: OuterGaps::default(),
            inner_gap: 0,
            min_leaf_px: MIN_LEAF_PX,
            rebalance_on_detach: true,
            tab_height: 24,
            tab_placement: TabPlacement::Top,
            stack_from_left: true,
        }
    }
}
