//! Classifies how a window's rectangle changed between two observations.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::Rect;
use crate::layout_engine::{Direction, Orientation};

bitflags! {
    /// A direction flag names where the moving edge went, so `GROW | RIGHT` is
    /// the right edge moving right and `SHRINK | LEFT` is the right edge moving
    /// left.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Movement: u8 {
        const MOVED = 1;
        const GROW = 1 << 1;
        const SHRINK = 1 << 2;
        const LEFT = 1 << 3;
        const UP = 1 << 4;
        const RIGHT = 1 << 5;
        const DOWN = 1 << 6;
    }
}

/// The side of a window rectangle that a resize dragged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Left,
    Top,
    Right,
    Bottom,
}

impl Edge {
    pub fn orientation(self) -> Orientation {
        match self {
            Edge::Left | Edge::Right => Orientation::Horizontal,
            Edge::Top | Edge::Bottom => Orientation::Vertical,
        }
    }
}

impl Movement {
    /// Classifies the change from `from` to `to`. A corner drag that resizes
    /// both axes reports its horizontal edge; use [`Movement::axes`] to get
    /// both.
    pub fn calculate(from: Rect, to: Rect) -> Movement {
        let horizontal = Self::axis(from, to, Orientation::Horizontal);
        let vertical = Self::axis(from, to, Orientation::Vertical);
        if horizontal == Some(Movement::MOVED) || vertical == Some(Movement::MOVED) {
            return Movement::MOVED;
        }
        horizontal.or(vertical).unwrap_or_else(Movement::empty)
    }

    /// Splits a resize into single-edge steps, horizontal first. Each step
    /// carries the rectangle after it is applied, so the last one ends at
    /// `to`. Empty when the change is not a resize.
    pub fn axes(from: Rect, to: Rect) -> Vec<(Movement, Rect)> {
        let horizontal = Self::axis(from, to, Orientation::Horizontal);
        let vertical = Self::axis(from, to, Orientation::Vertical);
        if horizontal == Some(Movement::MOVED) || vertical == Some(Movement::MOVED) {
            return Vec::new();
        }
        let middle = Rect { x: to.x, width: to.width, ..from };
        let mut steps = Vec::new();
        if let Some(movement) = horizontal {
            steps.push((movement, middle));
        }
        if let Some(movement) = vertical {
            steps.push((movement, to));
        }
        steps
    }

    /// How the two edges of `orientation` changed. Both edges moving is a
    /// move.
    fn axis(from: Rect, to: Rect, orientation: Orientation) -> Option<Movement> {
        let (near, far) = match orientation {
            Orientation::Horizontal => (Movement::LEFT, Movement::RIGHT),
            Orientation::Vertical => (Movement::UP, Movement::DOWN),
        };
        let (from_lo, to_lo) = (from.axis_origin(orientation), to.axis_origin(orientation));
        let from_len = from.axis_length(orientation);
        let to_len = to.axis_length(orientation);
        let from_hi = from_lo + from_len;
        let to_hi = to_lo + to_len;

        if from_lo == to_lo && from_hi == to_hi {
            None
        } else if from_lo == to_lo {
            // Far edge moved.
            Some(if to_len > from_len { Movement::GROW | far } else { Movement::SHRINK | near })
        } else if from_hi == to_hi {
            // Near edge moved.
            Some(if to_len > from_len { Movement::GROW | near } else { Movement::SHRINK | far })
        } else {
            Some(Movement::MOVED)
        }
    }

    pub fn is_resize(self) -> bool { self.intersects(Movement::GROW | Movement::SHRINK) }

    /// Direction the moving edge travelled.
    pub fn direction(self) -> Option<Direction> {
        if self.contains(Movement::LEFT) {
            Some(Direction::Left)
        } else if self.contains(Movement::RIGHT) {
            Some(Direction::Right)
        } else if self.contains(Movement::UP) {
            Some(Direction::Up)
        } else if self.contains(Movement::DOWN) {
            Some(Direction::Down)
        } else {
            None
        }
    }

    pub fn edge(self) -> Option<Edge> {
        let grow = self.contains(Movement::GROW);
        let shrink = self.contains(Movement::SHRINK);
        if grow == shrink {
            return None;
        }
        let edge = match (self.direction()?, grow) {
            (Direction::Right, true) | (Direction::Left, false) => Edge::Right,
            (Direction::Left, true) | (Direction::Right, false) => Edge::Left,
            (Direction::Up, true) | (Direction::Down, false) => Edge::Top,
            (Direction::Down, true) | (Direction::Up, false) => Edge::Bottom,
        };
        Some(edge)
    }
}
