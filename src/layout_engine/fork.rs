//! One binary split of the tiling tree.
//!
//! A fork never knows its parent; the forest keeps that link in a side table.

use serde::{Deserialize, Serialize};

use super::{MonitorId, Node, Orientation, Side, ToplevelKey, WorkspaceId};
use crate::model::Rect;

/// Smallest length, in pixels, a branch may be squeezed to along the split axis.
pub const MIN_LEAF_PX: i32 = 256;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fork {
    pub left: Node,
    pub right: Option<Node>,
    /// Share of the split axis given to `left`.
    pub ratio: f64,
    pub ratio_minimum: f64,
    pub orientation: Orientation,
    pub area: Rect,
    pub monitor: MonitorId,
    pub workspace: WorkspaceId,
    pub is_toplevel: bool,
    min_leaf_px: i32,
}

/// Splits an inner gap into the part kept by the left branch and the part
/// kept by the right one. Odd gaps give the extra pixel to the right.
pub fn gap_halves(inner_gap: i32) -> (i32, i32) {
    let lo = inner_gap / 2;
    (lo, inner_gap - lo)
}

/// Rounds to four decimal places, a hundredth of a percent. Two decimals would
/// not represent a split such as 1200 of 1920 px (0.625) exactly.
fn quantize(ratio: f64) -> f64 { (ratio * 10_000.0).round() / 10_000.0 }

impl Fork {
    pub fn new(
        left: Node,
        right: Option<Node>,
        area: Rect,
        orientation: Orientation,
        key: ToplevelKey,
        min_leaf_px: i32,
    ) -> Fork {
        let mut fork = Fork {
            left,
            right,
            ratio: 0.5,
            ratio_minimum: 0.5,
            orientation,
            area,
            monitor: key.monitor,
            workspace: key.workspace,
            is_toplevel: false,
            min_leaf_px,
        };
        fork.set_area(area);
        fork
    }

    pub fn key(&self) -> ToplevelKey {
        ToplevelKey { monitor: self.monitor, workspace: self.workspace }
    }

    pub fn is_full(&self) -> bool { self.right.is_some() }

    pub fn branch(&self, side: Side) -> Option<Node> {
        match side {
            Side::Left => Some(self.left),
            Side::Right => self.right,
        }
    }

    pub fn side_of(&self, node: Node) -> Option<Side> {
        if self.left == node {
            Some(Side::Left)
        } else if self.right == Some(node) {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn set_branch(&mut self, side: Side, node: Node) {
        match side {
            Side::Left => self.left = node,
            Side::Right => self.right = Some(node),
        }
    }

    /// Swaps `old` for `new` wherever it sits, returning the side it was on.
    pub fn replace(&mut self, old: Node, new: Node) -> Option<Side> {
        let side = self.side_of(old)?;
        self.set_branch(side, new);
        Some(side)
    }

    /// Allowed ratio range for the current area and orientation. An axis too
    /// short to hold two minimum leaves pins the ratio to one half.
    pub fn ratio_bounds(&self) -> (f64, f64) {
        let axis = self.area.axis_length(self.orientation);
        if axis <= 0 || axis < 2 * self.min_leaf_px {
            return (0.5, 0.5);
        }
        let minimum = f64::from(self.min_leaf_px) / f64::from(axis);
        (minimum, 1.0 - minimum)
    }

    fn clamp_ratio(&self, ratio: f64) -> f64 {
        let (lo, hi) = self.ratio_bounds();
        quantize(ratio).clamp(lo, hi)
    }

    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
        let (lo, hi) = self.ratio_bounds();
        self.ratio_minimum = lo;
        self.ratio = self.ratio.clamp(lo, hi);
    }

    /// Moves the split so the left branch plus its half of the inner gap spans
    /// `split` pixels from the area origin.
    pub fn set_ratio(&mut self, split: i32) {
        let axis = self.area.axis_length(self.orientation);
        if axis <= 0 {
            return;
        }
        self.ratio = self.clamp_ratio(f64::from(split) / f64::from(axis));
    }

    /// Like [`Fork::set_ratio`], measuring the right branch from the far edge.
    pub fn set_ratio_from_right(&mut self, right_length: i32) {
        let axis = self.area.axis_length(self.orientation);
        self.set_ratio(axis - right_length);
    }

    pub fn toggle_orientation(&mut self) {
        self.orientation = self.orientation.toggle();
        self.set_area(self.area);
    }

    /// Re-derives the orientation from the area's shape after the fork's
    /// children were reassigned, resetting the ratio if the axis changed.
    pub fn rebalance_orientation(&mut self) {
        let preferred = self.area.preferred_orientation();
        if preferred != self.orientation {
            self.orientation = preferred;
            self.ratio = 0.5;
        }
        self.set_area(self.area);
    }

    pub fn swap_branches(&mut self) {
        if let Some(right) = self.right {
            self.right = Some(self.left);
            self.left = right;
            self.ratio = self.clamp_ratio(1.0 - self.ratio);
        }
    }

    /// Rectangles of the two branches with the inner gap between them. The
    /// left branch gets the whole area when the right one is absent.
    pub fn split(&self, inner_gap: i32) -> (Rect, Option<Rect>) {
        if self.right.is_none() {
            return (self.area, None);
        }
        let area = self.area;
        let axis = area.axis_length(self.orientation);
        let (lo, hi) = gap_halves(inner_gap);
        let split = (f64::from(axis) * self.ratio).round() as i32;
        let left_length = (split - lo).max(0);
        let right_start = (split + hi).min(axis);
        let right_length = axis - right_start;

        match self.orientation {
            Orientation::Horizontal => (
                Rect::new(area.x, area.y, left_length, area.height),
                Some(Rect::new(area.x + right_start, area.y, right_length, area.height)),
            ),
            Orientation::Vertical => (
                Rect::new(area.x, area.y, area.width, left_length),
                Some(Rect::new(area.x, area.y + right_start, area.width, right_length)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;

    const KEY: ToplevelKey = ToplevelKey { monitor: 0, workspace: 0 };

    fn fork(area: Rect, orientation: Orientation) -> Fork {
        Fork::new(
            Node::Window(Entity::new(0, 0)),
            Some(Node::Window(Entity::new(1, 0))),
            area,
            orientation,
            KEY,
            MIN_LEAF_PX,
        )
    }

    #[test]
    fn even_split_without_gap() {
        let f = fork(Rect::new(0, 0, 1920, 1080), Orientation::Horizontal);
        assert_eq!(
            f.split(0),
            (Rect::new(0, 0, 960, 1080), Some(Rect::new(960, 0, 960, 1080)))
        );
    }

    #[test]
    fn split_conserves_area_with_gaps() {
        for gap in [0, 1, 7, 8, 15] {
            for orientation in [Orientation::Horizontal, Orientation::Vertical] {
                let mut f = fork(Rect::new(10, 20, 1366, 768), orientation);
                f.set_ratio(517);
                let (left, right) = f.split(gap);
                let right = right.unwrap();
                let axis = f.area.axis_length(orientation);
                assert_eq!(
                    left.axis_length(orientation) + gap + right.axis_length(orientation),
                    axis
                );
                assert!(!left.intersects(&right));
                assert!(f.area.contains(&left) && f.area.contains(&right));
            }
        }
    }

    #[test]
    fn vertical_split() {
        let mut f = fork(Rect::new(0, 0, 800, 1000), Orientation::Vertical);
        f.set_ratio(300);
        assert_eq!(f.ratio, 0.3);
        let (top, bottom) = f.split(10);
        assert_eq!(top, Rect::new(0, 0, 800, 295));
        assert_eq!(bottom, Some(Rect::new(0, 305, 800, 695)));
    }

    #[test]
    fn single_child_takes_whole_area() {
        let mut f = fork(Rect::new(0, 0, 1920, 1080), Orientation::Horizontal);
        f.right = None;
        assert_eq!(f.split(16), (Rect::new(0, 0, 1920, 1080), None));
    }

    #[test]
    fn ratio_is_clamped_and_quantized() {
        let mut f = fork(Rect::new(0, 0, 1920, 1080), Orientation::Horizontal);
        f.set_ratio(1200);
        assert_eq!(f.ratio, 0.625);

        f.set_ratio(10);
        assert_eq!(f.ratio, f.ratio_minimum);
        assert!((f.ratio_minimum - 256.0 / 1920.0).abs() < f64::EPSILON);

        f.set_ratio(1919);
        assert_eq!(f.ratio, 1.0 - f.ratio_minimum);

        f.set_ratio(641);
        assert_eq!(f.ratio, 0.3339);
    }

    #[test]
    fn short_axis_pins_ratio_to_half() {
        let mut f = fork(Rect::new(0, 0, 400, 1080), Orientation::Horizontal);
        assert_eq!(f.ratio_bounds(), (0.5, 0.5));
        f.set_ratio(50);
        assert_eq!(f.ratio, 0.5);

        let mut empty = fork(Rect::new(0, 0, 0, 0), Orientation::Vertical);
        empty.set_ratio(10);
        assert_eq!(empty.ratio, 0.5);
    }

    #[test]
    fn toggle_recomputes_minimum() {
        let mut f = fork(Rect::new(0, 0, 1920, 1024), Orientation::Horizontal);
        f.toggle_orientation();
        assert_eq!(f.orientation, Orientation::Vertical);
        assert_eq!(f.ratio_minimum, 0.25);
    }

    #[test]
    fn shrinking_area_pulls_ratio_into_range() {
        let mut f = fork(Rect::new(0, 0, 1920, 1080), Orientation::Horizontal);
        f.set_ratio(1600);
        f.set_area(Rect::new(0, 0, 1024, 1080));
        assert_eq!(f.ratio, 0.75);
        assert_eq!(f.ratio_minimum, 0.25);
    }

    #[test]
    fn rebalance_follows_area_shape() {
        let mut f = fork(Rect::new(0, 0, 1920, 1080), Orientation::Vertical);
        f.set_ratio(700);
        f.rebalance_orientation();
        assert_eq!(f.orientation, Orientation::Horizontal);
        assert_eq!(f.ratio, 0.5);

        f.set_ratio(1200);
        f.rebalance_orientation();
        assert_eq!(f.ratio, 0.625);
    }

    #[test]
    fn swap_mirrors_ratio() {
        let mut f = fork(Rect::new(0, 0, 1920, 1080), Orientation::Horizontal);
        let (left, right) = (f.left, f.right);
        f.set_ratio(1200);
        f.swap_branches();
        assert_eq!(f.left, right.unwrap());
        assert_eq!(f.right, Some(left));
        assert_eq!(f.ratio, 0.375);
    }

    #[test]
    fn branch_lookup() {
        let mut f = fork(Rect::new(0, 0, 1920, 1080), Orientation::Horizontal);
        let a = Node::Window(Entity::new(0, 0));
        let b = Node::Window(Entity::new(1, 0));
        let c = Node::Window(Entity::new(2, 0));
        assert_eq!(f.side_of(a), Some(Side::Left));
        assert_eq!(f.side_of(b), Some(Side::Right));
        assert_eq!(f.side_of(c), None);
        assert_eq!(f.replace(b, c), Some(Side::Right));
        assert_eq!(f.branch(Side::Right), Some(c));
        assert_eq!(f.replace(b, c), None);
    }
}
