//! Maps an edge drag on one branch of a fork to the ratio change it implies.

use super::fork::{Fork, gap_halves};
use super::{Orientation, Side};
use crate::model::{Movement, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeAction {
    /// The left branch's far edge moved; derive the split from it.
    ByLeft,
    /// The right branch's near edge moved; derive the split from it.
    ByRight,
    /// This fork's split is not the edge that moved; try the parent.
    Ascend,
}

const GROW_LEFT: Movement = Movement::GROW.union(Movement::LEFT);
const GROW_RIGHT: Movement = Movement::GROW.union(Movement::RIGHT);
const GROW_UP: Movement = Movement::GROW.union(Movement::UP);
const GROW_DOWN: Movement = Movement::GROW.union(Movement::DOWN);
const SHRINK_LEFT: Movement = Movement::SHRINK.union(Movement::LEFT);
const SHRINK_RIGHT: Movement = Movement::SHRINK.union(Movement::RIGHT);
const SHRINK_UP: Movement = Movement::SHRINK.union(Movement::UP);
const SHRINK_DOWN: Movement = Movement::SHRINK.union(Movement::DOWN);

/// Every drag that moves a fork's own split. Anything missing ascends.
const RESIZE_CASES: [(Orientation, Side, Movement, ResizeAction); 8] = [
    (Orientation::Horizontal, Side::Left, GROW_RIGHT, ResizeAction::ByLeft),
    (Orientation::Horizontal, Side::Left, SHRINK_LEFT, ResizeAction::ByLeft),
    (Orientation::Horizontal, Side::Right, GROW_LEFT, ResizeAction::ByRight),
    (Orientation::Horizontal, Side::Right, SHRINK_RIGHT, ResizeAction::ByRight),
    (Orientation::Vertical, Side::Left, GROW_DOWN, ResizeAction::ByLeft),
    (Orientation::Vertical, Side::Left, SHRINK_UP, ResizeAction::ByLeft),
    (Orientation::Vertical, Side::Right, GROW_UP, ResizeAction::ByRight),
    (Orientation::Vertical, Side::Right, SHRINK_DOWN, ResizeAction::ByRight),
];

pub fn action(orientation: Orientation, side: Side, movement: Movement) -> ResizeAction {
    RESIZE_CASES
        .iter()
        .find(|(o, s, m, _)| *o == orientation && *s == side && *m == movement)
        .map_or(ResizeAction::Ascend, |case| case.3)
}

/// Moves the fork's split onto the dragged edge of `rect`. Returns false for
/// [`ResizeAction::Ascend`].
pub fn apply(fork: &mut Fork, action: ResizeAction, rect: Rect, inner_gap: i32) -> bool {
    let orientation = fork.orientation;
    let origin = fork.area.axis_origin(orientation);
    let (lo, hi) = gap_halves(inner_gap);
    match action {
        ResizeAction::ByLeft => {
            let end = rect.axis_origin(orientation) + rect.axis_length(orientation);
            fork.set_ratio(end - origin + lo);
            true
        }
        ResizeAction::ByRight => {
            let far = origin + fork.area.axis_length(orientation);
            fork.set_ratio_from_right(far - rect.axis_origin(orientation) + hi);
            true
        }
        ResizeAction::Ascend => false,
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::layout_engine::{MIN_LEAF_PX, Node, ToplevelKey};
    use crate::model::{Edge, Entity};

    const ALL: [Movement; 8] = [
        GROW_LEFT,
        GROW_RIGHT,
        GROW_UP,
        GROW_DOWN,
        SHRINK_LEFT,
        SHRINK_RIGHT,
        SHRINK_UP,
        SHRINK_DOWN,
    ];

    #[test]
    fn every_combination_is_tabled() {
        let mut direct = 0;
        for orientation in Orientation::iter() {
            for side in Side::iter() {
                for movement in ALL {
                    let got = action(orientation, side, movement);
                    let edge = movement.edge().unwrap();
                    let (near, far) = match orientation {
                        Orientation::Horizontal => (Edge::Left, Edge::Right),
                        Orientation::Vertical => (Edge::Top, Edge::Bottom),
                    };
                    let expected = match side {
                        Side::Left if edge == far => ResizeAction::ByLeft,
                        Side::Right if edge == near => ResizeAction::ByRight,
                        _ => ResizeAction::Ascend,
                    };
                    assert_eq!(got, expected, "{orientation:?} {side:?} {movement:?}");
                    if got != ResizeAction::Ascend {
                        direct += 1;
                    }
                }
            }
        }
        assert_eq!(direct, 8);
    }

    #[test]
    fn moved_windows_always_ascend() {
        assert_eq!(
            action(Orientation::Horizontal, Side::Left, Movement::MOVED),
            ResizeAction::Ascend
        );
    }

    const GAP: i32 = 10;

    fn fork() -> Fork {
        Fork::new(
            Node::Window(Entity::new(0, 0)),
            Some(Node::Window(Entity::new(1, 0))),
            Rect::new(100, 0, 1920, 1080),
            Orientation::Horizontal,
            ToplevelKey { monitor: 0, workspace: 0 },
            MIN_LEAF_PX,
        )
    }

    #[test]
    fn split_lands_on_dragged_edge() {
        let mut f = fork();
        // Left window was (100, 0, 955, 1080); its right edge goes to 1295.
        assert!(apply(&mut f, ResizeAction::ByLeft, Rect::new(100, 0, 1195, 1080), GAP));
        assert_eq!(f.ratio, 0.625);
        let (left, _) = f.split(GAP);
        assert_eq!(left.right(), 1295);

        // Right window's left edge goes to 585.
        let mut f = fork();
        assert!(apply(&mut f, ResizeAction::ByRight, Rect::new(585, 0, 1435, 1080), GAP));
        assert_eq!(f.ratio, 0.25);
        let (_, right) = f.split(GAP);
        assert_eq!(right.unwrap().x, 585);

        assert!(!apply(&mut f, ResizeAction::Ascend, Rect::default(), GAP));
        assert_eq!(f.ratio, 0.25);
    }
}
