use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn toggle(self) -> Orientation {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn orientation(self) -> Orientation {
        match self {
            Direction::Left | Direction::Right => Orientation::Horizontal,
            Direction::Up | Direction::Down => Orientation::Vertical,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Whether the direction points away from the axis origin.
    pub fn is_forward(self) -> bool { matches!(self, Direction::Right | Direction::Down) }
}

/// Which branch of a fork a node occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod direction_operations {
        use super::*;

        #[test]
        fn direction_orientation() {
            assert_eq!(Direction::Left.orientation(), Orientation::Horizontal);
            assert_eq!(Direction::Right.orientation(), Orientation::Horizontal);
            assert_eq!(Direction::Up.orientation(), Orientation::Vertical);
            assert_eq!(Direction::Down.orientation(), Orientation::Vertical);
        }

        #[test]
        fn direction_opposite() {
            assert_eq!(Direction::Left.opposite(), Direction::Right);
            assert_eq!(Direction::Right.opposite(), Direction::Left);
            assert_eq!(Direction::Up.opposite(), Direction::Down);
            assert_eq!(Direction::Down.opposite(), Direction::Up);
        }

        #[test]
        fn forward_directions() {
            assert!(Direction::Right.is_forward());
            assert!(Direction::Down.is_forward());
            assert!(!Direction::Left.is_forward());
            assert!(!Direction::Up.is_forward());
        }
    }

    #[test]
    fn orientation_toggle_and_display() {
        assert_eq!(Orientation::Horizontal.toggle(), Orientation::Vertical);
        assert_eq!(Orientation::Vertical.toggle(), Orientation::Horizontal);
        assert_eq!(Orientation::Vertical.to_string(), "vertical");
        assert_eq!(Side::Left.other(), Side::Right);
    }
}
