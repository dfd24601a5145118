//! Integer screen geometry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::layout_engine::Orientation;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self { Point { x, y } }

    pub fn distance(self, other: Point) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        dx.hypot(dy)
    }
}

/// Padding kept between a monitor's work area and the tiled content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OuterGaps {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
}

impl OuterGaps {
    pub const fn uniform(gap: i32) -> Self {
        OuterGaps { top: gap, left: gap, bottom: gap, right: gap }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn right(&self) -> i32 { self.x + self.width }

    pub fn bottom(&self) -> i32 { self.y + self.height }

    pub fn center(&self) -> Point { Point::new(self.x + self.width / 2, self.y + self.height / 2) }

    pub fn area(&self) -> i64 { i64::from(self.width) * i64::from(self.height) }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    pub fn contains_point(&self, point: Point) -> bool {
        (self.x..self.right()).contains(&point.x) && (self.y..self.bottom()).contains(&point.y)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn axis_length(&self, orientation: Orientation) -> i32 {
        match orientation {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }

    pub fn axis_origin(&self, orientation: Orientation) -> i32 {
        match orientation {
            Orientation::Horizontal => self.x,
            Orientation::Vertical => self.y,
        }
    }

    /// The orientation that splits this rectangle along its longer side.
    pub fn preferred_orientation(&self) -> Orientation {
        if self.width > self.height {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    pub fn inset(&self, top: i32, left: i32, bottom: i32, right: i32) -> Rect {
        Rect::new(
            self.x + left,
            self.y + top,
            (self.width - left - right).max(0),
            (self.height - top - bottom).max(0),
        )
    }

    pub fn shrink(&self, gaps: &OuterGaps) -> Rect {
        self.inset(gaps.top, gaps.left, gaps.bottom, gaps.right)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

pub trait IsWithin {
    fn is_within(&self, how_much: i32, other: Self) -> bool;
}

impl IsWithin for i32 {
    fn is_within(&self, how_much: i32, other: Self) -> bool { (self - other).abs() <= how_much }
}

impl IsWithin for Rect {
    fn is_within(&self, how_much: i32, other: Self) -> bool {
        self.x.is_within(how_much, other.x)
            && self.y.is_within(how_much, other.y)
            && self.width.is_within(how_much, other.width)
            && self.height.is_within(how_much, other.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_rect() {
        let rect = Rect::new(0, 0, 100, 100);
        assert!(rect.contains(&Rect::new(10, 10, 80, 80)));
        assert!(rect.contains(&rect));
        assert!(!rect.contains(&Rect::new(-10, -10, 120, 120)));
        assert!(!rect.contains(&Rect::new(50, 50, 51, 10)));
    }

    #[test]
    fn test_contains_point() {
        let rect = Rect::new(0, 0, 100, 100);
        assert!(rect.contains_point(Point::new(50, 50)));
        assert!(rect.contains_point(Point::new(0, 0)));
        assert!(!rect.contains_point(Point::new(100, 100)));
        assert!(!rect.contains_point(Point::new(-1, 50)));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 50, 100, 100);
        assert!(a.intersects(&b));

        let far = Rect::new(200, 200, 100, 100);
        assert!(!a.intersects(&far));

        let touching = Rect::new(100, 0, 10, 10);
        assert!(!a.intersects(&touching));
    }

    #[test]
    fn test_distance_between_points() {
        assert_eq!(Point::new(0, 0).distance(Point::new(30, 40)), 50.0);
    }

    #[test]
    fn test_inset() {
        let rect = Rect::new(0, 0, 1920, 1080);
        assert_eq!(rect.inset(10, 20, 30, 40), Rect::new(20, 10, 1860, 1040));
        assert_eq!(rect.inset(600, 0, 600, 0).height, 0);
        assert_eq!(rect.shrink(&OuterGaps::uniform(8)), Rect::new(8, 8, 1904, 1064));
    }

    #[test]
    fn test_axis_helpers() {
        let rect = Rect::new(5, 7, 300, 200);
        assert_eq!(rect.axis_length(Orientation::Horizontal), 300);
        assert_eq!(rect.axis_length(Orientation::Vertical), 200);
        assert_eq!(rect.axis_origin(Orientation::Vertical), 7);
        assert_eq!(rect.preferred_orientation(), Orientation::Horizontal);
        assert_eq!(Rect::new(0, 0, 200, 200).preferred_orientation(), Orientation::Vertical);
    }

    #[test]
    fn test_is_within() {
        let a = Rect::new(10, 20, 100, 200);
        assert!(a.is_within(1, Rect::new(11, 19, 100, 201)));
        assert!(!a.is_within(1, Rect::new(12, 20, 100, 200)));
    }
}
