//! Tab groups: several windows sharing the rectangle of one tree leaf.

use serde::{Deserialize, Serialize};
use strum::Display;

use super::{Direction, ForestEvent};
use crate::model::{Entity, Rect};

slotmap::new_key_type! {
    pub struct StackId;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TabPlacement {
    #[default]
    Top,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackState {
    Empty,
    Populated,
    /// One member left; the owner either adds another or tears the stack down.
    Collapsing,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stack {
    tabs: Vec<Entity>,
    active: Option<Entity>,
    active_index: usize,
    prev_active: Option<Entity>,
    pub rect: Rect,
    pub tabs_rect: Rect,
    pub content_rect: Rect,
    tab_height: i32,
    placement: TabPlacement,
}

impl Stack {
    pub fn new(tab_height: i32, placement: TabPlacement) -> Stack {
        Stack {
            tabs: Vec::new(),
            active: None,
            active_index: 0,
            prev_active: None,
            rect: Rect::default(),
            tabs_rect: Rect::default(),
            content_rect: Rect::default(),
            tab_height: tab_height.max(0),
            placement,
        }
    }

    pub fn tabs(&self) -> &[Entity] { &self.tabs }

    pub fn active(&self) -> Option<Entity> { self.active }

    pub fn prev_active(&self) -> Option<Entity> { self.prev_active }

    pub fn len(&self) -> usize { self.tabs.len() }

    pub fn is_empty(&self) -> bool { self.tabs.is_empty() }

    pub fn contains(&self, window: Entity) -> bool { self.tabs.contains(&window) }

    pub fn position(&self, window: Entity) -> Option<usize> {
        self.tabs.iter().position(|&e| e == window)
    }

    pub fn state(&self) -> StackState {
        match self.tabs.len() {
            0 => StackState::Empty,
            1 => StackState::Collapsing,
            _ => StackState::Populated,
        }
    }

    /// Appends (or prepends) a member. The first member becomes active; later
    /// ones are hidden behind the active tab.
    pub fn add(&mut self, window: Entity, from_left: bool) -> Vec<ForestEvent> {
        if self.contains(window) {
            return Vec::new();
        }
        if from_left {
            self.tabs.push(window);
        } else {
            self.tabs.insert(0, window);
            if self.active.is_some() {
                self.active_index += 1;
            }
        }
        if self.active.is_none() {
            self.active = Some(window);
            self.active_index = self.position(window).unwrap_or(0);
            vec![ForestEvent::Show(window)]
        } else {
            vec![ForestEvent::Hide(window)]
        }
    }

    /// Removes a member and returns the position it held. Removing the active
    /// member leaves the stack without one until [`Stack::auto_activate`].
    pub fn remove_tab(&mut self, window: Entity) -> Option<usize> {
        let index = self.position(window)?;
        self.tabs.remove(index);
        if self.prev_active == Some(window) {
            self.prev_active = None;
        }
        if self.active == Some(window) {
            self.active = None;
            self.active_index = index;
        } else if index < self.active_index {
            self.active_index -= 1;
        }
        Some(index)
    }

    pub fn activate(&mut self, window: Entity) -> Vec<ForestEvent> {
        let Some(index) = self.position(window) else {
            return Vec::new();
        };
        if self.active != Some(window) && self.active.is_some() {
            self.prev_active = self.active;
        }
        self.active = Some(window);
        self.active_index = index;

        let mut events: Vec<_> = self
            .tabs
            .iter()
            .filter(|&&e| e != window)
            .map(|&e| ForestEvent::Hide(e))
            .collect();
        events.push(ForestEvent::Show(window));
        events
    }

    /// Re-activates whichever member sits at the remembered index, clamped to
    /// the current length.
    pub fn auto_activate(&mut self) -> Vec<ForestEvent> {
        if self.tabs.is_empty() {
            self.active = None;
            self.active_index = 0;
            return Vec::new();
        }
        let index = self.active_index.min(self.tabs.len() - 1);
        self.activate(self.tabs[index])
    }

    pub fn toggle_back(&mut self) -> Vec<ForestEvent> {
        match self.prev_active {
            Some(prev) if self.contains(prev) => self.activate(prev),
            _ => Vec::new(),
        }
    }

    /// Moves a tab one place in `direction`. Returns false at either end.
    pub fn move_tab(&mut self, window: Entity, direction: Direction) -> bool {
        let Some(index) = self.position(window) else {
            return false;
        };
        let target = if direction.is_forward() {
            index + 1
        } else {
            match index.checked_sub(1) {
                Some(i) => i,
                None => return false,
            }
        };
        if target >= self.tabs.len() {
            return false;
        }
        self.tabs.swap(index, target);
        if let Some(active) = self.active {
            self.active_index = self.position(active).unwrap_or(0);
        }
        true
    }

    /// Tab strip and content rectangles for a leaf occupying `rect`.
    pub fn layout(&self, rect: Rect) -> (Rect, Rect) {
        let strip = self.tab_height.min(rect.height);
        match self.placement {
            TabPlacement::Top => (
                Rect::new(rect.x, rect.y, rect.width, strip),
                Rect::new(rect.x, rect.y + strip, rect.width, rect.height - strip),
            ),
            TabPlacement::Bottom => (
                Rect::new(rect.x, rect.y + rect.height - strip, rect.width, strip),
                Rect::new(rect.x, rect.y, rect.width, rect.height - strip),
            ),
        }
    }

    pub fn update_positions(&mut self, rect: Rect) {
        self.rect = rect;
        (self.tabs_rect, self.content_rect) = self.layout(rect);
    }

    /// Exchanges the positions of two members.
    pub fn swap_tabs(&mut self, a: Entity, b: Entity) -> bool {
        let (Some(i), Some(j)) = (self.position(a), self.position(b)) else {
            return false;
        };
        self.tabs.swap(i, j);
        if let Some(active) = self.active {
            self.active_index = self.position(active).unwrap_or(0);
        }
        true
    }

    /// Empties the stack, making every former member visible again.
    pub fn release(&mut self) -> (Vec<Entity>, Vec<ForestEvent>) {
        let tabs = std::mem::take(&mut self.tabs);
        self.active = None;
        self.prev_active = None;
        self.active_index = 0;
        let events = tabs.iter().map(|&e| ForestEvent::Show(e)).collect();
        (tabs, events)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn w(i: u32) -> Entity { Entity::new(i, 0) }

    fn stack_of(n: u32) -> Stack {
        let mut stack = Stack::new(20, TabPlacement::Top);
        for i in 0..n {
            let _ = stack.add(w(i), true);
        }
        stack
    }

    #[test]
    fn first_member_is_active() {
        let mut stack = Stack::new(20, TabPlacement::Top);
        assert_eq!(stack.state(), StackState::Empty);
        assert_eq!(stack.add(w(1), true), vec![ForestEvent::Show(w(1))]);
        assert_eq!(stack.state(), StackState::Collapsing);
        assert_eq!(stack.add(w(2), true), vec![ForestEvent::Hide(w(2))]);
        assert_eq!(stack.state(), StackState::Populated);
        assert_eq!(stack.tabs(), &[w(1), w(2)]);
        assert_eq!(stack.active(), Some(w(1)));
        assert!(stack.add(w(2), true).is_empty());
    }

    #[test]
    fn prepending_keeps_active_member() {
        let mut stack = stack_of(2);
        let _ = stack.add(w(9), false);
        assert_eq!(stack.tabs(), &[w(9), w(0), w(1)]);
        assert_eq!(stack.active(), Some(w(0)));
        stack.remove_tab(w(0));
        let _ = stack.auto_activate();
        assert_eq!(stack.active(), Some(w(1)));
    }

    #[test]
    fn activate_hides_the_rest() {
        let mut stack = stack_of(3);
        let events = stack.activate(w(1));
        assert_eq!(
            events,
            vec![ForestEvent::Hide(w(0)), ForestEvent::Hide(w(2)), ForestEvent::Show(w(1))]
        );
        assert_eq!(stack.prev_active(), Some(w(0)));
        assert!(stack.activate(w(7)).is_empty());
    }

    #[test]
    fn removing_active_activates_neighbour() {
        let mut stack = stack_of(3);
        let _ = stack.activate(w(1));
        assert_eq!(stack.remove_tab(w(1)), Some(1));
        assert_eq!(stack.active(), None);
        let events = stack.auto_activate();
        assert_eq!(stack.active(), Some(w(2)));
        assert_eq!(events.last(), Some(&ForestEvent::Show(w(2))));

        // Removing the last slot falls back to the new last member.
        stack.remove_tab(w(2));
        let _ = stack.auto_activate();
        assert_eq!(stack.active(), Some(w(0)));

        stack.remove_tab(w(0));
        assert!(stack.auto_activate().is_empty());
        assert_eq!(stack.state(), StackState::Empty);
    }

    #[test]
    fn removing_before_active_keeps_index_in_step() {
        let mut stack = stack_of(3);
        let _ = stack.activate(w(2));
        stack.remove_tab(w(0));
        stack.remove_tab(w(2));
        let _ = stack.auto_activate();
        assert_eq!(stack.active(), Some(w(1)));
    }

    #[test]
    fn toggle_back_returns_to_previous() {
        let mut stack = stack_of(3);
        let _ = stack.activate(w(2));
        let _ = stack.toggle_back();
        assert_eq!(stack.active(), Some(w(0)));
        let _ = stack.toggle_back();
        assert_eq!(stack.active(), Some(w(2)));

        stack.remove_tab(w(0));
        assert!(stack.toggle_back().is_empty());
    }

    #[test]
    fn move_tab_reorders() {
        let mut stack = stack_of(3);
        assert!(stack.move_tab(w(0), Direction::Right));
        assert_eq!(stack.tabs(), &[w(1), w(0), w(2)]);
        assert!(!stack.move_tab(w(2), Direction::Down));
        assert!(stack.move_tab(w(2), Direction::Left));
        assert!(stack.move_tab(w(2), Direction::Up));
        assert!(!stack.move_tab(w(2), Direction::Up));
        assert_eq!(stack.tabs(), &[w(2), w(1), w(0)]);
        assert!(stack.swap_tabs(w(2), w(0)));
        assert!(!stack.swap_tabs(w(2), w(5)));
        assert_eq!(stack.tabs(), &[w(0), w(1), w(2)]);
        stack.remove_tab(w(0));
        let _ = stack.auto_activate();
        assert_eq!(stack.active(), Some(w(1)));
    }

    #[test]
    fn tab_strip_geometry() {
        let mut stack = stack_of(2);
        stack.update_positions(Rect::new(0, 0, 960, 1080));
        assert_eq!(stack.tabs_rect, Rect::new(0, 0, 960, 20));
        assert_eq!(stack.content_rect, Rect::new(0, 20, 960, 1060));

        let mut bottom = Stack::new(30, TabPlacement::Bottom);
        bottom.update_positions(Rect::new(100, 50, 400, 300));
        assert_eq!(bottom.tabs_rect, Rect::new(100, 320, 400, 30));
        assert_eq!(bottom.content_rect, Rect::new(100, 50, 400, 270));
    }

    #[test]
    fn release_shows_everyone() {
        let mut stack = stack_of(2);
        let (tabs, events) = stack.release();
        assert_eq!(tabs, vec![w(0), w(1)]);
        assert_eq!(events, vec![ForestEvent::Show(w(0)), ForestEvent::Show(w(1))]);
        assert!(stack.is_empty());
    }
}
