use serde::{Deserialize, Serialize};

use super::{Forest, StackId};
use crate::model::Entity;

/// What occupies one branch of a fork.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Window(Entity),
    Fork(Entity),
    Stack(StackId),
}

impl Node {
    pub fn is_window(&self, entity: Entity) -> bool { *self == Node::Window(entity) }

    pub fn is_fork(&self, entity: Entity) -> bool { *self == Node::Fork(entity) }

    pub fn window(&self) -> Option<Entity> {
        match self {
            Node::Window(e) => Some(*e),
            _ => None,
        }
    }

    pub fn fork(&self) -> Option<Entity> {
        match self {
            Node::Fork(e) => Some(*e),
            _ => None,
        }
    }

    pub fn stack(&self) -> Option<StackId> {
        match self {
            Node::Stack(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether `window` sits in this node directly or as a tab of this stack.
    /// Does not descend into forks.
    pub fn holds(&self, window: Entity, forest: &Forest) -> bool {
        match self {
            Node::Window(e) => *e == window,
            Node::Stack(id) => forest.stack(*id).is_some_and(|stack| stack.contains(window)),
            Node::Fork(_) => false,
        }
    }

    /// Every window under this node, left to right.
    pub fn windows(&self, forest: &Forest) -> Vec<Entity> {
        let mut out = Vec::new();
        self.collect_windows(forest, &mut out);
        out
    }

    fn collect_windows(&self, forest: &Forest, out: &mut Vec<Entity>) {
        match self {
            Node::Window(e) => out.push(*e),
            Node::Stack(id) => {
                if let Some(stack) = forest.stack(*id) {
                    out.extend_from_slice(stack.tabs());
                }
            }
            Node::Fork(e) => {
                let Some(fork) = forest.fork(*e) else { return };
                fork.left.collect_windows(forest, out);
                if let Some(right) = &fork.right {
                    right.collect_windows(forest, out);
                }
            }
        }
    }
}
