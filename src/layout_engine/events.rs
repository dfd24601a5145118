use serde::{Deserialize, Serialize};

use super::{StackId, WorkspaceId};
use crate::model::{Entity, Rect};

/// Side effects of a tree mutation, handed back to the caller instead of being
/// run from inside the recursion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForestEvent {
    /// `window` is now a direct child of `fork`, possibly through a stack.
    Attached { fork: Entity, window: Entity },
    Detached { window: Entity },
    Show(Entity),
    Hide(Entity),
    StackRemoved(StackId),
}

/// The value of a mutating forest call together with the events it raised.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<ForestEvent>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, events: Vec<ForestEvent>) -> Self { Outcome { value, events } }

    pub fn quiet(value: T) -> Self { Outcome { value, events: Vec::new() } }

    /// Moves the events into `sink` and returns the value.
    pub fn drain_into(self, sink: &mut Vec<ForestEvent>) -> T {
        sink.extend(self.events);
        self.value
    }
}

/// Work the host window manager is asked to perform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Place { window: Entity, rect: Rect },
    Show(Entity),
    Hide(Entity),
    MoveToWorkspace { window: Entity, workspace: WorkspaceId },
    TabStrip { stack: StackId, rect: Rect, tabs: Vec<Entity>, active: Option<Entity> },
    RemoveTabStrip(StackId),
}

impl Request {
    pub fn window(&self) -> Option<Entity> {
        match self {
            Request::Place { window, .. }
            | Request::MoveToWorkspace { window, .. }
            | Request::Show(window)
            | Request::Hide(window) => Some(*window),
            Request::TabStrip { .. } | Request::RemoveTabStrip(_) => None,
        }
    }
}
