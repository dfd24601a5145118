//! The tiling trees of every (monitor, workspace) pair.
//!
//! The forest is the only thing that mutates forks and stacks. Mutations hand
//! back the fork that needs re-measuring together with the [`ForestEvent`]s the
//! caller has to act on; [`Forest::measure`] fills the pending placement map
//! and [`Forest::arrange`] drains it.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, trace};

use super::fork::Fork;
use super::resize;
use super::{
    Direction, ForestEvent, Node, Orientation, Outcome, Side, Stack, StackId, TilingError,
    TilingSettings,
};
use crate::common::collections::{BTreeMap, HashMap, HashSet};
use crate::model::{Entity, Movement, Point, Rect, Storage, World};

pub type MonitorId = u32;
pub type WorkspaceId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToplevelKey {
    pub monitor: MonitorId,
    pub workspace: WorkspaceId,
}

impl ToplevelKey {
    pub const fn new(monitor: MonitorId, workspace: WorkspaceId) -> Self {
        ToplevelKey { monitor, workspace }
    }
}

/// Where a new window goes relative to the window it is attached onto.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Split along the longer side, new window second.
    #[default]
    Auto,
    /// The new window takes the half under the pointer.
    Cursor(Point),
    /// The new window takes the half nearer to this point, usually the
    /// centroid the window had before it was moved by keyboard.
    Keyboard(Point),
    Explicit { orientation: Orientation, new_first: bool },
}

impl Placement {
    /// Split orientation for a branch occupying `rect`, and whether the new
    /// window takes the first half.
    pub fn resolve(self, rect: Rect) -> (Orientation, bool) {
        let orientation = rect.preferred_orientation();
        match self {
            Placement::Auto => (orientation, false),
            Placement::Cursor(point) => {
                let along = match orientation {
                    Orientation::Horizontal => point.x,
                    Orientation::Vertical => point.y,
                };
                let middle = rect.axis_origin(orientation) + rect.axis_length(orientation) / 2;
                (orientation, along < middle)
            }
            Placement::Keyboard(point) => {
                let (first, second) = halves(rect, orientation);
                let nearer_first = point.distance(first.center()) < point.distance(second.center());
                (orientation, nearer_first)
            }
            Placement::Explicit { orientation, new_first } => (orientation, new_first),
        }
    }
}

fn halves(rect: Rect, orientation: Orientation) -> (Rect, Rect) {
    match orientation {
        Orientation::Horizontal => {
            let w = rect.width / 2;
            (
                Rect::new(rect.x, rect.y, w, rect.height),
                Rect::new(rect.x + w, rect.y, rect.width - w, rect.height),
            )
        }
        Orientation::Vertical => {
            let h = rect.height / 2;
            (
                Rect::new(rect.x, rect.y, rect.width, h),
                Rect::new(rect.x, rect.y + h, rect.width, rect.height - h),
            )
        }
    }
}

#[derive(Debug, Default)]
pub struct Forest {
    forks: Storage<Fork>,
    /// Child fork to parent fork. Toplevel forks have no entry.
    parents: Storage<Entity>,
    stacks: SlotMap<StackId, Stack>,
    /// Which stack a window is a tab of.
    window_stacks: Storage<StackId>,
    toplevel: BTreeMap<ToplevelKey, Entity>,
    requested: BTreeMap<Entity, Rect>,
    settings: TilingSettings,
}

impl Forest {
    pub fn new(settings: TilingSettings) -> Self { Forest { settings, ..Default::default() } }

    pub fn settings(&self) -> &TilingSettings { &self.settings }

    pub fn fork(&self, entity: Entity) -> Option<&Fork> { self.forks.get(entity) }

    pub fn forks(&self) -> impl Iterator<Item = (Entity, &Fork)> + '_ { self.forks.iter() }

    pub fn parent(&self, fork: Entity) -> Option<Entity> { self.parents.get(fork).copied() }

    pub fn stack(&self, id: StackId) -> Option<&Stack> { self.stacks.get(id) }

    pub fn stacks(&self) -> impl Iterator<Item = (StackId, &Stack)> + '_ { self.stacks.iter() }

    pub fn stack_of(&self, window: Entity) -> Option<StackId> {
        self.window_stacks.get(window).copied()
    }

    pub fn toplevel(&self, key: ToplevelKey) -> Option<Entity> { self.toplevel.get(&key).copied() }

    pub fn toplevels(&self) -> impl Iterator<Item = (ToplevelKey, Entity)> + '_ {
        self.toplevel.iter().map(|(k, v)| (*k, *v))
    }

    pub fn requested(&self) -> &BTreeMap<Entity, Rect> { &self.requested }

    fn fork_ref(&self, entity: Entity) -> Result<&Fork, TilingError> {
        self.forks.get(entity).ok_or(TilingError::StaleEntity(entity))
    }

    fn fork_mut(&mut self, entity: Entity) -> Result<&mut Fork, TilingError> {
        self.forks.get_mut(entity).ok_or(TilingError::StaleEntity(entity))
    }

    /// Root of the tree containing `fork`.
    pub fn find_toplevel(&self, fork: Entity) -> Entity {
        let mut current = fork;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// The fork holding `window` directly or through a stack, which side it is
    /// on and the node occupying that side. Forks are scanned in index order
    /// and the first match wins.
    pub fn find_branch(&self, window: Entity) -> Option<(Entity, Side, Node)> {
        self.forks.iter().find_map(|(entity, fork)| {
            [Side::Left, Side::Right].into_iter().find_map(|side| {
                let node = fork.branch(side)?;
                node.holds(window, self).then_some((entity, side, node))
            })
        })
    }

    pub fn owner_of(&self, window: Entity) -> Option<Entity> {
        self.find_branch(window).map(|(fork, ..)| fork)
    }

    fn find_stack(&self, id: StackId) -> Option<(Entity, Side)> {
        self.forks.iter().find_map(|(entity, fork)| {
            fork.side_of(Node::Stack(id)).map(|side| (entity, side))
        })
    }

    fn branch_rect(&self, fork: Entity, side: Side) -> Result<Rect, TilingError> {
        let fork = self.fork_ref(fork)?;
        let (left, right) = fork.split(self.settings.inner_gap);
        Ok(match side {
            Side::Left => left,
            Side::Right => right.unwrap_or(fork.area),
        })
    }

    /// Windows held directly by `node`, i.e. the ones whose owner is the fork
    /// that `node` hangs off.
    fn direct_windows(&self, node: Node) -> Vec<Entity> {
        match node {
            Node::Window(window) => vec![window],
            Node::Stack(id) => self.stacks.get(id).map(|s| s.tabs().to_vec()).unwrap_or_default(),
            Node::Fork(_) => Vec::new(),
        }
    }

    fn announce(&self, fork: Entity, node: Node, events: &mut Vec<ForestEvent>) {
        events.extend(
            self.direct_windows(node)
                .into_iter()
                .map(|window| ForestEvent::Attached { fork, window }),
        );
    }

    pub fn create_fork(
        &mut self,
        world: &mut World,
        left: Node,
        right: Option<Node>,
        area: Rect,
        orientation: Orientation,
        key: ToplevelKey,
    ) -> Entity {
        let entity = world.create_entity();
        let fork = Fork::new(left, right, area, orientation, key, self.settings.min_leaf_px);
        self.forks.insert(entity, fork);
        trace!(%entity, ?orientation, %area, "Created fork");
        entity
    }

    /// Creates the root fork of `key` holding only `window`. `work_area` is the
    /// monitor's usable area before the outer gap.
    pub fn create_toplevel(
        &mut self,
        world: &mut World,
        window: Entity,
        work_area: Rect,
        key: ToplevelKey,
    ) -> Result<Outcome<Entity>, TilingError> {
        if let Some(existing) = self.toplevel(key) {
            return Err(TilingError::StructuralViolation(format!(
                "{key:?} already has toplevel {existing}"
            )));
        }
        let area = work_area.shrink(&self.settings.outer_gap);
        let entity = self.create_fork(
            world,
            Node::Window(window),
            None,
            area,
            area.preferred_orientation(),
            key,
        );
        self.fork_mut(entity)?.is_toplevel = true;
        self.toplevel.insert(key, entity);
        debug!(%entity, ?key, "Created toplevel");
        Ok(Outcome::new(entity, vec![ForestEvent::Attached { fork: entity, window }]))
    }

    /// Tiles `window` as a new branch of the toplevel of `key`, creating the
    /// toplevel if there is none yet.
    pub fn attach_to_monitor(
        &mut self,
        world: &mut World,
        window: Entity,
        work_area: Rect,
        key: ToplevelKey,
        placement: Placement,
    ) -> Result<Outcome<Entity>, TilingError> {
        let root = match self.toplevel(key) {
            Some(root) if self.forks.contains(root) => root,
            Some(stale) => {
                debug!(%stale, ?key, "Dropping stale toplevel");
                self.toplevel.remove(&key);
                return self.create_toplevel(world, window, work_area, key);
            }
            None => return self.create_toplevel(world, window, work_area, key),
        };

        let area = work_area.shrink(&self.settings.outer_gap);
        let (orientation, new_first) = placement.resolve(area);
        let mut events = vec![ForestEvent::Attached { fork: root, window }];
        let current = self.fork_ref(root)?.clone();

        if current.right.is_some() {
            // Push the current content one level down and split the whole area.
            let child = self.create_fork(
                world,
                current.left,
                current.right,
                current.area,
                current.orientation,
                key,
            );
            let child_fork = self.fork_mut(child)?;
            child_fork.ratio = current.ratio;
            for node in [Some(current.left), current.right].into_iter().flatten() {
                match node {
                    Node::Fork(grandchild) => {
                        self.parents.insert(grandchild, child);
                    }
                    other => self.announce(child, other, &mut events),
                }
            }
            self.parents.insert(child, root);
            let fork = self.fork_mut(root)?;
            fork.left = Node::Fork(child);
        }

        let fork = self.fork_mut(root)?;
        fork.right = Some(Node::Window(window));
        fork.orientation = orientation;
        fork.ratio = 0.5;
        fork.set_area(area);
        if new_first {
            fork.swap_branches();
        }
        Ok(Outcome::new(root, events))
    }

    /// Tiles `new` next to `onto`. Returns the fork to re-measure.
    pub fn attach_window(
        &mut self,
        world: &mut World,
        onto: Entity,
        new: Entity,
        placement: Placement,
    ) -> Result<Outcome<Entity>, TilingError> {
        let (fork_entity, side, node) =
            self.find_branch(onto).ok_or(TilingError::NotTiled(onto))?;

        if let Node::Stack(id) = node {
            return self.attach_stack(fork_entity, id, new);
        }

        let fork = self.fork_mut(fork_entity)?;
        if fork.right.is_none() {
            let (orientation, new_first) = placement.resolve(fork.area);
            fork.right = Some(Node::Window(new));
            fork.orientation = orientation;
            fork.ratio = 0.5;
            fork.set_area(fork.area);
            if new_first {
                fork.swap_branches();
            }
            trace!(fork = %fork_entity, %onto, %new, "Filled free branch");
            let events = vec![ForestEvent::Attached { fork: fork_entity, window: new }];
            return Ok(Outcome::new(fork_entity, events));
        }

        let key = fork.key();
        let rect = self.branch_rect(fork_entity, side)?;
        let (orientation, new_first) = placement.resolve(rect);
        let (first, second) = if new_first {
            (Node::Window(new), node)
        } else {
            (node, Node::Window(new))
        };
        let child = self.create_fork(world, first, Some(second), rect, orientation, key);
        self.parents.insert(child, fork_entity);
        self.fork_mut(fork_entity)?.set_branch(side, Node::Fork(child));
        trace!(parent = %fork_entity, %child, %onto, %new, "Split branch");

        let events = vec![
            ForestEvent::Attached { fork: child, window: onto },
            ForestEvent::Attached { fork: child, window: new },
        ];
        Ok(Outcome::new(fork_entity, events))
    }

    /// Adds `new` as a tab of the stack `id` hanging off `fork`.
    pub fn attach_stack(
        &mut self,
        fork: Entity,
        id: StackId,
        new: Entity,
    ) -> Result<Outcome<Entity>, TilingError> {
        let from_left = self.settings.stack_from_left;
        let stack = self.stacks.get_mut(id).ok_or(TilingError::StaleStack(id))?;
        let mut events = stack.add(new, from_left);
        let content = stack.content_rect;
        self.window_stacks.insert(new, id);
        if content.area() > 0 {
            self.requested.insert(new, content);
        }
        events.push(ForestEvent::Attached { fork, window: new });
        Ok(Outcome::new(fork, events))
    }

    /// Turns the leaf holding `window` into a one-tab stack.
    pub fn create_stack(&mut self, window: Entity) -> Result<Outcome<StackId>, TilingError> {
        if let Some(id) = self.stack_of(window) {
            return Ok(Outcome::quiet(id));
        }
        let (fork, side, _) = self.find_branch(window).ok_or(TilingError::NotTiled(window))?;
        let rect = self.branch_rect(fork, side)?;
        let mut stack = Stack::new(self.settings.tab_height, self.settings.tab_placement);
        let events = stack.add(window, true);
        stack.update_positions(rect);
        let id = self.stacks.insert(stack);
        self.window_stacks.insert(window, id);
        self.fork_mut(fork)?.set_branch(side, Node::Stack(id));
        debug!(?id, %window, "Created stack");
        Ok(Outcome::new(id, events))
    }

    /// Dissolves a stack back into tiles: the first member keeps the leaf and
    /// the others are attached after it in order. Returns the fork to re-measure.
    pub fn unstack(
        &mut self,
        world: &mut World,
        id: StackId,
    ) -> Result<Outcome<Option<Entity>>, TilingError> {
        let (fork, side) = self.find_stack(id).ok_or(TilingError::StaleStack(id))?;
        let mut stack = self.stacks.remove(id).ok_or(TilingError::StaleStack(id))?;
        let (members, mut events) = stack.release();
        events.push(ForestEvent::StackRemoved(id));
        for &member in &members {
            self.window_stacks.remove(member);
        }

        let Some((&first, rest)) = members.split_first() else {
            let value = self.remove_node(world, fork, side, &mut events)?;
            return Ok(Outcome::new(value, events));
        };
        self.fork_mut(fork)?.set_branch(side, Node::Window(first));
        let mut previous = first;
        for &member in rest {
            self.attach_window(world, previous, member, Placement::Auto)?
                .drain_into(&mut events);
            previous = member;
        }
        debug!(?id, ?members, "Unstacked");
        Ok(Outcome::new(Some(fork), events))
    }

    /// Removes `window` from `fork`, collapsing whatever the removal leaves
    /// behind. Returns the nearest fork that needs re-measuring, or `None` when
    /// the whole tree went away.
    pub fn detach(
        &mut self,
        world: &mut World,
        fork: Entity,
        window: Entity,
    ) -> Result<Outcome<Option<Entity>>, TilingError> {
        let owner = self.fork_ref(fork)?;
        if let Some(id) = self.stack_of(window)
            && let Some(side) = owner.side_of(Node::Stack(id))
        {
            return self.detach_from_stack(world, fork, side, id, window);
        }
        let Some(side) = owner.side_of(Node::Window(window)) else {
            return Err(TilingError::StructuralViolation(format!(
                "fork {fork} does not own window {window}"
            )));
        };

        self.window_stacks.remove(window);
        self.requested.remove(&window);
        let mut events = vec![ForestEvent::Detached { window }];
        let value = self.remove_node(world, fork, side, &mut events)?;
        debug!(%fork, %window, remeasure = ?value, "Detached window");
        Ok(Outcome::new(value, events))
    }

    fn detach_from_stack(
        &mut self,
        world: &mut World,
        fork: Entity,
        side: Side,
        id: StackId,
        window: Entity,
    ) -> Result<Outcome<Option<Entity>>, TilingError> {
        let stack = self.stacks.get_mut(id).ok_or(TilingError::StaleStack(id))?;
        let was_active = stack.active() == Some(window);
        stack.remove_tab(window);
        let mut events = vec![ForestEvent::Detached { window }];
        if was_active {
            events.extend(stack.auto_activate());
        }
        let remaining = stack.len();
        self.window_stacks.remove(window);
        self.requested.remove(&window);

        let value = match remaining {
            0 => {
                self.stacks.remove(id);
                events.push(ForestEvent::StackRemoved(id));
                self.remove_node(world, fork, side, &mut events)?
            }
            1 => {
                let (members, shown) = match self.stacks.remove(id) {
                    Some(mut stack) => stack.release(),
                    None => return Err(TilingError::StaleStack(id)),
                };
                let Some(&last) = members.first() else {
                    return Err(TilingError::StaleStack(id));
                };
                self.window_stacks.remove(last);
                self.fork_mut(fork)?.set_branch(side, Node::Window(last));
                events.extend(shown);
                events.push(ForestEvent::StackRemoved(id));
                debug!(?id, %last, "Stack collapsed");
                Some(fork)
            }
            _ => Some(fork),
        };
        Ok(Outcome::new(value, events))
    }

    /// Drops the node on `side` of `fork` and restores the fork invariants.
    fn remove_node(
        &mut self,
        world: &mut World,
        fork: Entity,
        side: Side,
        events: &mut Vec<ForestEvent>,
    ) -> Result<Option<Entity>, TilingError> {
        let current = self.fork_ref(fork)?.clone();
        let sibling = current.branch(side.other());

        let Some(parent) = self.parent(fork) else {
            return match sibling {
                None => {
                    self.delete_entity(world, fork);
                    Ok(None)
                }
                Some(Node::Fork(child)) => {
                    self.merge_up(world, fork, child, events)?;
                    Ok(Some(fork))
                }
                Some(node) => {
                    let root = self.fork_mut(fork)?;
                    root.left = node;
                    root.right = None;
                    Ok(Some(fork))
                }
            };
        };

        let Some(sibling) = sibling else {
            // A non-root fork with a single child; drop it from the parent too.
            let parent_side = self.fork_ref(parent)?.side_of(Node::Fork(fork)).ok_or_else(|| {
                TilingError::StructuralViolation(format!("{parent} is not the parent of {fork}"))
            })?;
            self.delete_entity(world, fork);
            return self.remove_node(world, parent, parent_side, events);
        };

        if self.fork_mut(parent)?.replace(Node::Fork(fork), sibling).is_none() {
            return Err(TilingError::StructuralViolation(format!(
                "{parent} is not the parent of {fork}"
            )));
        }
        match sibling {
            Node::Fork(promoted) => {
                self.parents.insert(promoted, parent);
                let rebalance = self.settings.rebalance_on_detach;
                let promoted = self.fork_mut(promoted)?;
                promoted.set_area(current.area);
                if rebalance {
                    promoted.rebalance_orientation();
                }
            }
            node => self.announce(parent, node, events),
        }
        self.delete_entity(world, fork);
        Ok(Some(parent))
    }

    /// Splices the children of `child` into `root` and deletes `child`.
    fn merge_up(
        &mut self,
        world: &mut World,
        root: Entity,
        child: Entity,
        events: &mut Vec<ForestEvent>,
    ) -> Result<(), TilingError> {
        let merged = self.fork_ref(child)?.clone();
        let rebalance = self.settings.rebalance_on_detach;
        let fork = self.fork_mut(root)?;
        fork.left = merged.left;
        fork.right = merged.right;
        fork.orientation = merged.orientation;
        fork.ratio = merged.ratio;
        fork.set_area(fork.area);
        if rebalance {
            fork.rebalance_orientation();
        }
        for node in [Some(merged.left), merged.right].into_iter().flatten() {
            match node {
                Node::Fork(grandchild) => {
                    self.parents.insert(grandchild, root);
                }
                other => self.announce(root, other, events),
            }
        }
        self.delete_entity(world, child);
        trace!(%root, %child, "Merged child into root");
        Ok(())
    }

    /// Deletes a fork and every trace of it: its parent link and, for a
    /// toplevel, its key.
    pub fn delete_entity(&mut self, world: &mut World, entity: Entity) {
        world.delete_entity(entity, &mut [&mut self.forks, &mut self.parents]);
        self.toplevel.retain(|_, root| *root != entity);
    }

    /// Turns a finished edge drag of `window` into a ratio change on the fork
    /// whose split that edge is. Returns the fork to re-measure.
    pub fn resize(
        &mut self,
        fork: Entity,
        window: Entity,
        movement: Movement,
        rect: Rect,
    ) -> Result<Entity, TilingError> {
        let root = self.find_toplevel(fork);
        let bounds = self.fork_ref(root)?.area;
        if !bounds.contains(&rect) {
            return Err(TilingError::GeometryOutOfBounds { rect, bounds });
        }

        let inner_gap = self.settings.inner_gap;
        let mut child = match self.stack_of(window) {
            Some(id) => Node::Stack(id),
            None => Node::Window(window),
        };
        let mut current = fork;
        loop {
            let node = self.fork_mut(current)?;
            let side = node.side_of(child).ok_or_else(|| {
                TilingError::StructuralViolation(format!("{child:?} is not a child of {current}"))
            })?;
            let action = if node.is_full() && node.area.contains(&rect) {
                resize::action(node.orientation, side, movement)
            } else {
                resize::ResizeAction::Ascend
            };
            if resize::apply(node, action, rect, inner_gap) {
                trace!(fork = %current, ?action, ratio = node.ratio, "Resized");
                return Ok(current);
            }
            match self.parent(current) {
                Some(parent) => {
                    child = Node::Fork(current);
                    current = parent;
                }
                None => {
                    trace!(fork = %current, ?movement, "No fork owns the moved edge");
                    return Ok(current);
                }
            }
        }
    }

    /// Recomputes the rectangles below `fork` from its stored area and queues
    /// them for [`Forest::arrange`].
    pub fn measure(&mut self, fork: Entity) -> Result<(), TilingError> {
        let area = self.fork_ref(fork)?.area;
        self.measure_fork(fork, area)
    }

    fn measure_fork(&mut self, entity: Entity, area: Rect) -> Result<(), TilingError> {
        let inner_gap = self.settings.inner_gap;
        let fork = self.fork_mut(entity)?;
        fork.set_area(area);
        let (left_rect, right_rect) = fork.split(inner_gap);
        let (left, right) = (fork.left, fork.right);
        self.measure_node(left, left_rect)?;
        if let (Some(node), Some(rect)) = (right, right_rect) {
            self.measure_node(node, rect)?;
        }
        Ok(())
    }

    fn measure_node(&mut self, node: Node, rect: Rect) -> Result<(), TilingError> {
        match node {
            Node::Window(window) => {
                self.requested.insert(window, rect);
            }
            Node::Fork(fork) => self.measure_fork(fork, rect)?,
            Node::Stack(id) => {
                let stack = self.stacks.get_mut(id).ok_or(TilingError::StaleStack(id))?;
                stack.update_positions(rect);
                let content = stack.content_rect;
                for &tab in stack.tabs() {
                    self.requested.insert(tab, content);
                }
            }
        }
        Ok(())
    }

    /// Moves the toplevel of `key` onto a new work area and re-measures it.
    pub fn set_work_area(&mut self, key: ToplevelKey, work_area: Rect) -> Result<(), TilingError> {
        let root = self.toplevel(key).ok_or(TilingError::NoToplevel(key))?;
        let area = work_area.shrink(&self.settings.outer_gap);
        self.fork_mut(root)?.set_area(area);
        self.measure(root)
    }

    /// Takes the placements queued by [`Forest::measure`], ordered by entity.
    pub fn arrange(&mut self) -> Vec<(Entity, Rect)> {
        std::mem::take(&mut self.requested).into_iter().collect()
    }

    pub fn toggle_orientation(&mut self, fork: Entity) -> Result<Entity, TilingError> {
        self.fork_mut(fork)?.toggle_orientation();
        Ok(fork)
    }

    /// Exchanges the tree positions of two windows. Returns the forks to
    /// re-measure.
    pub fn swap_windows(
        &mut self,
        a: Entity,
        b: Entity,
    ) -> Result<Outcome<Vec<Entity>>, TilingError> {
        if a == b {
            return Ok(Outcome::quiet(Vec::new()));
        }
        if let Some(id) = self.stack_of(a)
            && self.stack_of(b) == Some(id)
        {
            let stack = self.stacks.get_mut(id).ok_or(TilingError::StaleStack(id))?;
            stack.swap_tabs(a, b);
            let forks = self.find_stack(id).map(|(fork, _)| vec![fork]).unwrap_or_default();
            return Ok(Outcome::quiet(forks));
        }

        let (fork_a, side_a, node_a) = self.find_branch(a).ok_or(TilingError::NotTiled(a))?;
        let (fork_b, side_b, node_b) = self.find_branch(b).ok_or(TilingError::NotTiled(b))?;
        self.fork_mut(fork_a)?.set_branch(side_a, node_b);
        self.fork_mut(fork_b)?.set_branch(side_b, node_a);

        let mut events = Vec::new();
        self.announce(fork_b, node_a, &mut events);
        self.announce(fork_a, node_b, &mut events);
        let forks = if fork_a == fork_b { vec![fork_a] } else { vec![fork_a, fork_b] };
        Ok(Outcome::new(forks, events))
    }

    pub fn activate_tab(&mut self, window: Entity) -> Result<Outcome<StackId>, TilingError> {
        let id = self.stack_of(window).ok_or(TilingError::NotTiled(window))?;
        let stack = self.stacks.get_mut(id).ok_or(TilingError::StaleStack(id))?;
        Ok(Outcome::new(id, stack.activate(window)))
    }

    pub fn toggle_tab_back(&mut self, window: Entity) -> Result<Outcome<StackId>, TilingError> {
        let id = self.stack_of(window).ok_or(TilingError::NotTiled(window))?;
        let stack = self.stacks.get_mut(id).ok_or(TilingError::StaleStack(id))?;
        Ok(Outcome::new(id, stack.toggle_back()))
    }

    pub fn move_tab(&mut self, window: Entity, direction: Direction) -> Result<bool, TilingError> {
        let id = self.stack_of(window).ok_or(TilingError::NotTiled(window))?;
        let stack = self.stacks.get_mut(id).ok_or(TilingError::StaleStack(id))?;
        Ok(stack.move_tab(window, direction))
    }

    /// Every window under `fork`, left to right.
    pub fn windows_of(&self, fork: Entity) -> Vec<Entity> { Node::Fork(fork).windows(self) }

    /// Rectangle every window of `key` would get, computed from the tree
    /// without touching the pending placements.
    pub fn leaf_rects(&self, key: ToplevelKey) -> Vec<(Entity, Rect)> {
        let mut out = Vec::new();
        if let Some(root) = self.toplevel(key)
            && let Some(fork) = self.fork(root)
        {
            self.collect_rects(Node::Fork(root), fork.area, &mut out);
        }
        out
    }

    fn collect_rects(&self, node: Node, rect: Rect, out: &mut Vec<(Entity, Rect)>) {
        match node {
            Node::Window(window) => out.push((window, rect)),
            Node::Stack(id) => {
                if let Some(stack) = self.stacks.get(id) {
                    let (_, content) = stack.layout(rect);
                    out.extend(stack.tabs().iter().map(|&tab| (tab, content)));
                }
            }
            Node::Fork(entity) => {
                let Some(fork) = self.fork(entity) else { return };
                let mut fork = fork.clone();
                fork.set_area(rect);
                let (left_rect, right_rect) = fork.split(self.settings.inner_gap);
                self.collect_rects(fork.left, left_rect, out);
                if let (Some(right), Some(right_rect)) = (fork.right, right_rect) {
                    self.collect_rects(right, right_rect, out);
                }
            }
        }
    }

    /// The tiled window of `key` with the largest area; the first one wins a tie.
    pub fn largest_window_on(&self, key: ToplevelKey) -> Option<Entity> {
        let mut best: Option<(Entity, i64)> = None;
        for (window, rect) in self.leaf_rects(key) {
            if best.is_none_or(|(_, area)| rect.area() > area) {
                best = Some((window, rect.area()));
            }
        }
        best.map(|(window, _)| window)
    }

    /// The tiled window of `key` under `point`, preferring the active tab of a
    /// stack.
    pub fn window_at(&self, key: ToplevelKey, point: Point) -> Option<Entity> {
        let hits: Vec<_> = self
            .leaf_rects(key)
            .into_iter()
            .filter(|(_, rect)| rect.contains_point(point))
            .map(|(window, _)| window)
            .collect();
        let active = hits.iter().copied().find(|&window| {
            self.stack_of(window)
                .and_then(|id| self.stack(id))
                .is_none_or(|stack| stack.active() == Some(window))
        });
        active.or_else(|| hits.first().copied())
    }

    /// Deletes the tree rooted at `root` and returns its windows, now untiled.
    pub fn take_tree(
        &mut self,
        world: &mut World,
        root: Entity,
    ) -> Result<Outcome<Vec<Entity>>, TilingError> {
        self.fork_ref(root)?;
        let windows = self.windows_of(root);
        let mut events = Vec::new();
        for fork in self.subtree_forks(root) {
            let Some(current) = self.fork(fork).cloned() else { continue };
            for node in [Some(current.left), current.right].into_iter().flatten() {
                if let Node::Stack(id) = node
                    && self.stacks.remove(id).is_some()
                {
                    events.push(ForestEvent::StackRemoved(id));
                }
            }
            self.delete_entity(world, fork);
        }
        for &window in &windows {
            self.window_stacks.remove(window);
            self.requested.remove(&window);
            events.push(ForestEvent::Detached { window });
        }
        debug!(%root, ?windows, "Took tree");
        Ok(Outcome::new(windows, events))
    }

    fn subtree_forks(&self, root: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut pending = vec![root];
        while let Some(entity) = pending.pop() {
            let Some(fork) = self.fork(entity) else { continue };
            out.push(entity);
            let children = [Some(fork.left), fork.right].into_iter().flatten();
            pending.extend(children.filter_map(|node| node.fork()));
        }
        out
    }

    fn retag(&mut self, root: Entity, key: ToplevelKey) {
        for entity in self.subtree_forks(root) {
            if let Some(fork) = self.forks.get_mut(entity) {
                fork.monitor = key.monitor;
                fork.workspace = key.workspace;
            }
        }
    }

    /// Shifts every toplevel above `removed` down one workspace. The trees
    /// that lived on `removed` are deleted and their windows returned.
    pub fn on_workspace_removed(
        &mut self,
        world: &mut World,
        removed: WorkspaceId,
    ) -> Outcome<Vec<Entity>> {
        let old = std::mem::take(&mut self.toplevel);
        let mut orphans = Vec::new();
        for (key, root) in old {
            if key.workspace == removed {
                orphans.push(root);
                continue;
            }
            let key = if key.workspace > removed {
                let shifted = ToplevelKey { workspace: key.workspace - 1, ..key };
                self.retag(root, shifted);
                debug!(?key, ?shifted, "Reindexed toplevel");
                shifted
            } else {
                key
            };
            self.toplevel.insert(key, root);
        }

        let mut windows = Vec::new();
        let mut events = Vec::new();
        for root in orphans {
            match self.take_tree(world, root) {
                Ok(outcome) => windows.extend(outcome.drain_into(&mut events)),
                Err(err) => debug!(%root, %err, "Orphaned toplevel already gone"),
            }
        }
        Outcome::new(windows, events)
    }

    /// Renders the tree of `key` for logs.
    pub fn draw_tree(&self, key: ToplevelKey) -> Option<String> {
        let root = self.toplevel(key)?;
        let tree = self.ascii_node(Node::Fork(root));
        let mut out = String::new();
        ascii_tree::write_tree(&mut out, &tree).ok()?;
        Some(out)
    }

    fn ascii_node(&self, node: Node) -> ascii_tree::Tree {
        match node {
            Node::Window(window) => ascii_tree::Tree::Leaf(vec![format!("window {window}")]),
            Node::Stack(id) => {
                let Some(stack) = self.stack(id) else {
                    return ascii_tree::Tree::Leaf(vec![format!("stack {id:?} (gone)")]);
                };
                let tabs = stack
                    .tabs()
                    .iter()
                    .map(|&tab| {
                        let mark = if stack.active() == Some(tab) { "☒" } else { "☐" };
                        format!("{mark} {tab}")
                    })
                    .collect();
                ascii_tree::Tree::Node(format!("stack {id:?}"), vec![ascii_tree::Tree::Leaf(tabs)])
            }
            Node::Fork(entity) => {
                let Some(fork) = self.fork(entity) else {
                    return ascii_tree::Tree::Leaf(vec![format!("fork {entity} (gone)")]);
                };
                let desc = format!(
                    "fork {entity} {} {:.4} {}",
                    fork.orientation, fork.ratio, fork.area
                );
                let children = [Some(fork.left), fork.right]
                    .into_iter()
                    .flatten()
                    .map(|child| self.ascii_node(child))
                    .collect();
                ascii_tree::Tree::Node(desc, children)
            }
        }
    }

    pub fn snapshot(&self) -> ForestSnapshot {
        let toplevels = self
            .toplevel
            .iter()
            .map(|(&key, &root)| ToplevelSnapshot { key, tree: self.snapshot_node(Node::Fork(root)) })
            .collect();
        ForestSnapshot { toplevels }
    }

    fn snapshot_node(&self, node: Node) -> TreeSnapshot {
        match node {
            Node::Window(window) => TreeSnapshot::Window(window),
            Node::Stack(id) => match self.stack(id) {
                Some(stack) => {
                    TreeSnapshot::Stack { tabs: stack.tabs().to_vec(), active: stack.active() }
                }
                None => TreeSnapshot::Stack { tabs: Vec::new(), active: None },
            },
            Node::Fork(entity) => match self.fork(entity) {
                Some(fork) => TreeSnapshot::Fork {
                    orientation: fork.orientation,
                    ratio: fork.ratio,
                    area: fork.area,
                    left: Box::new(self.snapshot_node(fork.left)),
                    right: fork.right.map(|right| Box::new(self.snapshot_node(right))),
                },
                None => TreeSnapshot::Missing(entity),
            },
        }
    }

    /// Checks the structural invariants and describes every violation found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut claimed: HashMap<Entity, Entity> = HashMap::default();
        let mut stack_owners: HashMap<StackId, Entity> = HashMap::default();

        for (entity, fork) in self.forks.iter() {
            let (lo, hi) = fork.ratio_bounds();
            if fork.ratio < lo - 1e-9 || fork.ratio > hi + 1e-9 {
                problems.push(format!("{entity}: ratio {} outside [{lo}, {hi}]", fork.ratio));
            }
            if fork.right.is_none() && self.parent(entity).is_some() {
                problems.push(format!("{entity}: non-root fork with a single child"));
            }
            for node in [Some(fork.left), fork.right].into_iter().flatten() {
                match node {
                    Node::Window(window) => {
                        if let Some(other) = claimed.insert(window, entity) {
                            problems.push(format!("{window} claimed by {other} and {entity}"));
                        }
                    }
                    Node::Stack(id) => {
                        if let Some(other) = stack_owners.insert(id, entity) {
                            problems.push(format!("{id:?} claimed by {other} and {entity}"));
                        }
                        match self.stack(id) {
                            None => problems.push(format!("{entity}: dangling {id:?}")),
                            Some(stack) if stack.is_empty() => {
                                problems.push(format!("{id:?} is empty"))
                            }
                            Some(stack) => {
                                for &tab in stack.tabs() {
                                    if let Some(other) = claimed.insert(tab, entity) {
                                        problems.push(format!(
                                            "{tab} claimed by {other} and {entity}"
                                        ));
                                    }
                                    if self.stack_of(tab) != Some(id) {
                                        problems.push(format!("{tab} not marked as in {id:?}"));
                                    }
                                }
                            }
                        }
                    }
                    Node::Fork(child) => {
                        if self.parent(child) != Some(entity) {
                            problems.push(format!(
                                "{child}: parent link {:?} but hangs off {entity}",
                                self.parent(child)
                            ));
                        }
                        if !self.forks.contains(child) {
                            problems.push(format!("{entity}: dangling child fork {child}"));
                        }
                    }
                }
            }
            if self.parent(entity).is_none() {
                match self.toplevel.get(&fork.key()) {
                    Some(&root) if root == entity => {}
                    _ => problems.push(format!("{entity}: root fork not registered as toplevel")),
                }
                if !fork.is_toplevel {
                    problems.push(format!("{entity}: root fork not marked toplevel"));
                }
            }
        }

        for (child, parent) in self.parents.iter() {
            let linked = self.fork(*parent).is_some_and(|p| p.side_of(Node::Fork(child)).is_some());
            if !linked {
                problems.push(format!("{child}: parent {parent} does not hold it"));
            }
        }

        let mut roots = HashSet::default();
        for (key, root) in &self.toplevel {
            match self.fork(*root) {
                None => problems.push(format!("{key:?}: toplevel {root} is gone")),
                Some(fork) if fork.key() != *key => {
                    problems.push(format!("{key:?}: toplevel {root} is tagged {:?}", fork.key()))
                }
                Some(_) => {}
            }
            if !roots.insert(*root) {
                problems.push(format!("{root} is toplevel of more than one key"));
            }
        }

        for id in self.stacks.keys() {
            if !stack_owners.contains_key(&id) {
                problems.push(format!("{id:?} is not in any tree"));
            }
        }
        problems
    }
}

/// Serializable view of every tree, keyed by toplevel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestSnapshot {
    pub toplevels: Vec<ToplevelSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToplevelSnapshot {
    pub key: ToplevelKey,
    pub tree: TreeSnapshot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeSnapshot {
    Window(Entity),
    Stack {
        tabs: Vec<Entity>,
        active: Option<Entity>,
    },
    Fork {
        orientation: Orientation,
        ratio: f64,
        area: Rect,
        left: Box<TreeSnapshot>,
        right: Option<Box<TreeSnapshot>>,
    },
    Missing(Entity),
}

impl TreeSnapshot {
    /// Windows in left-to-right order.
    pub fn leaves(&self) -> Vec<Entity> {
        match self {
            TreeSnapshot::Window(window) => vec![*window],
            TreeSnapshot::Stack { tabs, .. } => tabs.clone(),
            TreeSnapshot::Fork { left, right, .. } => {
                let mut out = left.leaves();
                if let Some(right) = right {
                    out.extend(right.leaves());
                }
                out
            }
            TreeSnapshot::Missing(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_placement_follows_pointer() {
        let rect = Rect::new(0, 0, 1000, 600);
        assert_eq!(
            Placement::Cursor(Point::new(100, 300)).resolve(rect),
            (Orientation::Horizontal, true)
        );
        assert_eq!(
            Placement::Cursor(Point::new(900, 300)).resolve(rect),
            (Orientation::Horizontal, false)
        );
        let tall = Rect::new(0, 0, 600, 1000);
        assert_eq!(
            Placement::Cursor(Point::new(300, 100)).resolve(tall),
            (Orientation::Vertical, true)
        );
    }

    #[test]
    fn keyboard_placement_picks_nearer_half() {
        let rect = Rect::new(0, 0, 1000, 600);
        assert_eq!(
            Placement::Keyboard(Point::new(-400, 300)).resolve(rect),
            (Orientation::Horizontal, true)
        );
        assert_eq!(
            Placement::Keyboard(Point::new(2000, 0)).resolve(rect),
            (Orientation::Horizontal, false)
        );
    }

    #[test]
    fn explicit_and_auto_placement() {
        let rect = Rect::new(0, 0, 1000, 600);
        assert_eq!(Placement::Auto.resolve(rect), (Orientation::Horizontal, false));
        let explicit = Placement::Explicit { orientation: Orientation::Vertical, new_first: true };
        assert_eq!(explicit.resolve(rect), (Orientation::Vertical, true));
    }

    #[test]
    fn halves_cover_odd_lengths() {
        let (a, b) = halves(Rect::new(0, 0, 101, 50), Orientation::Horizontal);
        assert_eq!(a, Rect::new(0, 0, 50, 50));
        assert_eq!(b, Rect::new(50, 0, 51, 50));
    }
}
