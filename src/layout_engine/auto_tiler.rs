//! Drives the forest from host window-manager notifications.
//!
//! Every handler runs to completion and returns the requests the host has to
//! apply. Errors never escape: they are logged and the handler falls back to a
//! no-op, a snap back, or attaching to the monitor.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use super::{
    Direction, Forest, ForestEvent, MonitorId, Placement, Request, TilingError, TilingSettings,
    ToplevelKey, WorkspaceId,
};
use crate::common::collections::{BTreeMap, BTreeSet};
use crate::model::{Entity, IsWithin, Movement, Point, Rect, Storage, World};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrabOp {
    Move,
    Resize,
}

/// What the tiler knows about a live window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowState {
    pub key: Option<ToplevelKey>,
    /// Last rectangle the tiler placed the window at, or the host reported for
    /// an untiled window.
    pub frame: Rect,
}

/// Reported geometry this close to the placed frame is treated as settled.
const SNAP_TOLERANCE_PX: i32 = 1;

#[derive(Clone, Copy, Debug)]
struct Grab {
    window: Entity,
    op: GrabOp,
    baseline: Rect,
    latest: Rect,
}

fn report(err: &TilingError, context: &str) {
    if err.is_stale() {
        debug!(%err, "{context}");
    } else {
        warn!(%err, "{context}");
    }
}

#[derive(Debug)]
pub struct AutoTiler {
    world: World,
    forest: Forest,
    windows: Storage<WindowState>,
    /// Window to the fork that holds it, kept current from forest events.
    owners: Storage<Entity>,
    monitors: BTreeMap<MonitorId, Rect>,
    grab: Option<Grab>,
    focused: Option<Entity>,
}

impl AutoTiler {
    pub fn new(settings: TilingSettings) -> Self {
        AutoTiler {
            world: World::new(),
            forest: Forest::new(settings),
            windows: Storage::new(),
            owners: Storage::new(),
            monitors: BTreeMap::new(),
            grab: None,
            focused: None,
        }
    }

    pub fn forest(&self) -> &Forest { &self.forest }

    pub fn window(&self, window: Entity) -> Option<&WindowState> { self.windows.get(window) }

    pub fn windows(&self) -> impl Iterator<Item = (Entity, &WindowState)> + '_ {
        self.windows.iter()
    }

    pub fn owner(&self, window: Entity) -> Option<Entity> { self.owners.get(window).copied() }

    pub fn is_tiled(&self, window: Entity) -> bool { self.owners.contains(window) }

    pub fn focused(&self) -> Option<Entity> { self.focused }

    pub fn work_area(&self, monitor: MonitorId) -> Option<Rect> {
        self.monitors.get(&monitor).copied()
    }

    fn monitor_at(&self, point: Point) -> Option<MonitorId> {
        self.monitors
            .iter()
            .find(|(_, area)| area.contains_point(point))
            .map(|(monitor, _)| *monitor)
    }

    /// Registers a monitor or updates its work area, re-measuring its trees.
    #[instrument(skip(self))]
    pub fn set_monitor(&mut self, monitor: MonitorId, work_area: Rect) -> Vec<Request> {
        self.monitors.insert(monitor, work_area);
        let keys: Vec<_> = self
            .forest
            .toplevels()
            .filter(|(key, _)| key.monitor == monitor)
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            if let Err(err) = self.forest.set_work_area(key, work_area) {
                report(&err, "Failed to resize toplevel");
            }
        }
        self.arrange()
    }

    /// Forgets a monitor, re-tiling its windows onto `fallback` on the same
    /// workspace index.
    #[instrument(skip(self))]
    pub fn remove_monitor(&mut self, monitor: MonitorId, fallback: MonitorId) -> Vec<Request> {
        if monitor == fallback || !self.monitors.contains_key(&fallback) {
            report(&TilingError::UnknownMonitor(fallback), "Cannot remove monitor");
            return Vec::new();
        }
        self.monitors.remove(&monitor);

        let roots: Vec<_> =
            self.forest.toplevels().filter(|(key, _)| key.monitor == monitor).collect();
        let mut requests = Vec::new();
        let mut orphaned = Vec::new();
        for (_, root) in roots {
            match self.forest.take_tree(&mut self.world, root) {
                Ok(outcome) => {
                    let mut events = Vec::new();
                    orphaned.extend(outcome.drain_into(&mut events));
                    self.apply_events(events, &mut requests);
                }
                Err(err) => report(&err, "Failed to take tree of removed monitor"),
            }
        }
        for (_, state) in self.windows.iter_mut() {
            if let Some(key) = &mut state.key
                && key.monitor == monitor
            {
                key.monitor = fallback;
            }
        }
        for window in orphaned {
            requests.extend(self.auto_tile(window, Placement::Auto));
        }
        requests
    }

    /// Allocates an entity for a newly mapped window. It is not tiled until
    /// [`AutoTiler::auto_tile`] is called.
    pub fn create_window(&mut self, key: Option<ToplevelKey>, frame: Rect) -> Entity {
        let window = self.world.create_entity();
        self.windows.insert(window, WindowState { key, frame });
        trace!(%window, ?key, %frame, "Created window");
        window
    }

    pub fn focus(&mut self, window: Entity) {
        if self.windows.contains(window) {
            self.focused = Some(window);
        }
    }

    /// Tiles `window` next to the focused window of its workspace, or next to
    /// the largest one when focus is elsewhere.
    #[instrument(skip(self))]
    pub fn auto_tile(&mut self, window: Entity, placement: Placement) -> Vec<Request> {
        let Some(state) = self.windows.get(window).copied() else {
            report(&TilingError::StaleEntity(window), "Cannot tile window");
            return Vec::new();
        };
        if self.owners.contains(window) {
            trace!(%window, "Already tiled");
            return Vec::new();
        }
        let key = match state.key {
            Some(key) => key,
            None => {
                report(&TilingError::MissingMonitorAssociation(window), "Attaching to monitor");
                let key = self.fallback_key(state.frame);
                if let Some(state) = self.windows.get_mut(window) {
                    state.key = Some(key);
                }
                return self.tile_on_monitor(window, key, placement);
            }
        };

        let focused = self.focused.filter(|&focused| {
            focused != window
                && self.owners.contains(focused)
                && self.windows.get(focused).and_then(|s| s.key) == Some(key)
        });
        let onto = focused.or_else(|| self.forest.largest_window_on(key));
        let Some(onto) = onto.filter(|&onto| onto != window) else {
            return self.tile_on_monitor(window, key, placement);
        };

        match self.forest.attach_window(&mut self.world, onto, window, placement) {
            Ok(outcome) => {
                let mut events = Vec::new();
                let fork = outcome.drain_into(&mut events);
                self.finish([fork], events)
            }
            Err(err) => {
                report(&err, "Attach onto window failed, attaching to monitor");
                self.tile_on_monitor(window, key, placement)
            }
        }
    }

    fn tile_on_monitor(
        &mut self,
        window: Entity,
        key: ToplevelKey,
        placement: Placement,
    ) -> Vec<Request> {
        let Some(work_area) = self.work_area(key.monitor) else {
            report(&TilingError::UnknownMonitor(key.monitor), "Cannot tile window");
            return Vec::new();
        };
        match self.forest.attach_to_monitor(&mut self.world, window, work_area, key, placement) {
            Ok(outcome) => {
                let mut events = Vec::new();
                let root = outcome.drain_into(&mut events);
                self.finish([root], events)
            }
            Err(err) => {
                report(&err, "Attach to monitor failed");
                Vec::new()
            }
        }
    }

    /// Where a window without a recorded workspace goes: the monitor under its
    /// centre and the focused window's workspace.
    fn fallback_key(&self, frame: Rect) -> ToplevelKey {
        let monitor = self
            .monitor_at(frame.center())
            .or_else(|| self.monitors.keys().next().copied())
            .unwrap_or_default();
        let workspace = self
            .focused
            .and_then(|focused| self.windows.get(focused))
            .and_then(|state| state.key)
            .map_or(0, |key| key.workspace);
        ToplevelKey::new(monitor, workspace)
    }

    /// Removes `window` from its tree, leaving it untiled.
    #[instrument(skip(self))]
    pub fn detach_window(&mut self, window: Entity) -> Vec<Request> {
        let Some(fork) = self.owner(window) else {
            return Vec::new();
        };
        match self.forest.detach(&mut self.world, fork, window) {
            Ok(outcome) => {
                let mut events = Vec::new();
                let remeasure = outcome.drain_into(&mut events);
                self.finish(remeasure, events)
            }
            Err(err) => {
                report(&err, "Detach failed");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self))]
    pub fn destroy_window(&mut self, window: Entity) -> Vec<Request> {
        let requests = self.detach_window(window);
        if self.grab.is_some_and(|grab| grab.window == window) {
            self.grab = None;
        }
        if self.focused == Some(window) {
            self.focused = None;
        }
        self.world.delete_entity(window, &mut [&mut self.windows, &mut self.owners]);
        requests
    }

    /// A size or position notification. During a grab only the latest
    /// rectangle is recorded; a tiled window that moved on its own is put back.
    pub fn geometry_changed(&mut self, window: Entity, rect: Rect) -> Vec<Request> {
        if let Some(grab) = self.grab.as_mut()
            && grab.window == window
        {
            grab.latest = rect;
            return Vec::new();
        }
        let tiled = self.owners.contains(window);
        let Some(state) = self.windows.get_mut(window) else {
            return Vec::new();
        };
        if !tiled {
            state.frame = rect;
            return Vec::new();
        }
        if rect.is_within(SNAP_TOLERANCE_PX, state.frame) {
            return Vec::new();
        }
        trace!(%window, %rect, frame = %state.frame, "Snapping tiled window back");
        vec![Request::Place { window, rect: state.frame }]
    }

    pub fn grab_begin(&mut self, window: Entity, op: GrabOp) {
        if let Some(active) = self.grab {
            warn!(active = %active.window, %window, "Grab already in progress");
            return;
        }
        let Some(state) = self.windows.get(window) else {
            return;
        };
        self.grab = Some(Grab { window, op, baseline: state.frame, latest: state.frame });
    }

    /// Ends a grab, replaying the net change against the rectangle captured
    /// when it began.
    #[instrument(skip(self))]
    pub fn grab_end(&mut self, window: Entity) -> Vec<Request> {
        let Some(grab) = self.grab.filter(|grab| grab.window == window) else {
            debug!(%window, "Grab end without matching grab");
            return Vec::new();
        };
        self.grab = None;

        if !self.owners.contains(window) {
            if let Some(state) = self.windows.get_mut(window) {
                state.frame = grab.latest;
            }
            return Vec::new();
        }
        let movement = Movement::calculate(grab.baseline, grab.latest);
        if movement.is_empty() {
            return Vec::new();
        }
        trace!(%window, ?movement, baseline = %grab.baseline, latest = %grab.latest);
        match grab.op {
            GrabOp::Resize => {
                let steps = Movement::axes(grab.baseline, grab.latest);
                if steps.is_empty() {
                    debug!(%window, ?movement, "Resize grab moved the window");
                    return self.snap_back(window);
                }
                self.resize_window(window, steps)
            }
            GrabOp::Move => self.drop_window(window, grab.latest),
        }
    }

    /// Applies each single-edge step of a resize in turn. Any rejected step
    /// snaps the window back to the layout as it stands.
    fn resize_window(&mut self, window: Entity, steps: Vec<(Movement, Rect)>) -> Vec<Request> {
        let Some(fork) = self.owner(window) else {
            return Vec::new();
        };
        // The intermediate rectangle lies inside the baseline and the final one.
        let root = self.forest.find_toplevel(fork);
        if let (Some((_, rect)), Some(root)) = (steps.last(), self.forest.fork(root))
            && !root.area.contains(rect)
        {
            let err = TilingError::GeometryOutOfBounds { rect: *rect, bounds: root.area };
            report(&err, "Resize rejected");
            return self.snap_back(window);
        }
        let mut remeasure = Vec::with_capacity(steps.len());
        for (movement, rect) in steps {
            // Later steps look up forks by area, so each step is measured first.
            match self.forest.resize(fork, window, movement, rect).and_then(|changed| {
                self.forest.measure(changed)?;
                Ok(changed)
            }) {
                Ok(changed) => remeasure.push(changed),
                Err(err) => {
                    report(&err, "Resize rejected");
                    remeasure.push(fork);
                    break;
                }
            }
        }
        self.finish(remeasure, Vec::new())
    }

    fn snap_back(&mut self, window: Entity) -> Vec<Request> {
        let owner = self.owner(window);
        self.finish(owner, Vec::new())
    }

    /// A moved window dropped over another tiled window is re-attached next to
    /// it; dropped on another monitor it joins that monitor's tree.
    fn drop_window(&mut self, window: Entity, rect: Rect) -> Vec<Request> {
        let Some(key) = self.windows.get(window).and_then(|state| state.key) else {
            return self.snap_back(window);
        };
        let center = rect.center();
        let Some(monitor) = self.monitor_at(center) else {
            return self.snap_back(window);
        };
        let target_key = ToplevelKey::new(monitor, key.workspace);
        let target = self.forest.window_at(target_key, center).filter(|&target| {
            target != window
                && (self.forest.stack_of(target).is_none()
                    || self.forest.stack_of(target) != self.forest.stack_of(window))
        });
        if target.is_none() && monitor == key.monitor {
            return self.snap_back(window);
        }

        let placement = Placement::Cursor(center);
        let mut requests = self.detach_window(window);
        if let Some(state) = self.windows.get_mut(window) {
            state.key = Some(target_key);
        }
        let Some(target) = target else {
            requests.extend(self.tile_on_monitor(window, target_key, placement));
            return requests;
        };
        match self.forest.attach_window(&mut self.world, target, window, placement) {
            Ok(outcome) => {
                let mut events = Vec::new();
                let fork = outcome.drain_into(&mut events);
                requests.extend(self.finish([fork], events));
            }
            Err(err) => {
                report(&err, "Drop target vanished, attaching to monitor");
                requests.extend(self.tile_on_monitor(window, target_key, placement));
            }
        }
        requests
    }

    #[instrument(skip(self))]
    pub fn move_to_workspace(&mut self, window: Entity, workspace: WorkspaceId) -> Vec<Request> {
        let Some(state) = self.windows.get(window).copied() else {
            return Vec::new();
        };
        let key = state.key.unwrap_or_else(|| self.fallback_key(state.frame));
        self.reassign(window, ToplevelKey { workspace, ..key })
    }

    #[instrument(skip(self))]
    pub fn move_to_monitor(&mut self, window: Entity, monitor: MonitorId) -> Vec<Request> {
        if !self.monitors.contains_key(&monitor) {
            report(&TilingError::UnknownMonitor(monitor), "Cannot move window");
            return Vec::new();
        }
        let Some(state) = self.windows.get(window).copied() else {
            return Vec::new();
        };
        let key = state.key.unwrap_or_else(|| self.fallback_key(state.frame));
        self.reassign(window, ToplevelKey { monitor, ..key })
    }

    fn reassign(&mut self, window: Entity, key: ToplevelKey) -> Vec<Request> {
        if self.windows.get(window).and_then(|state| state.key) == Some(key) {
            return Vec::new();
        }
        let tiled = self.owners.contains(window);
        let mut requests = if tiled { self.detach_window(window) } else { Vec::new() };
        if let Some(state) = self.windows.get_mut(window) {
            state.key = Some(key);
        }
        if tiled {
            requests.extend(self.auto_tile(window, Placement::Auto));
        }
        requests
    }

    /// Shifts every workspace above `removed` down by one. Windows that were on
    /// `removed` move to the workspace before it.
    #[instrument(skip(self))]
    pub fn workspace_removed(&mut self, removed: WorkspaceId) -> Vec<Request> {
        let outcome = self.forest.on_workspace_removed(&mut self.world, removed);
        let mut events = Vec::new();
        let orphaned = outcome.drain_into(&mut events);
        let mut requests = Vec::new();
        self.apply_events(events, &mut requests);

        let target = removed.saturating_sub(1);
        let mut moved = Vec::new();
        for (window, state) in self.windows.iter_mut() {
            let Some(key) = &mut state.key else { continue };
            if key.workspace == removed {
                key.workspace = target;
                moved.push(window);
            } else if key.workspace > removed {
                key.workspace -= 1;
            }
        }
        requests.extend(
            moved.into_iter().map(|window| Request::MoveToWorkspace { window, workspace: target }),
        );
        for window in orphaned {
            requests.extend(self.auto_tile(window, Placement::Auto));
        }
        requests
    }

    #[instrument(skip(self))]
    pub fn toggle_orientation(&mut self, window: Entity) -> Vec<Request> {
        let Some(fork) = self.owner(window) else {
            return Vec::new();
        };
        match self.forest.toggle_orientation(fork) {
            Ok(fork) => self.finish([fork], Vec::new()),
            Err(err) => {
                report(&err, "Toggle orientation failed");
                Vec::new()
            }
        }
    }

    /// Turns the window's leaf into a tab group, or dissolves the group it is
    /// already in.
    #[instrument(skip(self))]
    pub fn toggle_stacking(&mut self, window: Entity) -> Vec<Request> {
        if let Some(id) = self.forest.stack_of(window) {
            return match self.forest.unstack(&mut self.world, id) {
                Ok(outcome) => {
                    let mut events = Vec::new();
                    let remeasure = outcome.drain_into(&mut events);
                    self.finish(remeasure, events)
                }
                Err(err) => {
                    report(&err, "Unstack failed");
                    Vec::new()
                }
            };
        }
        if !self.owners.contains(window) {
            return Vec::new();
        }
        match self.forest.create_stack(window) {
            Ok(outcome) => {
                let mut events = Vec::new();
                let _ = outcome.drain_into(&mut events);
                let owner = self.owner(window);
                self.finish(owner, events)
            }
            Err(err) => {
                report(&err, "Stacking failed");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self))]
    pub fn swap(&mut self, a: Entity, b: Entity) -> Vec<Request> {
        match self.forest.swap_windows(a, b) {
            Ok(outcome) => {
                let mut events = Vec::new();
                let forks = outcome.drain_into(&mut events);
                self.finish(forks, events)
            }
            Err(err) => {
                report(&err, "Swap failed");
                Vec::new()
            }
        }
    }

    pub fn activate_tab(&mut self, window: Entity) -> Vec<Request> {
        match self.forest.activate_tab(window) {
            Ok(outcome) => {
                let mut events = Vec::new();
                let _ = outcome.drain_into(&mut events);
                let owner = self.owner(window);
                self.finish(owner, events)
            }
            Err(err) => {
                report(&err, "Activate tab failed");
                Vec::new()
            }
        }
    }

    pub fn toggle_tab_back(&mut self, window: Entity) -> Vec<Request> {
        match self.forest.toggle_tab_back(window) {
            Ok(outcome) => {
                let mut events = Vec::new();
                let _ = outcome.drain_into(&mut events);
                let owner = self.owner(window);
                self.finish(owner, events)
            }
            Err(err) => {
                report(&err, "Toggle tab failed");
                Vec::new()
            }
        }
    }

    pub fn move_tab(&mut self, window: Entity, direction: Direction) -> Vec<Request> {
        match self.forest.move_tab(window, direction) {
            Ok(true) => {
                let owner = self.owner(window);
                self.finish(owner, Vec::new())
            }
            Ok(false) => Vec::new(),
            Err(err) => {
                report(&err, "Move tab failed");
                Vec::new()
            }
        }
    }

    /// Applies forest events, re-measures `forks` and collects placements.
    fn finish(
        &mut self,
        forks: impl IntoIterator<Item = Entity>,
        events: Vec<ForestEvent>,
    ) -> Vec<Request> {
        let mut requests = Vec::new();
        self.apply_events(events, &mut requests);
        let mut keys = BTreeSet::new();
        for fork in forks {
            if let Err(err) = self.forest.measure(fork) {
                report(&err, "Measure failed");
                continue;
            }
            let root = self.forest.find_toplevel(fork);
            if let Some(root) = self.forest.fork(root) {
                keys.insert(root.key());
            }
        }
        requests.extend(self.arrange());
        for key in keys {
            if let Some(tree) = self.forest.draw_tree(key) {
                debug!("Tree {key:?}\n{}", tree.trim());
            }
        }
        requests
    }

    fn apply_events(&mut self, events: Vec<ForestEvent>, requests: &mut Vec<Request>) {
        for event in events {
            match event {
                ForestEvent::Attached { fork, window } => {
                    self.owners.insert(window, fork);
                }
                ForestEvent::Detached { window } => {
                    self.owners.remove(window);
                }
                ForestEvent::Show(window) => requests.push(Request::Show(window)),
                ForestEvent::Hide(window) => requests.push(Request::Hide(window)),
                ForestEvent::StackRemoved(id) => requests.push(Request::RemoveTabStrip(id)),
            }
        }
    }

    /// Turns pending placements into requests, followed by the tab strip of
    /// every stack that was placed.
    fn arrange(&mut self) -> Vec<Request> {
        let mut requests = Vec::new();
        let mut stacks = BTreeSet::new();
        for (window, rect) in self.forest.arrange() {
            let Some(state) = self.windows.get_mut(window) else {
                report(&TilingError::StaleEntity(window), "Dropping placement");
                continue;
            };
            state.frame = rect;
            requests.push(Request::Place { window, rect });
            if let Some(id) = self.forest.stack_of(window) {
                stacks.insert(id);
            }
        }
        for id in stacks {
            if let Some(stack) = self.forest.stack(id) {
                requests.push(Request::TabStrip {
                    stack: id,
                    rect: stack.tabs_rect,
                    tabs: stack.tabs().to_vec(),
                    active: stack.active(),
                });
            }
        }
        requests
    }
}
