//! Drives an [`AutoTiler`] from a script of host events.
//!
//! A script holds one RON-encoded [`HostEvent`] per line. Blank lines and lines
//! starting with `//` are skipped. Windows are referred to by name; the name is
//! bound to a fresh entity by [`HostEvent::WindowCreated`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::common::collections::BTreeMap;
use crate::layout_engine::{
    AutoTiler, Direction, GrabOp, MonitorId, Placement, Request, TilingSettings, ToplevelKey,
    WorkspaceId,
};
use crate::model::{Entity, Rect};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum HostEvent {
    Monitor {
        id: MonitorId,
        work_area: Rect,
    },
    MonitorRemoved {
        id: MonitorId,
        fallback: MonitorId,
    },
    /// A window was mapped and should be tiled.
    WindowCreated {
        window: String,
        #[serde(default)]
        key: Option<ToplevelKey>,
        frame: Rect,
        #[serde(default)]
        placement: Placement,
    },
    WindowDestroyed(String),
    Focused(String),
    /// Take a window out of its tree, e.g. because it became floating.
    Untile(String),
    Tile {
        window: String,
        #[serde(default)]
        placement: Placement,
    },
    GeometryChanged {
        window: String,
        rect: Rect,
    },
    GrabBegin {
        window: String,
        op: GrabOp,
    },
    GrabEnd(String),
    MoveToWorkspace {
        window: String,
        workspace: WorkspaceId,
    },
    MoveToMonitor {
        window: String,
        monitor: MonitorId,
    },
    WorkspaceRemoved(WorkspaceId),
    ToggleOrientation(String),
    ToggleStacking(String),
    Swap(String, String),
    ActivateTab(String),
    ToggleTabBack(String),
    MoveTab {
        window: String,
        direction: Direction,
    },
}

/// The requests one script line produced.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Step {
    pub line: usize,
    pub event: HostEvent,
    pub requests: Vec<Request>,
}

pub fn parse_script(script: &str) -> anyhow::Result<Vec<(usize, HostEvent)>> {
    let mut events = Vec::new();
    for (index, line) in script.lines().enumerate() {
        if let Some(event) = parse_line(index + 1, line)? {
            events.push((index + 1, event));
        }
    }
    Ok(events)
}

fn parse_line(line: usize, text: &str) -> anyhow::Result<Option<HostEvent>> {
    let text = text.trim();
    if text.is_empty() || text.starts_with("//") {
        return Ok(None);
    }
    let event = ron::de::from_str(text).with_context(|| format!("line {line}"))?;
    Ok(Some(event))
}

pub struct Replay {
    tiler: AutoTiler,
    windows: BTreeMap<String, Entity>,
    names: BTreeMap<Entity, String>,
}

impl Replay {
    pub fn new(settings: TilingSettings) -> Self {
        Replay {
            tiler: AutoTiler::new(settings),
            windows: BTreeMap::new(),
            names: BTreeMap::new(),
        }
    }

    pub fn tiler(&self) -> &AutoTiler { &self.tiler }

    pub fn windows(&self) -> &BTreeMap<String, Entity> { &self.windows }

    pub fn name_of(&self, window: Entity) -> Option<&str> {
        self.names.get(&window).map(String::as_str)
    }

    fn lookup(&self, name: &str) -> anyhow::Result<Entity> {
        match self.windows.get(name) {
            Some(&window) => Ok(window),
            None => bail!("unknown window {name:?}"),
        }
    }

    pub fn handle(&mut self, event: &HostEvent) -> anyhow::Result<Vec<Request>> {
        let requests = match event {
            HostEvent::Monitor { id, work_area } => self.tiler.set_monitor(*id, *work_area),
            HostEvent::MonitorRemoved { id, fallback } => {
                self.tiler.remove_monitor(*id, *fallback)
            }
            HostEvent::WindowCreated { window, key, frame, placement } => {
                if self.windows.contains_key(window) {
                    bail!("window {window:?} already exists");
                }
                let entity = self.tiler.create_window(*key, *frame);
                self.windows.insert(window.clone(), entity);
                self.names.insert(entity, window.clone());
                self.tiler.auto_tile(entity, *placement)
            }
            HostEvent::WindowDestroyed(window) => {
                let entity = self.lookup(window)?;
                self.windows.remove(window);
                self.names.remove(&entity);
                self.tiler.destroy_window(entity)
            }
            HostEvent::Focused(window) => {
                let entity = self.lookup(window)?;
                self.tiler.focus(entity);
                Vec::new()
            }
            HostEvent::Untile(window) => {
                let entity = self.lookup(window)?;
                self.tiler.detach_window(entity)
            }
            HostEvent::Tile { window, placement } => {
                let entity = self.lookup(window)?;
                self.tiler.auto_tile(entity, *placement)
            }
            HostEvent::GeometryChanged { window, rect } => {
                let entity = self.lookup(window)?;
                self.tiler.geometry_changed(entity, *rect)
            }
            HostEvent::GrabBegin { window, op } => {
                let entity = self.lookup(window)?;
                self.tiler.grab_begin(entity, *op);
                Vec::new()
            }
            HostEvent::GrabEnd(window) => {
                let entity = self.lookup(window)?;
                self.tiler.grab_end(entity)
            }
            HostEvent::MoveToWorkspace { window, workspace } => {
                let entity = self.lookup(window)?;
                self.tiler.move_to_workspace(entity, *workspace)
            }
            HostEvent::MoveToMonitor { window, monitor } => {
                let entity = self.lookup(window)?;
                self.tiler.move_to_monitor(entity, *monitor)
            }
            HostEvent::WorkspaceRemoved(workspace) => self.tiler.workspace_removed(*workspace),
            HostEvent::ToggleOrientation(window) => {
                let entity = self.lookup(window)?;
                self.tiler.toggle_orientation(entity)
            }
            HostEvent::ToggleStacking(window) => {
                let entity = self.lookup(window)?;
                self.tiler.toggle_stacking(entity)
            }
            HostEvent::Swap(a, b) => {
                let (a, b) = (self.lookup(a)?, self.lookup(b)?);
                self.tiler.swap(a, b)
            }
            HostEvent::ActivateTab(window) => {
                let entity = self.lookup(window)?;
                self.tiler.activate_tab(entity)
            }
            HostEvent::ToggleTabBack(window) => {
                let entity = self.lookup(window)?;
                self.tiler.toggle_tab_back(entity)
            }
            HostEvent::MoveTab { window, direction } => {
                let entity = self.lookup(window)?;
                self.tiler.move_tab(entity, *direction)
            }
        };
        Ok(requests)
    }

    /// Runs every event of `script`, stopping at the first bad line.
    pub fn run(&mut self, script: &str) -> anyhow::Result<Vec<Step>> {
        let mut steps = Vec::new();
        for (line, event) in parse_script(script)? {
            steps.push(self.step(line, event)?);
        }
        Ok(steps)
    }

    fn step(&mut self, line: usize, event: HostEvent) -> anyhow::Result<Step> {
        let _span = debug_span!("replay", line).entered();
        debug!(?event);
        let requests = self.handle(&event).with_context(|| format!("line {line}"))?;
        Ok(Step { line, event, requests })
    }

    /// One-line rendering of a request with window names substituted.
    pub fn describe(&self, request: &Request) -> String {
        let name = |window: &Entity| match self.name_of(*window) {
            Some(name) => name.to_string(),
            None => window.to_string(),
        };
        match request {
            Request::Place { window, rect } => format!("place {} {rect}", name(window)),
            Request::Show(window) => format!("show {}", name(window)),
            Request::Hide(window) => format!("hide {}", name(window)),
            Request::MoveToWorkspace { window, workspace } => {
                format!("move {} to workspace {workspace}", name(window))
            }
            Request::TabStrip { stack, rect, tabs, active } => {
                let tabs: Vec<_> = tabs
                    .iter()
                    .map(|tab| {
                        if Some(*tab) == *active { format!("[{}]", name(tab)) } else { name(tab) }
                    })
                    .collect();
                format!("tabs {stack:?} {rect} {}", tabs.join(" "))
            }
            Request::RemoveTabStrip(stack) => format!("remove tabs {stack:?}"),
        }
    }
}

/// Replays the script at `path`, reading it line by line.
pub fn replay(path: &Path, settings: TilingSettings) -> anyhow::Result<(Replay, Vec<Step>)> {
    let file = BufReader::new(
        File::open(path).with_context(|| format!("opening {}", path.display()))?,
    );
    let mut replay = Replay::new(settings);
    let mut steps = Vec::new();
    for (index, line) in file.lines().enumerate() {
        let Some(event) = parse_line(index + 1, &line?)? else { continue };
        steps.push(replay.step(index + 1, event)?);
    }
    Ok((replay, steps))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    const SCRIPT: &str = r#"
Monitor(id: 0, work_area: (x: 0, y: 0, width: 1920, height: 1080))
// two tiles side by side
WindowCreated(window: "a", key: Some((monitor: 0, workspace: 0)), frame: (x: 0, y: 0, width: 800, height: 600))
Focused("a")
WindowCreated(window: "b", key: Some((monitor: 0, workspace: 0)), frame: (x: 0, y: 0, width: 800, height: 600))
GrabBegin(window: "a", op: resize)
GeometryChanged(window: "a", rect: (x: 0, y: 0, width: 1200, height: 1080))
GrabEnd("a")
"#;

    fn described(replay: &Replay, step: &Step) -> Vec<String> {
        step.requests.iter().map(|r| replay.describe(r)).collect()
    }

    #[test]
    fn resize_script() {
        let mut replay = Replay::new(TilingSettings::default());
        let steps = replay.run(SCRIPT).unwrap();
        let lines: Vec<_> = steps.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 4, 5, 6, 7, 8, 9]);

        assert_eq!(described(&replay, &steps[1]), vec!["place a (0, 0, 1920x1080)"]);
        assert_eq!(described(&replay, &steps[3]), vec![
            "place a (0, 0, 960x1080)",
            "place b (960, 0, 960x1080)",
        ]);
        assert!(steps[4].requests.is_empty());
        assert!(steps[5].requests.is_empty());
        assert_eq!(described(&replay, &steps[6]), vec![
            "place a (0, 0, 1200x1080)",
            "place b (1200, 0, 720x1080)",
        ]);
        assert!(replay.tiler().forest().validate().is_empty());
    }

    #[test]
    fn stacking_script_names_tabs() {
        let mut replay = Replay::new(TilingSettings::default());
        replay.run(SCRIPT).unwrap();
        let steps = replay
            .run(
                r#"
Focused("b")
ToggleStacking("b")
WindowCreated(window: "c", key: Some((monitor: 0, workspace: 0)), frame: (x: 0, y: 0, width: 10, height: 10))
"#,
            )
            .unwrap();
        let created = described(&replay, &steps[2]);
        assert!(created.contains(&"hide c".to_string()), "{created:?}");
        assert!(created.iter().any(|line| line.ends_with("[b] c")), "{created:?}");
    }

    #[test]
    fn unknown_window_names_the_line() {
        let mut replay = Replay::new(TilingSettings::default());
        let err = replay.run("Focused(\"ghost\")\n").unwrap_err();
        assert_eq!(err.to_string(), "line 1");
        assert!(format!("{err:#}").contains("unknown window \"ghost\""));
    }

    #[test]
    fn malformed_line_is_reported() {
        let err = parse_script("\n\nNotAnEvent(3)\n").unwrap_err();
        assert_eq!(err.to_string(), "line 3");
    }

    #[test]
    fn duplicate_window_is_rejected() {
        let mut replay = Replay::new(TilingSettings::default());
        replay.run(SCRIPT).unwrap();
        let err = replay
            .run(r#"WindowCreated(window: "a", frame: (x: 0, y: 0, width: 1, height: 1))"#)
            .unwrap_err();
        assert!(format!("{err:#}").contains("already exists"));
    }

    #[test]
    fn destroyed_names_are_released() {
        let mut replay = Replay::new(TilingSettings::default());
        replay.run(SCRIPT).unwrap();
        let steps = replay.run("WindowDestroyed(\"a\")").unwrap();
        let b = replay.windows()["b"];
        assert_eq!(steps[0].requests, vec![Request::Place {
            window: b,
            rect: Rect::new(0, 0, 1920, 1080)
        }]);
        assert!(!replay.windows().contains_key("a"));
    }

    #[test]
    fn replays_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCRIPT.as_bytes()).unwrap();
        let (replay, steps) = replay(file.path(), TilingSettings::default()).unwrap();
        assert_eq!(steps.len(), 7);
        assert_eq!(replay.windows().len(), 2);
    }
}
