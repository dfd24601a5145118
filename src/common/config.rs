use std::path::{Path, PathBuf};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::layout_engine::{MIN_LEAF_PX, OuterGaps, TabPlacement, TilingSettings};

/// The annotated configuration shipped with the binary.
pub const DEFAULT_CONFIG: &str = include_str!("../../forktile.default.toml");

pub fn config_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".config")
        .join("forktile")
        .join("config.toml")
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub gaps: GapSettings,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub stack: StackSettings,
}

/// Gap configuration for window spacing
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct GapSettings {
    /// Space between the tiled area and the monitor edges
    #[serde(default)]
    pub outer: OuterGapSettings,
    /// Space between two adjacent tiles
    #[serde(default)]
    pub inner: i32,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy, Default)]
#[serde(deny_unknown_fields)]
pub struct OuterGapSettings {
    #[serde(default)]
    pub top: i32,
    #[serde(default)]
    pub left: i32,
    #[serde(default)]
    pub bottom: i32,
    #[serde(default)]
    pub right: i32,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    /// Smallest size a tile may be resized down to
    #[serde(default = "default_min_leaf_px")]
    pub min_leaf_px: i32,
    /// Re-pick a fork's orientation from its shape when a detach hands it a
    /// new area
    #[serde(default = "yes")]
    pub rebalance_on_detach: bool,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            min_leaf_px: default_min_leaf_px(),
            rebalance_on_detach: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct StackSettings {
    /// Height of the tab strip drawn over a stack
    #[serde(default = "default_tab_height")]
    pub tab_height: i32,
    #[serde(default)]
    pub tab_placement: TabPlacement,
    /// Append new tabs after the existing ones instead of before
    #[serde(default = "yes")]
    pub stack_from_left: bool,
}

impl Default for StackSettings {
    fn default() -> Self {
        StackSettings {
            tab_height: default_tab_height(),
            tab_placement: TabPlacement::default(),
            stack_from_left: true,
        }
    }
}

fn yes() -> bool { true }

fn default_min_leaf_px() -> i32 { MIN_LEAF_PX }

fn default_tab_height() -> i32 { 24 }

impl GapSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let outer = self.outer;
        for (side, value) in [
            ("top", outer.top),
            ("left", outer.left),
            ("bottom", outer.bottom),
            ("right", outer.right),
        ] {
            if value < 0 {
                issues.push(format!("gaps.outer.{side} must be non-negative, got {value}"));
            }
        }
        if self.inner < 0 {
            issues.push(format!("gaps.inner must be non-negative, got {}", self.inner));
        }
        issues
    }
}

impl LayoutSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.min_leaf_px <= 0 {
            issues.push(format!("layout.min_leaf_px must be positive, got {}", self.min_leaf_px));
        }
        issues
    }
}

impl StackSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.tab_height < 0 {
            issues.push(format!("stack.tab_height must be non-negative, got {}", self.tab_height));
        }
        issues
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Ok(Config::default()) }
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<Config>(buf) {
            Ok(config) => Ok(config),
            Err(e) => bail!("{}", e.to_string().trim_end()),
        }
    }

    /// Save the current config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.gaps.validate());
        issues.extend(self.layout.validate());
        issues.extend(self.stack.validate());
        issues
    }

    /// Engine parameters, with negative values clamped to zero.
    pub fn tiling(&self) -> TilingSettings {
        let outer = self.gaps.outer;
        TilingSettings {
            outer_gap: OuterGaps {
                top: outer.top.max(0),
                left: outer.left.max(0),
                bottom: outer.bottom.max(0),
                right: outer.right.max(0),
            },
            inner_gap: self.gaps.inner.max(0),
            min_leaf_px: self.layout.min_leaf_px.max(1),
            rebalance_on_detach: self.layout.rebalance_on_detach,
            tab_height: self.stack.tab_height.max(0),
            tab_placement: self.stack.tab_placement,
            stack_from_left: self.stack.stack_from_left,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn shipped_config_matches_defaults() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_empty());
        assert_eq!(config.tiling(), TilingSettings::default());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = Config::parse(
            r#"
            [gaps]
            inner = 8

            [gaps.outer]
            top = 30

            [stack]
            tab_placement = "bottom"
            "#,
        )
        .unwrap();
        assert_eq!(config.gaps.inner, 8);
        assert_eq!(config.gaps.outer, OuterGapSettings { top: 30, ..Default::default() });
        assert_eq!(config.layout, LayoutSettings::default());
        assert_eq!(config.stack.tab_placement, TabPlacement::Bottom);
        assert_eq!(config.stack.tab_height, 24);

        let tiling = config.tiling();
        assert_eq!(tiling.inner_gap, 8);
        assert_eq!(tiling.outer_gap.top, 30);
        assert_eq!(tiling.outer_gap.left, 0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("[gaps]\nwidth = 3\n").unwrap_err();
        assert!(err.to_string().contains("width"), "{err}");
    }

    #[test]
    fn validation_reports_every_issue() {
        let config = Config::parse(
            r#"
            [gaps]
            inner = -2
            [gaps.outer]
            left = -1
            [layout]
            min_leaf_px = 0
            [stack]
            tab_height = -5
            "#,
        )
        .unwrap();
        let issues = config.validate();
        assert_eq!(issues.len(), 4, "{issues:?}");
        assert!(issues.iter().any(|i| i.contains("gaps.outer.left")));
        assert!(issues.iter().any(|i| i.contains("gaps.inner")));
        assert!(issues.iter().any(|i| i.contains("min_leaf_px must be positive")));
        assert!(issues.iter().any(|i| i.contains("tab_height")));

        let tiling = config.tiling();
        assert_eq!(tiling.inner_gap, 0);
        assert_eq!(tiling.min_leaf_px, 1);
    }

    #[test]
    fn save_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.gaps.inner = 12;
        config.layout.rebalance_on_detach = false;
        config.save(&path).unwrap();
        assert_eq!(Config::read(&path).unwrap(), config);
    }

    #[test]
    fn absent_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert_eq!(Config::read_or_default(&path).unwrap(), Config::default());
        assert!(Config::read(&path).is_err());
    }
}
