//! Timed input scripts for the headless runner.
//!
//! A script is a JSON array of steps, each with a time `at` (seconds since
//! start) and an action:
//!
//! ```json
//! [
//!   { "at": 0.5, "action": "drag_start" },
//!   { "at": 0.6, "action": "input", "value": "1.25" },
//!   { "at": 1.0, "action": "drag", "event": "touch_end" },
//!   { "at": 2.0, "action": "toggle" },
//!   { "at": 2.5, "action": "remove_target" }
//! ]
//! ```

use crate::core::timeline::DragEvent;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

/// Slider value as written in the script: number or raw text
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Number(f64),
    Text(String),
}

impl InputValue {
    /// Text as the slider would emit it
    pub fn as_text(&self) -> String {
        match self {
            InputValue::Number(v) => v.to_string(),
            InputValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    Input { value: InputValue },
    Drag { event: DragEvent },
    DragStart,
    DragEnd,
    Toggle,
    RemoveTarget,
    RestoreTarget,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScriptStep {
    pub at: f64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

/// Steps sorted by time, consumed front to back.
#[derive(Clone, Debug, Default)]
pub struct Script {
    steps: Vec<ScriptStep>,
    cursor: usize,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut steps: Vec<ScriptStep> = serde_json::from_str(json).context("Failed to parse script")?;
        if let Some(bad) = steps.iter().find(|s| !s.at.is_finite() || s.at < 0.0) {
            bail!("Script step time must be finite and non-negative, got {}", bad.at);
        }
        // Stable: steps with equal times keep file order
        steps.sort_by(|a, b| a.at.total_cmp(&b.at));
        Ok(Self { steps, cursor: 0 })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("In script {}", path.display()))
    }

    /// Pop all steps due at or before `time`.
    pub fn due(&mut self, time: f64) -> Vec<ScriptAction> {
        let start = self.cursor;
        while self.cursor < self.steps.len() && self.steps[self.cursor].at <= time {
            self.cursor += 1;
        }
        self.steps[start..self.cursor].iter().map(|s| s.action.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.steps.len() - self.cursor
    }
}
