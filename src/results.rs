use crate::error::RecordError;
use crate::models::{Task, TaskResult};
use crate::prompts::Technique;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Result of one (model, task, technique) triple
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub model: String,
    pub task: Task,
    pub technique: Technique,
    #[serde(flatten)]
    pub result: TaskResult,
}

/// Results collected while a run is in progress, in recording order
#[derive(Debug, Default)]
pub struct ResultMatrix {
    entries: Vec<ResultEntry>,
    recorded: HashSet<(String, Task, Technique)>,
}

impl ResultMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the result of a triple; every triple may be recorded once
    pub fn record(
        &mut self,
        model: &str,
        task: Task,
        technique: Technique,
        result: TaskResult,
    ) -> Result<(), RecordError> {
        if !self.recorded.insert((model.to_string(), task, technique)) {
            return Err(RecordError::Duplicate {
                model: model.to_string(),
                task: task.to_string(),
                technique: technique.to_string(),
            });
        }

        self.entries.push(ResultEntry {
            model: model.to_string(),
            task,
            technique,
            result,
        });
        Ok(())
    }

    /// Finish the run; no further results can be recorded
    pub fn freeze(self) -> FrozenResults {
        FrozenResults {
            entries: self.entries,
        }
    }
}

/// Read-only results of a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrozenResults {
    entries: Vec<ResultEntry>,
}

impl FrozenResults {
    #[cfg(test)]
    pub fn get(&self, model: &str, task: Task, technique: Technique) -> Option<&TaskResult> {
        self.entries
            .iter()
            .find(|e| e.model == model && e.task == task && e.technique == technique)
            .map(|e| &e.result)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Models in the order they were first recorded
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !models.contains(&entry.model.as_str()) {
                models.push(&entry.model);
            }
        }
        models
    }

    pub fn to_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for entry in &self.entries {
            let metrics = entry
                .result
                .metrics
                .named()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect();

            snapshot
                .0
                .entry(entry.model.clone())
                .or_default()
                .entry(entry.task.to_string())
                .or_default()
                .insert(entry.technique.to_string(), metrics);
        }
        snapshot
    }
}

type MetricMap = BTreeMap<String, f64>;

/// `model -> task -> technique -> metric -> value`, as written to disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, BTreeMap<String, BTreeMap<String, MetricMap>>>);

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize snapshot to JSON")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse snapshot JSON")
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid snapshot: {}", path.display()))
    }

    /// Write to `<dir>/comprehensive_results_<YYYYmmdd_HHMMSS>.json`
    pub fn write_timestamped(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(snapshot_file_name(Local::now().naive_local()));
        self.write(&path)?;
        Ok(path)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot to: {}", path.display()))
    }
}

fn snapshot_file_name(at: NaiveDateTime) -> String {
    format!("comprehensive_results_{}.json", at.format("%Y%m%d_%H%M%S"))
}
