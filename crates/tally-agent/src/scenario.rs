//! Scenario files for the replay harness.
//!
//! A scenario seeds a [`MemoryDirectory`] with groups, counters, and
//! children, then applies a timed script of directory mutations — each one
//! emitting the same events a live backend would. This is how the engine is
//! exercised end-to-end without a real directory service.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tally_core::ids::{ChildId, GroupId};
use tally_core::memory::MemoryDirectory;
use tally_core::types::{Child, Counter, Group};

/// A replayable scenario: initial directory state plus a timed script.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scenario {
    /// Groups present at startup.
    pub groups: Vec<Group>,
    /// Counters present at startup.
    pub counters: Vec<Counter>,
    /// Children present at startup (no events emitted for these).
    pub children: Vec<Child>,
    /// Timed mutations applied after the engine starts.
    pub script: Vec<Step>,
}

/// One scripted mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Delay before this step, relative to the previous one.
    #[serde(default)]
    pub after_ms: u64,
    /// The mutation to apply.
    pub action: Action,
}

/// A directory mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Create a child (emits a created event).
    CreateChild {
        /// The child to create.
        child: Child,
    },
    /// Delete a child by id (emits a deleted event).
    DeleteChild {
        /// The child to delete.
        id: ChildId,
    },
    /// Rename a child (emits a renamed event).
    RenameChild {
        /// The child to rename.
        id: ChildId,
        /// The new name.
        name: String,
    },
    /// Move a child to another parent (emits a renamed event).
    MoveChild {
        /// The child to move.
        id: ChildId,
        /// The new parent, or none for top level.
        parent: Option<GroupId>,
    },
}

impl Scenario {
    /// Load a scenario from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scenario file {}", path.display()))
    }

    /// Seed a directory with the scenario's initial state.
    #[must_use]
    pub fn seed(&self) -> MemoryDirectory {
        let dir = MemoryDirectory::new();
        for group in &self.groups {
            dir.insert_group(group.clone());
        }
        for counter in &self.counters {
            dir.insert_counter(counter.clone());
        }
        for child in &self.children {
            dir.seed_child(child.clone());
        }
        dir
    }
}

impl Action {
    /// Apply this mutation to `dir`, emitting the corresponding event.
    pub fn apply(&self, dir: &MemoryDirectory) {
        match self {
            Self::CreateChild { child } => dir.create_child(child.clone()),
            Self::DeleteChild { id } => {
                if dir.delete_child(id).is_none() {
                    tracing::warn!(%id, "scenario deletes an unknown child");
                }
            }
            Self::RenameChild { id, name } => {
                if dir.rename_child(id, name).is_none() {
                    tracing::warn!(%id, "scenario renames an unknown child");
                }
            }
            Self::MoveChild { id, parent } => {
                if dir.move_child(id, parent.clone()).is_none() {
                    tracing::warn!(%id, "scenario moves an unknown child");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tally_core::ids::CounterId;

    const EXAMPLE: &str = r#"{
        "groups": [{"id": "g1", "name": "Tier 1"}],
        "counters": [{"id": "c1", "name": "tickets: 0"}],
        "children": [
            {"id": "t1", "parentId": "g1", "kind": "text", "name": "ticket-1"}
        ],
        "script": [
            {"afterMs": 50, "action": {"type": "create_child", "child":
                {"id": "t2", "parentId": "g1", "kind": "text", "name": "ticket-2"}}},
            {"action": {"type": "rename_child", "id": "t1", "name": "closed-ticket-1"}},
            {"afterMs": 10, "action": {"type": "delete_child", "id": "t2"}},
            {"action": {"type": "move_child", "id": "t1", "parent": null}}
        ]
    }"#;

    #[test]
    fn parses_example_scenario() {
        let scenario: Scenario = serde_json::from_str(EXAMPLE).unwrap();
        assert_eq!(scenario.groups.len(), 1);
        assert_eq!(scenario.children.len(), 1);
        assert_eq!(scenario.script.len(), 4);
        assert_eq!(scenario.script[0].after_ms, 50);
        assert_eq!(scenario.script[1].after_ms, 0);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{EXAMPLE}").unwrap();
        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.counters[0].id, CounterId::from("c1"));
    }

    #[test]
    fn load_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{oops").unwrap();
        assert!(Scenario::load(file.path()).is_err());
    }

    #[tokio::test]
    async fn seed_and_apply_round_trip() {
        let scenario: Scenario = serde_json::from_str(EXAMPLE).unwrap();
        let dir = scenario.seed();
        let mut rx = dir.subscribe();

        for step in &scenario.script {
            step.action.apply(&dir);
        }

        // Four scripted mutations, four events.
        let mut kinds = Vec::new();
        for _ in 0..4 {
            kinds.push(rx.recv().await.unwrap().kind().to_owned());
        }
        assert_eq!(
            kinds,
            vec!["child_created", "child_renamed", "child_deleted", "child_renamed"]
        );
    }
}
