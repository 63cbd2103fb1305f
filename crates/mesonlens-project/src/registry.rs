//! Tool registry
//!
//! An explicitly constructed collection of installed build tools, passed
//! by handle to whoever needs one. Mutation goes through add/update/
//! remove; readers take per-parse snapshots and observe changes through a
//! broadcast channel rather than shared mutable state.

use mesonlens_core::{Error, MesonTool, Result, SavedTool, ToolId};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::info;

/// Registry change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolEvent {
    Added(ToolId),
    Updated(ToolId),
    Removed(ToolId),
}

/// Process-wide collection of registered tools.
pub struct ToolRegistry {
    tools: RwLock<Vec<MesonTool>>,
    events: broadcast::Sender<ToolEvent>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            tools: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Restore a registry from its persisted form. Tool versions are
    /// re-probed while loading.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let saved: Vec<SavedTool> = serde_json::from_slice(&data)?;
        let registry = Self::new();
        {
            let mut tools = registry.tools.write().expect("registry lock poisoned");
            tools.extend(saved.into_iter().map(MesonTool::from));
        }
        Ok(registry)
    }

    /// Persist all registrations as a JSON document.
    pub fn save(&self, path: &Path) -> Result<()> {
        let saved: Vec<SavedTool> = self
            .tools
            .read()
            .expect("registry lock poisoned")
            .iter()
            .map(SavedTool::from)
            .collect();
        let data = serde_json::to_vec_pretty(&saved)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Subscribe to registry changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ToolEvent> {
        self.events.subscribe()
    }

    pub fn add_tool(&self, tool: MesonTool) -> ToolId {
        let id = tool.id();
        self.tools
            .write()
            .expect("registry lock poisoned")
            .push(tool);
        let _ = self.events.send(ToolEvent::Added(id));
        id
    }

    /// Update name and executable of an existing registration, or create
    /// a new one under the given id when none exists.
    pub fn update_tool(&self, id: ToolId, name: &str, exe: &Path) {
        let mut tools = self.tools.write().expect("registry lock poisoned");
        if let Some(tool) = tools.iter_mut().find(|tool| tool.id() == id) {
            tool.set_name(name);
            tool.set_exe(exe);
            drop(tools);
            let _ = self.events.send(ToolEvent::Updated(id));
        } else {
            tools.push(MesonTool::with_id(name, exe, id, false));
            drop(tools);
            let _ = self.events.send(ToolEvent::Added(id));
        }
    }

    pub fn remove_tool(&self, id: ToolId) -> Result<MesonTool> {
        let mut tools = self.tools.write().expect("registry lock poisoned");
        let index = tools
            .iter()
            .position(|tool| tool.id() == id)
            .ok_or_else(|| Error::UnknownTool(id.to_string()))?;
        let tool = tools.remove(index);
        drop(tools);
        let _ = self.events.send(ToolEvent::Removed(id));
        Ok(tool)
    }

    /// Snapshot of one registration.
    pub fn tool(&self, id: ToolId) -> Option<MesonTool> {
        self.tools
            .read()
            .expect("registry lock poisoned")
            .iter()
            .find(|tool| tool.id() == id)
            .cloned()
    }

    /// Snapshot of the auto-detected registration, if any.
    pub fn auto_detected(&self) -> Option<MesonTool> {
        self.tools
            .read()
            .expect("registry lock poisoned")
            .iter()
            .find(|tool| tool.auto_detected())
            .cloned()
    }

    /// Snapshot of every registration.
    pub fn tools(&self) -> Vec<MesonTool> {
        self.tools.read().expect("registry lock poisoned").clone()
    }

    /// Register a system tool found on `PATH` when no auto-detected entry
    /// exists yet.
    pub fn ensure_auto_detected(&self) -> Option<ToolId> {
        if self.auto_detected().is_some() {
            return None;
        }
        let path: PathBuf = MesonTool::find()?;
        let name = format!("System {} at {}", MesonTool::tool_name(), path.display());
        info!("auto-detected {name}");
        let tool = MesonTool::with_id(name, path, ToolId::new(), true);
        Some(self.add_tool(tool))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_update_remove_with_events() {
        let registry = ToolRegistry::new();
        let mut events = registry.subscribe();

        let id = registry.add_tool(MesonTool::new("one", "/usr/bin/meson"));
        registry.update_tool(id, "renamed", Path::new("/opt/meson"));
        registry.remove_tool(id).unwrap();

        assert_eq!(events.try_recv().unwrap(), ToolEvent::Added(id));
        assert_eq!(events.try_recv().unwrap(), ToolEvent::Updated(id));
        assert_eq!(events.try_recv().unwrap(), ToolEvent::Removed(id));
        assert!(registry.tools().is_empty());
    }

    #[test]
    fn test_update_unknown_id_registers_a_new_tool() {
        let registry = ToolRegistry::new();
        let id = ToolId::new();
        registry.update_tool(id, "fresh", Path::new("/usr/bin/meson"));
        let tool = registry.tool(id).unwrap();
        assert_eq!(tool.name(), "fresh");
        assert!(!tool.auto_detected());
    }

    #[test]
    fn test_remove_unknown_id_is_an_error() {
        let registry = ToolRegistry::new();
        assert!(registry.remove_tool(ToolId::new()).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tools.json");

        let registry = ToolRegistry::new();
        let id = registry.add_tool(MesonTool::new("mine", "/opt/meson/bin/meson"));
        registry.save(&file).unwrap();

        let restored = ToolRegistry::load(&file).unwrap();
        let tool = restored.tool(id).unwrap();
        assert_eq!(tool.name(), "mine");
        assert_eq!(tool.exe(), Path::new("/opt/meson/bin/meson"));
        assert!(!tool.auto_detected());
    }
}
