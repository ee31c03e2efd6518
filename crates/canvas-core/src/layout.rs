//! Panel layout preference
//!
//! The canvas panel width survives restarts through a [`LayoutStore`].
//! [`PanelResizer`] implements the drag handle on top of it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::LayoutSettings;

/// Persisted layout preferences
pub trait LayoutStore: Send + Sync {
    fn get(&self, key: &str) -> Option<u32>;
    fn set(&self, key: &str, value: u32);
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryLayoutStore {
    values: Mutex<HashMap<String, u32>>,
}

impl MemoryLayoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayoutStore for MemoryLayoutStore {
    fn get(&self, key: &str) -> Option<u32> {
        self.values.lock().get(key).copied()
    }

    fn set(&self, key: &str, value: u32) {
        self.values.lock().insert(key.to_string(), value);
    }
}

/// Store backed by a JSON object on disk
///
/// The file is created on the first `set`. Read and write failures are
/// logged; a missing or corrupt file reads as empty.
#[derive(Debug)]
pub struct FileLayoutStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLayoutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, u32> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                tracing::warn!("Failed to read layout store {}: {}", self.path.display(), e);
                return HashMap::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring corrupt layout store {}: {}", self.path.display(), e);
            HashMap::new()
        })
    }

    fn save(&self, values: &HashMap<String, u32>) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        Ok(())
    }
}

impl LayoutStore for FileLayoutStore {
    fn get(&self, key: &str) -> Option<u32> {
        let _guard = self.lock.lock();
        self.load().get(key).copied()
    }

    fn set(&self, key: &str, value: u32) {
        let _guard = self.lock.lock();
        let mut values = self.load();
        values.insert(key.to_string(), value);
        if let Err(e) = self.save(&values) {
            tracing::warn!("Failed to persist layout store {}: {}", self.path.display(), e);
        }
    }
}

/// Drag-to-resize state of the canvas panel
///
/// The panel is anchored on the right, so dragging left widens it.
pub struct PanelResizer<S: LayoutStore> {
    store: S,
    settings: LayoutSettings,
    width: u32,
    drag: Option<(i32, u32)>,
}

impl<S: LayoutStore> PanelResizer<S> {
    pub fn new(store: S, settings: LayoutSettings) -> Self {
        let (min, max) = width_bounds(&settings);
        let width = store
            .get(&settings.storage_key)
            .unwrap_or(settings.default_width)
            .clamp(min, max);
        Self {
            store,
            settings,
            width,
            drag: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn drag_start(&mut self, x: i32) {
        self.drag = Some((x, self.width));
    }

    /// Returns the new width, or `None` when no drag is in progress.
    pub fn drag_move(&mut self, x: i32) -> Option<u32> {
        let (start_x, start_width) = self.drag?;
        let proposed = i64::from(start_width) + i64::from(start_x) - i64::from(x);
        let (min, max) = width_bounds(&self.settings);
        self.width = proposed.clamp(i64::from(min), i64::from(max)) as u32;
        Some(self.width)
    }

    pub fn drag_end(&mut self) {
        if self.drag.take().is_some() {
            self.store.set(&self.settings.storage_key, self.width);
            tracing::debug!("Saved panel width {}", self.width);
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// `(min, max)` with swapped settings put back in order.
fn width_bounds(settings: &LayoutSettings) -> (u32, u32) {
    let (a, b) = (settings.min_width, settings.max_width);
    (a.min(b), a.max(b))
}

impl<S: LayoutStore + ?Sized> LayoutStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Option<u32> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: u32) {
        (**self).set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_default_width_when_unset() {
        let resizer = PanelResizer::new(MemoryLayoutStore::new(), LayoutSettings::default());
        assert_eq!(resizer.width(), 450);
        assert!(!resizer.is_dragging());
    }

    #[test]
    fn test_drag_left_widens_and_clamps() {
        let store = Arc::new(MemoryLayoutStore::new());
        let mut resizer = PanelResizer::new(store.clone(), LayoutSettings::default());

        assert_eq!(resizer.drag_move(10), None);
        resizer.drag_start(1000);
        assert_eq!(resizer.drag_move(900), Some(550));
        assert_eq!(resizer.drag_move(100), Some(800));
        assert_eq!(resizer.drag_move(1400), Some(300));
        assert_eq!(resizer.drag_move(1050), Some(400));
        assert_eq!(store.get("codeCanvasPanelWidth"), None);

        resizer.drag_end();
        assert_eq!(store.get("codeCanvasPanelWidth"), Some(400));
    }

    #[test]
    fn test_swapped_bounds_do_not_panic() {
        let store = MemoryLayoutStore::new();
        store.set("codeCanvasPanelWidth", 900);
        let settings = LayoutSettings {
            min_width: 800,
            max_width: 300,
            ..LayoutSettings::default()
        };
        let mut resizer = PanelResizer::new(store, settings);
        assert_eq!(resizer.width(), 800);

        resizer.drag_start(500);
        assert_eq!(resizer.drag_move(1000), Some(300));
        assert_eq!(resizer.drag_move(0), Some(800));
    }

    #[test]
    fn test_stored_width_is_loaded() {
        let store = MemoryLayoutStore::new();
        store.set("codeCanvasPanelWidth", 620);
        let resizer = PanelResizer::new(store, LayoutSettings::default());
        assert_eq!(resizer.width(), 620);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("layout.json");

        let store = FileLayoutStore::new(&path);
        assert_eq!(store.get("w"), None);
        store.set("w", 512);
        assert!(path.exists());

        let reopened = FileLayoutStore::new(&path);
        assert_eq!(reopened.get("w"), Some(512));
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileLayoutStore::new(&path);
        assert_eq!(store.get("w"), None);
        store.set("w", 333);
        assert_eq!(store.get("w"), Some(333));
    }
}
