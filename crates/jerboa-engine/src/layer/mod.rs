//! Layers and the ordered stack the application updates each frame.

use std::fmt;

use anyhow::Result;

use crate::core::LayerContext;

/// Self-contained unit of per-frame logic.
///
/// Every callback receives the same [`LayerContext`] shape; attach and
/// detach run outside the frame loop with a zero frame time.
pub trait Layer {
    fn name(&self) -> &str {
        "layer"
    }

    /// Runs once when the layer enters the stack. An error keeps the layer
    /// out of the stack.
    fn on_attach(&mut self, ctx: &mut LayerContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    fn on_detach(&mut self, ctx: &mut LayerContext<'_>) {
        let _ = ctx;
    }

    fn on_update(&mut self, ctx: &mut LayerContext<'_>) {
        let _ = ctx;
    }

    /// Runs between the UI backend's begin and end of frame.
    fn on_ui_render(&mut self, ctx: &mut LayerContext<'_>) {
        let _ = ctx;
    }
}

/// Handle returned when a layer is pushed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

struct Entry {
    id: LayerId,
    layer: Box<dyn Layer>,
}

/// Normal layers followed by overlays, each group in insertion order.
#[derive(Default)]
pub struct LayerStack {
    entries: Vec<Entry>,
    /// Index of the first overlay.
    overlay_start: usize,
    next_id: u64,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> LayerId {
        self.next_id += 1;
        LayerId(self.next_id)
    }

    /// Inserts `layer` after the existing normal layers, before any overlay.
    pub fn push_layer(&mut self, layer: Box<dyn Layer>) -> LayerId {
        let id = self.next_id();
        self.entries.insert(self.overlay_start, Entry { id, layer });
        self.overlay_start += 1;
        id
    }

    /// Appends `layer` after everything else.
    pub fn push_overlay(&mut self, layer: Box<dyn Layer>) -> LayerId {
        let id = self.next_id();
        self.entries.push(Entry { id, layer });
        id
    }

    /// Removes the normal layer `id`. Overlays are not matched.
    pub fn pop_layer(&mut self, id: LayerId) -> Option<Box<dyn Layer>> {
        let index = self.entries[..self.overlay_start]
            .iter()
            .position(|e| e.id == id)?;
        self.overlay_start -= 1;
        Some(self.entries.remove(index).layer)
    }

    /// Removes the overlay `id`. Normal layers are not matched.
    pub fn pop_overlay(&mut self, id: LayerId) -> Option<Box<dyn Layer>> {
        let index = self.entries[self.overlay_start..]
            .iter()
            .position(|e| e.id == id)?;
        Some(self.entries.remove(self.overlay_start + index).layer)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layers in update order.
    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &dyn Layer)> + '_ {
        self.entries.iter().map(|e| (e.id, e.layer.as_ref()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (dyn Layer + 'static)> + '_ {
        self.entries.iter_mut().map(|e| e.layer.as_mut())
    }

    /// Empties the stack, last layer first.
    pub fn drain(&mut self) -> Vec<(LayerId, Box<dyn Layer>)> {
        self.overlay_start = 0;
        self.entries.drain(..).rev().map(|e| (e.id, e.layer)).collect()
    }
}

impl fmt::Debug for LayerStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.id, e.layer.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Layer for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    fn names(stack: &LayerStack) -> Vec<String> {
        stack.iter().map(|(_, l)| l.name().to_string()).collect()
    }

    #[test]
    fn overlays_follow_normal_layers() {
        let mut stack = LayerStack::new();
        stack.push_layer(Box::new(Named("A")));
        stack.push_overlay(Box::new(Named("B")));
        stack.push_layer(Box::new(Named("C")));
        assert_eq!(names(&stack), ["A", "C", "B"]);

        stack.push_overlay(Box::new(Named("D")));
        stack.push_layer(Box::new(Named("E")));
        assert_eq!(names(&stack), ["A", "C", "E", "B", "D"]);
    }

    #[test]
    fn pop_hands_the_layer_back() {
        let mut stack = LayerStack::new();
        let a = stack.push_layer(Box::new(Named("A")));
        let b = stack.push_overlay(Box::new(Named("B")));

        assert!(stack.pop_overlay(a).is_none());
        assert!(stack.pop_layer(b).is_none());

        let layer = stack.pop_layer(a).unwrap();
        assert_eq!(layer.name(), "A");
        assert!(!stack.contains(a));

        stack.push_layer(Box::new(Named("C")));
        assert_eq!(names(&stack), ["C", "B"]);
        assert_eq!(stack.pop_overlay(b).unwrap().name(), "B");
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn drain_runs_back_to_front() {
        let mut stack = LayerStack::new();
        stack.push_layer(Box::new(Named("A")));
        stack.push_overlay(Box::new(Named("B")));
        stack.push_layer(Box::new(Named("C")));

        let order: Vec<String> = stack
            .drain()
            .iter()
            .map(|(_, l)| l.name().to_string())
            .collect();
        assert_eq!(order, ["B", "C", "A"]);
        assert!(stack.is_empty());

        stack.push_layer(Box::new(Named("D")));
        stack.push_overlay(Box::new(Named("E")));
        assert_eq!(names(&stack), ["D", "E"]);
    }

    #[test]
    fn ids_are_unique() {
        let mut stack = LayerStack::new();
        let a = stack.push_layer(Box::new(Named("A")));
        let b = stack.push_overlay(Box::new(Named("B")));
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "layer#1");
    }
}
