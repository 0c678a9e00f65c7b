use std::collections::VecDeque;

use glam::IVec2;

use crate::event::{EventBus, VSyncChangedEvent, WindowCloseEvent, WindowResizeEvent};

use super::{CursorMode, Window, WindowProps};

type QueuedEvent = Box<dyn FnOnce(&EventBus)>;

/// Window without a platform surface.
///
/// Events queued with [`HeadlessWindow::queue_event`] are published on the
/// next [`Window::update`], the same point in the frame where a platform
/// window would deliver them.
pub struct HeadlessWindow {
    props: WindowProps,
    position: IVec2,
    vsync: bool,
    bus: EventBus,
    pending: VecDeque<QueuedEvent>,
    updates: u64,
    close_after: Option<u64>,
}

impl HeadlessWindow {
    pub fn new(props: WindowProps) -> Self {
        log::info!(
            "creating headless window \"{}\" ({}x{})",
            props.title,
            props.width,
            props.height
        );
        Self {
            props,
            position: IVec2::ZERO,
            vsync: false,
            bus: EventBus::new(),
            pending: VecDeque::new(),
            updates: 0,
            close_after: None,
        }
    }

    /// Publishes a `WindowCloseEvent` during the `frames`-th update.
    pub fn close_after_updates(mut self, frames: u64) -> Self {
        self.close_after = Some(frames);
        self
    }

    /// Defers `event` to the next update.
    pub fn queue_event<E: 'static>(&mut self, event: E) {
        self.pending
            .push_back(Box::new(move |bus: &EventBus| bus.publish(&event)));
    }

    /// Changes the framebuffer size and publishes the resize immediately.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.props.width = width;
        self.props.height = height;
        self.bus.publish(&WindowResizeEvent { width, height });
    }

    pub fn set_position(&mut self, position: IVec2) {
        self.position = position;
    }

    /// Number of completed `update` calls.
    pub fn update_count(&self) -> u64 {
        self.updates
    }
}

impl Window for HeadlessWindow {
    fn title(&self) -> &str {
        &self.props.title
    }

    fn width(&self) -> u32 {
        self.props.width
    }

    fn height(&self) -> u32 {
        self.props.height
    }

    fn position(&self) -> IVec2 {
        self.position
    }

    fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    fn set_vsync(&mut self, enabled: bool) {
        self.vsync = enabled;
        self.bus.publish(&VSyncChangedEvent { enabled });
    }

    fn is_vsync(&self) -> bool {
        self.vsync
    }

    fn cursor_mode(&self) -> CursorMode {
        self.props.cursor_mode
    }

    fn set_cursor_mode(&mut self, mode: CursorMode) {
        self.props.cursor_mode = mode;
    }

    fn update(&mut self) {
        while let Some(publish) = self.pending.pop_front() {
            publish(&self.bus);
        }

        self.updates += 1;
        if self.close_after == Some(self.updates) {
            self.bus.publish(&WindowCloseEvent);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::event::MouseMovedEvent;

    #[test]
    fn queued_events_publish_on_update() {
        let mut window = HeadlessWindow::new(WindowProps::default());
        let seen = Rc::new(Cell::new(0.0));
        let s = seen.clone();
        let _obs = window
            .event_bus()
            .subscribe(move |e: &MouseMovedEvent| s.set(e.x));

        window.queue_event(MouseMovedEvent { x: 4.0, y: 2.0 });
        assert_eq!(seen.get(), 0.0);

        window.update();
        assert_eq!(seen.get(), 4.0);
    }

    #[test]
    fn close_fires_on_requested_update() {
        let mut window = HeadlessWindow::new(WindowProps::default()).close_after_updates(2);
        let closed = Rc::new(Cell::new(false));
        let c = closed.clone();
        let _obs = window
            .event_bus()
            .subscribe(move |_: &WindowCloseEvent| c.set(true));

        window.update();
        assert!(!closed.get());
        window.update();
        assert!(closed.get());
    }

    #[test]
    fn props_are_reported_back() {
        let mut window = HeadlessWindow::new(
            WindowProps::new("tools", 640, 480).with_cursor_mode(CursorMode::Hidden),
        );
        assert_eq!(window.title(), "tools");
        assert_eq!((window.width(), window.height()), (640, 480));
        assert_eq!(window.cursor_mode(), CursorMode::Hidden);

        window.set_cursor_mode(CursorMode::Disabled);
        window.resize(800, 600);
        assert_eq!(window.cursor_mode(), CursorMode::Disabled);
        assert_eq!(window.width(), 800);
    }
}
