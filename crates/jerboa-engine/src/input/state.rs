use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use glam::DVec2;

use crate::event::{
    EventBus, EventObserver, KeyPressedEvent, KeyReleasedEvent, MouseButtonPressedEvent,
    MouseButtonReleasedEvent, MouseMovedEvent, MouseScrolledEvent,
};

use super::types::{Key, Modifiers, MouseButton};

/// Snapshot of what [`Input`] tracks.
#[derive(Debug, Default)]
struct InputState {
    modifiers: Modifiers,
    keys_down: HashSet<Key>,
    buttons_down: HashSet<MouseButton>,

    /// Last known cursor position; `None` until the first move event.
    cursor: Option<DVec2>,

    /// Cursor travel accumulated since the last `end_frame`.
    movement: DVec2,

    /// Scroll accumulated since the last `end_frame`.
    scroll: DVec2,
}

/// Polling view of keyboard and mouse state.
///
/// Fed by observers on the window's event bus; queries never touch the
/// platform. Per-frame deltas are cleared by [`Input::end_frame`], which the
/// application calls after polling window events.
pub struct Input {
    state: Rc<RefCell<InputState>>,
    _observers: Vec<EventObserver>,
}

impl Input {
    /// Subscribes to key and mouse events on `bus`.
    pub fn attach(bus: &EventBus) -> Self {
        let state = Rc::new(RefCell::new(InputState::default()));

        let s = state.clone();
        let key_pressed = bus.subscribe(move |e: &KeyPressedEvent| {
            let mut s = s.borrow_mut();
            s.modifiers = e.modifiers;
            s.keys_down.insert(e.key);
        });

        let s = state.clone();
        let key_released = bus.subscribe(move |e: &KeyReleasedEvent| {
            let mut s = s.borrow_mut();
            s.modifiers = e.modifiers;
            s.keys_down.remove(&e.key);
        });

        let s = state.clone();
        let button_pressed = bus.subscribe(move |e: &MouseButtonPressedEvent| {
            let mut s = s.borrow_mut();
            s.modifiers = e.modifiers;
            s.buttons_down.insert(e.button);
        });

        let s = state.clone();
        let button_released = bus.subscribe(move |e: &MouseButtonReleasedEvent| {
            let mut s = s.borrow_mut();
            s.modifiers = e.modifiers;
            s.buttons_down.remove(&e.button);
        });

        let s = state.clone();
        let moved = bus.subscribe(move |e: &MouseMovedEvent| {
            let mut s = s.borrow_mut();
            let pos = DVec2::new(e.x, e.y);
            // The first sample only establishes the baseline.
            if let Some(prev) = s.cursor {
                s.movement += pos - prev;
            }
            s.cursor = Some(pos);
        });

        let s = state.clone();
        let scrolled = bus.subscribe(move |e: &MouseScrolledEvent| {
            s.borrow_mut().scroll += DVec2::new(e.x_offset, e.y_offset);
        });

        Self {
            state,
            _observers: vec![
                key_pressed,
                key_released,
                button_pressed,
                button_released,
                moved,
                scrolled,
            ],
        }
    }

    pub fn is_key_held_down(&self, key: Key) -> bool {
        self.state.borrow().keys_down.contains(&key)
    }

    pub fn is_mouse_button_held_down(&self, button: MouseButton) -> bool {
        self.state.borrow().buttons_down.contains(&button)
    }

    /// Modifiers reported with the most recent key or button event.
    pub fn modifiers(&self) -> Modifiers {
        self.state.borrow().modifiers
    }

    pub fn mouse_position(&self) -> Option<DVec2> {
        self.state.borrow().cursor
    }

    /// Cursor travel since the previous frame.
    pub fn mouse_movement(&self) -> DVec2 {
        self.state.borrow().movement
    }

    /// Scroll offset accumulated since the previous frame.
    pub fn scroll_delta(&self) -> DVec2 {
        self.state.borrow().scroll
    }

    /// Clears per-frame deltas. Held keys and buttons persist.
    pub fn end_frame(&self) {
        let mut s = self.state.borrow_mut();
        s.movement = DVec2::ZERO;
        s.scroll = DVec2::ZERO;
    }

    /// Forgets every held key and button, e.g. after focus loss.
    pub fn release_all(&self) {
        let mut s = self.state.borrow_mut();
        s.keys_down.clear();
        s.buttons_down.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(bus: &EventBus, key: Key) {
        bus.publish(&KeyPressedEvent { key, modifiers: Modifiers::NONE });
    }

    fn release(bus: &EventBus, key: Key) {
        bus.publish(&KeyReleasedEvent { key, modifiers: Modifiers::NONE });
    }

    #[test]
    fn held_keys_follow_press_and_release() {
        let bus = EventBus::new();
        let input = Input::attach(&bus);

        press(&bus, Key::W);
        press(&bus, Key::A);
        assert!(input.is_key_held_down(Key::W));
        assert!(input.is_key_held_down(Key::A));

        release(&bus, Key::W);
        assert!(!input.is_key_held_down(Key::W));
        assert!(input.is_key_held_down(Key::A));
    }

    #[test]
    fn first_move_sets_baseline_without_movement() {
        let bus = EventBus::new();
        let input = Input::attach(&bus);

        bus.publish(&MouseMovedEvent { x: 100.0, y: 50.0 });
        assert_eq!(input.mouse_movement(), DVec2::ZERO);

        bus.publish(&MouseMovedEvent { x: 110.0, y: 45.0 });
        bus.publish(&MouseMovedEvent { x: 115.0, y: 40.0 });
        assert_eq!(input.mouse_movement(), DVec2::new(15.0, -10.0));
        assert_eq!(input.mouse_position(), Some(DVec2::new(115.0, 40.0)));
    }

    #[test]
    fn end_frame_clears_deltas_but_not_held_state() {
        let bus = EventBus::new();
        let input = Input::attach(&bus);

        press(&bus, Key::Space);
        bus.publish(&MouseButtonPressedEvent {
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        });
        bus.publish(&MouseMovedEvent { x: 0.0, y: 0.0 });
        bus.publish(&MouseMovedEvent { x: 3.0, y: 4.0 });
        bus.publish(&MouseScrolledEvent { x_offset: 0.0, y_offset: -1.0 });

        input.end_frame();

        assert_eq!(input.mouse_movement(), DVec2::ZERO);
        assert_eq!(input.scroll_delta(), DVec2::ZERO);
        assert!(input.is_key_held_down(Key::Space));
        assert!(input.is_mouse_button_held_down(MouseButton::Left));
    }

    #[test]
    fn dropping_input_unsubscribes() {
        let bus = EventBus::new();
        let input = Input::attach(&bus);
        assert_eq!(bus.observer_count::<KeyPressedEvent>(), 1);
        drop(input);
        assert_eq!(bus.observer_count::<KeyPressedEvent>(), 0);
    }
}
