use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use glam::{DVec2, IVec2};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{
    DeviceEvent, DeviceId, ElementState, MouseButton as WinitMouseButton, MouseScrollDelta,
    WindowEvent,
};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{CursorGrabMode, Window as PlatformWindow, WindowAttributes, WindowId};

use crate::event::{
    EventBus, KeyPressedEvent, KeyReleasedEvent, KeyRepeatEvent, MouseButtonPressedEvent,
    MouseButtonReleasedEvent, MouseMovedEvent, MouseScrolledEvent, VSyncChangedEvent,
    WindowCloseEvent, WindowResizeEvent,
};
use crate::input::{Key, Modifiers, MouseButton};

use super::{CursorMode, Window, WindowProps};

/// Upper bound on event-loop pumps while waiting for the platform to resume.
const STARTUP_PUMPS: usize = 100;

/// Logical pixels per scroll "line" when the platform reports pixel deltas.
const SCROLL_PIXELS_PER_LINE: f64 = 20.0;

/// Collects platform callbacks during one `pump_app_events` call.
struct Pump {
    attributes: Option<WindowAttributes>,
    window: Option<Arc<PlatformWindow>>,
    create_error: Option<String>,
    events: Vec<WindowEvent>,
    mouse_motion: DVec2,
}

impl ApplicationHandler for Pump {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(attributes) = self.attributes.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => self.create_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.events.push(event);
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.mouse_motion += DVec2::new(dx, dy);
        }
    }
}

type EventQueue = RefCell<Vec<WindowEvent>>;

/// Copies of the raw platform events seen by [`WinitWindow::update`], for
/// consumers that need more than the bus carries (text input, IME, focus).
#[derive(Clone, Default)]
pub struct PlatformEvents(Rc<EventQueue>);

impl PlatformEvents {
    /// Takes everything received since the last drain.
    pub fn drain(&self) -> Vec<WindowEvent> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Hands `events` to every live tap and forgets the dropped ones.
fn forward(taps: &mut Vec<Weak<EventQueue>>, events: &[WindowEvent]) {
    taps.retain(|tap| match tap.upgrade() {
        Some(queue) => {
            queue.borrow_mut().extend(events.iter().cloned());
            true
        }
        None => false,
    });
}

/// Desktop window backed by winit.
///
/// The event loop is pumped from [`Window::update`] instead of owning the
/// thread, so the application keeps its own frame loop.
pub struct WinitWindow {
    event_loop: EventLoop<()>,
    pump: Pump,
    window: Arc<PlatformWindow>,

    title: String,
    size: PhysicalSize<u32>,
    vsync: bool,
    cursor_mode: CursorMode,
    modifiers: Modifiers,

    /// Unbounded cursor position reported while the cursor is disabled.
    virtual_cursor: DVec2,

    bus: EventBus,
    taps: Vec<Weak<EventQueue>>,
}

impl WinitWindow {
    pub fn new(props: WindowProps) -> Result<Self> {
        log::info!(
            "creating window \"{}\" ({}x{})",
            props.title,
            props.width,
            props.height
        );

        let mut event_loop = EventLoop::new().context("failed to create winit EventLoop")?;

        let attributes = PlatformWindow::default_attributes()
            .with_title(props.title.clone())
            .with_inner_size(LogicalSize::new(props.width as f64, props.height as f64));

        let mut pump = Pump {
            attributes: Some(attributes),
            window: None,
            create_error: None,
            events: Vec::new(),
            mouse_motion: DVec2::ZERO,
        };

        for _ in 0..STARTUP_PUMPS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut pump)
            {
                anyhow::bail!("event loop exited during window creation (code {code})");
            }
            if let Some(err) = pump.create_error.take() {
                anyhow::bail!("failed to create window: {err}");
            }
            if pump.window.is_some() {
                break;
            }
        }

        let window = pump
            .window
            .clone()
            .context("platform never resumed the event loop; no window was created")?;

        // Startup noise (initial resize, focus) is superseded by the state read below.
        pump.events.clear();
        pump.mouse_motion = DVec2::ZERO;

        let size = window.inner_size();
        let mut this = Self {
            event_loop,
            pump,
            window,
            title: props.title,
            size,
            vsync: false,
            cursor_mode: CursorMode::Normal,
            modifiers: Modifiers::NONE,
            virtual_cursor: DVec2::ZERO,
            bus: EventBus::new(),
            taps: Vec::new(),
        };
        this.set_cursor_mode(props.cursor_mode);

        Ok(this)
    }

    /// The underlying platform window, for surface creation.
    pub fn native(&self) -> Arc<PlatformWindow> {
        self.window.clone()
    }

    /// Starts copying raw platform events into the returned queue. The copy
    /// stops once every clone of the queue is dropped.
    pub fn tap_platform_events(&mut self) -> PlatformEvents {
        let events = PlatformEvents::default();
        self.taps.push(Rc::downgrade(&events.0));
        events
    }

    fn dispatch(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.bus.publish(&WindowCloseEvent),

            WindowEvent::Resized(size) => {
                if *size != self.size {
                    self.size = *size;
                    self.bus.publish(&WindowResizeEvent {
                        width: size.width,
                        height: size.height,
                    });
                }
            }

            WindowEvent::ModifiersChanged(m) => {
                self.modifiers = map_modifiers(m.state());
            }

            WindowEvent::KeyboardInput { event, .. } => {
                let key = map_key(event.physical_key);
                let modifiers = self.modifiers;
                match (event.state, event.repeat) {
                    (ElementState::Pressed, true) => {
                        self.bus.publish(&KeyRepeatEvent { key, modifiers })
                    }
                    (ElementState::Pressed, false) => {
                        self.bus.publish(&KeyPressedEvent { key, modifiers })
                    }
                    (ElementState::Released, _) => {
                        self.bus.publish(&KeyReleasedEvent { key, modifiers })
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                // Disabled cursors report raw motion instead; see `update`.
                if self.cursor_mode != CursorMode::Disabled {
                    let pos = self.to_logical(*position);
                    self.virtual_cursor = pos;
                    self.bus.publish(&MouseMovedEvent { x: pos.x, y: pos.y });
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let (x_offset, y_offset) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (*x as f64, *y as f64),
                    MouseScrollDelta::PixelDelta(p) => {
                        let logical = self.to_logical(*p);
                        (
                            logical.x / SCROLL_PIXELS_PER_LINE,
                            logical.y / SCROLL_PIXELS_PER_LINE,
                        )
                    }
                };
                self.bus.publish(&MouseScrolledEvent { x_offset, y_offset });
            }

            WindowEvent::MouseInput { state, button, .. } => {
                let button = map_mouse_button(*button);
                let modifiers = self.modifiers;
                match state {
                    ElementState::Pressed => {
                        self.bus.publish(&MouseButtonPressedEvent { button, modifiers })
                    }
                    ElementState::Released => {
                        self.bus.publish(&MouseButtonReleasedEvent { button, modifiers })
                    }
                }
            }

            _ => {}
        }
    }

    fn to_logical(&self, pos: PhysicalPosition<f64>) -> DVec2 {
        let logical = pos.to_logical::<f64>(self.window.scale_factor());
        DVec2::new(logical.x, logical.y)
    }
}

impl Window for WinitWindow {
    fn title(&self) -> &str {
        &self.title
    }

    fn width(&self) -> u32 {
        self.size.width
    }

    fn height(&self) -> u32 {
        self.size.height
    }

    fn position(&self) -> IVec2 {
        self.window
            .outer_position()
            .map(|p| IVec2::new(p.x, p.y))
            .unwrap_or(IVec2::ZERO)
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
        self.cursor_mode
    }

    fn set_cursor_mode(&mut self, mode: CursorMode) {
        self.cursor_mode = mode;

        let (visible, grab) = match mode {
            CursorMode::Normal => (true, CursorGrabMode::None),
            CursorMode::Hidden => (false, CursorGrabMode::None),
            CursorMode::Disabled => (false, CursorGrabMode::Locked),
        };

        self.window.set_cursor_visible(visible);
        if let Err(e) = self.window.set_cursor_grab(grab) {
            // Some platforms (X11) only support confinement.
            let fallback = self.window.set_cursor_grab(CursorGrabMode::Confined);
            if grab != CursorGrabMode::Locked || fallback.is_err() {
                log::warn!("cursor grab {grab:?} not supported: {e}");
            }
        }
    }

    fn update(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.pump);

        let events = std::mem::take(&mut self.pump.events);
        for event in &events {
            self.dispatch(event);
        }
        forward(&mut self.taps, &events);

        let motion = std::mem::take(&mut self.pump.mouse_motion);
        if self.cursor_mode == CursorMode::Disabled && motion != DVec2::ZERO {
            self.virtual_cursor += motion;
            self.bus.publish(&MouseMovedEvent {
                x: self.virtual_cursor.x,
                y: self.virtual_cursor.y,
            });
        }

        if let PumpStatus::Exit(code) = status {
            log::debug!("event loop exited with code {code}");
            self.bus.publish(&WindowCloseEvent);
        }
    }
}

fn map_modifiers(m: ModifiersState) -> Modifiers {
    Modifiers {
        shift: m.shift_key(),
        ctrl: m.control_key(),
        alt: m.alt_key(),
        meta: m.super_key(),
    }
}

fn map_mouse_button(b: WinitMouseButton) -> MouseButton {
    match b {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Back => MouseButton::Back,
        WinitMouseButton::Forward => MouseButton::Forward,
        WinitMouseButton::Other(v) => MouseButton::Other(v),
    }
}

fn map_key(pk: PhysicalKey) -> Key {
    let PhysicalKey::Code(code) = pk else {
        return Key::Unknown(0);
    };

    match code {
        KeyCode::Escape => Key::Escape,
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Space => Key::Space,

        KeyCode::Insert => Key::Insert,
        KeyCode::Delete => Key::Delete,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,

        KeyCode::ArrowUp => Key::ArrowUp,
        KeyCode::ArrowDown => Key::ArrowDown,
        KeyCode::ArrowLeft => Key::ArrowLeft,
        KeyCode::ArrowRight => Key::ArrowRight,

        KeyCode::ShiftLeft => Key::LeftShift,
        KeyCode::ShiftRight => Key::RightShift,
        KeyCode::ControlLeft => Key::LeftControl,
        KeyCode::ControlRight => Key::RightControl,
        KeyCode::AltLeft => Key::LeftAlt,
        KeyCode::AltRight => Key::RightAlt,
        KeyCode::SuperLeft => Key::LeftSuper,
        KeyCode::SuperRight => Key::RightSuper,

        KeyCode::KeyA => Key::A,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyF => Key::F,
        KeyCode::KeyG => Key::G,
        KeyCode::KeyH => Key::H,
        KeyCode::KeyI => Key::I,
        KeyCode::KeyJ => Key::J,
        KeyCode::KeyK => Key::K,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyM => Key::M,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyT => Key::T,
        KeyCode::KeyU => Key::U,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyY => Key::Y,
        KeyCode::KeyZ => Key::Z,

        KeyCode::Digit0 => Key::Digit0,
        KeyCode::Digit1 => Key::Digit1,
        KeyCode::Digit2 => Key::Digit2,
        KeyCode::Digit3 => Key::Digit3,
        KeyCode::Digit4 => Key::Digit4,
        KeyCode::Digit5 => Key::Digit5,
        KeyCode::Digit6 => Key::Digit6,
        KeyCode::Digit7 => Key::Digit7,
        KeyCode::Digit8 => Key::Digit8,
        KeyCode::Digit9 => Key::Digit9,

        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F4 => Key::F4,
        KeyCode::F5 => Key::F5,
        KeyCode::F6 => Key::F6,
        KeyCode::F7 => Key::F7,
        KeyCode::F8 => Key::F8,
        KeyCode::F9 => Key::F9,
        KeyCode::F10 => Key::F10,
        KeyCode::F11 => Key::F11,
        KeyCode::F12 => Key::F12,

        other => Key::Unknown(other as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taps_receive_copies_until_dropped() {
        let first = PlatformEvents::default();
        let second = PlatformEvents::default();
        let mut taps = vec![Rc::downgrade(&first.0), Rc::downgrade(&second.0)];

        forward(&mut taps, &[WindowEvent::Focused(true)]);
        assert_eq!(first.drain(), [WindowEvent::Focused(true)]);
        assert!(first.drain().is_empty());

        drop(second);
        forward(&mut taps, &[WindowEvent::Focused(false)]);
        assert_eq!(taps.len(), 1);
        assert_eq!(first.drain(), [WindowEvent::Focused(false)]);
    }
}
