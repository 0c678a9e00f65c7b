use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Context, Result};

use crate::event::{EventBus, EventObserver, KeyPressedEvent, WindowCloseEvent, WindowResizeEvent};
use crate::input::Input;
use crate::layer::{Layer, LayerId, LayerStack};
use crate::render::{GraphicsContext, RenderApi};
use crate::time::{FrameClock, FrameTime};
use crate::ui::{HeadlessUi, UiBackend};
use crate::window::{Window, WindowProps};

use super::ctx::LayerContext;

/// Application start-up parameters.
#[derive(Debug, Clone)]
pub struct ApplicationProps {
    pub window: WindowProps,
    pub vsync: bool,
}

impl Default for ApplicationProps {
    fn default() -> Self {
        Self {
            window: WindowProps::default(),
            vsync: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AppState {
    Constructed,
    Running,
    ShuttingDown,
    Terminated,
}

/// Client code run around the frame loop.
pub trait ApplicationHooks {
    /// Runs after the engine is initialized, before the first frame. The
    /// usual place to push layers.
    fn on_init(&mut self, app: &mut Application) -> Result<()> {
        let _ = app;
        Ok(())
    }

    /// Runs after every layer has been detached.
    fn on_shutdown(&mut self, app: &mut Application) {
        let _ = app;
    }
}

impl ApplicationHooks for () {}

/// Everything a [`LayerContext`] borrows, kept apart from the layer stack
/// so both can be borrowed at once.
struct Services {
    window: Box<dyn Window>,
    graphics: GraphicsContext,
    input: Input,
    layer_bus: EventBus,
    ui: Box<dyn UiBackend>,
    running: Rc<Cell<bool>>,
}

impl Services {
    fn context(&mut self, time: FrameTime) -> LayerContext<'_> {
        LayerContext::new(
            time,
            self.window.as_mut(),
            &self.graphics,
            &self.input,
            &self.layer_bus,
            self.ui.context(),
            &self.running,
        )
    }
}

/// Owns the window, the graphics context and the layer stack, and drives
/// the frame loop.
pub struct Application {
    state: AppState,
    services: Services,
    layers: LayerStack,
    clock: FrameClock,
    active_api: Option<RenderApi>,
    _observers: Vec<EventObserver>,
}

impl Application {
    /// `graphics` must have been created on `window`'s event bus so the
    /// renderer follows its resizes.
    pub fn new(props: ApplicationProps, window: Box<dyn Window>, graphics: GraphicsContext) -> Self {
        let running = Rc::new(Cell::new(true));
        let layer_bus = EventBus::new();
        let bus = window.event_bus();

        let on_close = {
            let running = running.clone();
            bus.subscribe(move |_: &WindowCloseEvent| {
                log::info!("window close requested");
                running.set(false);
            })
        };
        let on_resize = {
            let layer_bus = layer_bus.clone();
            bus.subscribe(move |e: &WindowResizeEvent| {
                log::debug!("window resized to {}x{}", e.width, e.height);
                layer_bus.publish(e);
            })
        };
        let on_key = bus.subscribe(|e: &KeyPressedEvent| {
            log::trace!("key pressed: {:?} {:?}", e.key, e.modifiers);
        });

        let input = Input::attach(bus);

        let mut services = Services {
            window,
            graphics,
            input,
            layer_bus,
            ui: Box::new(HeadlessUi::new()),
            running,
        };
        services.window.set_vsync(props.vsync);

        log::info!(
            "application created: \"{}\" {}x{} on {}",
            services.window.title(),
            services.window.width(),
            services.window.height(),
            services.graphics.api()
        );

        Self {
            state: AppState::Constructed,
            services,
            layers: LayerStack::new(),
            clock: FrameClock::new(),
            active_api: None,
            _observers: vec![on_close, on_resize, on_key],
        }
    }

    /// Replaces the UI backend. Only meaningful before [`run`](Self::run).
    pub fn with_ui(mut self, ui: Box<dyn UiBackend>) -> Self {
        debug_assert_eq!(self.state, AppState::Constructed);
        self.services.ui = ui;
        self
    }

    /// Initializes, loops until the running flag drops, then shuts down.
    pub fn run(&mut self, hooks: &mut dyn ApplicationHooks) -> Result<()> {
        self.init(hooks)?;
        while self.is_running() {
            self.run_frame();
        }
        self.shut_down(hooks);
        Ok(())
    }

    fn init(&mut self, hooks: &mut dyn ApplicationHooks) -> Result<()> {
        anyhow::ensure!(
            self.state == AppState::Constructed,
            "application cannot start from {:?}",
            self.state
        );
        self.state = AppState::Running;

        let api = self.services.graphics.api();
        self.active_api = Some(api);
        log::info!("render api: {api}");

        self.services.ui.init(self.services.window.as_ref());
        if let Err(e) = hooks.on_init(self) {
            log::error!("init hook failed: {e:#}");
            self.tear_down();
            return Err(e.context("application init hook failed"));
        }
        self.clock.reset();
        Ok(())
    }

    /// One iteration: clear, update layers, UI pass, present, poll window
    /// events, end the input frame.
    pub fn run_frame(&mut self) {
        let time = self.clock.tick();
        self.services.graphics.renderer().clear();

        {
            let mut ctx = self.services.context(time);
            for layer in self.layers.iter_mut() {
                layer.on_update(&mut ctx);
            }
        }

        if self.services.ui.begin_frame(self.services.window.as_ref(), time) {
            {
                let mut ctx = self.services.context(time);
                for layer in self.layers.iter_mut() {
                    layer.on_ui_render(&mut ctx);
                }
            }
            self.services.ui.end_frame();
        }

        self.services.graphics.renderer().present();
        self.services.window.update();
        self.services.input.end_frame();
    }

    fn shut_down(&mut self, hooks: &mut dyn ApplicationHooks) {
        self.state = AppState::ShuttingDown;
        log::info!("shutting down");
        self.release_layers();
        hooks.on_shutdown(self);
        self.state = AppState::Terminated;
        log::info!("application terminated");
    }

    /// Unwinds a start-up that failed after the UI and some layers came up.
    fn tear_down(&mut self) {
        self.state = AppState::ShuttingDown;
        self.release_layers();
        self.services.running.set(false);
        self.state = AppState::Terminated;
        log::info!("application terminated during init");
    }

    fn release_layers(&mut self) {
        self.services.ui.shut_down();
        for (id, mut layer) in self.layers.drain() {
            log::debug!("detaching {} ({id})", layer.name());
            layer.on_detach(&mut self.services.context(FrameTime::zero()));
        }
    }

    /// Attaches `layer` and inserts it before the overlays.
    pub fn push_layer(&mut self, layer: Box<dyn Layer>) -> Result<LayerId> {
        let layer = self.attach(layer)?;
        Ok(self.layers.push_layer(layer))
    }

    /// Attaches `layer` and appends it after everything else.
    pub fn push_overlay(&mut self, layer: Box<dyn Layer>) -> Result<LayerId> {
        let layer = self.attach(layer)?;
        Ok(self.layers.push_overlay(layer))
    }

    fn attach(&mut self, mut layer: Box<dyn Layer>) -> Result<Box<dyn Layer>> {
        layer
            .on_attach(&mut self.services.context(FrameTime::zero()))
            .with_context(|| format!("failed to attach layer {}", layer.name()))?;
        log::debug!("attached layer {}", layer.name());
        Ok(layer)
    }

    /// Detaches the normal layer `id` and hands it back.
    pub fn pop_layer(&mut self, id: LayerId) -> Option<Box<dyn Layer>> {
        let layer = self.layers.pop_layer(id)?;
        Some(self.detach(layer))
    }

    /// Detaches the overlay `id` and hands it back.
    pub fn pop_overlay(&mut self, id: LayerId) -> Option<Box<dyn Layer>> {
        let layer = self.layers.pop_overlay(id)?;
        Some(self.detach(layer))
    }

    fn detach(&mut self, mut layer: Box<dyn Layer>) -> Box<dyn Layer> {
        layer.on_detach(&mut self.services.context(FrameTime::zero()));
        log::debug!("detached layer {}", layer.name());
        layer
    }

    pub fn request_exit(&self) {
        self.services.running.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.services.running.get()
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    /// API recorded at init; `None` before [`run`](Self::run).
    pub fn active_api(&self) -> Option<RenderApi> {
        self.active_api
    }

    pub fn window(&self) -> &dyn Window {
        self.services.window.as_ref()
    }

    pub fn window_mut(&mut self) -> &mut dyn Window {
        self.services.window.as_mut()
    }

    pub fn graphics(&self) -> &GraphicsContext {
        &self.services.graphics
    }

    pub fn input(&self) -> &Input {
        &self.services.input
    }

    /// Bus shared by all layers.
    pub fn event_bus(&self) -> &EventBus {
        &self.services.layer_bus
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::backend::headless::{Command, HeadlessDevice};
    use crate::window::HeadlessWindow;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recording {
        name: &'static str,
        log: Log,
        exit_after: Option<u64>,
        updates: u64,
    }

    impl Recording {
        fn boxed(name: &'static str, log: &Log) -> Box<dyn Layer> {
            Box::new(Self {
                name,
                log: log.clone(),
                exit_after: None,
                updates: 0,
            })
        }
    }

    impl Layer for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn on_attach(&mut self, _ctx: &mut LayerContext<'_>) -> Result<()> {
            self.log.borrow_mut().push(format!("attach {}", self.name));
            Ok(())
        }

        fn on_detach(&mut self, _ctx: &mut LayerContext<'_>) {
            self.log.borrow_mut().push(format!("detach {}", self.name));
        }

        fn on_update(&mut self, ctx: &mut LayerContext<'_>) {
            self.updates += 1;
            self.log.borrow_mut().push(format!("update {}", self.name));
            if self.exit_after == Some(self.updates) {
                ctx.request_exit();
            }
        }

        fn on_ui_render(&mut self, _ctx: &mut LayerContext<'_>) {
            self.log.borrow_mut().push(format!("ui {}", self.name));
        }
    }

    struct FailingAttach;

    impl Layer for FailingAttach {
        fn on_attach(&mut self, _ctx: &mut LayerContext<'_>) -> Result<()> {
            anyhow::bail!("no assets")
        }
    }

    fn app(window: HeadlessWindow) -> (Application, HeadlessDevice) {
        let device = HeadlessDevice::new();
        let graphics = device.create_context(window.event_bus());
        let app = Application::new(ApplicationProps::default(), Box::new(window), graphics);
        (app, device)
    }

    fn headless(updates: u64) -> HeadlessWindow {
        HeadlessWindow::new(WindowProps::new("test", 320, 200)).close_after_updates(updates)
    }

    #[test]
    fn layers_update_before_overlays() {
        let log: Log = Rc::default();
        let (mut app, _device) = app(headless(1));

        app.push_layer(Recording::boxed("A", &log)).unwrap();
        app.push_overlay(Recording::boxed("B", &log)).unwrap();
        app.push_layer(Recording::boxed("C", &log)).unwrap();
        log.borrow_mut().clear();

        app.run(&mut ()).unwrap();

        assert_eq!(
            log.borrow()[..6],
            ["update A", "update C", "update B", "ui A", "ui C", "ui B"]
        );
    }

    #[test]
    fn close_event_stops_the_loop_before_the_next_frame() {
        let log: Log = Rc::default();
        let (mut app, device) = app(headless(3));
        app.push_layer(Recording::boxed("A", &log)).unwrap();

        app.run(&mut ()).unwrap();

        let updates = log.borrow().iter().filter(|l| *l == "update A").count();
        assert_eq!(updates, 3);
        assert_eq!(device.frames_presented(), 3);
        assert!(!app.is_running());
        assert_eq!(app.state(), AppState::Terminated);
    }

    #[test]
    fn layer_can_request_exit() {
        let log: Log = Rc::default();
        let (mut app, device) = app(headless(100));
        app.push_layer(Box::new(Recording {
            name: "A",
            log: log.clone(),
            exit_after: Some(2),
            updates: 0,
        }))
        .unwrap();

        app.run(&mut ()).unwrap();
        assert_eq!(device.frames_presented(), 2);
    }

    #[test]
    fn frame_clears_before_present() {
        let (mut app, device) = app(headless(1));
        device.clear_commands();
        app.run(&mut ()).unwrap();

        let commands = device.commands();
        assert!(matches!(commands.first(), Some(Command::Clear { .. })));
        assert_eq!(commands.last(), Some(&Command::Present));
    }

    #[test]
    fn resize_reaches_layers_and_viewport() {
        let mut window = headless(1);
        window.queue_event(WindowResizeEvent {
            width: 640,
            height: 480,
        });
        let (mut app, device) = app(window);

        let seen = Rc::new(Cell::new((0, 0)));
        let _observer = {
            let seen = seen.clone();
            app.event_bus()
                .subscribe(move |e: &WindowResizeEvent| seen.set((e.width, e.height)))
        };

        app.run(&mut ()).unwrap();
        assert_eq!(seen.get(), (640, 480));
        assert_eq!(device.viewport(), (640, 480));
    }

    #[test]
    fn vsync_follows_props() {
        let (app, device) = app(headless(1));
        assert!(app.window().is_vsync());
        assert!(device.vsync());
    }

    #[test]
    fn shut_down_detaches_last_first_then_runs_hook() {
        struct Hooks {
            log: Log,
        }

        impl ApplicationHooks for Hooks {
            fn on_init(&mut self, app: &mut Application) -> Result<()> {
                app.push_layer(Recording::boxed("A", &self.log))?;
                app.push_overlay(Recording::boxed("B", &self.log))?;
                Ok(())
            }

            fn on_shutdown(&mut self, app: &mut Application) {
                assert!(app.layers().is_empty());
                self.log.borrow_mut().push("shutdown".to_string());
            }
        }

        let log: Log = Rc::default();
        let (mut app, _device) = app(headless(1));
        app.run(&mut Hooks { log: log.clone() }).unwrap();

        let log = log.borrow();
        assert_eq!(log[..2], ["attach A", "attach B"]);
        assert_eq!(log[log.len() - 3..], ["detach B", "detach A", "shutdown"]);
        assert_eq!(app.active_api(), Some(RenderApi::Headless));
    }

    #[test]
    fn failed_attach_keeps_layer_out() {
        let (mut app, _device) = app(headless(1));
        let err = app.push_layer(Box::new(FailingAttach)).unwrap_err();
        assert!(format!("{err:#}").contains("no assets"));
        assert!(app.layers().is_empty());
    }

    #[test]
    fn pop_layer_detaches() {
        let log: Log = Rc::default();
        let (mut app, _device) = app(headless(1));
        let id = app.push_layer(Recording::boxed("A", &log)).unwrap();

        let layer = app.pop_layer(id).unwrap();
        assert_eq!(layer.name(), "A");
        assert_eq!(log.borrow().last().map(String::as_str), Some("detach A"));
        assert!(app.pop_layer(id).is_none());
    }

    #[test]
    fn failed_init_hook_unwinds_pushed_layers() {
        struct Hooks {
            log: Log,
        }

        impl ApplicationHooks for Hooks {
            fn on_init(&mut self, app: &mut Application) -> Result<()> {
                app.push_layer(Recording::boxed("A", &self.log))?;
                anyhow::bail!("missing assets")
            }

            fn on_shutdown(&mut self, _app: &mut Application) {
                self.log.borrow_mut().push("shutdown".to_string());
            }
        }

        let log: Log = Rc::default();
        let (mut app, device) = app(headless(5));
        let err = app.run(&mut Hooks { log: log.clone() }).unwrap_err();

        assert!(format!("{err:#}").contains("missing assets"));
        assert_eq!(*log.borrow(), ["attach A", "detach A"]);
        assert_eq!(app.state(), AppState::Terminated);
        assert!(app.layers().is_empty());
        assert!(!app.is_running());
        assert_eq!(device.frames_presented(), 0);
    }

    #[test]
    fn layers_see_the_ui_context_during_ui_render() {
        struct Panels {
            built: Rc<Cell<bool>>,
        }

        impl Layer for Panels {
            fn on_ui_render(&mut self, ctx: &mut LayerContext<'_>) {
                crate::ui::egui::Window::new("Window 1").show(ctx.ui, |ui| {
                    let _ = ui.button("Hello");
                });
                self.built.set(true);
            }
        }

        let built = Rc::new(Cell::new(false));
        let (mut app, _device) = app(headless(1));
        app.push_layer(Box::new(Panels {
            built: built.clone(),
        }))
        .unwrap();
        app.run(&mut ()).unwrap();
        assert!(built.get());
    }

    #[test]
    fn run_twice_is_rejected() {
        let (mut app, _device) = app(headless(1));
        app.run(&mut ()).unwrap();
        assert!(app.run(&mut ()).is_err());
    }
}
