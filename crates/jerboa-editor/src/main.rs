mod cube;
mod editor_layer;

use anyhow::{Context, Result};
use jerboa_engine::backend::wgpu_backend::{self, GpuInit};
use jerboa_engine::core::{Application, ApplicationHooks, ApplicationProps};
use jerboa_engine::logging::{LoggingConfig, init_logging};
use jerboa_engine::window::{WindowProps, WinitWindow};

use editor_layer::EditorLayer;

struct Editor;

impl ApplicationHooks for Editor {
    fn on_init(&mut self, app: &mut Application) -> Result<()> {
        let id = app.push_layer(Box::new(EditorLayer::new()))?;
        log::debug!("pushed editor layer as {id}");
        Ok(())
    }

    fn on_shutdown(&mut self, _app: &mut Application) {
        log::info!("editor shutting down");
    }
}

fn run() -> Result<()> {
    let props = ApplicationProps {
        window: WindowProps::new("Jerboa Editor", 1280, 720),
        vsync: true,
    };

    let mut window =
        WinitWindow::new(props.window.clone()).context("failed to open the editor window")?;
    let (graphics, ui) = wgpu_backend::create_context(&mut window, GpuInit::default())
        .context("failed to initialize the wgpu backend")?;

    let mut app = Application::new(props, Box::new(window), graphics).with_ui(Box::new(ui));
    app.run(&mut Editor)
}

fn main() {
    init_logging(LoggingConfig::default());

    if let Err(err) = run() {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
