// =============================================================================
// VULKAN BOOTSTRAP - window, instance, physical device
// =============================================================================
//
// The classic first steps of a Vulkan application, and nothing more:
//
// ┌─────────────────────────────────────────────────────────────────┐
// │  init_window      winit window, no client API, fixed size       │
// │  init_vulkan                                                    │
// │    ├── create_instance        (surface extensions, validation)  │
// │    ├── setup_debug_messenger  (validation only)                 │
// │    └── pick_physical_device   (first suitable GPU)              │
// │  main_loop        pump events until close                       │
// │  cleanup          messenger -> instance -> window               │
// └─────────────────────────────────────────────────────────────────┘
//
// No logical device, swapchain or rendering is created.
//
// =============================================================================

mod backend;
mod config;

use anyhow::{Context, Result};
use backend::instance::{InstanceSettings, VulkanInstance};
use backend::physical::{self, SelectedDevice};
use config::Config;
use raw_window_handle::HasDisplayHandle;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let (config, source) = Config::load();

    init_logging(&config);
    source.report();
    log::debug!("Config: {:?}", config);
    log::info!("Starting Vulkan bootstrap");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.resizable { "resizable" } else { "fixed size" }
    );

    let event_loop = EventLoop::new()?;
    // Nothing is rendered, so only wake up for events
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// `RUST_LOG` wins over the configured level
fn init_logging(config: &Config) {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or(config.debug.log_level.as_str())).init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The Vulkan instance must be
/// gone before the window it was created for.
struct App {
    config: Config,

    physical_device: Option<SelectedDevice>,
    instance: Option<VulkanInstance>,
    window: Option<Window>,

    /// First initialization failure, handed back to `main`
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            physical_device: None,
            instance: None,
            window: None,
            error: None,
        }
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    fn init_window(&self, event_loop: &ActiveEventLoop) -> Result<Window> {
        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        event_loop
            .create_window(window_attributes)
            .context("Failed to create window")
    }

    /// Instance, debug messenger and physical device, in that order.
    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        log::info!("Initializing Vulkan...");

        let display = window
            .display_handle()
            .context("Failed to get display handle")?
            .as_raw();

        let settings = InstanceSettings {
            application_name: self.config.instance.application_name.clone(),
            engine_name: self.config.instance.engine_name.clone(),
            api_version: self.config.get_api_version(),
            validation: self.config.validation_enabled(),
            verbose_validation: self.config.debug.verbose,
        };

        let instance =
            VulkanInstance::new(display, &settings).context("Failed to create Vulkan instance")?;
        if settings.validation && !instance.validation_enabled() {
            log::warn!("Continuing without validation layers");
        }

        let requirements = self.config.get_device_requirements();
        let picked = physical::pick_physical_device(&instance.instance, &requirements);
        self.instance = Some(instance);
        let physical_device = picked.context("Failed to pick a physical device")?;
        log::debug!(
            "Physical device {:?}, vendor {:#06x}",
            physical_device.handle,
            physical_device.info.vendor_id
        );
        self.physical_device = Some(physical_device);

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    /// `main` returns the error, which prints it
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::info!("Initialization failed, shutting down...");
        self.error.get_or_insert(error);
        event_loop.exit();
    }

    // =========================================================================
    // CLEANUP
    // =========================================================================

    fn cleanup(&mut self) {
        self.physical_device = None;
        self.instance = None;
        self.window = None;
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match self.init_window(event_loop) {
            Ok(w) => w,
            Err(e) => return self.fail(event_loop, e),
        };

        let result = self.init_vulkan(&window);
        self.window = Some(window);

        if let Err(e) = result {
            self.fail(event_loop, e);
        }
    }

    /// The main loop: nothing to draw, just wait for the user to leave.
    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        log::info!("Cleaning up...");
        self.cleanup();
        log::info!("Cleanup complete");
    }
}
