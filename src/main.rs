use anyhow::{Context, Result};
use compass_config::AppConfig;
use compass_renderer::pipeline::PolygonPipeline;
use compass_renderer::polygon::{to_clip_space, Canvas};
use compass_sensors::heading::toggle_label;
use compass_sensors::source::SensorSource;
use compass_sensors::types::Heading;
use compass_sensors::HeadingClient;
use glam::Vec2;
use std::sync::Arc;
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const TITLE: &str = "Polygon Compass";

/// Application state.
struct App {
    config: AppConfig,
    heading_client: HeadingClient,
    sensors: Box<dyn SensorSource>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    /// Freeze flag shown in the window title.
    shown_frozen: Option<bool>,
}

struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    polygon: PolygonPipeline,
    frame_count: u64,
}

impl App {
    fn new(
        config: AppConfig,
        heading_client: HeadingClient,
        sensors: Box<dyn SensorSource>,
    ) -> Self {
        Self {
            config,
            heading_client,
            sensors,
            window: None,
            gpu: None,
            shown_frozen: None,
        }
    }

    fn subscribe_sensors(&mut self) {
        if self.sensors.is_subscribed() {
            return;
        }
        match self.sensors.subscribe(self.heading_client.sink()) {
            Ok(()) => info!(source = self.sensors.name(), "Sensors subscribed"),
            Err(e) => warn!(
                ?e,
                source = self.sensors.name(),
                "Sensors unavailable, heading stays put"
            ),
        }
    }

    fn update_title(&mut self, heading: Heading) {
        if self.shown_frozen == Some(heading.frozen) {
            return;
        }
        self.shown_frozen = Some(heading.frozen);
        if let Some(window) = &self.window {
            window.set_title(&format!(
                "{TITLE} | Space: {}",
                toggle_label(heading.frozen)
            ));
        }
    }

    fn render(&mut self) {
        let heading = self.heading_client.heading();
        self.update_title(heading);

        let (Some(gpu), Some(window)) = (&mut self.gpu, &self.window) else {
            return;
        };

        let surface_size = Vec2::new(
            gpu.surface_config.width as f32,
            gpu.surface_config.height as f32,
        );
        let scale = window.scale_factor() as f32;
        let canvas = Canvas::centered(
            surface_size,
            self.config.canvas.size * scale,
            self.config.canvas.margin * scale,
        );

        if canvas.radius() > 0.0 {
            let path = canvas.rotated_triangle(heading.degrees);
            let vertices = to_clip_space(&path, surface_size, self.config.canvas.fill_color);
            gpu.polygon.upload(&gpu.queue, &vertices);
        } else {
            tracing::trace!(radius = canvas.radius(), "Canvas too small to draw");
            gpu.polygon.clear();
        }

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(e) => {
                warn!(?e, "Failed to get surface texture");
                gpu.surface.configure(&gpu.device, &gpu.surface_config);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let background = self.config.canvas.background_color;
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("polygon_render"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("polygon_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: background.x as f64,
                            g: background.y as f64,
                            b: background.z as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            gpu.polygon.draw(&mut pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        gpu.frame_count += 1;
        if gpu.frame_count % 300 == 0 {
            tracing::debug!(
                frames = gpu.frame_count,
                degrees = heading.degrees,
                frozen = heading.frozen,
                "Render heartbeat"
            );
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let attrs = Window::default_attributes()
                .with_title(TITLE)
                .with_inner_size(LogicalSize::new(
                    self.config.window.width,
                    self.config.window.height,
                ));

            let window = match event_loop.create_window(attrs) {
                Ok(window) => Arc::new(window),
                Err(e) => {
                    error!(?e, "Failed to create window");
                    event_loop.exit();
                    return;
                }
            };

            match pollster::block_on(init_gpu(window.clone())) {
                Ok(gpu) => self.gpu = Some(gpu),
                Err(e) => {
                    error!(?e, "Failed to initialize GPU");
                    event_loop.exit();
                    return;
                }
            }

            self.window = Some(window.clone());
            window.request_redraw();
            info!("Application initialized");
        }

        self.subscribe_sensors();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.sensors.unsubscribe();
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.sensors.unsubscribe();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(gpu) = &mut self.gpu {
                        gpu.surface_config.width = size.width;
                        gpu.surface_config.height = size.height;
                        gpu.surface.configure(&gpu.device, &gpu.surface_config);
                    }
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Space) => self.heading_client.toggle_freeze(),
                        PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                        _ => {}
                    }
                }
            }

            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.heading_client.toggle_freeze(),

            WindowEvent::RedrawRequested => {
                self.render();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}

async fn init_gpu(window: Arc<Window>) -> Result<GpuState> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let surface = instance
        .create_surface(window.clone())
        .context("Failed to create surface")?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .context("No suitable GPU adapter found")?;

    info!(name = adapter.get_info().name, "Using GPU");

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("compass_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .context("Failed to create device")?;

    let size = window.inner_size();
    let caps = surface.get_capabilities(&adapter);
    let format = caps
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .copied()
        .or_else(|| caps.formats.first().copied())
        .context("Surface reports no formats")?;

    let surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        alpha_mode: wgpu::CompositeAlphaMode::Auto,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);

    let polygon = PolygonPipeline::new(&device, format);

    Ok(GpuState {
        device,
        queue,
        surface,
        surface_config,
        polygon,
        frame_count: 0,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "polygon_compass=info,compass_sensors=info,compass_renderer=info".into()
            }),
        )
        .init();

    info!("Polygon Compass starting");

    let config = compass_config::load_config().unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    info!(
        source = ?config.sensors.source,
        interval_ms = config.sensors.sample_interval_ms,
        "Config loaded"
    );

    let heading_client = HeadingClient::spawn();
    let sensors = compass_sensors::source::from_config(
        &config.sensors,
        tokio::runtime::Handle::current(),
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, heading_client, sensors);
    event_loop.run_app(&mut app)?;

    Ok(())
}
