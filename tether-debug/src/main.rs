//! Tether debug harness.
//!
//! Renders a block of text offscreen with a headless wgpu device and dumps
//! the glyph atlas as a PNG, for inspecting packing and rasterization.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tether_core::{FontdueShaper, FrameStatus, Renderer, RendererConfig, WgpuPresenter, WgpuTarget};
use tracing_subscriber::EnvFilter;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Parser)]
#[command(version, about = "Render text offscreen and dump the glyph atlas", long_about = None)]
struct Cli {
    /// TrueType/OpenType font file
    #[arg(long)]
    font: PathBuf,

    /// Text to lay out
    #[arg(long, default_value = "fn main() {\n    println!(\"hello\");\n}")]
    text: String,

    /// Surface width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Surface height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Where to write the atlas PNG
    #[arg(long, default_value = "atlas.png")]
    out: PathBuf,

    /// Renderer config (JSON). Missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            RendererConfig::from_json_str(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => RendererConfig::default(),
    };

    let font = std::fs::read(&cli.font)
        .with_context(|| format!("reading font {}", cli.font.display()))?;
    let shaper = FontdueShaper::from_bytes(&font)?;

    let (device, queue) = pollster::block_on(request_device())?;
    let sample_count = config.sample_count;

    let size = wgpu::Extent3d {
        width: cli.width.max(1),
        height: cli.height.max(1),
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Tether Debug Color"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let multisample = (sample_count > 1).then(|| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Tether Debug MSAA"),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    });
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let multisample_view = multisample
        .as_ref()
        .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));

    let presenter = WgpuPresenter::new(device, queue, TARGET_FORMAT, sample_count);
    let mut renderer = Renderer::create(presenter, shaper, config, cli.width, cli.height)?;

    renderer.insert_text(&cli.text);
    let status = renderer.draw(WgpuTarget {
        color: &color_view,
        multisample: multisample_view.as_ref(),
    });
    if status == FrameStatus::Failed {
        anyhow::bail!("frame presentation failed");
    }

    renderer
        .atlas_image()
        .save(&cli.out)
        .with_context(|| format!("writing atlas {}", cli.out.display()))?;

    let stats = renderer.stats();
    tracing::info!("Frame status: {:?}", status);
    println!(
        "{:?}: {} instances, atlas {}x{} with {} glyphs ({} hits, {} misses, {} growths) -> {}",
        status,
        stats.last_instances,
        renderer.atlas().size().0,
        renderer.atlas().size().1,
        renderer.atlas().len(),
        stats.atlas.hits,
        stats.atlas.misses,
        stats.atlas.growths,
        cli.out.display()
    );
    Ok(())
}

async fn request_device() -> Result<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: None,
        })
        .await
        .context("no GPU adapter available")?;
    tracing::info!("Using adapter {:?}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Tether Debug Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        )
        .await
        .context("requesting GPU device")?;
    Ok((device, queue))
}
