use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use restir_sampling_context::config::ContextConfig;
use restir_sampling_context::gpu::{BufferPlan, ContextBuffers};
use restir_sampling_context::ImportanceSamplingContext;

#[derive(Parser)]
struct Options {
    /// JSON file with static parameters; stock defaults when omitted.
    config: Option<PathBuf>,

    /// Also create the GPU buffers on the default adapter.
    #[clap(long)]
    gpu: bool,

    #[clap(short, long, default_value = "2")]
    frames: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let options = Options::parse();

    let config = match &options.config {
        Some(path) => ContextConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ContextConfig::default(),
    };

    let mut ctx = ImportanceSamplingContext::new(config.static_params)
        .context("failed to build importance sampling context")?;
    ctx.regir_context_mut()
        .set_dynamic_parameters(config.regir_dynamic);

    print_layout(&ctx);

    for frame in 0..options.frames {
        ctx.set_frame_index(frame);
        let di = ctx.restir_di_context().buffer_indices();
        let gi = ctx.restir_gi_context().buffer_indices();
        println!(
            "frame {frame}: checkerboard field {}, DI {:?}, GI {:?}",
            ctx.restir_di_context()
                .runtime_parameters()
                .active_checkerboard_field,
            di,
            gi
        );
    }

    if options.gpu {
        create_gpu_buffers(&ctx)?;
    }

    Ok(())
}

fn print_layout(ctx: &ImportanceSamplingContext) {
    let plan = BufferPlan::from_context(ctx);
    let local = ctx.local_light_ris_buffer_segment();
    let env = ctx.environment_light_ris_buffer_segment();
    let regir = ctx.regir_context();

    println!("RIS buffer: {} elements", plan.ris_elements);
    println!("  local lights       {:?}", local.range());
    println!("  environment light  {:?}", env.range());
    println!(
        "  ReGIR ({:?})      {}..{}",
        regir.static_parameters().mode,
        regir.ris_buffer_offset(),
        regir.ris_buffer_offset() + regir.light_slot_count()
    );
    if let Some(onion) = regir.onion() {
        println!(
            "  onion: {} layer groups, {} rings, {} cells",
            onion.layer_group_count(),
            onion.ring_count(),
            onion.total_cells()
        );
    }
    let reservoir = ctx.restir_di_context().reservoir_buffer_parameters();
    println!(
        "DI reservoirs: row pitch {}, array pitch {}, {} elements",
        reservoir.block_row_pitch, reservoir.array_pitch, plan.di_reservoir_elements
    );
    println!("GI reservoirs: {} elements", plan.gi_reservoir_elements);
    println!("neighbor offsets: {}", plan.neighbor_offset_count);
    println!("total storage: {} bytes", plan.total_bytes());
}

fn create_gpu_buffers(ctx: &ImportanceSamplingContext) -> anyhow::Result<()> {
    let instance = wgpu::Instance::new(&Default::default());
    let adapter = match pollster::block_on(instance.request_adapter(&Default::default())) {
        Ok(adapter) => adapter,
        Err(err) => {
            log::warn!("no GPU adapter available, skipping buffer creation: {err}");
            return Ok(());
        }
    };
    log::info!("using adapter {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("importance sampling device"),
        ..Default::default()
    }))?;

    let buffers = ContextBuffers::create(&device, ctx)?;
    buffers.write_frame(&queue, ctx)?;
    println!(
        "created GPU buffers: RIS {} bytes, DI reservoirs {} bytes",
        buffers.ris_buffer.size(),
        buffers.di_reservoir_buffer.size()
    );
    Ok(())
}
