// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the preview pipeline
//!
//! This module provides command-line functionality for:
//! - Running a headless preview session for a fixed number of frames
//! - Probing the GPU adapter

use hdr_preview::backends::camera::get_default_device;
use hdr_preview::compute::PassthroughStage;
use hdr_preview::gpu::{create_render_device, WgpuContext};
use hdr_preview::pipeline::{FramePipeline, PipelineOptions};
use hdr_preview::constants::{DEFAULT_DISPLAY_HEIGHT, DEFAULT_DISPLAY_WIDTH};
use hdr_preview::{CaptureSize, Config};
use std::sync::mpsc;
use std::time::Duration;

/// Print the adapter the pipeline would run on
pub fn probe_gpu() -> Result<(), Box<dyn std::error::Error>> {
    let (_device, _queue, info) = pollster::block_on(create_render_device("probe"))?;
    println!("Adapter: {}", info.adapter_name);
    println!("Backend: {:?}", info.backend);
    Ok(())
}

/// Run a headless preview session and print a checksum of the final frame.
///
/// Explicit dimensions override the configured capture target; otherwise
/// the config (or its defaults) applies.
pub fn run_preview(
    width: Option<u32>,
    height: Option<u32>,
    frames: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let mut options = PipelineOptions::from_config(&config);
    if let (Some(w), Some(h)) = (width, height) {
        options.target_size = CaptureSize::new(w, h);
    }

    let gpu = WgpuContext::new()?;
    let pipeline = FramePipeline::new(
        Box::new(gpu),
        get_default_device(),
        Box::new(PassthroughStage::new()),
        options,
    );

    let demand_driven = config.demand_driven;

    // Demand-driven ticks: the capture thread signals, we render. The
    // fixed-rate mode below just ticks on an interval instead.
    let (redraw_tx, redraw_rx) = mpsc::channel::<()>();
    let signal = pipeline.frame_signal();
    signal.set_redraw_request(Some(Box::new(move || {
        let _ = redraw_tx.send(());
    })));

    let display_width = width.unwrap_or(DEFAULT_DISPLAY_WIDTH).max(1);
    let display_height = height.unwrap_or(DEFAULT_DISPLAY_HEIGHT).max(1);

    pipeline.on_app_start()?;
    pipeline.on_app_resume()?;
    pipeline.on_surface_created()?;
    pipeline.on_surface_changed(display_width, display_height)?;

    if let Some(capture) = pipeline.capture_size() {
        println!("Capture size: {}", capture);
    }

    let mut rendered = 0u32;
    while rendered < frames {
        if demand_driven {
            match redraw_rx.recv_timeout(Duration::from_secs(2)) {
                Ok(()) => {}
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err("no camera frames arrived within 2s".into());
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        } else {
            std::thread::sleep(Duration::from_millis(16));
        }
        pipeline.render_tick()?;
        rendered += 1;
    }

    let data = pipeline.read_display()?;
    let checksum: u64 = data.iter().map(|b| *b as u64).sum();
    println!("Rendered {} frames; display checksum {:#018x}", rendered, checksum);

    pipeline.on_app_pause()?;
    pipeline.on_app_stop()?;
    pipeline.on_surface_destroyed()?;
    Ok(())
}
