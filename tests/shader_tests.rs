// SPDX-License-Identifier: GPL-3.0-only

//! WGSL validation for the built-in pass shaders
//!
//! Parses and validates each shader with naga so source regressions are
//! caught without a GPU.

use hdr_preview::gpu::{CAMERA_FRAGMENT_SHADER, DISPLAY_FRAGMENT_SHADER, QUAD_VERTEX_SHADER};
use naga::valid::{Capabilities, ValidationFlags, Validator};

fn validate(label: &str, source: &str) -> naga::Module {
    let module = naga::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("{} failed to parse: {}", label, e.emit_to_string(source)));
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .unwrap_or_else(|e| panic!("{} failed validation: {:?}", label, e));
    module
}

fn has_entry_point(module: &naga::Module, name: &str, stage: naga::ShaderStage) -> bool {
    module
        .entry_points
        .iter()
        .any(|ep| ep.name == name && ep.stage == stage)
}

#[test]
fn quad_vertex_shader_is_valid() {
    let module = validate("quad.wgsl", QUAD_VERTEX_SHADER);
    assert!(has_entry_point(&module, "vs_main", naga::ShaderStage::Vertex));
}

#[test]
fn camera_fragment_shader_is_valid() {
    let module = validate("camera.wgsl", CAMERA_FRAGMENT_SHADER);
    assert!(has_entry_point(
        &module,
        "fs_main",
        naga::ShaderStage::Fragment
    ));
}

#[test]
fn display_fragment_shader_is_valid() {
    let module = validate("display.wgsl", DISPLAY_FRAGMENT_SHADER);
    assert!(has_entry_point(
        &module,
        "fs_main",
        naga::ShaderStage::Fragment
    ));
}
