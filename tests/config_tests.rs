// SPDX-License-Identifier: GPL-3.0-only

//! Config serialization and validation tests

use hdr_preview::Config;

#[test]
fn default_config_round_trips_through_json() {
    let config = Config::default();
    let json = serde_json::to_string(&config).unwrap();
    let restored: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(config, restored);
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config, Config::default());

    let config: Config = serde_json::from_str(r#"{"target_width": 640}"#).unwrap();
    assert_eq!(config.target_width, 640);
    assert_eq!(config.target_height, Config::default().target_height);
}

#[test]
fn validation_clamps_out_of_range_values() {
    let config = Config {
        target_width: 0,
        target_height: 0,
        compute_textures: 9,
        log_fps: false,
        demand_driven: true,
    }
    .validated();

    assert_eq!(config.target_width, Config::default().target_width);
    assert_eq!(config.target_height, Config::default().target_height);
    assert_eq!(config.compute_textures, 2);
}

#[test]
fn validation_keeps_sane_values_untouched() {
    let config = Config {
        target_width: 1280,
        target_height: 720,
        compute_textures: 1,
        log_fps: true,
        demand_driven: false,
    };
    assert_eq!(config.clone().validated(), config);
}
