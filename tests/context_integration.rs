use restir_sampling_context::config::ContextConfig;
use restir_sampling_context::gpu::BufferPlan;
use restir_sampling_context::neighbor_offsets::generate_neighbor_offsets;
use restir_sampling_context::onion::{MAX_ONION_LAYER_GROUPS, MAX_ONION_RINGS, build_onion};
use restir_sampling_context::regir::{ReGirMode, ReGirStaticParameters};
use restir_sampling_context::reservoir::{
    CheckerboardMode, RESERVOIR_BLOCK_SIZE, calculate_reservoir_buffer_parameters,
};
use restir_sampling_context::ris_buffer::RisBufferParameters;
use restir_sampling_context::{ImportanceSamplingContext, ImportanceSamplingStaticParameters};

#[test]
fn onion_cell_count_grows_with_both_parameters() {
    for coverage in 0..=64 {
        let mut previous = 0;
        for detail in 1..=8 {
            let cells = build_onion(detail, coverage).total_cells();
            assert!(cells > previous, "detail {detail} coverage {coverage}");
            previous = cells;
        }
    }
    for detail in 0..=8 {
        let mut previous = 0;
        for coverage in 0..=64 {
            let cells = build_onion(detail, coverage).total_cells();
            assert!(cells > previous, "detail {detail} coverage {coverage}");
            previous = cells;
        }
    }
}

#[test]
fn onion_stays_within_gpu_capacity() {
    for detail in 0..=8 {
        for coverage in [0, 1, 10, 64] {
            let onion = build_onion(detail, coverage);
            assert!(onion.layer_group_count() <= MAX_ONION_LAYER_GROUPS);
            assert!(onion.ring_count() <= MAX_ONION_RINGS);
            assert!(onion.to_gpu().is_ok());
        }
    }
    assert_eq!(build_onion(8, 0).ring_count(), MAX_ONION_RINGS);
}

#[test]
fn onion_is_deterministic() {
    assert_eq!(build_onion(5, 10), build_onion(5, 10));
}

#[test]
fn full_hd_reservoir_layout() {
    let p = calculate_reservoir_buffer_parameters(1920, 1080, CheckerboardMode::Off).unwrap();
    let block = RESERVOIR_BLOCK_SIZE * RESERVOIR_BLOCK_SIZE;
    assert_eq!(p.block_row_pitch % block, 0);
    let height_blocks = 1080u32.div_ceil(RESERVOIR_BLOCK_SIZE);
    assert_eq!(p.array_pitch, p.block_row_pitch * height_blocks);
}

#[test]
fn neighbor_offsets_depend_only_on_count() {
    let a = generate_neighbor_offsets(8192);
    let b = generate_neighbor_offsets(8192);
    assert_eq!(a.len(), 2 * 8192);
    assert_eq!(a, b);
}

#[test]
fn grid_mode_reserves_cells_times_lights() {
    let ctx = ImportanceSamplingContext::new(ImportanceSamplingStaticParameters {
        regir: ReGirStaticParameters {
            mode: ReGirMode::Grid,
            grid_size: [4, 4, 4],
            lights_per_cell: 512,
            ..Default::default()
        },
        ..Default::default()
    })
    .unwrap();
    assert_eq!(ctx.regir_context().light_slot_count(), 32768);
    assert_eq!(
        ctx.ris_buffer_element_count(),
        2 * 1024 * 128 + 32768
    );
}

#[test]
fn disabled_regir_reserves_nothing() {
    let ctx = ImportanceSamplingContext::new(ImportanceSamplingStaticParameters {
        regir: ReGirStaticParameters {
            mode: ReGirMode::Disabled,
            ..Default::default()
        },
        ..Default::default()
    })
    .unwrap();
    assert_eq!(ctx.regir_context().light_slot_count(), 0);
    assert_eq!(ctx.ris_buffer_element_count(), 2 * 1024 * 128);
    assert!(!ctx.is_regir_enabled());
}

#[test]
fn zero_tile_size_is_an_error_not_a_panic() {
    let result = ImportanceSamplingContext::new(ImportanceSamplingStaticParameters {
        local_light_ris: RisBufferParameters {
            tile_size: 0,
            tile_count: 128,
        },
        ..Default::default()
    });
    let err = result.err().unwrap();
    assert!(err.is_invalid_configuration());
}

#[test]
fn oversized_inputs_are_errors_not_panics() {
    let big_ris = RisBufferParameters {
        tile_size: 65536,
        tile_count: 32768,
    };
    let ris_overflow = ImportanceSamplingContext::new(ImportanceSamplingStaticParameters {
        local_light_ris: big_ris,
        environment_light_ris: big_ris,
        ..Default::default()
    });
    assert!(ris_overflow.err().unwrap().is_invalid_configuration());

    let huge_render = ImportanceSamplingContext::new(ImportanceSamplingStaticParameters {
        render_width: 65536,
        render_height: 65536,
        ..Default::default()
    });
    assert!(huge_render.err().unwrap().is_invalid_configuration());
}

#[test]
fn json_config_builds_a_context() {
    let config = ContextConfig::from_json(
        r#"{
            "renderWidth": 1280,
            "renderHeight": 720,
            "checkerboardMode": "White",
            "environmentLightRis": { "tileSize": 256, "tileCount": 64 },
            "regir": { "mode": "Onion", "onionDetailLayers": 3, "onionCoverageLayers": 4 }
        }"#,
    )
    .unwrap();
    let ctx = ImportanceSamplingContext::new(config.static_params).unwrap();

    let onion = ctx.regir_context().onion().unwrap();
    assert_eq!(onion.layer_group_count(), 3);
    assert_eq!(
        ctx.regir_context().light_slot_count(),
        onion.total_cells() * 512
    );

    let plan = BufferPlan::from_context(&ctx);
    assert_eq!(plan.ris_elements, 1024 * 128 + 256 * 64 + onion.total_cells() * 512);
    assert_eq!(plan.neighbor_offset_bytes(), 2 * 8192);
}

#[test]
fn checkerboard_halves_reservoir_width() {
    let full = calculate_reservoir_buffer_parameters(1920, 1080, CheckerboardMode::Off).unwrap();
    let half = calculate_reservoir_buffer_parameters(1920, 1080, CheckerboardMode::Black).unwrap();
    assert!(half.block_row_pitch < full.block_row_pitch);
}
