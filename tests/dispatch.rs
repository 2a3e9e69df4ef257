mod common;

use common::Harness;
use glam::{Vec3, Vec4};
use ocean_shadow::cascade::Staleness;
use ocean_shadow::config::{LodConfig, ShadowSimSettings};
use ocean_shadow::error::ShadowDataError;
use ocean_shadow::light::{LightId, SceneLight};
use ocean_shadow::manager::{FrameOutcome, ShadowBinding, ShadowDataStatus};

fn sun() -> SceneLight {
    SceneLight::directional(LightId::new(1), Vec3::new(0.3, -1.0, 0.0))
}

fn source_cascades(harness: &Harness, light: &SceneLight) -> Vec<u32> {
    harness
        .work_list(light)
        .map(|list| list.dispatches().iter().map(|command| command.params.source_cascade).collect())
        .unwrap_or_default()
}

#[test]
fn cascades_are_dispatched_coarsest_first() {
    let mut harness = Harness::new(ShadowSimSettings::default(), LodConfig::new(4, 16));
    let light = sun();
    assert_eq!(harness.step(Some(&light)), FrameOutcome::Processed { dispatches: 4 });

    let list = harness.work_list(&light).expect("attached work-list");
    let order: Vec<u32> = list.dispatches().iter().map(|command| command.params.cascade).collect();
    assert_eq!(order, vec![3, 2, 1, 0]);
    let textures = harness.textures();
    for command in list.dispatches() {
        assert_eq!(command.source, textures.source_slot());
        assert_eq!(command.target, textures.target_slot());
    }
}

#[test]
fn each_target_layer_is_cleared_every_frame() {
    let mut harness = Harness::new(ShadowSimSettings::default(), LodConfig::new(3, 16));
    let light = sun();
    harness.step(Some(&light));
    harness.device.take_clears();
    harness.step(Some(&light));

    let target = *harness.textures().targets();
    let clears = harness.device.take_clears();
    assert_eq!(clears, vec![(target, 2), (target, 1), (target, 0)]);
}

#[test]
fn zooming_rebases_source_cascades() {
    let mut harness = Harness::new(ShadowSimSettings::default(), LodConfig::new(4, 16));
    let light = sun();

    harness.scale_difference_pow2 = 1;
    harness.step(Some(&light));
    // Coarsest first: cascades 3, 2, 1, 0.
    assert_eq!(source_cascades(&harness, &light), vec![3, 3, 2, 1]);

    harness.scale_difference_pow2 = -1;
    harness.step(Some(&light));
    assert_eq!(source_cascades(&harness, &light), vec![2, 1, 0, 0]);

    harness.scale_difference_pow2 = 0;
    harness.step(Some(&light));
    assert_eq!(source_cascades(&harness, &light), vec![3, 2, 1, 0]);
}

#[test]
fn single_cascade_always_reads_itself() {
    let mut harness = Harness::new(ShadowSimSettings::default(), LodConfig::new(1, 16));
    let light = sun();
    for diff in [-3, 0, 2] {
        harness.scale_difference_pow2 = diff;
        assert_eq!(harness.step(Some(&light)), FrameOutcome::Processed { dispatches: 1 });
        assert_eq!(source_cascades(&harness, &light), vec![0]);
    }
}

#[test]
fn parameters_carry_transforms_settings_and_timing() {
    let settings = ShadowSimSettings {
        jitter_diameter_soft: 10.0,
        jitter_diameter_hard: 1.5,
        current_frame_weight_soft: 0.1,
        current_frame_weight_hard: 0.4,
        ..ShadowSimSettings::default()
    };
    let mut harness = Harness::new(settings, LodConfig::new(3, 16));
    let light = sun();
    harness.step(Some(&light));
    harness.step(Some(&light));

    let list = harness.work_list(&light).expect("attached work-list");
    for command in list.dispatches() {
        let params = &command.params;
        let cascade = params.cascade as usize;
        let current = harness.transforms.render_data(cascade).copied().expect("render data");
        let source = harness.transforms.source_data(cascade).copied().expect("source data");
        assert_eq!(params.transform.position, current.position);
        assert_eq!(params.transform.scale, current.scale);
        assert_eq!(params.source_transform.frame, source.frame);
        assert_eq!(params.source_transform.frame + 1, params.frame);
        assert_eq!(params.source_staleness, Staleness::Fresh);
        assert_eq!(params.jitter_diameters_current_frame_weights, Vec4::new(10.0, 1.5, 0.1, 0.4));
        assert!((params.delta_time - 1.0 / 60.0).abs() < 1e-6);
        assert_eq!(params.frame, harness.frame);
    }
}

#[test]
fn skipped_transform_updates_mark_sources_stale() {
    let mut harness = Harness::new(ShadowSimSettings::default(), LodConfig::new(2, 16));
    let light = sun();
    harness.step(Some(&light));
    harness.step(Some(&light));

    let staleness = |harness: &Harness| -> Vec<Staleness> {
        let list = harness.work_list(&light).expect("attached work-list");
        list.dispatches().iter().map(|command| command.params.source_staleness).collect()
    };

    // Frame 3 reuses frame 2's snapshots; frame 4 then sources them one frame late.
    harness.update_transforms = false;
    harness.step(Some(&light));
    harness.update_transforms = true;
    assert_eq!(harness.step(Some(&light)), FrameOutcome::Processed { dispatches: 2 });
    assert_eq!(staleness(&harness), vec![Staleness::Stale { frames: 1 }; 2]);

    // Frames 5 to 7 skipped: frame 8 sources frame 4 where frame 7 was expected.
    harness.update_transforms = false;
    for _ in 0..3 {
        harness.step(Some(&light));
    }
    harness.update_transforms = true;
    assert_eq!(harness.step(Some(&light)), FrameOutcome::Processed { dispatches: 2 });
    assert_eq!(staleness(&harness), vec![Staleness::Expired { frames: 3 }; 2]);
}

#[test]
fn pausing_detaches_and_leaves_textures_untouched() {
    let mut harness = Harness::new(ShadowSimSettings::default(), LodConfig::new(2, 16));
    let light = sun();
    harness.step_and_execute(&light);
    harness.step_and_execute(&light);
    let target = *harness.textures().targets();
    assert_eq!(harness.device.texel(target, 0)[0], 2.0);
    harness.device.take_clears();

    harness.process_data = false;
    assert_eq!(harness.step_and_execute(&light), FrameOutcome::Paused);
    assert_eq!(harness.step_and_execute(&light), FrameOutcome::Paused);
    assert_eq!(harness.hooks.total_attached(), 0);
    assert!(harness.device.take_clears().is_empty());
    assert_eq!(*harness.textures().targets(), target);
    assert_eq!(harness.device.texel(target, 0)[0], 2.0);

    // Resuming continues from the preserved history.
    harness.process_data = true;
    assert_eq!(harness.step_and_execute(&light), FrameOutcome::Processed { dispatches: 2 });
    assert_eq!(harness.hooks.total_attached(), 1);
    let target = *harness.textures().targets();
    assert_eq!(harness.device.texel(target, 0)[0], 3.0);
}

#[test]
fn missing_camera_disables_for_the_session() {
    let mut harness = Harness::new(ShadowSimSettings::default(), LodConfig::new(2, 16));
    let light = sun();
    harness.step(Some(&light));
    assert_eq!(harness.hooks.total_attached(), 1);

    harness.camera = false;
    assert_eq!(harness.step(Some(&light)), FrameOutcome::Disabled);
    assert_eq!(harness.hooks.total_attached(), 0);

    harness.camera = true;
    assert_eq!(harness.step(Some(&light)), FrameOutcome::Disabled);
    assert_eq!(harness.shadow.status(), &ShadowDataStatus::Disabled(ShadowDataError::MissingCamera));
    assert_eq!(harness.shadow.reports().count_of(&ShadowDataError::MissingCamera), 1);
    assert!(harness.shadow.binding(false).is_null());
}

#[test]
fn shading_binding_exposes_current_or_previous_results() {
    let mut harness = Harness::new(ShadowSimSettings::default(), LodConfig::new(2, 16));
    assert!(harness.shadow.binding(false).is_null());
    let light = sun();
    harness.step_and_execute(&light);

    let target = *harness.textures().targets();
    let source = *harness.textures().sources();
    match harness.shadow.binding(false) {
        ShadowBinding::Cascades { array, cascade_count, .. } => {
            assert_eq!(*array, target);
            assert_eq!(cascade_count, 2);
        }
        ShadowBinding::Null => panic!("expected cascades"),
    }
    match harness.shadow.binding(true) {
        ShadowBinding::Cascades { array, .. } => assert_eq!(*array, source),
        ShadowBinding::Null => panic!("expected cascades"),
    }
}
