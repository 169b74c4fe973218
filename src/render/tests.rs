use super::*;
use crate::association::SpaceRef;
use crate::color::{ColorScheme, NEUTRAL_COLOR};
use crate::scene::MemoryScene;
use crate::sensor::Quality;
use crate::sync::HeatmapSample;

const MAX_AGE: i64 = 300_000;
const NOW: i64 = 10_000_000;

struct Fixture {
    scene: MemoryScene,
    model: ModelRef,
    index: SpatialElementIndex,
    associations: AssociationStore,
    samples: SampleCache,
    config: HeatmapConfig,
}

fn fixture() -> Fixture {
    let scene = MemoryScene::new();
    let model = ModelRef::new("tower");
    for (id, guid) in [(1, "g1"), (2, "g2"), (3, "g3")] {
        scene.add_element(&model, "IfcSpace", id, Some(guid), Some(guid));
    }
    let mut index = SpatialElementIndex::new("IfcSpace", "Area");
    index.refresh(&scene, &[model.clone()]);

    let mut associations = AssociationStore::new();
    for (sensor, guid) in [("s1", "g1"), ("s2", "g2"), ("s3", "g3")] {
        associations.upsert(sensor, &SpaceRef::new(guid, guid)).unwrap();
    }

    Fixture {
        scene,
        model,
        index,
        associations,
        samples: SampleCache::new(),
        config: HeatmapConfig::default(),
    }
}

fn sample(guid: &str, sensor: &str, value: f64, timestamp: i64) -> HeatmapSample {
    HeatmapSample {
        space_guid: guid.to_string(),
        sensor_id: sensor.to_string(),
        value,
        sensor_type: "temperature".to_string(),
        quality: Quality::Good,
        timestamp,
    }
}

impl Fixture {
    fn apply(&self, renderer: &mut HeatmapRenderer) -> RenderReport {
        renderer.apply(
            &self.scene,
            &self.samples,
            &self.associations,
            &self.index,
            &self.config,
            NOW,
            MAX_AGE,
        )
    }
}

#[test]
fn test_apply_submits_all_and_redraws_once() {
    let mut f = fixture();
    f.samples.write(sample("g1", "s1", 18.0, NOW));
    f.samples.write(sample("g2", "s2", 24.0, NOW));
    f.samples.write(sample("g3", "s3", 30.0, NOW));
    let mut renderer = HeatmapRenderer::new();

    let report = f.apply(&mut renderer);

    assert_eq!(report.applied, 3);
    assert_eq!(report.redraws, 1);
    assert_eq!(f.scene.redraw_count(&f.model), 1);
    assert_eq!(f.scene.apply_calls(), 3);

    let hot = f.scene.overlay(&f.model, 3).unwrap();
    assert_eq!(hot.color, ColorScheme::Thermal.anchors()[5]);
    assert_eq!(hot.opacity, 0.7);
    assert!(hot.transparent);
    assert_eq!(renderer.color_for("g1"), Some(ColorScheme::Thermal.anchors()[0]));
}

#[test]
fn test_restore_record_captured_once_with_prior_state() {
    let mut f = fixture();
    let prior = OverlayStyle::new(NEUTRAL_COLOR, 1.0);
    f.scene.preset_overlay(&f.model, 1, prior);
    f.samples.write(sample("g1", "s1", 20.0, NOW));
    let mut renderer = HeatmapRenderer::new();

    f.apply(&mut renderer);
    f.samples.write(sample("g1", "s1", 28.0, NOW + 1));
    f.apply(&mut renderer);

    let key = ElementKey {
        model: f.model.clone(),
        local_id: 1,
    };
    let record = renderer.record(&key).unwrap();
    assert_eq!(record.prior_overlay, Some(prior));
    assert_eq!(renderer.record_count(), 1);
}

#[test]
fn test_clear_restores_to_no_overlay() {
    let mut f = fixture();
    f.scene
        .preset_overlay(&f.model, 1, OverlayStyle::new(NEUTRAL_COLOR, 1.0));
    f.samples.write(sample("g1", "s1", 20.0, NOW));
    f.samples.write(sample("g2", "s2", 20.0, NOW));
    let mut renderer = HeatmapRenderer::new();
    f.apply(&mut renderer);

    assert_eq!(renderer.clear(&f.scene), 2);

    assert_eq!(f.scene.overlay_count(), 0);
    assert_eq!(renderer.record_count(), 0);
    assert_eq!(renderer.color_for("g1"), None);
    assert_eq!(renderer.clear(&f.scene), 0);
}

#[test]
fn test_failed_element_does_not_abort_pass() {
    let mut f = fixture();
    f.scene.fail_element(&f.model, 2);
    f.samples.write(sample("g1", "s1", 20.0, NOW));
    f.samples.write(sample("g2", "s2", 20.0, NOW));
    f.samples.write(sample("g3", "s3", 20.0, NOW));
    let mut renderer = HeatmapRenderer::new();

    let report = f.apply(&mut renderer);

    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(f.scene.redraw_count(&f.model), 1);
    assert!(f.scene.overlay(&f.model, 3).is_some());

    // Never drawn, so nothing to restore for it
    assert_eq!(renderer.record_count(), 2);
    renderer.clear(&f.scene);
    assert_eq!(f.scene.overlay_count(), 0);
}

#[test]
fn test_stale_or_unlinked_samples_are_not_rendered() {
    let mut f = fixture();
    f.samples.write(sample("g1", "s1", 20.0, NOW - MAX_AGE - 1));
    f.samples.write(sample("g2", "s9", 20.0, NOW));
    f.samples.write(sample("unknown", "s1", 20.0, NOW));
    let mut renderer = HeatmapRenderer::new();

    let report = f.apply(&mut renderer);

    assert_eq!(report.applied, 0);
    assert_eq!(f.scene.overlay_count(), 0);
    assert_eq!(renderer.record_count(), 0);
}

#[test]
fn test_space_without_sample_is_blanked() {
    let mut f = fixture();
    f.samples.write(sample("g1", "s1", 20.0, NOW));
    f.samples.write(sample("g2", "s2", 20.0, NOW));
    let mut renderer = HeatmapRenderer::new();
    f.apply(&mut renderer);

    f.samples.remove_older_than(i64::MAX);
    f.samples.write(sample("g2", "s2", 21.0, NOW));
    let report = f.apply(&mut renderer);

    assert_eq!(report.blanked, 1);
    assert!(f.scene.overlay(&f.model, 1).is_none());
    assert!(f.scene.overlay(&f.model, 2).is_some());
    assert_eq!(f.scene.redraw_count(&f.model), 2);
}

#[test]
fn test_deactivated_association_blanks_space() {
    let mut f = fixture();
    f.samples.write(sample("g1", "s1", 20.0, NOW));
    let mut renderer = HeatmapRenderer::new();
    f.apply(&mut renderer);

    let id = f.associations.by_space("g1")[0].id.clone();
    f.associations.set_active(&id, false).unwrap();
    let report = f.apply(&mut renderer);

    assert_eq!(report.blanked, 1);
    assert_eq!(f.scene.overlay_count(), 0);
}

#[test]
fn test_config_change_recolors() {
    let mut f = fixture();
    f.samples.write(sample("g1", "s1", 30.0, NOW));
    let mut renderer = HeatmapRenderer::new();
    f.apply(&mut renderer);

    f.config.color_scheme = ColorScheme::Monochrome;
    f.config.opacity = 1.0;
    renderer.invalidate_colors();
    assert_eq!(renderer.color_for("g1"), None);
    f.apply(&mut renderer);

    let style = f.scene.overlay(&f.model, 1).unwrap();
    assert_eq!(style.color, ColorScheme::Monochrome.anchors()[5]);
    assert!(!style.transparent);
}

#[test]
fn test_redraw_once_per_model() {
    let mut f = fixture();
    let annex = ModelRef::new("annex");
    f.scene.add_element(&annex, "IfcSpace", 1, Some("g4"), Some("Annex"));
    f.index.refresh(&f.scene, &[f.model.clone(), annex.clone()]);
    f.associations.upsert("s4", &SpaceRef::new("g4", "Annex")).unwrap();

    f.samples.write(sample("g1", "s1", 20.0, NOW));
    f.samples.write(sample("g2", "s2", 20.0, NOW));
    f.samples.write(sample("g4", "s4", 20.0, NOW));
    let mut renderer = HeatmapRenderer::new();

    let report = f.apply(&mut renderer);

    assert_eq!(report.redraws, 2);
    assert_eq!(f.scene.redraw_count(&f.model), 1);
    assert_eq!(f.scene.redraw_count(&annex), 1);
}

#[test]
fn test_failed_blank_is_retried_by_clear() {
    let mut f = fixture();
    f.samples.write(sample("g1", "s1", 29.0, NOW));
    let mut renderer = HeatmapRenderer::new();
    f.apply(&mut renderer);

    f.scene.fail_clear_once(&f.model, 1);
    f.samples.clear();
    let report = f.apply(&mut renderer);

    assert_eq!(report.blanked, 0);
    assert!(f.scene.overlay(&f.model, 1).is_some());
    assert_eq!(renderer.record_count(), 1);

    assert_eq!(renderer.clear(&f.scene), 1);
    assert!(f.scene.overlay(&f.model, 1).is_none());
}

#[test]
fn test_failed_blank_is_retried_next_pass() {
    let mut f = fixture();
    f.samples.write(sample("g1", "s1", 20.0, NOW));
    let mut renderer = HeatmapRenderer::new();
    f.apply(&mut renderer);

    f.scene.fail_clear_once(&f.model, 1);
    f.samples.clear();
    f.apply(&mut renderer);
    let report = f.apply(&mut renderer);

    assert_eq!(report.blanked, 1);
    assert_eq!(f.scene.overlay_count(), 0);
    assert_eq!(renderer.record_count(), 0);
}

#[test]
fn test_failed_recolor_blanks_previous_color() {
    let mut f = fixture();
    f.samples.write(sample("g1", "s1", 18.0, NOW));
    let mut renderer = HeatmapRenderer::new();
    f.apply(&mut renderer);
    assert!(f.scene.overlay(&f.model, 1).is_some());

    f.scene.fail_element(&f.model, 1);
    f.samples.write(sample("g1", "s1", 30.0, NOW + 1));
    let report = f.apply(&mut renderer);

    assert_eq!(report.failed, 1);
    assert_eq!(report.blanked, 1);
    assert!(f.scene.overlay(&f.model, 1).is_none());
    assert_eq!(renderer.color_for("g1"), None);
    assert_eq!(renderer.record_count(), 0);
}
