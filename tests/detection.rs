//! End-to-end tests against the public API: load a hand-written model file
//! in the cascade's plain-text format and exercise `Cascade::detect` over
//! synthetic images.

use cascade_detector::Cascade;
use std::io::Write;

fn write_model(contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!(
        "cascade-detector-test-{}-{}.model",
        std::process::id(),
        contents.len()
    ));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

/// S5: a cascade whose first stage has bias +inf rejects every window.
#[test]
fn infinite_bias_first_stage_yields_no_detections() {
    // window=24, 1 stage, 1 classifier (V2 8x8 at origin, arbitrary
    // threshold/polarity -- irrelevant, since bias is unreachable), weight 1.
    let model = "24 1\ninf 1\n0 0 4 8 0 0.0 1\n1.0\n";
    let path = write_model(model);
    let cascade = Cascade::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let gray = vec![200u8; 96 * 96];
    let detections = cascade.detect(&gray, 96, 96);
    assert!(detections.is_empty());
}

/// A classifier whose threshold is unreachably low accepts every window
/// regardless of pixel content, so scanning should find windows at every
/// scale that fits and clustering should collapse each scale's heavily
/// overlapping windows down to far fewer rectangles than the raw count.
#[test]
fn accept_everywhere_cascade_scans_multiple_scales_and_clusters() {
    let model = "24 1\n-1000000000.0 1\n0 0 4 8 0 -1000000000.0 1\n1.0\n";
    let path = write_model(model);
    let cascade = Cascade::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let gray = vec![100u8; 96 * 96];
    let detections = cascade.detect(&gray, 96, 96);

    assert!(!detections.is_empty());
    for rect in &detections {
        assert!(rect.y >= 0 && rect.x >= 0);
        assert!(rect.y + rect.h <= 96);
        assert!(rect.x + rect.w <= 96);
    }

    // Distinct window sizes correspond to distinct scales; an
    // always-accepting cascade should find more than one scale on a 96x96
    // image with a 24px base window (24, 30, 37, 48, 60, 75, 93...).
    let mut sizes: Vec<i64> = detections.iter().map(|r| r.h).collect();
    sizes.sort_unstable();
    sizes.dedup();
    assert!(sizes.len() > 1, "expected multiple scales, got {:?}", sizes);
}

/// Round-trip persistence (spec property 6): loading a saved model and
/// re-detecting on the same image gives bitwise identical rectangles.
#[test]
fn save_then_reload_gives_identical_detections() {
    let model = "24 1\n0.0 1\n0 0 4 8 0 0.0 1\n1.0\n";
    let path = write_model(model);
    let cascade = Cascade::load(&path).unwrap();

    let resaved = std::env::temp_dir().join(format!("cascade-detector-resave-{}.model", std::process::id()));
    cascade.save(&resaved).unwrap();
    let reloaded = Cascade::load(&resaved).unwrap();

    std::fs::remove_file(&path).ok();
    std::fs::remove_file(&resaved).ok();

    let gray: Vec<u8> = (0..64 * 64).map(|i| (i % 256) as u8).collect();
    assert_eq!(cascade.detect(&gray, 64, 64), reloaded.detect(&gray, 64, 64));
}
