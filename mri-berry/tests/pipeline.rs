use mri_berry::morph::label_components;
use mri_berry::prelude::*;
use mri_berry::segment::{grow_region, TumorSegmenter};
use ndarray::Array3;

const N: usize = 24;

/// 平滑的 "脑" 加上强度为 120 的 8³ 肿瘤块 `[9, 17)³`.
fn phantom() -> MriScan {
    let data = Array3::from_shape_fn((N, N, N), |(z, h, w)| {
        let in_tumor = [z, h, w].iter().all(|c| (9..17).contains(c));
        if in_tumor {
            return 120.0;
        }
        let r2 = [z, h, w].iter().map(|&c| (c as f64 - 12.0).powi(2)).sum::<f64>();
        (60.0 * (-r2 / 80.0).exp()) as f32
    });
    MriScan::new(data, [1.0; 3], [0.0; 3]).unwrap()
}

#[test]
fn test_identical_volumes_end_to_end() {
    let _ = simple_logger::SimpleLogger::new().with_level(log::LevelFilter::Info).init();
    let fixed = phantom();
    let moving = phantom();

    let out = register(&fixed, &moving, &RegistrationConfig::default()).unwrap();
    assert_eq!(out.registered.geometry(), fixed.geometry());
    assert!(out.transform.angle() < 0.01);
    assert!(out.transform.translation().iter().all(|t| t.abs() < 0.1));

    let params = TumorParams::default();
    let (fixed_tumor, seed) = segment_tumor(&fixed, Some(SeedPoint::new(12, 12, 12)), &params).unwrap();
    let (registered_tumor, _) = segment_tumor(&out.registered, Some(seed), &params).unwrap();
    assert_eq!(fixed_tumor.count_foreground(), 512 - 8);

    let report = Report::compute(&fixed, &out.registered, &fixed_tumor, &registered_tumor).unwrap();
    assert!(report.dice > 0.95, "dice = {}", report.dice);
    assert_eq!(report.fixed_volume, 504.0);

    let brain = segment_foreground(&fixed, &ForegroundParams::default());
    assert!(!brain.is_background());
    assert_eq!(label_components(&brain).len(), 1);
}

#[test]
fn test_registered_keeps_fixed_grid() {
    let fixed = phantom();
    let data = Array3::from_shape_fn((10, 20, 14), |(z, h, w)| ((z * 7 + h * 3 + w) % 50) as f32);
    let moving = MriScan::new(data, [2.5, 1.2, 1.7], [-3.0, 4.0, 2.0]).unwrap();
    let config = RegistrationConfig {
        max_iterations: 3,
        ..Default::default()
    };
    let out = register(&fixed, &moving, &config).unwrap();
    assert_eq!(out.registered.geometry(), fixed.geometry());
    assert_eq!(out.registered.shape(), fixed.shape());
}

#[test]
fn test_grow_fills_exactly_the_uniform_block() {
    let v = phantom();
    let window = TumorParams::default().window(120.0);
    let grown = grow_region(&v, (12, 12, 12), &window);
    assert_eq!(grown.count_foreground(), 512);
    assert!(grown
        .foreground_pos()
        .iter()
        .all(|&(z, h, w)| [z, h, w].iter().all(|c| (9..17).contains(c))));
}

#[test]
fn test_tumor_segmentation_is_deterministic() {
    let v = phantom();
    let seed = Some(SeedPoint::new(10, 14, 11));
    let a = segment_tumor(&v, seed, &TumorParams::default()).unwrap();
    let b = segment_tumor(&v, seed, &TumorParams::default()).unwrap();
    assert_eq!(a.0, b.0);
}

#[test]
fn test_isolated_seed_reports_stage_and_volume() {
    let mut v = phantom();
    v[(2, 2, 2)] = 500.0;
    let err = TumorSegmenter::new(TumorParams::default())
        .volume_tag(VolumeTag::registered())
        .run(&v, Some(SeedPoint::new(2, 2, 2)), None)
        .unwrap_err();
    assert_eq!(err.stage(), Stage::SegmentTumor);
    let msg = err.to_string();
    assert!(msg.contains("registered"), "{msg}");
    assert!(msg.contains("(2, 2, 2)"), "{msg}");
}

#[test]
fn test_missing_seed() {
    let err = segment_tumor(&phantom(), None, &TumorParams::default()).unwrap_err();
    assert!(matches!(err, PipelineError::MissingSeed { .. }));
}

#[test]
fn test_dice_and_volume() {
    let v = phantom();
    let (m, _) = segment_tumor(&v, Some(SeedPoint::new(12, 12, 12)), &TumorParams::default()).unwrap();
    assert_eq!(dice(&m, &m).unwrap(), 1.0);

    let mut other = Mask::background(*m.geometry());
    other[(0, 0, 0)] = MASK_FOREGROUND;
    assert_eq!(dice(&m, &other).unwrap(), 0.0);

    let mut cube = Mask::background(Geometry::unit((12, 12, 12)));
    for z in 1..11 {
        for h in 1..11 {
            for w in 1..11 {
                cube[(z, h, w)] = MASK_FOREGROUND;
            }
        }
    }
    assert_eq!(volume_mm3(&cube), 1000.0);
}
