//! End-to-end tests for the `Stacker` facade, covering multi-frame
//! registration, drift gating, calibration and rendering scenarios.

use astrostack::{Frame, Rect, Stacker, StackerConfig};

fn gaussian_spot_bytes(width: usize, height: usize, cx: f32, cy: f32) -> Vec<u8> {
    let mut bytes = vec![0u8; width * height * 3];
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let v = (-(dx * dx + dy * dy) / (2.0 * 8.0 * 8.0)).exp();
            let byte = (v * 255.0).round() as u8;
            let idx = (y * width + x) * 3;
            bytes[idx] = byte;
            bytes[idx + 1] = byte;
            bytes[idx + 2] = byte;
        }
    }
    bytes
}

#[test]
fn test_single_frame_is_identity_through_the_pipeline() {
    let config = StackerConfig::new(16, 16, -1, -1, 0);
    let mut stacker = Stacker::new(config).unwrap();
    let bytes = gaussian_spot_bytes(16, 16, 8.0, 8.0);
    assert!(stacker.stack_image(&bytes, 0.0, false).unwrap());
    assert_eq!(stacker.frames_accepted(), 1);
    assert_eq!(stacker.fully_stacked_area(), Rect::full(16, 16));
}

#[test]
fn test_get_stacked_before_any_frame_is_all_zero() {
    let config = StackerConfig::new(16, 16, -1, -1, 0);
    let stacker = Stacker::new(config).unwrap();
    assert!(stacker.get_stacked().iter().all(|&b| b == 0));
}

#[test]
fn test_translated_pair_registers_known_shift() {
    let config = StackerConfig::new(64, 64, -1, -1, 64);
    let mut stacker = Stacker::new(config).unwrap();

    let reference = gaussian_spot_bytes(64, 64, 32.0, 32.0);
    assert!(stacker.stack_image(&reference, 0.0, false).unwrap());
    assert_eq!(stacker.fully_stacked_area(), Rect::full(64, 64));

    let moved = gaussian_spot_bytes(64, 64, 36.0, 29.0);
    assert!(stacker.stack_image(&moved, 0.0, false).unwrap());

    // The moved frame is offset by (+4, -3); accumulator space shrinks by
    // that much on the corresponding edges.
    let area = stacker.fully_stacked_area();
    assert_eq!(area.width, 60);
    assert_eq!(area.height, 61);
    assert_eq!(stacker.frames_accepted(), 2);
}

#[test]
fn test_drift_gate_rejects_then_recovers_on_restart() {
    let config = StackerConfig::new(64, 64, -1, -1, 64);
    let mut stacker = Stacker::new(config).unwrap();

    let reference = gaussian_spot_bytes(64, 64, 32.0, 32.0);
    assert!(stacker.stack_image(&reference, 0.0, false).unwrap());

    // A couple of small, identical steps anchor the gate with a tiny
    // running step average, so a later wild jump reliably exceeds it.
    let small_step = gaussian_spot_bytes(64, 64, 36.0, 29.0);
    assert!(stacker.stack_image(&small_step, 0.0, false).unwrap());
    assert!(stacker.stack_image(&small_step, 0.0, false).unwrap());
    assert_eq!(stacker.frames_accepted(), 3);

    // An implausibly large jump, repeated past the gate's missed-frame
    // limit, is rejected every single time -- `missed_frames` only ever
    // climbs, so without `restart` the gate never recovers on its own.
    let wild_jump = gaussian_spot_bytes(64, 64, 60.0, 2.0);
    for _ in 0..7 {
        assert!(!stacker.stack_image(&wild_jump, 0.0, false).unwrap());
    }
    assert_eq!(stacker.frames_accepted(), 3);

    // `restart` force-accepts the jump and re-anchors the gate there.
    assert!(stacker.stack_image(&wild_jump, 0.0, true).unwrap());
    assert_eq!(stacker.frames_accepted(), 4);

    // A frame right at the new anchor is accepted normally again.
    assert!(stacker.stack_image(&wild_jump, 0.0, false).unwrap());
    assert_eq!(stacker.frames_accepted(), 5);
}

#[test]
fn test_dark_subtraction_changes_accumulated_value() {
    let config = StackerConfig::new(2, 2, -1, -1, 0);
    let mut stacker = Stacker::new(config).unwrap();
    stacker.set_darks(&[20u8; 2 * 2 * 3]).unwrap();

    let bytes = vec![100u8; 2 * 2 * 3];
    assert!(stacker.stack_image(&bytes, 0.0, false).unwrap());

    // With gamma 1.0, pixel' = 100/255 - 20/255; rendered explicit mode
    // with tgt_gamma=1.0 should show the same value in every channel.
    stacker.set_target_gamma(1.0);
    let rendered = stacker.get_stacked();
    assert!(rendered.iter().all(|&b| b == rendered[0]));
}

#[test]
fn test_pre_averaging_batches_frames_before_registration() {
    let config = StackerConfig::new(8, 8, -1, -1, 0).with_exp_multiplier(3);
    let mut stacker = Stacker::new(config).unwrap();
    let bytes = vec![60u8; 8 * 8 * 3];

    assert!(!stacker.stack_image(&bytes, 0.0, false).unwrap());
    assert!(!stacker.stack_image(&bytes, 0.0, false).unwrap());
    assert!(stacker.stack_image(&bytes, 0.0, false).unwrap());
    assert_eq!(stacker.frames_accepted(), 1);
}

#[test]
fn test_auto_stretch_is_monotonic_in_accumulated_brightness() {
    let config = StackerConfig::new(4, 4, -1, -1, 0);

    let mut dim = Stacker::new(config.clone()).unwrap();
    dim.stack_image(&vec![40u8; 4 * 4 * 3], 0.0, false).unwrap();

    let mut bright = Stacker::new(config).unwrap();
    bright.stack_image(&vec![200u8; 4 * 4 * 3], 0.0, false).unwrap();

    let dim_out = dim.get_stacked();
    let bright_out = bright.get_stacked();
    assert!(bright_out[0] >= dim_out[0]);
}

#[test]
fn test_roi_size_zero_disables_registration_and_keeps_full_area() {
    let config = StackerConfig::new(10, 10, -1, -1, 0);
    let mut stacker = Stacker::new(config).unwrap();
    let bytes = vec![1u8; 10 * 10 * 3];
    stacker.stack_image(&bytes, 0.0, false).unwrap();
    stacker.stack_image(&bytes, 0.0, false).unwrap();
    assert_eq!(stacker.fully_stacked_area(), Rect::full(10, 10));
}

#[test]
fn test_darks_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("darks.flt");

    let config = StackerConfig::new(2, 2, -1, -1, 0);
    let mut producer = Stacker::new(config.clone()).unwrap();
    producer.stack_image(&vec![80u8; 2 * 2 * 3], 0.0, false).unwrap();
    producer.save_stacked_darks(&path).unwrap();

    let mut consumer = Stacker::new(config).unwrap();
    consumer.load_darks(&path).unwrap();
    // No panics, no size-mismatch errors on a legitimate round-trip file.
    assert!(consumer.error().is_none());
}

#[test]
fn test_frame_from_bytes_matches_manual_scaling() {
    let bytes = [255u8, 0, 128];
    let frame = Frame::from_bytes(1, 1, &bytes);
    assert!((frame.data[0] - 1.0).abs() < 1e-6);
    assert_eq!(frame.data[1], 0.0);
}
