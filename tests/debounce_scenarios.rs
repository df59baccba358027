use occupancy_witness::{
    DebounceConfig, DebounceDetector, Detection, ScriptedBackend, TargetCount, TargetState,
};

fn detector() -> DebounceDetector {
    DebounceDetector::new(DebounceConfig::default()).expect("default config is valid")
}

fn counts(person: u32, cat: u32) -> TargetCount {
    TargetCount::from_pairs(&[("person", person), ("cat", cat)])
}

fn feed(detector: &mut DebounceDetector, frame: &[Detection], times: usize) -> Vec<TargetCount> {
    (0..times).filter_map(|_| detector.update(frame)).collect()
}

#[test]
fn person_settles_after_fifteen_frames() {
    let mut detector = detector();
    let frame = vec![Detection::new("person", 0.8)];

    for _ in 0..14 {
        assert_eq!(detector.update(&frame), None);
    }
    assert_eq!(detector.state("person"), Some(TargetState::Unstable));

    let emitted = detector.update(&frame).expect("15th frame emits");
    assert_eq!(emitted, counts(1, 0));
    assert_eq!(
        serde_json::to_string(&emitted).unwrap(),
        r#"{"person":1,"cat":0}"#
    );

    // Streaks were reset by the emission and the tally matches the new baseline.
    assert_eq!(detector.update(&frame), None);
    assert_eq!(detector.streak("person"), Some(1));
    assert!(feed(&mut detector, &frame, 30).is_empty());
}

#[test]
fn low_confidence_detections_are_ignored() {
    let mut detector = detector();
    let frame = vec![
        Detection::new("person", 0.4),
        Detection::new("cat", 0.9),
        Detection::new("dog", 0.99),
    ];

    let emitted = feed(&mut detector, &frame, 15);
    assert_eq!(emitted, vec![counts(0, 1)]);
}

#[test]
fn threshold_is_inclusive() {
    let mut detector = detector();
    let frame = vec![Detection::new("person", 0.6)];
    assert_eq!(feed(&mut detector, &frame, 15), vec![counts(1, 0)]);
}

#[test]
fn stable_tally_equal_to_baseline_never_emits() {
    let mut detector = detector();
    let frame = vec![Detection::new("person", 0.3)];

    // Non-empty but fully filtered: an all-zero tally, equal to the initial baseline.
    assert!(feed(&mut detector, &frame, 100).is_empty());
    assert_eq!(detector.last_emitted(), &counts(0, 0));
    assert_eq!(detector.state("person"), Some(TargetState::Stable));
}

#[test]
fn empty_frame_resets_streaks() {
    let mut detector = detector();
    let frame = vec![Detection::new("person", 0.9)];

    assert!(feed(&mut detector, &frame, 14).is_empty());
    assert_eq!(detector.update(&[]), None);
    assert_eq!(detector.streak("person"), Some(0));
    assert_eq!(detector.streak("cat"), Some(0));

    // Streaks restart from 0: 14 more frames are not enough, the 15th is.
    assert!(feed(&mut detector, &frame, 14).is_empty());
    assert_eq!(detector.update(&frame), Some(counts(1, 0)));
}

#[test]
fn flicker_delays_emission() {
    let mut detector = detector();
    let person = vec![Detection::new("person", 0.9)];
    let cat = vec![Detection::new("cat", 0.9)];

    // Both targets change every frame, so neither streak can build.
    for _ in 0..10 {
        assert_eq!(detector.update(&cat), None);
        assert_eq!(detector.update(&person), None);
    }
    assert_eq!(detector.streak("person"), Some(1));
    assert_eq!(detector.streak("cat"), Some(1));

    let emitted = feed(&mut detector, &cat, 15);
    assert_eq!(emitted, vec![counts(0, 1)]);
}

#[test]
fn departure_is_reported_after_settling() {
    let mut detector = detector();
    let present = vec![Detection::new("cat", 0.95)];
    let gone = vec![Detection::new("chair", 0.9)];

    assert_eq!(feed(&mut detector, &present, 15), vec![counts(0, 1)]);
    assert_eq!(feed(&mut detector, &gone, 15), vec![counts(0, 0)]);
    assert_eq!(detector.last_emitted(), &counts(0, 0));
}

#[test]
fn any_settled_target_triggers_full_tally() {
    let mut detector = detector();
    // cat stays at 0 and settles first; person keeps changing.
    for i in 0..15u32 {
        let frame: Vec<Detection> = (0..=(i % 2))
            .map(|_| Detection::new("person", 0.9))
            .collect();
        if let Some(emitted) = detector.update(&frame) {
            assert_eq!(i, 14);
            assert_eq!(emitted, counts(1, 0));
            return;
        }
    }
    panic!("expected an emission once the cat streak settled");
}

#[test]
fn threshold_change_applies_to_later_frames() {
    let mut detector = detector();
    let frame = vec![Detection::new("person", 0.5)];

    assert!(feed(&mut detector, &frame, 5).is_empty());
    detector.set_threshold(0.5).unwrap();
    assert!((detector.threshold() - 0.5).abs() < f32::EPSILON);
    assert_eq!(feed(&mut detector, &frame, 15), vec![counts(1, 0)]);

    assert!(detector.set_threshold(-0.1).is_err());
    assert!((detector.threshold() - 0.5).abs() < f32::EPSILON);
}

#[test]
fn scripted_backend_replays_recorded_session() {
    use occupancy_witness::{DetectorBackend, Frame, PixelFormat};

    let script = r#"[
        [{"label": "person", "confidence": 0.82}],
        [{"label": "person", "confidence": 0.79}, {"label": "cat", "confidence": 0.2}]
    ]"#;
    let mut backend = ScriptedBackend::from_json_str(script).unwrap();
    let frame = Frame::new(vec![0; 3], 1, 1, PixelFormat::Rgb24).unwrap();
    let mut detector = DebounceDetector::new(DebounceConfig {
        required_streak: 4,
        ..DebounceConfig::default()
    })
    .unwrap();

    let mut emitted = Vec::new();
    for _ in 0..10 {
        let detections = backend.detect(&frame).unwrap();
        emitted.extend(detector.update(&detections));
    }
    assert_eq!(emitted, vec![counts(1, 0)]);
}
