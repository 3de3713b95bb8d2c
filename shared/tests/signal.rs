use shared::signal::{SignalClass, classify};

#[test]
fn bands_are_half_open_at_documented_thresholds() {
    assert_eq!(classify(Some(-25.0)), SignalClass::VeryWeak);
    assert_eq!(classify(Some(-20.01)), SignalClass::VeryWeak);
    assert_eq!(classify(Some(-20.0)), SignalClass::Weak);
    assert_eq!(classify(Some(-10.01)), SignalClass::Weak);
    assert_eq!(classify(Some(-10.0)), SignalClass::Moderate);
    assert_eq!(classify(Some(-0.5)), SignalClass::Moderate);
    assert_eq!(classify(Some(0.0)), SignalClass::Good);
    assert_eq!(classify(Some(4.99)), SignalClass::Good);
    assert_eq!(classify(Some(5.0)), SignalClass::Strong);
    assert_eq!(classify(Some(30.0)), SignalClass::Strong);
}

#[test]
fn missing_snr_is_unknown() {
    assert_eq!(classify(None), SignalClass::Unknown);
    assert_eq!(classify(Some(f64::NAN)), SignalClass::Unknown);
}

#[test]
fn weight_increases_with_signal_quality() {
    let ordered = [
        SignalClass::Unknown,
        SignalClass::VeryWeak,
        SignalClass::Weak,
        SignalClass::Moderate,
        SignalClass::Good,
        SignalClass::Strong,
    ];
    for pair in ordered.windows(2) {
        assert!(pair[0] < pair[1]);
        assert!(pair[0].weight() < pair[1].weight());
        assert_ne!(pair[0].color(), pair[1].color());
    }
}
