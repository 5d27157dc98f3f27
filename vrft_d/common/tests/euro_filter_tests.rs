use common::EuroFilter;

#[test]
fn test_first_sample_passes_through() {
    let mut filter = EuroFilter::new();
    assert_eq!(filter.filter(100.0, 0.1), 100.0);
}

#[test]
fn test_step_is_smoothed() {
    let mut filter = EuroFilter::new();
    filter.filter(0.0, 0.1);

    let out = filter.filter(1.0, 0.1);
    assert!(out > 0.0);
    assert!(out < 1.0);
}

#[test]
fn test_converges_on_constant_input() {
    let mut filter = EuroFilter::from_smoothness(0.5);
    filter.filter(0.0, 0.01);

    let mut out = 0.0;
    for _ in 0..2000 {
        out = filter.filter(1.0, 0.01);
    }
    assert!((out - 1.0).abs() < 1e-3);
}

#[test]
fn test_nan_yields_zero() {
    let mut filter = EuroFilter::new();
    assert_eq!(filter.filter(f32::NAN, 0.1), 0.0);
}

#[test]
fn test_non_positive_dt_does_not_produce_nan() {
    let mut filter = EuroFilter::new();
    filter.filter(0.2, 0.0);
    let out = filter.filter(0.8, 0.0);
    assert!(out.is_finite());
}

#[test]
fn test_reset_forgets_history() {
    let mut filter = EuroFilter::from_smoothness(0.9);
    filter.filter(0.0, 0.01);
    filter.filter(0.1, 0.01);

    filter.reset();
    assert_eq!(filter.filter(0.7, 0.01), 0.7);
}

#[test]
fn test_heavier_smoothness_lags_more() {
    let mut light = EuroFilter::from_smoothness(0.1);
    let mut heavy = EuroFilter::from_smoothness(0.9);
    light.filter(0.0, 0.01);
    heavy.filter(0.0, 0.01);

    let light_out = light.filter(1.0, 0.01);
    let heavy_out = heavy.filter(1.0, 0.01);
    assert!(heavy_out < light_out);
}
