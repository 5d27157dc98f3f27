//! Parameter system tests
//!
//! Name matching, delta suppression, zeroing and bit packing against a
//! declared set.

use common::{UnifiedExpressions, UnifiedTrackingData};
use glam::Vec2;
use vrft_d::osc::namespace::{DeclaredParameter, DeclaredParameters, ParamType, ParamValue, ParamWrite};
use vrft_d::osc::parameters::base_param::{BoolParam, FloatParam};
use vrft_d::osc::parameters::binary_param::BinaryBaseParameter;
use vrft_d::osc::parameters::eparam::EParam;
use vrft_d::osc::parameters::xy_param::XYParam;
use vrft_d::osc::parameters::Parameter;

fn declared(names: &[(&str, ParamType)]) -> DeclaredParameters {
    names
        .iter()
        .map(|(name, ty)| DeclaredParameter::new(*name, *ty))
        .collect()
}

fn jaw(value: f32) -> UnifiedTrackingData {
    let mut data = UnifiedTrackingData::default();
    data.set_weight(UnifiedExpressions::JawOpen, value);
    data
}

fn bool_at(writes: &[ParamWrite], name: &str) -> Option<bool> {
    writes.iter().find(|w| w.name == name).map(|w| match w.value {
        ParamValue::Bool(b) => b,
        other => panic!("expected bool for {}, got {:?}", name, other),
    })
}

mod address_matching {
    use super::*;

    #[test]
    fn exact_and_prefixed_names_wire() {
        let mut param = FloatParam::new("v2/EyeLeftX", |_| 0.0);
        let set = declared(&[
            ("v2/EyeLeftX", ParamType::Float),
            ("FT/v2/EyeLeftX", ParamType::Float),
            ("Custom/v2/EyeLeftX", ParamType::Float),
        ]);
        assert_eq!(param.reset(&set), 3);
    }

    #[test]
    fn nested_version_is_rejected() {
        let mut param = FloatParam::new("v2/EyeLeftX", |_| 0.0);
        let set = declared(&[("v1/v2/EyeLeftX", ParamType::Float)]);
        assert_eq!(param.reset(&set), 0);
        assert_eq!(param.names(), vec!["v2/EyeLeftX".to_string()]);
    }

    #[test]
    fn type_must_agree() {
        let mut float = FloatParam::new("v2/JawOpen", |_| 0.0);
        let mut flag = BoolParam::new("v2/JawOpen", |_| false);
        let set = declared(&[("v2/JawOpen", ParamType::Bool)]);

        assert_eq!(float.reset(&set), 0);
        assert_eq!(flag.reset(&set), 1);
    }
}

mod float_and_bool {
    use super::*;

    #[test]
    fn float_suppresses_small_changes() {
        let mut param = FloatParam::new("v2/JawOpen", |d| d.weight(UnifiedExpressions::JawOpen));
        param.reset(&declared(&[("v2/JawOpen", ParamType::Float)]));

        assert_eq!(param.process(&jaw(0.5)).len(), 1);
        assert!(param.process(&jaw(0.500001)).is_empty());
        assert_eq!(param.process(&jaw(0.6)).len(), 1);
    }

    #[test]
    fn reset_forgets_history() {
        let mut param = FloatParam::new("v2/JawOpen", |d| d.weight(UnifiedExpressions::JawOpen));
        let set = declared(&[("v2/JawOpen", ParamType::Float)]);
        param.reset(&set);
        param.process(&jaw(0.5));

        param.reset(&set);
        assert_eq!(param.process(&jaw(0.5)).len(), 1);
    }

    #[test]
    fn float_skips_non_finite() {
        let mut param = FloatParam::new("v2/JawOpen", |d| d.weight(UnifiedExpressions::JawOpen));
        param.reset(&declared(&[("v2/JawOpen", ParamType::Float)]));
        assert!(param.process(&jaw(f32::NAN)).is_empty());
    }

    #[test]
    fn bool_sends_on_flip_only() {
        let mut param = BoolParam::new("Open", |d| d.weight(UnifiedExpressions::JawOpen) > 0.5);
        param.reset(&declared(&[("Open", ParamType::Bool)]));

        assert_eq!(bool_at(&param.process(&jaw(0.9)), "Open"), Some(true));
        assert!(param.process(&jaw(0.8)).is_empty());
        assert_eq!(bool_at(&param.process(&jaw(0.1)), "Open"), Some(false));
    }

    #[test]
    fn zero_always_writes() {
        let mut float = FloatParam::new("v2/JawOpen", |_| 0.0);
        let mut flag = BoolParam::new("Open", |_| false);
        let set = declared(&[("v2/JawOpen", ParamType::Float), ("Open", ParamType::Bool)]);
        float.reset(&set);
        flag.reset(&set);

        float.process(&jaw(0.0));
        flag.process(&jaw(0.0));

        assert_eq!(
            float.zero(),
            vec![ParamWrite::float("v2/JawOpen", 0.0)]
        );
        assert_eq!(flag.zero(), vec![ParamWrite::bool("Open", false)]);
    }

    #[test]
    fn unwired_parameters_stay_silent() {
        let mut float = FloatParam::new("v2/JawOpen", |_| 1.0);
        float.reset(&DeclaredParameters::default());
        assert!(float.process(&jaw(1.0)).is_empty());
        assert!(float.zero().is_empty());
    }
}

mod binary {
    use super::*;

    fn signed_slots() -> DeclaredParameters {
        declared(&[
            ("JawOpen1", ParamType::Bool),
            ("JawOpen2", ParamType::Bool),
            ("JawOpen4", ParamType::Bool),
            ("JawOpen8", ParamType::Bool),
            ("JawOpenNegative", ParamType::Bool),
        ])
    }

    #[test]
    fn packs_sign_and_magnitude() {
        let mut param =
            BinaryBaseParameter::new("JawOpen", |d| d.weight(UnifiedExpressions::JawOpen));
        assert_eq!(param.reset(&signed_slots()), 5);
        assert_eq!(param.bit_width(), 4);
        assert_eq!(param.max_value(), 15);

        let writes = param.process(&jaw(-0.6));
        assert_eq!(writes[0].name, "JawOpenNegative");
        assert_eq!(bool_at(&writes, "JawOpenNegative"), Some(true));
        assert_eq!(bool_at(&writes, "JawOpen1"), Some(true));
        assert_eq!(bool_at(&writes, "JawOpen2"), Some(false));
        assert_eq!(bool_at(&writes, "JawOpen4"), Some(false));
        assert_eq!(bool_at(&writes, "JawOpen8"), Some(true));

        let magnitude: u32 = [("JawOpen1", 1), ("JawOpen2", 2), ("JawOpen4", 4), ("JawOpen8", 8)]
            .iter()
            .filter(|(name, _)| bool_at(&writes, name) == Some(true))
            .map(|(_, weight)| weight)
            .sum();
        let decoded = -(magnitude as f32) / 15.0;
        assert!((decoded - -0.6).abs() <= 1.0 / 15.0);
    }

    #[test]
    fn only_flipped_bits_are_resent() {
        let mut param =
            BinaryBaseParameter::new("JawOpen", |d| d.weight(UnifiedExpressions::JawOpen));
        param.reset(&signed_slots());

        param.process(&jaw(0.6));
        let writes = param.process(&jaw(0.6));
        assert!(writes.is_empty());

        // 9 -> 10 flips the two low bits only
        let writes = param.process(&jaw(0.67));
        let names: Vec<&str> = writes.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["JawOpen1", "JawOpen2"]);
    }

    #[test]
    fn non_power_of_two_slots_are_ignored() {
        let mut param = BinaryBaseParameter::new("JawOpen", |_| 1.0);
        let set = declared(&[("JawOpen1", ParamType::Bool), ("JawOpen3", ParamType::Bool)]);

        assert_eq!(param.reset(&set), 1);
        assert_eq!(param.bit_width(), 1);
        assert_eq!(param.names(), vec!["JawOpen1".to_string()]);
    }

    #[test]
    fn ft_prefix_is_accepted() {
        let mut param = BinaryBaseParameter::new("v2/JawOpen", |_| 1.0);
        let set = declared(&[("FT/v2/JawOpen1", ParamType::Bool), ("FT/v2/JawOpen2", ParamType::Bool)]);
        assert_eq!(param.reset(&set), 2);
        assert_eq!(param.max_value(), 3);
    }

    #[test]
    fn negative_without_sign_slot_emits_nothing() {
        let mut param =
            BinaryBaseParameter::new("JawOpen", |d| d.weight(UnifiedExpressions::JawOpen));
        param.reset(&declared(&[("JawOpen1", ParamType::Bool), ("JawOpen2", ParamType::Bool)]));

        assert!(param.process(&jaw(-0.5)).is_empty());
        assert_eq!(param.process(&jaw(0.5)).len(), 2);
    }

    #[test]
    fn sign_slot_alone_is_not_wired() {
        let mut param = BinaryBaseParameter::new("JawOpen", |_| -1.0);
        assert_eq!(param.reset(&declared(&[("JawOpenNegative", ParamType::Bool)])), 0);
        assert!(!param.has_negative());
        assert_eq!(param.names(), vec!["JawOpen".to_string()]);
    }

    #[test]
    fn every_declared_sign_slot_is_written() {
        let mut param =
            BinaryBaseParameter::new("JawOpen", |d| d.weight(UnifiedExpressions::JawOpen));
        let set = declared(&[
            ("JawOpen1", ParamType::Bool),
            ("JawOpenNegative", ParamType::Bool),
            ("FT/JawOpenNegative", ParamType::Bool),
        ]);
        assert_eq!(param.reset(&set), 3);

        let writes = param.process(&jaw(-1.0));
        assert_eq!(bool_at(&writes, "JawOpenNegative"), Some(true));
        assert_eq!(bool_at(&writes, "FT/JawOpenNegative"), Some(true));
        assert_eq!(bool_at(&writes, "JawOpen1"), Some(true));
        assert_eq!(param.zero().len(), 3);
    }

    #[test]
    fn zero_clears_every_slot() {
        let mut param = BinaryBaseParameter::new("JawOpen", |_| -1.0);
        param.reset(&signed_slots());
        param.process(&jaw(0.0));

        let writes = param.zero();
        assert_eq!(writes.len(), 5);
        assert!(writes.iter().all(|w| w.value == ParamValue::Bool(false)));
    }
}

mod composites {
    use super::*;

    #[test]
    fn xy_writes_both_axes() {
        let mut param = XYParam::new("EyesX", "EyesY", |_| Vec2::new(0.25, -0.5));
        let set = declared(&[("EyesX", ParamType::Float), ("EyesY", ParamType::Float)]);
        assert_eq!(param.reset(&set), 2);

        let writes = param.process(&UnifiedTrackingData::default());
        assert_eq!(
            writes,
            vec![ParamWrite::float("EyesX", 0.25), ParamWrite::float("EyesY", -0.5)]
        );
        assert_eq!(param.zero().len(), 2);
    }

    #[test]
    fn eparam_lands_on_every_declared_type() {
        let mut param =
            EParam::expression("v2/JawOpen", |d| d.weight(UnifiedExpressions::JawOpen));
        let set = declared(&[
            ("v2/JawOpen", ParamType::Float),
            ("FT/v2/JawOpen", ParamType::Bool),
            ("v2/JawOpen1", ParamType::Bool),
            ("v2/JawOpen2", ParamType::Bool),
        ]);
        assert_eq!(param.reset(&set), 4);

        let writes = param.process(&jaw(1.0));
        assert!(writes.contains(&ParamWrite::float("v2/JawOpen", 1.0)));
        assert_eq!(bool_at(&writes, "FT/v2/JawOpen"), Some(false));
        assert_eq!(bool_at(&writes, "v2/JawOpen1"), Some(true));
        assert_eq!(bool_at(&writes, "v2/JawOpen2"), Some(true));

        let names = param.names();
        assert!(names.contains(&"v2/JawOpen1".to_string()));
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn simple_threshold_drives_bool_view() {
        let mut param = EParam::simple("v2/EyeOpen", |d| d.eye.left.openness);
        param.reset(&declared(&[("v2/EyeOpen", ParamType::Bool)]));

        let mut data = UnifiedTrackingData::default();
        data.eye.left.openness = 0.2;
        assert_eq!(bool_at(&param.process(&data), "v2/EyeOpen"), Some(true));
        data.eye.left.openness = 0.8;
        assert_eq!(bool_at(&param.process(&data), "v2/EyeOpen"), Some(false));
    }

    #[test]
    fn skipped_binary_view_never_wires_slots() {
        let mut param = EParam::new("v2/JawOpen", |_| 1.0, 0.5, true);
        let set = declared(&[("v2/JawOpen1", ParamType::Bool)]);
        assert_eq!(param.reset(&set), 0);
    }
}
