use super::base_param::BoolParam;
use super::eparam::EParam;
use super::unified_expressions::create_unified_expression_params;
use super::xy_param::XYParam;
use super::Parameter;
use crate::osc::namespace::{DeclaredParameters, ParamType, ParamWrite};
use common::{TrackingStatus, UnifiedExpressions as U, UnifiedTrackingData};
use log::{debug, info};

/// Tracking subsystem a parameter draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Eye,
    Expression,
    Either,
}

impl Subsystem {
    pub fn is_active(self, status: TrackingStatus) -> bool {
        match self {
            Self::Eye => status.eye,
            Self::Expression => status.expression,
            Self::Either => status.any(),
        }
    }
}

struct Entry {
    subsystem: Subsystem,
    parameter: Box<dyn Parameter>,
    wired: usize,
    live: bool,
}

struct StatusFlag {
    param: BoolParam,
    read: fn(TrackingStatus) -> bool,
}

/// Channel groups averaged into one output.
const AVERAGES: &[(&str, &[U])] = &[
    ("v2/BrowInnerUp", &[U::BrowInnerUpLeft, U::BrowInnerUpRight]),
    ("v2/BrowOuterUp", &[U::BrowOuterUpLeft, U::BrowOuterUpRight]),
    ("v2/CheekSquint", &[U::CheekSquintLeft, U::CheekSquintRight]),
    ("v2/CheekSuck", &[U::CheekSuckLeft, U::CheekSuckRight]),
    ("v2/NoseSneer", &[U::NoseSneerLeft, U::NoseSneerRight]),
    ("v2/MouthUpperUp", &[U::MouthUpperUpLeft, U::MouthUpperUpRight]),
    ("v2/MouthLowerDown", &[U::MouthLowerDownLeft, U::MouthLowerDownRight]),
    ("v2/MouthStretch", &[U::MouthStretchLeft, U::MouthStretchRight]),
    ("v2/MouthDimple", &[U::MouthDimpleLeft, U::MouthDimpleRight]),
    ("v2/MouthPress", &[U::MouthPressLeft, U::MouthPressRight]),
    ("v2/MouthTightener", &[U::MouthTightenerLeft, U::MouthTightenerRight]),
    ("v2/LipSuckUpper", &[U::LipSuckUpperLeft, U::LipSuckUpperRight]),
    ("v2/LipSuckLower", &[U::LipSuckLowerLeft, U::LipSuckLowerRight]),
    (
        "v2/LipSuck",
        &[
            U::LipSuckUpperLeft,
            U::LipSuckUpperRight,
            U::LipSuckLowerLeft,
            U::LipSuckLowerRight,
        ],
    ),
    ("v2/LipFunnelUpper", &[U::LipFunnelUpperLeft, U::LipFunnelUpperRight]),
    ("v2/LipFunnelLower", &[U::LipFunnelLowerLeft, U::LipFunnelLowerRight]),
    (
        "v2/LipFunnel",
        &[
            U::LipFunnelUpperLeft,
            U::LipFunnelUpperRight,
            U::LipFunnelLowerLeft,
            U::LipFunnelLowerRight,
        ],
    ),
    ("v2/LipPuckerUpper", &[U::LipPuckerUpperLeft, U::LipPuckerUpperRight]),
    ("v2/LipPuckerLower", &[U::LipPuckerLowerLeft, U::LipPuckerLowerRight]),
    ("v2/LipPuckerLeft", &[U::LipPuckerUpperLeft, U::LipPuckerLowerLeft]),
    ("v2/LipPuckerRight", &[U::LipPuckerUpperRight, U::LipPuckerLowerRight]),
    (
        "v2/LipPucker",
        &[
            U::LipPuckerUpperLeft,
            U::LipPuckerUpperRight,
            U::LipPuckerLowerLeft,
            U::LipPuckerLowerRight,
        ],
    ),
];

/// Signed axes: mean of the first group minus mean of the second.
const AXES: &[(&str, &[U], &[U])] = &[
    ("v2/JawX", &[U::JawRight], &[U::JawLeft]),
    ("v2/JawZ", &[U::JawForward], &[U::JawBackward]),
    ("v2/CheekPuffSuckLeft", &[U::CheekPuffLeft], &[U::CheekSuckLeft]),
    ("v2/CheekPuffSuckRight", &[U::CheekPuffRight], &[U::CheekSuckRight]),
    (
        "v2/CheekPuffSuck",
        &[U::CheekPuffLeft, U::CheekPuffRight],
        &[U::CheekSuckLeft, U::CheekSuckRight],
    ),
    ("v2/MouthUpperX", &[U::MouthUpperRight], &[U::MouthUpperLeft]),
    ("v2/MouthLowerX", &[U::MouthLowerRight], &[U::MouthLowerLeft]),
    (
        "v2/MouthX",
        &[U::MouthUpperRight, U::MouthLowerRight],
        &[U::MouthUpperLeft, U::MouthLowerLeft],
    ),
    (
        "v2/LipSuckFunnelUpper",
        &[U::LipSuckUpperLeft, U::LipSuckUpperRight],
        &[U::LipFunnelUpperLeft, U::LipFunnelUpperRight],
    ),
    (
        "v2/LipSuckFunnelLower",
        &[U::LipSuckLowerLeft, U::LipSuckLowerRight],
        &[U::LipFunnelLowerLeft, U::LipFunnelLowerRight],
    ),
    ("v2/TongueX", &[U::TongueRight], &[U::TongueLeft]),
    ("v2/TongueY", &[U::TongueUp], &[U::TongueDown]),
    ("v2/TongueArchY", &[U::TongueCurlUp], &[U::TongueBendDown]),
    ("v2/TongueShape", &[U::TongueFlat], &[U::TongueSquish]),
];

fn mean(d: &UnifiedTrackingData, group: &[U]) -> f32 {
    if group.is_empty() {
        return 0.0;
    }
    group.iter().map(|&e| d.weight(e)).sum::<f32>() / group.len() as f32
}

fn smile(d: &UnifiedTrackingData, pull: U, slant: U) -> f32 {
    d.weight(pull) * 0.8 + d.weight(slant) * 0.2
}

fn smile_left(d: &UnifiedTrackingData) -> f32 {
    smile(d, U::MouthCornerPullLeft, U::MouthCornerSlantLeft)
}

fn smile_right(d: &UnifiedTrackingData) -> f32 {
    smile(d, U::MouthCornerPullRight, U::MouthCornerSlantRight)
}

fn sad_left(d: &UnifiedTrackingData) -> f32 {
    d.weight(U::MouthFrownLeft).max(d.weight(U::MouthStretchLeft))
}

fn sad_right(d: &UnifiedTrackingData) -> f32 {
    d.weight(U::MouthFrownRight).max(d.weight(U::MouthStretchRight))
}

fn brow_up(d: &UnifiedTrackingData, outer: U, inner: U) -> f32 {
    d.weight(outer) * 0.6 + d.weight(inner) * 0.4
}

fn brow_down(d: &UnifiedTrackingData, lowerer: U, pinch: U) -> f32 {
    d.weight(lowerer) * 0.75 + d.weight(pinch) * 0.25
}

fn brow_expression_left(d: &UnifiedTrackingData) -> f32 {
    brow_up(d, U::BrowOuterUpLeft, U::BrowInnerUpLeft).min(1.0)
        - brow_down(d, U::BrowLowererLeft, U::BrowPinchLeft)
}

fn brow_expression_right(d: &UnifiedTrackingData) -> f32 {
    brow_up(d, U::BrowOuterUpRight, U::BrowInnerUpRight).min(1.0)
        - brow_down(d, U::BrowLowererRight, U::BrowPinchRight)
}

fn eye_lid(openness: f32, wide: f32) -> f32 {
    openness * 0.75 + wide * 0.25
}

/// Every live parameter, each tagged with the subsystem it reads from.
pub struct ParameterRegistry {
    flags: Vec<StatusFlag>,
    entries: Vec<Entry>,
}

impl ParameterRegistry {
    pub fn empty() -> Self {
        Self {
            flags: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.flags = vec![
            StatusFlag {
                param: BoolParam::manual("EyeTrackingActive"),
                read: |s| s.eye,
            },
            StatusFlag {
                param: BoolParam::manual("ExpressionTrackingActive"),
                read: |s| s.expression,
            },
            StatusFlag {
                param: BoolParam::manual("LipTrackingActive"),
                read: |s| s.expression,
            },
        ];

        registry.add_eye_params();
        registry.add_face_params();

        for param in create_unified_expression_params() {
            registry.push(Subsystem::Expression, Box::new(param));
        }
        registry
    }

    pub fn push(&mut self, subsystem: Subsystem, parameter: Box<dyn Parameter>) {
        self.entries.push(Entry {
            subsystem,
            parameter,
            wired: 0,
            live: false,
        });
    }

    fn eye(&mut self, param: impl Parameter + 'static) {
        self.push(Subsystem::Eye, Box::new(param));
    }

    fn face(&mut self, param: impl Parameter + 'static) {
        self.push(Subsystem::Expression, Box::new(param));
    }

    fn add_eye_params(&mut self) {
        // Legacy gaze axes
        self.eye(XYParam::new("EyesX", "EyesY", |d| d.eye.combined_gaze()));
        self.eye(XYParam::new("LeftEyeX", "LeftEyeY", |d| d.eye.left.gaze_xy()));
        self.eye(XYParam::new("RightEyeX", "RightEyeY", |d| {
            d.eye.right.gaze_xy()
        }));

        self.eye(EParam::simple("v2/EyeLeftX", |d| d.eye.left.gaze.x));
        self.eye(EParam::simple("v2/EyeLeftY", |d| d.eye.left.gaze.y));
        self.eye(EParam::simple("v2/EyeRightX", |d| d.eye.right.gaze.x));
        self.eye(EParam::simple("v2/EyeRightY", |d| d.eye.right.gaze.y));
        self.eye(EParam::simple("v2/EyeX", |d| d.eye.combined_gaze().x));
        self.eye(EParam::simple("v2/EyeY", |d| d.eye.combined_gaze().y));

        self.eye(EParam::simple("v2/EyeOpenLeft", |d| d.eye.left.openness));
        self.eye(EParam::simple("v2/EyeOpenRight", |d| d.eye.right.openness));
        self.eye(EParam::simple("v2/EyeOpen", |d| d.eye.combined_openness()));
        self.eye(EParam::simple("v2/EyeClosedLeft", |d| 1.0 - d.eye.left.openness));
        self.eye(EParam::simple("v2/EyeClosedRight", |d| {
            1.0 - d.eye.right.openness
        }));
        self.eye(EParam::simple("v2/EyeClosed", |d| {
            1.0 - d.eye.combined_openness()
        }));

        self.eye(EParam::simple("v2/PupilDilation", |d| d.eye.combined_pupil()));
        self.eye(EParam::simple("v2/PupilDiameterLeft", |d| {
            d.eye.left.pupil_diameter_mm * 0.1
        }));
        self.eye(EParam::simple("v2/PupilDiameterRight", |d| {
            d.eye.right.pupil_diameter_mm * 0.1
        }));

        // Lids mix openness with the wide shapes, so either subsystem drives them.
        self.push(
            Subsystem::Either,
            Box::new(EParam::simple("v2/EyeLidLeft", |d| {
                eye_lid(d.eye.left.openness, d.weight(U::EyeWideLeft))
            })),
        );
        self.push(
            Subsystem::Either,
            Box::new(EParam::simple("v2/EyeLidRight", |d| {
                eye_lid(d.eye.right.openness, d.weight(U::EyeWideRight))
            })),
        );
        self.push(
            Subsystem::Either,
            Box::new(EParam::simple("v2/EyeLid", |d| {
                eye_lid(
                    d.eye.combined_openness(),
                    mean(d, &[U::EyeWideLeft, U::EyeWideRight]),
                )
            })),
        );
    }

    fn add_face_params(&mut self) {
        self.face(EParam::simple("v2/EyeWide", |d| {
            d.weight(U::EyeWideLeft).max(d.weight(U::EyeWideRight))
        }));
        self.face(EParam::simple("v2/EyeSquint", |d| {
            d.weight(U::EyeSquintLeft).max(d.weight(U::EyeSquintRight))
        }));

        for &(name, group) in AVERAGES {
            self.face(EParam::simple(name, move |d| mean(d, group)));
        }
        for &(name, positive, negative) in AXES {
            self.face(EParam::simple(name, move |d| {
                mean(d, positive) - mean(d, negative)
            }));
        }

        self.face(EParam::simple("v2/BrowUp", |d| {
            (brow_up(d, U::BrowOuterUpLeft, U::BrowInnerUpLeft)
                + brow_up(d, U::BrowOuterUpRight, U::BrowInnerUpRight))
                * 0.5
        }));
        self.face(EParam::simple("v2/BrowDown", |d| {
            (brow_down(d, U::BrowLowererLeft, U::BrowPinchLeft)
                + brow_down(d, U::BrowLowererRight, U::BrowPinchRight))
                * 0.5
        }));
        self.face(EParam::simple("v2/BrowExpressionLeft", brow_expression_left));
        self.face(EParam::simple("v2/BrowExpressionRight", brow_expression_right));
        self.face(EParam::simple("v2/BrowExpression", |d| {
            (brow_expression_left(d) + brow_expression_right(d)) * 0.5
        }));

        self.face(EParam::simple("v2/SmileFrownLeft", |d| {
            smile_left(d) - d.weight(U::MouthFrownLeft)
        }));
        self.face(EParam::simple("v2/SmileFrownRight", |d| {
            smile_right(d) - d.weight(U::MouthFrownRight)
        }));
        self.face(EParam::simple("v2/SmileFrown", |d| {
            (smile_left(d) + smile_right(d)) * 0.5
                - mean(d, &[U::MouthFrownLeft, U::MouthFrownRight])
        }));
        self.face(EParam::simple("v2/SmileSadLeft", |d| smile_left(d) - sad_left(d)));
        self.face(EParam::simple("v2/SmileSadRight", |d| smile_right(d) - sad_right(d)));
        self.face(EParam::simple("v2/SmileSad", |d| {
            (smile_left(d) + smile_right(d) - sad_left(d) - sad_right(d)) * 0.5
        }));
    }

    /// Rewire every parameter. Returns the number of wired outputs.
    pub fn reset(&mut self, declared: &DeclaredParameters) -> usize {
        let mut wired = 0usize;
        let mut relevant = 0usize;

        for flag in &mut self.flags {
            wired += flag.param.reset(declared);
        }
        for entry in &mut self.entries {
            entry.wired = entry.parameter.reset(declared);
            entry.live = false;
            if entry.wired > 0 {
                relevant += 1;
                wired += entry.wired;
            }
        }

        info!(
            "Parameter Registry: {} parameters relevant, {} outputs wired",
            relevant, wired
        );
        debug!(
            "Declared set has {} params ({} bool, {} float, {} int)",
            declared.len(),
            declared.count(ParamType::Bool),
            declared.count(ParamType::Float),
            declared.count(ParamType::Int)
        );
        wired
    }

    /// Values for this tick. A parameter whose subsystem is inactive is skipped,
    /// and zeroed once on the tick it goes inactive.
    pub fn process(&mut self, data: &UnifiedTrackingData, status: TrackingStatus) -> Vec<ParamWrite> {
        let mut writes = Vec::new();

        for flag in &mut self.flags {
            writes.extend(flag.param.process_value((flag.read)(status)));
        }

        for entry in &mut self.entries {
            if entry.wired == 0 {
                continue;
            }
            if entry.subsystem.is_active(status) {
                entry.live = true;
                writes.extend(entry.parameter.process(data));
            } else if entry.live {
                entry.live = false;
                writes.extend(entry.parameter.zero());
            }
        }
        writes
    }

    /// Neutral values for every wired output.
    pub fn zero_all(&mut self) -> Vec<ParamWrite> {
        let mut writes = Vec::new();
        for flag in &mut self.flags {
            writes.extend(flag.param.zero());
        }
        for entry in &mut self.entries {
            entry.live = false;
            if entry.wired > 0 {
                writes.extend(entry.parameter.zero());
            }
        }
        writes
    }

    /// Drop every delta cache after a failed send. Wired entries are marked
    /// live so an inactive subsystem gets its zero written again.
    pub fn invalidate(&mut self) {
        for flag in &mut self.flags {
            flag.param.invalidate();
        }
        for entry in &mut self.entries {
            entry.parameter.invalidate();
            entry.live = entry.wired > 0;
        }
    }

    /// Output names of every wired parameter.
    pub fn wired_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.wired > 0)
            .flat_map(|e| e.parameter.names())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
