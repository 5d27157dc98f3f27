//! Tracking data model shared by the daemon and its signal-source modules.

mod catalog;

pub use catalog::{LocalTrackingModule, ModuleDataService, RemoteTrackingModule};

use anyhow::Result;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSingleEyeData {
    pub gaze: Vec3,
    pub pupil_diameter_mm: f32,
    pub openness: f32,
}

impl UnifiedSingleEyeData {
    /// Horizontal and vertical gaze components.
    pub fn gaze_xy(&self) -> Vec2 {
        Vec2::new(self.gaze.x, self.gaze.y)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEyeData {
    pub left: UnifiedSingleEyeData,
    pub right: UnifiedSingleEyeData,
    pub max_dilation: f32,
    pub min_dilation: f32,
}

impl UnifiedEyeData {
    pub fn combined_gaze(&self) -> Vec2 {
        (self.left.gaze_xy() + self.right.gaze_xy()) * 0.5
    }

    pub fn combined_openness(&self) -> f32 {
        (self.left.openness + self.right.openness) * 0.5
    }

    pub fn combined_pupil(&self) -> f32 {
        (self.left.pupil_diameter_mm + self.right.pupil_diameter_mm) * 0.5
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnifiedExpressionShape {
    pub weight: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedHeadData {
    pub head_yaw: f32,
    pub head_pitch: f32,
    pub head_roll: f32,
}

/// One tick worth of raw tracking values. Mutation stages rewrite it in place
/// before parameters read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTrackingData {
    pub eye: UnifiedEyeData,
    pub shapes: Vec<UnifiedExpressionShape>,
    pub head: UnifiedHeadData,
}

impl Default for UnifiedTrackingData {
    fn default() -> Self {
        Self {
            eye: UnifiedEyeData::default(),
            shapes: vec![UnifiedExpressionShape::default(); UnifiedExpressions::Max as usize],
            head: UnifiedHeadData::default(),
        }
    }
}

impl UnifiedTrackingData {
    /// Weight of a single expression channel, 0.0 when the snapshot is short.
    pub fn weight(&self, expr: UnifiedExpressions) -> f32 {
        self.shapes
            .get(expr as usize)
            .map(|s| s.weight)
            .unwrap_or(0.0)
    }

    pub fn set_weight(&mut self, expr: UnifiedExpressions, weight: f32) {
        if let Some(shape) = self.shapes.get_mut(expr as usize) {
            shape.weight = weight;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum UnifiedExpressions {
    // Eye Expressions
    EyeSquintRight = 0,
    EyeSquintLeft,
    EyeWideRight,
    EyeWideLeft,

    // Eyebrow Expressions
    BrowPinchRight,
    BrowPinchLeft,
    BrowLowererRight,
    BrowLowererLeft,
    BrowInnerUpRight,
    BrowInnerUpLeft,
    BrowOuterUpRight,
    BrowOuterUpLeft,

    // Nose Expressions
    NasalDilationRight,
    NasalDilationLeft,
    NasalConstrictRight,
    NasalConstrictLeft,

    // Cheek Expressions
    CheekSquintRight,
    CheekSquintLeft,
    CheekPuffRight,
    CheekPuffLeft,
    CheekSuckRight,
    CheekSuckLeft,

    // Jaw Exclusive Expressions
    JawOpen,
    JawRight,
    JawLeft,
    JawForward,
    JawBackward,
    JawClench,
    JawMandibleRaise,
    MouthClosed,

    // Lip Expressions
    LipSuckUpperRight,
    LipSuckUpperLeft,
    LipSuckLowerRight,
    LipSuckLowerLeft,
    LipSuckCornerRight,
    LipSuckCornerLeft,
    LipFunnelUpperRight,
    LipFunnelUpperLeft,
    LipFunnelLowerRight,
    LipFunnelLowerLeft,
    LipPuckerUpperRight,
    LipPuckerUpperLeft,
    LipPuckerLowerRight,
    LipPuckerLowerLeft,

    // Upper lip raiser group
    MouthUpperUpRight,
    MouthUpperUpLeft,
    MouthUpperDeepenRight,
    MouthUpperDeepenLeft,
    NoseSneerRight,
    NoseSneerLeft,

    // Lower lip depressor group
    MouthLowerDownRight,
    MouthLowerDownLeft,

    // Mouth Direction group
    MouthUpperRight,
    MouthUpperLeft,
    MouthLowerRight,
    MouthLowerLeft,

    // Smile group
    MouthCornerPullRight,
    MouthCornerPullLeft,
    MouthCornerSlantRight,
    MouthCornerSlantLeft,

    // Sad group
    MouthFrownRight,
    MouthFrownLeft,
    MouthStretchRight,
    MouthStretchLeft,
    MouthDimpleRight,
    MouthDimpleLeft,
    MouthRaiserUpper,
    MouthRaiserLower,
    MouthPressRight,
    MouthPressLeft,
    MouthTightenerRight,
    MouthTightenerLeft,

    // Tongue Expressions
    TongueOut,
    TongueUp,
    TongueDown,
    TongueRight,
    TongueLeft,
    TongueRoll,
    TongueBendDown,
    TongueCurlUp,
    TongueSquish,
    TongueFlat,
    TongueTwistRight,
    TongueTwistLeft,

    // Throat/Neck Expressions
    SoftPalateClose,
    ThroatSwallow,
    NeckFlexRight,
    NeckFlexLeft,

    Max,
}

impl TryFrom<usize> for UnifiedExpressions {
    type Error = ();

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value >= Self::Max as usize {
            return Err(());
        }
        // repr(usize) with contiguous discriminants starting at 0
        Ok(unsafe { std::mem::transmute::<usize, UnifiedExpressions>(value) })
    }
}

impl UnifiedExpressions {
    /// Every real expression channel in declaration order, `Max` excluded.
    pub fn iter() -> impl Iterator<Item = UnifiedExpressions> {
        (0..Self::Max as usize).filter_map(|i| Self::try_from(i).ok())
    }

    pub fn name(self) -> String {
        format!("{:?}", self)
    }
}

/// Which tracking subsystems currently deliver data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStatus {
    pub eye: bool,
    pub expression: bool,
}

impl TrackingStatus {
    pub const ACTIVE: Self = Self {
        eye: true,
        expression: true,
    };
    pub const INACTIVE: Self = Self {
        eye: false,
        expression: false,
    };

    pub fn any(&self) -> bool {
        self.eye || self.expression
    }
}

/// log level for module logging
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

/// logger callback for modules
pub type LogCallback = extern "C" fn(level: LogLevel, target: *const i8, message: *const i8);

/// Logger handed to modules on initialize. Lines end up in the host's `log` output.
pub struct ModuleLogger {
    callback: LogCallback,
    module_name: String,
}

impl ModuleLogger {
    pub fn new(callback: LogCallback, module_name: String) -> Self {
        Self {
            callback,
            module_name,
        }
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    fn log(&self, level: LogLevel, message: &str) {
        let (Ok(target), Ok(msg)) = (
            std::ffi::CString::new(self.module_name.replace('\0', "")),
            std::ffi::CString::new(message.replace('\0', "")),
        ) else {
            return;
        };
        (self.callback)(level, target.as_ptr(), msg.as_ptr());
    }
}

/// A signal source. `update` fills the snapshot for the current tick;
/// `status` reports which subsystems are producing data right now.
pub trait TrackingModule {
    fn initialize(&mut self, logger: ModuleLogger) -> Result<()>;
    fn update(&mut self, data: &mut UnifiedTrackingData) -> Result<()>;
    fn unload(&mut self);

    fn status(&self) -> TrackingStatus {
        TrackingStatus::ACTIVE
    }
}
