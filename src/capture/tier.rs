//! Camera constraint tiers.
//!
//! A tier is one candidate camera configuration. Acquisition walks an
//! ordered ladder of tiers, most specific first, and keeps the first one
//! the platform can satisfy.

use serde::{Deserialize, Serialize};

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera, pointing away from the user.
    Environment,
    /// Front camera, pointing at the user.
    User,
    /// Any camera will do.
    Any,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
            FacingMode::Any => "any",
        }
    }
}

/// A frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if both dimensions are at least those of `other`.
    pub fn covers(&self, other: &Resolution) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One candidate camera configuration in a fallback ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraintTier {
    /// Short name used in logs and reports.
    pub name: String,
    /// Requested facing direction.
    pub facing: FacingMode,
    /// When true the facing direction is a hard requirement.
    #[serde(default)]
    pub exact_facing: bool,
    /// Preferred resolution; the platform may deliver something close.
    pub ideal: Resolution,
    /// Smallest acceptable resolution.
    #[serde(default)]
    pub min: Option<Resolution>,
    /// Largest acceptable resolution.
    #[serde(default)]
    pub max: Option<Resolution>,
    /// Preferred frame rate.
    #[serde(default)]
    pub frame_rate: Option<u32>,
}

impl CameraConstraintTier {
    /// Rear camera, hard requirement.
    pub fn rear_exact() -> Self {
        Self {
            name: "rear-exact".into(),
            facing: FacingMode::Environment,
            exact_facing: true,
            ideal: Resolution::new(1280, 720),
            min: Some(Resolution::new(640, 480)),
            max: Some(Resolution::new(1920, 1080)),
            frame_rate: Some(30),
        }
    }

    /// Rear camera if available, otherwise whatever the platform picks.
    pub fn rear_preferred() -> Self {
        Self {
            name: "rear-preferred".into(),
            facing: FacingMode::Environment,
            exact_facing: false,
            ideal: Resolution::new(1280, 720),
            min: Some(Resolution::new(640, 480)),
            max: None,
            frame_rate: None,
        }
    }

    pub fn front() -> Self {
        Self {
            name: "front".into(),
            facing: FacingMode::User,
            exact_facing: false,
            ideal: Resolution::new(1280, 720),
            min: None,
            max: None,
            frame_rate: None,
        }
    }

    /// Last resort: no constraints beyond a modest ideal size.
    pub fn any() -> Self {
        Self {
            name: "any".into(),
            facing: FacingMode::Any,
            exact_facing: false,
            ideal: Resolution::new(640, 480),
            min: None,
            max: None,
            frame_rate: None,
        }
    }

    /// The default ladder, most specific first.
    pub fn default_ladder() -> Vec<Self> {
        vec![
            Self::rear_exact(),
            Self::rear_preferred(),
            Self::front(),
            Self::any(),
        ]
    }

    /// True if a stream of `actual` size satisfies the tier's bounds.
    pub fn accepts(&self, actual: &Resolution) -> bool {
        let above_min = self.min.map_or(true, |min| actual.covers(&min));
        let below_max = self.max.map_or(true, |max| max.covers(actual));
        above_min && below_max
    }

    /// Checks that the bounds are internally consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.ideal.width == 0 || self.ideal.height == 0 {
            return Err(format!("tier '{}': ideal resolution is empty", self.name));
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if !max.covers(&min) {
                return Err(format!("tier '{}': min {} exceeds max {}", self.name, min, max));
            }
        }
        if self.frame_rate == Some(0) {
            return Err(format!("tier '{}': frame rate must be positive", self.name));
        }
        Ok(())
    }
}

impl std::fmt::Display for CameraConstraintTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (facing={}{}, ideal={}",
            self.name,
            self.facing.as_str(),
            if self.exact_facing { " exact" } else { "" },
            self.ideal
        )?;
        if let Some(min) = self.min {
            write!(f, ", min={min}")?;
        }
        if let Some(max) = self.max {
            write!(f, ", max={max}")?;
        }
        write!(f, ")")
    }
}
