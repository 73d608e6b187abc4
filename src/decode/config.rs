//! Decoder configuration.

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Upper bound on decoder worker threads.
pub const MAX_WORKERS: usize = 16;

/// A barcode encoding standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    Ean13,
    Ean8,
    Code128,
    UpcA,
    UpcE,
    Code39,
}

impl Symbology {
    pub const ALL: [Symbology; 6] = [
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::Code128,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::Code39,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Ean13 => "ean_13",
            Symbology::Ean8 => "ean_8",
            Symbology::Code128 => "code_128",
            Symbology::UpcA => "upc_a",
            Symbology::UpcE => "upc_e",
            Symbology::Code39 => "code_39",
        }
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "ean13" => Ok(Symbology::Ean13),
            "ean8" => Ok(Symbology::Ean8),
            "code128" => Ok(Symbology::Code128),
            "upca" => Ok(Symbology::UpcA),
            "upce" => Ok(Symbology::UpcE),
            "code39" => Ok(Symbology::Code39),
            _ => Err(format!("unknown symbology '{s}'")),
        }
    }
}

/// Scan region expressed as percentage insets from each frame edge.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl RegionOfInterest {
    /// The whole frame.
    pub fn full() -> Self {
        Self::default()
    }

    /// A centered region inset by `horizontal`% left/right and
    /// `vertical`% top/bottom.
    pub fn centered(horizontal: f32, vertical: f32) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn is_full(&self) -> bool {
        *self == Self::full()
    }

    pub fn validate(&self) -> Result<(), String> {
        let insets = [self.top, self.right, self.bottom, self.left];
        if insets.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("region insets must be non-negative percentages".into());
        }
        if self.left + self.right >= 100.0 || self.top + self.bottom >= 100.0 {
            return Err("region insets leave no area to scan".into());
        }
        Ok(())
    }

    /// Converts the insets into a pixel rectangle for a frame size.
    pub fn to_rect(&self, width: u32, height: u32) -> Rect {
        let px = |pct: f32, total: u32| ((pct.clamp(0.0, 100.0) / 100.0) * total as f32).round() as u32;
        let left = px(self.left, width);
        let right = px(self.right, width);
        let top = px(self.top, height);
        let bottom = px(self.bottom, height);
        Rect::new(
            left,
            top,
            width.saturating_sub(left + right),
            height.saturating_sub(top + bottom),
        )
        .clamp_to(width, height)
    }
}

/// Locator precision hint. Smaller patches find smaller or more distant
/// barcodes at the cost of latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocatorPrecision {
    XSmall,
    Small,
    #[default]
    Medium,
    Large,
    XLarge,
}

impl LocatorPrecision {
    /// Locator patch edge in pixels.
    pub fn patch_size(&self) -> u32 {
        match self {
            LocatorPrecision::XSmall => 8,
            LocatorPrecision::Small => 16,
            LocatorPrecision::Medium => 32,
            LocatorPrecision::Large => 64,
            LocatorPrecision::XLarge => 128,
        }
    }
}

impl FromStr for LocatorPrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x-small" | "xsmall" => Ok(LocatorPrecision::XSmall),
            "small" => Ok(LocatorPrecision::Small),
            "medium" => Ok(LocatorPrecision::Medium),
            "large" => Ok(LocatorPrecision::Large),
            "x-large" | "xlarge" => Ok(LocatorPrecision::XLarge),
            _ => Err(format!("unknown locator precision '{s}'")),
        }
    }
}

/// Configuration handed to the decode adapter and its engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Accepted symbologies.
    pub symbologies: BTreeSet<Symbology>,
    /// Region of the frame the decoder analyzes.
    pub region: RegionOfInterest,
    /// Number of background decoder workers.
    pub workers: usize,
    /// Target decode rate in frames per second; `None` decodes every frame.
    pub frequency: Option<u32>,
    /// Locator precision hint.
    pub locator: LocatorPrecision,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            symbologies: Symbology::ALL.into_iter().collect(),
            region: RegionOfInterest::full(),
            workers: 1,
            frequency: Some(10),
            locator: LocatorPrecision::Medium,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.symbologies.is_empty() {
            return Err("at least one symbology must be enabled".into());
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(format!("workers must be between 1 and {MAX_WORKERS}"));
        }
        if self.frequency == Some(0) {
            return Err("frequency must be positive".into());
        }
        self.region.validate()
    }

    pub fn accepts(&self, symbology: Symbology) -> bool {
        self.symbologies.contains(&symbology)
    }
}
