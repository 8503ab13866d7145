//! Qualitative categories derived from continuous measurements.
//!
//! Three pure threshold maps. All boundaries are half-open and
//! lower-inclusive: a value exactly on a boundary belongs to the
//! higher category.

/// UV index category (WHO/EPA ranges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UvCategory {
    /// UV index below 3.
    Low,
    /// UV index in [3, 6).
    Medium,
    /// UV index in [6, 8).
    High,
    /// UV index in [8, 11).
    VeryHigh,
    /// UV index 11 or above.
    Extreme,
}

impl UvCategory {
    /// Map a UV index to its category.
    pub fn from_index(uv_index: f64) -> Self {
        if uv_index < 3.0 {
            Self::Low
        } else if uv_index < 6.0 {
            Self::Medium
        } else if uv_index < 8.0 {
            Self::High
        } else if uv_index < 11.0 {
            Self::VeryHigh
        } else {
            Self::Extreme
        }
    }

    /// Get the category name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::VeryHigh => "Very High",
            Self::Extreme => "Extreme",
        }
    }
}

impl std::fmt::Display for UvCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Discomfort index category (typical index range 55-85).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiscomfortCategory {
    /// Index below 55.
    Cold,
    /// Index in [55, 60).
    Comfortable,
    /// Index in [60, 75).
    Warm,
    /// Index 75 or above.
    Hot,
}

impl DiscomfortCategory {
    /// Map a discomfort index to its category.
    pub fn from_index(index: f64) -> Self {
        if index < 55.0 {
            Self::Cold
        } else if index < 60.0 {
            Self::Comfortable
        } else if index < 75.0 {
            Self::Warm
        } else {
            Self::Hot
        }
    }

    /// Get the category name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cold => "Cold",
            Self::Comfortable => "Comfortable",
            Self::Warm => "Warm",
            Self::Hot => "Hot",
        }
    }
}

impl std::fmt::Display for DiscomfortCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Heatstroke risk category for the WBGT-like heatstroke factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeatstrokeCategory {
    /// Below 25 °C.
    Safe,
    /// In [25, 28) °C.
    Caution,
    /// In [28, 31) °C.
    Warning,
    /// 31 °C or above.
    Danger,
}

impl HeatstrokeCategory {
    /// Map a heatstroke factor (°C) to its category.
    pub fn from_celsius(wbgt_c: f64) -> Self {
        if wbgt_c < 25.0 {
            Self::Safe
        } else if wbgt_c < 28.0 {
            Self::Caution
        } else if wbgt_c < 31.0 {
            Self::Warning
        } else {
            Self::Danger
        }
    }

    /// Get the category name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Caution => "Caution",
            Self::Warning => "Warning",
            Self::Danger => "Danger",
        }
    }
}

impl std::fmt::Display for HeatstrokeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
