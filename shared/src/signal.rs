use serde::Serialize;

/// SNR severity bands, ordered from no reading up to the strongest signal.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalClass {
    Unknown,
    VeryWeak,
    Weak,
    Moderate,
    Good,
    Strong,
}

/// Bands are half-open: `< -20`, `[-20, -10)`, `[-10, 0)`, `[0, 5)`, `>= 5`.
/// A missing or non-finite SNR is `Unknown`.
pub fn classify(snr: Option<f64>) -> SignalClass {
    match snr {
        Some(s) if s.is_finite() => {
            if s < -20.0 {
                SignalClass::VeryWeak
            } else if s < -10.0 {
                SignalClass::Weak
            } else if s < 0.0 {
                SignalClass::Moderate
            } else if s < 5.0 {
                SignalClass::Good
            } else {
                SignalClass::Strong
            }
        }
        _ => SignalClass::Unknown,
    }
}

impl SignalClass {
    pub const fn color(self) -> &'static str {
        match self {
            SignalClass::Unknown => "#888888",
            SignalClass::VeryWeak => "#ff4444",
            SignalClass::Weak => "#ff9900",
            SignalClass::Moderate => "#ffdd00",
            SignalClass::Good => "#88dd22",
            SignalClass::Strong => "#00cc66",
        }
    }

    /// Relative line weight for rendering; strictly increasing with band order.
    pub const fn weight(self) -> f64 {
        match self {
            SignalClass::Unknown => 1.0,
            SignalClass::VeryWeak => 1.5,
            SignalClass::Weak => 2.0,
            SignalClass::Moderate => 2.5,
            SignalClass::Good => 3.0,
            SignalClass::Strong => 3.5,
        }
    }
}
