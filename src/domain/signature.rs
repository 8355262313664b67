//! Identity signature correlating the same physical item across marketplaces.
//!
//! A signature is `name|wear|pattern` with wear fixed at eight decimal
//! places. An absent pattern renders as `-`, which no real pattern index
//! can produce.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal digits kept from the wear value.
pub const WEAR_PRECISION: usize = 8;

const ABSENT_PATTERN: &str = "-";

/// Canonical correlation key for an item instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Derive the signature from the three identity fields.
    ///
    /// Pure and deterministic: equal inputs always yield equal keys.
    pub fn compute(name: &str, wear: f64, pattern: Option<u32>) -> Self {
        let pattern = match pattern {
            Some(p) => p.to_string(),
            None => ABSENT_PATTERN.to_string(),
        };
        Signature(format!("{}|{}|{}", name, format_wear(wear), pattern))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn format_wear(wear: f64) -> String {
    let mut s = format!("{:.*}", WEAR_PRECISION, wear);
    // -0.00000000 and 0.00000000 must agree.
    if s.starts_with('-') && s[1..].bytes().all(|b| b == b'0' || b == b'.') {
        s.remove(0);
    }
    s
}

/// Collapse a marketplace's pattern fields into the single optional form.
///
/// A charm (keychain) pattern overrides the paint seed. Missing values and
/// negative sentinels both become `None`.
pub fn resolve_pattern(paint_seed: Option<i64>, charm_pattern: Option<i64>) -> Option<u32> {
    let valid = |v: Option<i64>| v.and_then(|p| u32::try_from(p).ok());
    valid(charm_pattern).or_else(|| valid(paint_seed))
}

const DOPPLER_PHASES: [&str; 8] = [
    "Phase 1",
    "Phase 2",
    "Phase 3",
    "Phase 4",
    "Ruby",
    "Sapphire",
    "Black Pearl",
    "Emerald",
];

/// Split a Doppler phase out of a display name.
///
/// Some marketplaces embed the phase in the name ("Karambit | Doppler
/// Phase 2 (Factory New)") while others report it separately; stripping it
/// keeps names comparable across sources.
pub fn extract_phase(name: &str) -> (String, String) {
    if name.contains("Doppler") {
        if let Some(phase) = DOPPLER_PHASES.iter().find(|p| name.contains(*p)) {
            let clean = name.replacen(&format!(" {}", phase), "", 1);
            return (clean, phase.to_string());
        }
    }
    (name.to_string(), String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_format() {
        let sig = Signature::compute("AK-47 | Redline (Field-Tested)", 0.2512, Some(661));
        assert_eq!(sig.as_str(), "AK-47 | Redline (Field-Tested)|0.25120000|661");
    }

    #[test]
    fn test_signature_absent_pattern_never_collides_with_zero() {
        let absent = Signature::compute("Sticker", 0.0, None);
        let zero = Signature::compute("Sticker", 0.0, Some(0));
        assert_ne!(absent, zero);
        assert_eq!(absent.as_str(), "Sticker|0.00000000|-");
    }

    #[test]
    fn test_signature_ignores_noise_beyond_precision() {
        let a = Signature::compute("M4A4 | Howl", 0.123456781, Some(1));
        let b = Signature::compute("M4A4 | Howl", 0.123456784, Some(1));
        assert_eq!(a, b);

        let c = Signature::compute("M4A4 | Howl", 0.12345679, Some(1));
        assert_ne!(a, c);
    }

    #[test]
    fn test_signature_negative_zero_wear() {
        assert_eq!(
            Signature::compute("Case", -0.0, None),
            Signature::compute("Case", 0.0, None)
        );
        assert_eq!(
            Signature::compute("Case", -0.000000001, None),
            Signature::compute("Case", 0.0, None)
        );
    }

    #[test]
    fn test_resolve_pattern_charm_overrides_seed() {
        assert_eq!(resolve_pattern(Some(412), Some(77)), Some(77));
        assert_eq!(resolve_pattern(Some(412), None), Some(412));
    }

    #[test]
    fn test_resolve_pattern_normalizes_sentinels() {
        assert_eq!(resolve_pattern(None, None), None);
        assert_eq!(resolve_pattern(Some(-1), None), None);
        assert_eq!(resolve_pattern(Some(-1), Some(-1)), None);
        assert_eq!(resolve_pattern(Some(5), Some(-1)), Some(5));
    }

    #[test]
    fn test_extract_phase() {
        let (name, phase) = extract_phase("★ Karambit | Doppler Phase 2 (Factory New)");
        assert_eq!(name, "★ Karambit | Doppler (Factory New)");
        assert_eq!(phase, "Phase 2");

        let (name, phase) = extract_phase("★ Bayonet | Gamma Doppler Emerald (Minimal Wear)");
        assert_eq!(name, "★ Bayonet | Gamma Doppler (Minimal Wear)");
        assert_eq!(phase, "Emerald");
    }

    #[test]
    fn test_extract_phase_passthrough() {
        let (name, phase) = extract_phase("AWP | Asiimov (Field-Tested)");
        assert_eq!(name, "AWP | Asiimov (Field-Tested)");
        assert!(phase.is_empty());

        let (name, phase) = extract_phase("★ Karambit | Doppler (Factory New)");
        assert_eq!(name, "★ Karambit | Doppler (Factory New)");
        assert!(phase.is_empty());
    }
}
