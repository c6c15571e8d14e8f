//! Length units for distance predicates.

use serde::{Deserialize, Serialize};

/// A distance with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Distance {
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Distance { value, unit }
    }

    /// Convert into another linear unit.
    pub fn to_unit(self, target: LengthUnit) -> f64 {
        self.value * self.unit.metre_factor() / target.metre_factor()
    }
}

/// The linear units a caller may express a distance in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LengthUnit {
    Metre,
    Kilometre,
    Centimetre,
    Millimetre,
    Mile,
    NauticalMile,
    Foot,
    Yard,
    Inch,
}

impl LengthUnit {
    /// The factor converting one of this unit into metres.
    pub fn metre_factor(self) -> f64 {
        match self {
            LengthUnit::Metre => 1.0,
            LengthUnit::Kilometre => 1000.0,
            LengthUnit::Centimetre => 0.01,
            LengthUnit::Millimetre => 0.001,
            LengthUnit::Mile => 1609.344,
            LengthUnit::NauticalMile => 1852.0,
            LengthUnit::Foot => 0.3048,
            LengthUnit::Yard => 0.9144,
            LengthUnit::Inch => 0.0254,
        }
    }

    /// Parse a unit symbol, e.g. `"m"` or `"km"`.
    pub fn from_symbol(symbol: &str) -> Option<LengthUnit> {
        match symbol {
            "m" | "metre" | "meter" => Some(LengthUnit::Metre),
            "km" | "kilometre" | "kilometer" => Some(LengthUnit::Kilometre),
            "cm" | "centimetre" | "centimeter" => Some(LengthUnit::Centimetre),
            "mm" | "millimetre" | "millimeter" => Some(LengthUnit::Millimetre),
            "mi" | "mile" => Some(LengthUnit::Mile),
            "nmi" | "nautical mile" => Some(LengthUnit::NauticalMile),
            "ft" | "foot" => Some(LengthUnit::Foot),
            "yd" | "yard" => Some(LengthUnit::Yard),
            "in" | "inch" => Some(LengthUnit::Inch),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kilometres_convert_to_metres() {
        let distance = Distance::new(1.5, LengthUnit::Kilometre);
        assert!((distance.to_unit(LengthUnit::Metre) - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn feet_convert_to_metres() {
        let distance = Distance::new(10.0, LengthUnit::Foot);
        assert!((distance.to_unit(LengthUnit::Metre) - 3.048).abs() < 1e-9);
    }
}
