//! Hardware profiles
//!
//! The two supported InfinityBook Gen10 control paths were tuned separately:
//! the EC speed registers take 0-200, the hwmon PWM sink takes 0-255 and has
//! an explicit fan-off band. Each keeps its own breakpoints and hysteresis.

use serde::{Deserialize, Serialize};

use crate::engine::{CurvePoint, CurveTable, FanCurve};

/// Profile selector as written in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileKind {
    #[serde(rename = "gen10-ec")]
    Gen10Ec,
    #[serde(rename = "gen10-hwmon")]
    Gen10Hwmon,
}

impl ProfileKind {
    pub fn profile(self) -> &'static HardwareProfile {
        match self {
            ProfileKind::Gen10Ec => &GEN10_EC,
            ProfileKind::Gen10Hwmon => &GEN10_HWMON,
        }
    }
}

/// Actuator range and fan curve for one hardware path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareProfile {
    pub name: &'static str,
    /// Largest value the actuator accepts
    pub max: u16,
    pub curve: FanCurve,
}

impl HardwareProfile {
    /// Command as a percentage of the actuator range
    pub fn percent(&self, value: u16) -> u16 {
        if self.max == 0 {
            return 0;
        }
        (value.min(self.max) as u32 * 100 / self.max as u32) as u16
    }

    /// Human-readable threshold table for the startup banner
    pub fn describe_thresholds(&self) -> Vec<String> {
        let table = &self.curve.table;
        let mut lines = Vec::new();
        if let Some(off) = table.off {
            lines.push(format!("Fan off:    <= {} C", off.temp));
        }
        if let Some(first) = table.points.first() {
            lines.push(format!("Minimum:    <= {} C -> {}%", first.temp, self.percent(first.speed)));
        }
        for p in table.points.iter().skip(1) {
            lines.push(format!("            {:>3} C -> {}%", p.temp, self.percent(p.speed)));
        }
        lines.push(format!("Hysteresis: {} C", self.curve.hysteresis));
        lines
    }
}

const GEN10_EC_POINTS: &[CurvePoint] = &[
    CurvePoint::new(62, 25),
    CurvePoint::new(70, 50),
    CurvePoint::new(78, 100),
    CurvePoint::new(86, 150),
    CurvePoint::new(92, 200),
];

const GEN10_HWMON_POINTS: &[CurvePoint] = &[
    CurvePoint::new(61, 39),
    CurvePoint::new(67, 96),
    CurvePoint::new(73, 128),
    CurvePoint::new(80, 192),
    CurvePoint::new(90, 255),
];

/// EC register path (and the legacy module nodes that wrap it)
pub const GEN10_EC: HardwareProfile = HardwareProfile {
    name: "gen10-ec",
    max: 200,
    curve: FanCurve::new(
        CurveTable {
            off: None,
            points: GEN10_EC_POINTS,
        },
        6,
    ),
};

/// hwmon PWM sink path
pub const GEN10_HWMON: HardwareProfile = HardwareProfile {
    name: "gen10-hwmon",
    max: 255,
    curve: FanCurve::new(
        CurveTable {
            off: Some(CurvePoint::new(55, 0)),
            points: GEN10_HWMON_POINTS,
        },
        8,
    ),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_stay_within_their_range() {
        for profile in [&GEN10_EC, &GEN10_HWMON] {
            for t in -10..=130 {
                assert!(profile.curve.interpolate(t) <= profile.max, "{} at {}", profile.name, t);
            }
            assert_eq!(profile.curve.interpolate(130), profile.max);
        }
    }

    #[test]
    fn ec_profile_never_switches_off() {
        assert_eq!(GEN10_EC.curve.interpolate(30), 25);
    }

    #[test]
    fn hwmon_profile_switches_off_when_cool() {
        assert_eq!(GEN10_HWMON.curve.interpolate(50), 0);
        assert_eq!(GEN10_HWMON.curve.interpolate(58), 39);
    }

    #[test]
    fn percent_of_range() {
        assert_eq!(GEN10_HWMON.percent(39), 15);
        assert_eq!(GEN10_HWMON.percent(255), 100);
        assert_eq!(GEN10_EC.percent(100), 50);
        assert_eq!(GEN10_EC.percent(250), 100);
    }

    #[test]
    fn profile_names_round_trip_through_serde() {
        let kind: ProfileKind = serde_json::from_str("\"gen10-hwmon\"").unwrap();
        assert_eq!(kind.profile().name, "gen10-hwmon");
        assert!(serde_json::from_str::<ProfileKind>("\"gen11\"").is_err());
    }
}
