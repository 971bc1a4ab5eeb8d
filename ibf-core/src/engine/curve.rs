//! Fan curve engine
//!
//! # How It Works
//!
//! 1. **Interpolation**: a temperature is mapped to a fan speed by walking an
//!    ordered breakpoint table and interpolating linearly between the two
//!    surrounding points. All arithmetic is integer and truncates, which is
//!    what the shipped tables were tuned against.
//!
//! 2. **Hysteresis**: the speed may drop only once the temperature has fallen
//!    far enough that even `temp + H` maps below the current speed. Rising
//!    temperatures are never held back.

/// One breakpoint: at `temp` °C the fan runs at `speed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurvePoint {
    pub temp: i32,
    pub speed: u16,
}

impl CurvePoint {
    pub const fn new(temp: i32, speed: u16) -> Self {
        Self { temp, speed }
    }
}

/// Compiled breakpoint table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveTable {
    /// At or below this point the fan is switched off (speed of the point)
    pub off: Option<CurvePoint>,
    /// Breakpoints in ascending temperature order
    pub points: &'static [CurvePoint],
}

impl CurveTable {
    /// Speed for a temperature, without hysteresis
    ///
    /// An empty table returns `u16::MAX`, which every actuator clamps to full
    /// speed.
    pub fn interpolate(&self, temp: i32) -> u16 {
        if let Some(off) = self.off {
            if temp <= off.temp {
                return off.speed;
            }
        }

        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return u16::MAX;
        };

        if temp <= first.temp {
            return first.speed;
        }

        for pair in self.points.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if temp <= hi.temp {
                let range = hi.temp - lo.temp;
                let pos = temp - lo.temp;
                let delta = hi.speed as i32 - lo.speed as i32;
                return (lo.speed as i32 + delta * pos / range) as u16;
            }
        }

        last.speed
    }
}

/// Breakpoint table plus hysteresis gap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanCurve {
    pub table: CurveTable,
    /// Hysteresis gap in °C
    pub hysteresis: i32,
}

impl FanCurve {
    pub const fn new(table: CurveTable, hysteresis: i32) -> Self {
        Self { table, hysteresis }
    }

    pub fn interpolate(&self, temp: i32) -> u16 {
        self.table.interpolate(temp)
    }

    /// Next commanded speed given the previously commanded one
    pub fn calc_target(&self, temp: i32, previous: u16) -> u16 {
        let target = self.interpolate(temp);
        if target < previous && self.interpolate(temp + self.hysteresis) >= previous {
            return previous;
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINTS: &[CurvePoint] = &[
        CurvePoint::new(62, 25),
        CurvePoint::new(70, 50),
        CurvePoint::new(78, 100),
        CurvePoint::new(86, 150),
        CurvePoint::new(92, 200),
    ];

    const OFF_POINTS: &[CurvePoint] = &[
        CurvePoint::new(61, 39),
        CurvePoint::new(67, 96),
        CurvePoint::new(90, 255),
    ];

    fn curve() -> FanCurve {
        FanCurve::new(CurveTable { off: None, points: POINTS }, 6)
    }

    #[test]
    fn test_interpolation_at_points() {
        let c = curve();
        for p in POINTS {
            assert_eq!(c.interpolate(p.temp), p.speed);
        }
    }

    #[test]
    fn test_interpolation_truncates() {
        let c = curve();
        assert_eq!(c.interpolate(64), 31);
        assert_eq!(c.interpolate(72), 62);
        assert_eq!(c.interpolate(88), 166);
    }

    #[test]
    fn test_below_and_above_curve() {
        let c = curve();
        assert_eq!(c.interpolate(-20), 25);
        assert_eq!(c.interpolate(62), 25);
        assert_eq!(c.interpolate(93), 200);
        assert_eq!(c.interpolate(150), 200);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let c = curve();
        let mut last = 0;
        for t in 0..=120 {
            let s = c.interpolate(t);
            assert!(s >= last, "speed dropped at {}°C", t);
            assert!((25..=200).contains(&s));
            last = s;
        }
    }

    #[test]
    fn test_off_threshold() {
        let table = CurveTable {
            off: Some(CurvePoint::new(55, 0)),
            points: OFF_POINTS,
        };
        assert_eq!(table.interpolate(40), 0);
        assert_eq!(table.interpolate(55), 0);
        assert_eq!(table.interpolate(56), 39);
        assert_eq!(table.interpolate(61), 39);
        assert_eq!(table.interpolate(64), 67);
        assert_eq!(table.interpolate(95), 255);
    }

    #[test]
    fn test_empty_table_is_full_speed() {
        let table = CurveTable { off: None, points: &[] };
        assert_eq!(table.interpolate(40), u16::MAX);
    }

    #[test]
    fn test_rising_never_suppressed() {
        let c = curve();
        assert_eq!(c.calc_target(80, 50), 112);
        assert_eq!(c.calc_target(95, 112), 200);
    }

    #[test]
    fn test_hysteresis_holds_small_drops() {
        let c = curve();
        // 78°C commands 100; dropping to 74 still maps 74+6=80 -> 112 >= 100
        assert_eq!(c.calc_target(74, 100), 100);
        // at 71, 71+6=77 -> 93 < 100 so the step down happens
        assert_eq!(c.calc_target(71, 100), 56);
    }

    #[test]
    fn test_hysteresis_rule_exhaustive() {
        let c = curve();
        for prev in [25u16, 50, 100, 150, 200] {
            for t in 40..110 {
                let next = c.calc_target(t, prev);
                if next < prev {
                    assert!(c.interpolate(t + 6) < prev);
                    assert_eq!(next, c.interpolate(t));
                }
            }
        }
    }
}
