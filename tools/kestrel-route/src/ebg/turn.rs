//! Turn costs and turn classification
//!
//! Angles follow [`crate::geo::turn_angle`]: 0 = straight, positive = right.

/// Numeric turn classification stored per edge-based edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TurnInstruction {
    NoTurn = 0,
    GoStraight = 1,
    TurnSlightRight = 2,
    TurnRight = 3,
    TurnSharpRight = 4,
    UTurn = 5,
    TurnSharpLeft = 6,
    TurnLeft = 7,
    TurnSlightLeft = 8,
    ReachViaPoint = 9,
    HeadOn = 10,
    EnterRoundAbout = 11,
    LeaveRoundAbout = 12,
    StayOnRoundAbout = 13,
    StartAtEndOfStreet = 14,
    ReachedYourDestination = 15,
}

impl TurnInstruction {
    pub fn from_u8(value: u8) -> Option<Self> {
        use TurnInstruction::*;
        Some(match value {
            0 => NoTurn,
            1 => GoStraight,
            2 => TurnSlightRight,
            3 => TurnRight,
            4 => TurnSharpRight,
            5 => UTurn,
            6 => TurnSharpLeft,
            7 => TurnLeft,
            8 => TurnSlightLeft,
            9 => ReachViaPoint,
            10 => HeadOn,
            11 => EnterRoundAbout,
            12 => LeaveRoundAbout,
            13 => StayOnRoundAbout,
            14 => StartAtEndOfStreet,
            15 => ReachedYourDestination,
            _ => return None,
        })
    }

    /// Direction class of a signed turn angle in degrees
    pub fn from_angle(angle: f64) -> Self {
        let magnitude = angle.abs();
        let right = angle >= 0.0;
        match magnitude {
            m if m < 23.0 => TurnInstruction::GoStraight,
            m if m < 67.0 => {
                if right {
                    TurnInstruction::TurnSlightRight
                } else {
                    TurnInstruction::TurnSlightLeft
                }
            }
            m if m < 113.0 => {
                if right {
                    TurnInstruction::TurnRight
                } else {
                    TurnInstruction::TurnLeft
                }
            }
            m if m < 158.0 => {
                if right {
                    TurnInstruction::TurnSharpRight
                } else {
                    TurnInstruction::TurnSharpLeft
                }
            }
            _ => TurnInstruction::UTurn,
        }
    }
}

/// Facts about one turn `u -> v -> w` needed to classify it
#[derive(Debug, Clone, Copy)]
pub struct TurnContext {
    pub angle: f64,
    pub is_u_turn: bool,
    pub from_roundabout: bool,
    pub to_roundabout: bool,
    pub same_name: bool,
    /// Number of turns leaving the approach other than the u-turn
    pub alternatives: usize,
}

pub fn classify_turn(turn: &TurnContext) -> TurnInstruction {
    if turn.is_u_turn {
        return TurnInstruction::UTurn;
    }
    match (turn.from_roundabout, turn.to_roundabout) {
        (false, true) => return TurnInstruction::EnterRoundAbout,
        (true, false) => return TurnInstruction::LeaveRoundAbout,
        (true, true) => return TurnInstruction::StayOnRoundAbout,
        (false, false) => {}
    }
    if turn.alternatives <= 1 || (turn.same_name && turn.angle.abs() < 67.0) {
        return TurnInstruction::NoTurn;
    }
    TurnInstruction::from_angle(turn.angle)
}

/// Angle-dependent turn cost supplied by the routing profile
pub trait TurnFunction: Send + Sync {
    /// Penalty in deciseconds for a signed turn angle in degrees
    fn penalty(&self, angle: f64) -> i32;
}

/// Sigmoid turn cost: near zero when going straight, `max_penalty` for a
/// u-turn, turns across oncoming traffic more expensive than the others
#[derive(Debug, Clone, PartialEq)]
pub struct SigmoidTurnFunction {
    /// Deciseconds
    pub max_penalty: f64,
    /// Asymmetry; > 1 makes turns across traffic more expensive
    pub turn_bias: f64,
    pub left_side_driving: bool,
}

impl SigmoidTurnFunction {
    pub fn car() -> Self {
        Self {
            max_penalty: 75.0,
            turn_bias: 1.075,
            left_side_driving: false,
        }
    }
}

impl TurnFunction for SigmoidTurnFunction {
    fn penalty(&self, angle: f64) -> i32 {
        let (angle, bias) = if self.left_side_driving {
            (-angle, self.turn_bias)
        } else {
            (angle, self.turn_bias)
        };
        let exponent = -((13.0 / bias) * (-angle / 180.0) - 6.5 * bias);
        let sigmoid = 1.0 / (1.0 + exponent.exp());
        (self.max_penalty * sigmoid).round() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_codes_roundtrip() {
        for code in 0..=15u8 {
            let instruction = TurnInstruction::from_u8(code).unwrap();
            assert_eq!(instruction as u8, code);
        }
        assert_eq!(TurnInstruction::from_u8(16), None);
    }

    #[test]
    fn test_angle_classes() {
        assert_eq!(TurnInstruction::from_angle(5.0), TurnInstruction::GoStraight);
        assert_eq!(TurnInstruction::from_angle(45.0), TurnInstruction::TurnSlightRight);
        assert_eq!(TurnInstruction::from_angle(-90.0), TurnInstruction::TurnLeft);
        assert_eq!(TurnInstruction::from_angle(140.0), TurnInstruction::TurnSharpRight);
        assert_eq!(TurnInstruction::from_angle(-175.0), TurnInstruction::UTurn);
    }

    #[test]
    fn test_classify_roundabouts_and_trivial_turns() {
        let base = TurnContext {
            angle: 90.0,
            is_u_turn: false,
            from_roundabout: false,
            to_roundabout: false,
            same_name: false,
            alternatives: 3,
        };
        assert_eq!(classify_turn(&base), TurnInstruction::TurnRight);
        assert_eq!(
            classify_turn(&TurnContext {
                to_roundabout: true,
                ..base
            }),
            TurnInstruction::EnterRoundAbout
        );
        assert_eq!(
            classify_turn(&TurnContext {
                from_roundabout: true,
                to_roundabout: true,
                ..base
            }),
            TurnInstruction::StayOnRoundAbout
        );
        assert_eq!(
            classify_turn(&TurnContext {
                alternatives: 1,
                ..base
            }),
            TurnInstruction::NoTurn
        );
        assert_eq!(
            classify_turn(&TurnContext {
                is_u_turn: true,
                ..base
            }),
            TurnInstruction::UTurn
        );
    }

    #[test]
    fn test_sigmoid_shape() {
        let f = SigmoidTurnFunction::car();
        let straight = f.penalty(0.0);
        let right = f.penalty(90.0);
        let left = f.penalty(-90.0);
        let u_turn = f.penalty(-180.0);
        assert!(straight < 10, "straight {straight}");
        assert!(left > right, "left {left} right {right}");
        assert!(u_turn >= left);
        assert!(u_turn <= 75);
    }

    #[test]
    fn test_left_side_driving_mirrors() {
        let right_hand = SigmoidTurnFunction::car();
        let left_hand = SigmoidTurnFunction {
            left_side_driving: true,
            ..SigmoidTurnFunction::car()
        };
        assert_eq!(right_hand.penalty(-90.0), left_hand.penalty(90.0));
    }
}
