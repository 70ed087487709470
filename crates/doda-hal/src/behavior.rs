//! Behavior presets.
//!
//! Every [`BehaviorKind`] maps to a static [`BehaviorPreset`]: a list of
//! keyframes over the SO-101 arm joints.  The arm doubles as Doda's body:
//!
//! | joint           | body part            |
//! |-----------------|----------------------|
//! | `shoulder_lift` | knees                |
//! | `elbow_flex`    | waist                |
//! | `wrist_flex`    | neck                 |
//! | `wrist_roll`    | head rotation        |
//! | `gripper`       | beak (0–100 % open)  |
//!
//! Offsets are relative to the pose captured when the behavior starts; the
//! registry always returns to that pose after the last keyframe.

use doda_types::BehaviorKind;

/// Target for one joint within a keyframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointTarget {
    /// Degrees relative to the start pose.
    Offset(f32),
    /// Absolute value (used for the beak opening).
    Absolute(f32),
}

/// A set of joint targets followed by a pause.
#[derive(Debug)]
pub struct Keyframe {
    pub targets: &'static [(&'static str, JointTarget)],
    pub hold_ms: u64,
}

/// A named, fixed sequence of keyframes.
#[derive(Debug)]
pub struct BehaviorPreset {
    pub name: &'static str,
    pub frames: &'static [Keyframe],
}

impl BehaviorPreset {
    /// Nominal duration including the final return to the start pose.
    pub fn nominal_ms(&self) -> u64 {
        self.frames.iter().map(|f| f.hold_ms).sum::<u64>() + RETURN_HOLD_MS
    }

    /// Every joint this preset touches, without duplicates.
    pub fn joints(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for frame in self.frames {
            for (joint, _) in frame.targets {
                if !out.contains(joint) {
                    out.push(*joint);
                }
            }
        }
        out
    }
}

/// Pause after returning to the start pose.
pub const RETURN_HOLD_MS: u64 = 2_000;

use JointTarget::{Absolute, Offset};

const STANCE: &[(&str, JointTarget)] = &[
    ("shoulder_lift", Offset(35.0)),
    ("elbow_flex", Offset(-25.0)),
    ("wrist_flex", Offset(-40.0)),
];

macro_rules! frame {
    ($targets:expr, $hold_ms:expr $(,)?) => {
        Keyframe {
            targets: $targets,
            hold_ms: $hold_ms,
        }
    };
}

static GREETING: BehaviorPreset = BehaviorPreset {
    name: "dodo_greeting",
    frames: &[
        frame!(STANCE, 2_000),
        frame!(&[("wrist_roll", Offset(-30.0))], 600),
        frame!(&[("wrist_roll", Offset(30.0))], 600),
        frame!(&[("wrist_roll", Offset(-30.0))], 600),
        frame!(&[("wrist_roll", Offset(30.0))], 600),
        frame!(&[("wrist_roll", Offset(-30.0))], 600),
        frame!(&[("wrist_roll", Offset(30.0))], 600),
        frame!(&[("wrist_roll", Offset(0.0))], 400),
        frame!(&[("gripper", Absolute(50.0))], 300),
        frame!(&[("gripper", Absolute(0.0))], 300),
        frame!(&[("gripper", Absolute(50.0))], 300),
        frame!(&[("gripper", Absolute(0.0))], 300),
        frame!(&[("gripper", Absolute(50.0))], 300),
        frame!(&[("gripper", Absolute(0.0))], 300),
    ],
};

static HEAD_BOB: BehaviorPreset = BehaviorPreset {
    name: "dodo_head_bob",
    frames: &[
        frame!(STANCE, 2_000),
        frame!(&[("wrist_flex", Offset(30.0))], 1_000),
        frame!(&[("wrist_flex", Offset(-40.0))], 1_000),
        frame!(&[("wrist_flex", Offset(30.0))], 1_000),
        frame!(&[("wrist_flex", Offset(-40.0))], 1_000),
        frame!(&[("wrist_flex", Offset(30.0))], 1_000),
        frame!(&[("wrist_flex", Offset(-40.0))], 1_000),
        frame!(&[("wrist_flex", Offset(30.0))], 1_000),
        frame!(&[("wrist_flex", Offset(-40.0))], 1_000),
    ],
};

static PLEASED: BehaviorPreset = BehaviorPreset {
    name: "dodo_pleased",
    frames: &[
        frame!(STANCE, 2_000),
        frame!(
            &[("elbow_flex", Offset(-35.0)), ("wrist_flex", Offset(-60.0))],
            1_500,
        ),
        frame!(&[("gripper", Absolute(30.0))], 500),
        frame!(&[("gripper", Absolute(0.0))], 500),
        frame!(STANCE, 1_000),
    ],
};

static WOO: BehaviorPreset = BehaviorPreset {
    name: "dodo_woo",
    frames: &[
        frame!(STANCE, 2_000),
        frame!(
            &[
                ("shoulder_lift", Offset(65.0)),
                ("elbow_flex", Offset(-90.0)),
                ("wrist_flex", Offset(-65.0)),
            ],
            2_000,
        ),
        frame!(&[("gripper", Absolute(100.0))], 300),
        frame!(&[("gripper", Absolute(0.0))], 300),
        frame!(&[("gripper", Absolute(100.0))], 300),
        frame!(&[("gripper", Absolute(0.0))], 300),
        frame!(&[("gripper", Absolute(100.0))], 300),
        frame!(&[("gripper", Absolute(0.0))], 300),
        frame!(&[("wrist_roll", Offset(-25.0))], 400),
        frame!(&[("wrist_roll", Offset(25.0))], 400),
        frame!(&[("wrist_roll", Offset(-25.0))], 400),
        frame!(&[("wrist_roll", Offset(25.0))], 400),
        frame!(&[("wrist_roll", Offset(0.0))], 300),
    ],
};

static DISMAY: BehaviorPreset = BehaviorPreset {
    name: "dodo_dismay",
    frames: &[
        frame!(STANCE, 2_000),
        frame!(
            &[
                ("shoulder_lift", Offset(20.0)),
                ("wrist_flex", Offset(40.0)),
                ("gripper", Absolute(0.0)),
            ],
            1_500,
        ),
        frame!(&[("wrist_roll", Offset(-30.0))], 800),
        frame!(&[("wrist_roll", Offset(30.0))], 800),
        frame!(&[("wrist_roll", Offset(-30.0))], 800),
        frame!(&[("wrist_roll", Offset(30.0))], 800),
        frame!(&[("wrist_roll", Offset(-30.0))], 800),
        frame!(&[("wrist_roll", Offset(30.0))], 800),
        frame!(&[("wrist_roll", Offset(0.0))], 500),
    ],
};

static IDLE: BehaviorPreset = BehaviorPreset {
    name: "dodo_idle",
    frames: &[
        frame!(STANCE, 2_000),
        frame!(&[("shoulder_lift", Offset(38.0))], 2_000),
        frame!(&[("shoulder_lift", Offset(35.0))], 2_000),
        frame!(
            &[("wrist_roll", Offset(15.0)), ("wrist_flex", Offset(-35.0))],
            1_500,
        ),
        frame!(&[("wrist_roll", Offset(0.0)), ("wrist_flex", Offset(-40.0))], 1_500),
    ],
};

/// Look up the preset for `kind`.  `Curious` shares the head-bob preset.
pub fn preset_for(kind: BehaviorKind) -> &'static BehaviorPreset {
    match kind {
        BehaviorKind::Greeting => &GREETING,
        BehaviorKind::HeadBob | BehaviorKind::Curious => &HEAD_BOB,
        BehaviorKind::Pleased => &PLEASED,
        BehaviorKind::Woo => &WOO,
        BehaviorKind::Dismay => &DISMAY,
        BehaviorKind::Idle => &IDLE,
    }
}
