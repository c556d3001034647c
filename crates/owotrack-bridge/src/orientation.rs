//! Quaternion to head-tracking Euler angles, and calibration.
//!
//! The phone reports its orientation in its own frame. Converting to the
//! yaw/pitch/roll OpenTrack expects takes three steps:
//!
//! 1. [`quat_to_euler`]: standard aerospace yaw/pitch/roll of the device.
//! 2. [`device_to_head`]: fixed axis swap for a phone strapped to the head.
//! 3. [`Calibration::apply`]: subtract the zero offset, wrapping yaw.

use owotrack_protocol::Quaternion;
use serde::{Deserialize, Serialize};

/// Yaw, pitch and roll in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl EulerAngles {
    pub const ZERO: EulerAngles = EulerAngles {
        yaw: 0.0,
        pitch: 0.0,
        roll: 0.0,
    };

    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Largest absolute per-axis difference to `other`.
    pub fn max_delta(&self, other: &EulerAngles) -> f64 {
        (self.yaw - other.yaw)
            .abs()
            .max((self.pitch - other.pitch).abs())
            .max((self.roll - other.roll).abs())
    }
}

/// Device yaw, pitch and roll of a unit quaternion, in degrees.
pub fn quat_to_euler(q: &Quaternion) -> EulerAngles {
    let (x, y, z, w) = (q.x as f64, q.y as f64, q.z as f64, q.w as f64);

    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
    let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
    let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));

    EulerAngles {
        yaw: yaw.to_degrees(),
        pitch: pitch.to_degrees(),
        roll: roll.to_degrees(),
    }
}

/// Remap device axes onto head axes.
pub fn device_to_head(device: EulerAngles) -> EulerAngles {
    EulerAngles {
        yaw: -device.yaw,
        pitch: -device.roll,
        roll: device.pitch,
    }
}

/// Raw head angles for a quaternion reported by the phone.
pub fn raw_angles(q: &Quaternion) -> EulerAngles {
    device_to_head(quat_to_euler(q))
}

/// Signed difference `a - b` wrapped into [-180, 180].
pub fn wrap_degrees(a: f64, b: f64) -> f64 {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}

/// Process-wide zero offset subtracted from raw angles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Calibration {
    pub offset: EulerAngles,
}

impl Calibration {
    pub fn new(offset: EulerAngles) -> Self {
        Self { offset }
    }

    /// Calibrated angles. Yaw is a full circle and wraps; pitch and roll do not.
    pub fn apply(&self, raw: EulerAngles) -> EulerAngles {
        EulerAngles {
            yaw: wrap_degrees(raw.yaw, self.offset.yaw),
            pitch: raw.pitch - self.offset.pitch,
            roll: raw.roll - self.offset.roll,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.offset == EulerAngles::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn axis_angle(axis: [f64; 3], degrees: f64) -> Quaternion {
        let half = degrees.to_radians() / 2.0;
        let s = half.sin();
        Quaternion::new(
            (axis[0] * s) as f32,
            (axis[1] * s) as f32,
            (axis[2] * s) as f32,
            half.cos() as f32,
        )
    }

    #[test]
    fn test_identity_is_level() {
        let angles = quat_to_euler(&Quaternion::IDENTITY);
        assert_eq!(angles, EulerAngles::ZERO);
    }

    #[test]
    fn test_single_axis_rotations() {
        let yaw = quat_to_euler(&axis_angle([0.0, 0.0, 1.0], 30.0));
        assert_abs_diff_eq!(yaw.yaw, 30.0, epsilon = 1e-3);
        assert_abs_diff_eq!(yaw.pitch, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(yaw.roll, 0.0, epsilon = 1e-3);

        let pitch = quat_to_euler(&axis_angle([0.0, 1.0, 0.0], -45.0));
        assert_abs_diff_eq!(pitch.pitch, -45.0, epsilon = 1e-3);

        let roll = quat_to_euler(&axis_angle([1.0, 0.0, 0.0], 60.0));
        assert_abs_diff_eq!(roll.roll, 60.0, epsilon = 1e-3);
    }

    #[test]
    fn test_pitch_clamped_at_gimbal_lock() {
        // Slightly denormalized so 2(wy - zx) exceeds 1.0
        let a = FRAC_1_SQRT_2 as f32 + 1e-4;
        let q = Quaternion::new(0.0, a, 0.0, a);
        let angles = quat_to_euler(&q);
        assert!(angles.pitch.is_finite());
        assert_abs_diff_eq!(angles.pitch, 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_device_to_head_axes() {
        let head = device_to_head(EulerAngles::new(10.0, 20.0, 30.0));
        assert_eq!(head, EulerAngles::new(-10.0, -30.0, 20.0));
    }

    #[test]
    fn test_yaw_wraps_across_seam() {
        let calibration = Calibration::new(EulerAngles::new(-179.0, 0.0, 0.0));
        let final_angles = calibration.apply(EulerAngles::new(179.0, 0.0, 0.0));
        assert_abs_diff_eq!(final_angles.yaw, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pitch_and_roll_do_not_wrap() {
        let calibration = Calibration::new(EulerAngles::new(0.0, -80.0, 170.0));
        let final_angles = calibration.apply(EulerAngles::new(0.0, 80.0, -170.0));
        assert_abs_diff_eq!(final_angles.pitch, 160.0);
        assert_abs_diff_eq!(final_angles.roll, -340.0);
    }

    #[test]
    fn test_zero_calibration_is_passthrough() {
        let raw = EulerAngles::new(-45.5, 12.0, 3.25);
        assert!(Calibration::default().is_zero());
        assert_eq!(Calibration::default().apply(raw), raw);
    }

    #[test]
    fn test_calibrating_to_current_pose_gives_zero() {
        let raw = raw_angles(&axis_angle([0.3, 0.4, 0.866], 50.0));
        let final_angles = Calibration::new(raw).apply(raw);
        assert_abs_diff_eq!(final_angles.yaw, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(final_angles.pitch, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(final_angles.roll, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_max_delta() {
        let a = EulerAngles::new(1.0, 2.0, 3.0);
        let b = EulerAngles::new(1.05, 1.5, 3.2);
        assert_abs_diff_eq!(a.max_delta(&b), 0.5, epsilon = 1e-12);
    }

    fn unit_quaternion() -> impl Strategy<Value = Quaternion> {
        (
            -1.0f64..1.0,
            -1.0f64..1.0,
            -1.0f64..1.0,
            -1.0f64..1.0,
        )
            .prop_filter("non-degenerate", |(x, y, z, w)| {
                (x * x + y * y + z * z + w * w).sqrt() > 0.1
            })
            .prop_map(|(x, y, z, w)| {
                let n = (x * x + y * y + z * z + w * w).sqrt();
                Quaternion::new((x / n) as f32, (y / n) as f32, (z / n) as f32, (w / n) as f32)
            })
    }

    proptest! {
        #[test]
        fn prop_euler_angles_in_range(q in unit_quaternion()) {
            let angles = quat_to_euler(&q);
            prop_assert!((-180.0..=180.0).contains(&angles.yaw));
            prop_assert!((-90.0..=90.0).contains(&angles.pitch));
            prop_assert!((-180.0..=180.0).contains(&angles.roll));
        }

        #[test]
        fn prop_euler_matches_closed_form(q in unit_quaternion()) {
            let angles = quat_to_euler(&q);
            let (x, y, z, w) = (q.x as f64, q.y as f64, q.z as f64, q.w as f64);
            let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin().to_degrees();
            let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z)).to_degrees();
            prop_assert!((angles.pitch - pitch).abs() < 1e-6);
            prop_assert!((angles.yaw - yaw).abs() < 1e-6);
        }

        #[test]
        fn prop_wrapped_yaw_in_range(a in -720.0f64..720.0, b in -720.0f64..720.0) {
            let wrapped = wrap_degrees(a, b);
            prop_assert!((-180.0..=180.0).contains(&wrapped));
        }
    }
}
