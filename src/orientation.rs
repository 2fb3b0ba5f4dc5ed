//! Rotation parameterisations and the conversions between them.
//!
//! Orientations enter the engine as Bunge Euler angles and are carried
//! internally as quaternions. Binning happens in homochoric space, where
//! equal volumes correspond to equal rotation-space measure.
//!
//! Conventions:
//! - Euler angles are `(phi1, Phi, phi2)` in radians
//! - Quaternions follow `nalgebra` storage, vector part `(i, j, k)` and scalar `w`
//! - Axis-angle rotations carry the angle in radians

use std::f64::consts::PI;

use nalgebra::{Matrix3, Quaternion, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Rotation quaternion, scalar part `w`.
pub type Quat = Quaternion<f64>;

/// Magnitudes below this are treated as the identity rotation.
pub const ROTATION_EPSILON: f64 = 1e-12;


/// Bunge Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Euler {
    pub phi1: f64,
    pub phi: f64,
    pub phi2: f64,
}

impl Euler {
    pub fn new(phi1: f64, phi: f64, phi2: f64) -> Self {
        Self { phi1, phi, phi2 }
    }

    pub fn from_degrees(phi1: f64, phi: f64, phi2: f64) -> Self {
        Self::new(phi1.to_radians(), phi.to_radians(), phi2.to_radians())
    }

    pub fn to_degrees(&self) -> [f64; 3] {
        [
            self.phi1.to_degrees(),
            self.phi.to_degrees(),
            self.phi2.to_degrees(),
        ]
    }

    pub fn to_quat(&self) -> Quat {
        let (s, c) = (self.phi / 2.0).sin_cos();
        let (s1, c1) = ((self.phi1 - self.phi2) / 2.0).sin_cos();
        let (s2, c2) = ((self.phi1 + self.phi2) / 2.0).sin_cos();
        Quaternion::new(c * c2, s * c1, s * s1, c * s2)
    }

    /// Extracts Euler angles from a unit quaternion, wrapping `phi1` and
    /// `phi2` into `[0, 2pi)`.
    pub fn from_quat(q: &Quat) -> Self {
        let delta = q.j.atan2(q.i);
        let sigma = q.k.atan2(q.w);
        let phi = 2.0 * (q.k * q.k + q.w * q.w).sqrt().min(1.0).acos();
        let phi1 = (sigma + delta).rem_euclid(2.0 * PI);
        let phi2 = (sigma - delta).rem_euclid(2.0 * PI);
        Self { phi1, phi, phi2 }
    }

    /// Draws an orientation uniformly over rotation space.
    pub fn random_uniform<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let phi1 = 2.0 * PI * rng.random::<f64>();
        let phi = (2.0 * (rng.random::<f64>() - 0.5)).acos();
        let phi2 = 2.0 * PI * rng.random::<f64>();
        Self { phi1, phi, phi2 }
    }
}

/// Rotation by `angle` radians about `axis`. The axis need not be unit length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisAngle {
    pub angle: f64,
    pub axis: Vector3<f64>,
}

impl AxisAngle {
    pub fn new(angle: f64, axis: Vector3<f64>) -> Self {
        Self { angle, axis }
    }

    pub fn to_quat(&self) -> Quat {
        let norm = self.axis.norm();
        if norm < ROTATION_EPSILON {
            return Quat::identity();
        }
        let (s, c) = (self.angle / 2.0).sin_cos();
        let n = self.axis / norm;
        Quaternion::new(c, n.x * s, n.y * s, n.z * s)
    }

    /// Angle in `[0, pi]` and unit axis. Degenerate rotations get the `z` axis.
    pub fn from_quat(q: &Quat) -> Self {
        let angle = 2.0 * q.w.abs().min(1.0).acos();
        let sign = if q.w < 0.0 { -1.0 } else { 1.0 };
        let v = q.imag() * sign;
        let norm = v.norm();
        if angle == 0.0 || norm < ROTATION_EPSILON {
            return Self::new(angle, Vector3::z());
        }
        Self::new(angle, v / norm)
    }
}

/// Rodrigues-Frank vector `n tan(w/2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rodrigues(pub Vector3<f64>);

impl Rodrigues {
    /// Rotations of exactly 180 degrees keep their axis, scaled to `f64::MAX`.
    pub fn from_quat(q: &Quat) -> Self {
        if q.w == 0.0 {
            return Self(q.imag() * f64::MAX);
        }
        Self(q.imag() / q.w)
    }

    /// Infinite components are read as a half turn about their signs.
    pub fn to_quat(&self) -> Quat {
        let m = self.0.amax();
        if m < ROTATION_EPSILON {
            return Quat::identity();
        }
        if !m.is_finite() {
            let n = self.0.map(|c| if c.is_infinite() { c.signum() } else { 0.0 });
            let n = n.normalize();
            return Quaternion::new(0.0, n.x, n.y, n.z);
        }
        // scaled first so the length of near half-turn vectors stays finite
        let axis = self.0 / m;
        let t = m * axis.norm();
        AxisAngle::new(2.0 * t.atan(), axis).to_quat()
    }
}

/// Homochoric vector `n (3/4 (w - sin w))^(1/3)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homochoric(pub Vector3<f64>);

impl Homochoric {
    pub fn from_quat(q: &Quat) -> Self {
        let aa = AxisAngle::from_quat(q);
        if aa.angle == 0.0 {
            return Self(Vector3::zeros());
        }
        Self(aa.axis * homochoric_radius(aa.angle))
    }

    pub fn to_quat(&self) -> Quat {
        let h = self.0.norm();
        if h < ROTATION_EPSILON {
            return Quat::identity();
        }
        AxisAngle::new(rotation_angle(h), self.0).to_quat()
    }
}

/// Radius of the homochoric ball point for a rotation angle `w`.
pub fn homochoric_radius(w: f64) -> f64 {
    (0.75 * (w - w.sin())).cbrt()
}

/// Inverts [`homochoric_radius`] on `[0, pi]` by bisection.
fn rotation_angle(h: f64) -> f64 {
    let target = h * h * h / 0.75;
    let (mut lo, mut hi) = (0.0, PI);
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if mid - mid.sin() < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Orientation matrix `g` mapping crystal directions into the sample frame.
pub fn rotation_matrix(q: &Quat) -> Matrix3<f64> {
    let (x, y, z, w) = (q.i, q.j, q.k, q.w);
    Matrix3::new(
        1.0 - 2.0 * y * y - 2.0 * z * z,
        2.0 * x * y - 2.0 * z * w,
        2.0 * x * z + 2.0 * y * w,
        2.0 * x * y + 2.0 * z * w,
        1.0 - 2.0 * x * x - 2.0 * z * z,
        2.0 * y * z - 2.0 * x * w,
        2.0 * x * z - 2.0 * y * w,
        2.0 * y * z + 2.0 * x * w,
        1.0 - 2.0 * x * x - 2.0 * y * y,
    )
}
