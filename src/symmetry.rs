//! Crystal symmetry operations for the supported Laue classes.
//!
//! Each symmetry is a unit struct implementing [`SymmetryOps`]. The trait
//! carries the per-symmetry tables (symmetry quaternions, bin grids, pole
//! families, histogram size) as required methods and builds every
//! orientation-space operation on top of them as provided methods, so the
//! texture builders can stay generic over `&dyn SymmetryOps`.
//!
//! Supported classes:
//! - [`CubicOps`]: m-3m, 24 proper rotations
//! - [`HexagonalOps`]: 6/mmm, 12 proper rotations
//! - [`OrthoRhombicOps`]: mmm, 4 proper rotations

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4, FRAC_PI_6};

use clap::ValueEnum;
use nalgebra::{Quaternion, Vector3};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::bins::BinDims;
use crate::orientation::{homochoric_radius, AxisAngle, Euler, Homochoric, Quat, Rodrigues};

const R2: f64 = FRAC_1_SQRT_2;
const R3: f64 = 0.577_350_269_189_625_8;
const H3: f64 = 0.866_025_403_784_438_6;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const ALL: [LaueClass; 3] = [
        LaueClass::Cubic,
        LaueClass::Hexagonal,
        LaueClass::Orthorhombic,
    ];

    #[test]
    fn parse_laue_class() {
        assert_eq!("Cubic".parse::<LaueClass>().unwrap(), LaueClass::Cubic);
        assert_eq!("6/mmm".parse::<LaueClass>().unwrap(), LaueClass::Hexagonal);
        assert!("triclinic".parse::<LaueClass>().is_err());
    }

    #[test]
    fn bin_space_sizes() {
        assert_eq!(CubicOps.odf_size(), 5832);
        assert_eq!(CubicOps.mdf_size(), 5832);
        assert_eq!(HexagonalOps.odf_size(), 15552);
        assert_eq!(HexagonalOps.odf_dims().counts, [36, 36, 12]);
        assert_eq!(HexagonalOps.mdf_size(), 15552);
        assert_eq!(OrthoRhombicOps.odf_size(), 46656);
        assert_eq!(OrthoRhombicOps.mdf_size(), 46656);
    }

    #[test]
    fn symmetry_tables_are_unit_quaternions() {
        for class in ALL {
            let ops = class.ops();
            for q in ops.symmetry_quats() {
                assert!((q.norm() - 1.0).abs() < 1e-6, "{} {:?}", ops.name(), q);
            }
        }
        assert_eq!(CubicOps.quat_syms().len(), 24);
        assert_eq!(HexagonalOps.quat_syms().len(), 12);
        assert_eq!(OrthoRhombicOps.quat_syms().len(), 4);
    }

    #[test]
    fn equivalent_orientations_share_a_bin() {
        let mut rng = StdRng::seed_from_u64(11);
        for class in ALL {
            let ops = class.ops();
            for _ in 0..20 {
                let q = Euler::random_uniform(&mut rng).to_quat();
                let bin = ops.quat_to_odf_bin(&q);
                for sym in ops.symmetry_quats() {
                    assert_eq!(ops.quat_to_odf_bin(&(q * sym)), bin, "{}", ops.name());
                }
            }
        }
    }

    #[test]
    fn fundamental_zone_has_positive_scalar() {
        let mut rng = StdRng::seed_from_u64(5);
        for class in ALL {
            let ops = class.ops();
            for _ in 0..50 {
                let q = ops.fz_quat(&Euler::random_uniform(&mut rng).to_quat());
                assert!(q.w >= 0.0);
            }
        }
    }

    #[test]
    fn identity_bin_round_trip() {
        for class in ALL {
            let ops = class.ops();
            let bin = ops.euler_to_odf_bin(&Euler::new(0.0, 0.0, 0.0));
            let centre = ops.odf_bin_to_euler(bin);
            assert_eq!(ops.euler_to_odf_bin(&centre), bin, "{}", ops.name());
        }
    }

    #[test]
    fn misorientation_of_equivalent_orientations_vanishes() {
        let mut rng = StdRng::seed_from_u64(3);
        let q = Euler::random_uniform(&mut rng).to_quat();
        for sym in CubicOps.symmetry_quats() {
            let miso = CubicOps.misorientation(&q, &(q * sym));
            assert!(miso.angle < 1e-6, "angle {}", miso.angle);
            assert_eq!(miso.axis, Vector3::z());
        }
    }

    #[test]
    fn twin_misorientation_is_sixty_degrees() {
        let twin = AxisAngle::new(60f64.to_radians(), Vector3::new(1.0, 1.0, 1.0)).to_quat();
        let miso = CubicOps.misorientation(&Quat::identity(), &twin);
        assert!((miso.angle.to_degrees() - 60.0).abs() < 1e-9);
        let fz = CubicOps.mdf_fz(&miso);
        for c in fz.axis.iter() {
            assert!((c - R3).abs() < 1e-9, "{:?}", fz.axis);
        }
    }

    #[test]
    fn cubic_mdf_axis_sorted_descending() {
        let aa = AxisAngle::new(0.3, Vector3::new(-0.2, 0.9, -0.4));
        let fz = CubicOps.mdf_fz(&aa);
        assert!(fz.axis.x >= fz.axis.y && fz.axis.y >= fz.axis.z && fz.axis.z >= 0.0);
        assert!((fz.angle - 0.3).abs() < 1e-9);
    }

    #[test]
    fn orthorhombic_sign_flipped_axes_share_a_bin() {
        let axis = Vector3::new(1.0, 0.2, 0.3);
        let bin = OrthoRhombicOps.misorientation_bin(&AxisAngle::new(0.5, axis));
        for flip in [[-1.0, 1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, -1.0], [-1.0, -1.0, -1.0]] {
            let flipped = axis.component_mul(&Vector3::from(flip));
            let aa = AxisAngle::new(0.5, flipped);
            assert_eq!(OrthoRhombicOps.misorientation_bin(&aa), bin, "{:?}", flipped);
            let fz = OrthoRhombicOps.mdf_fz(&aa);
            assert!(fz.axis.iter().all(|c| *c >= 0.0), "{:?}", fz.axis);
            assert!((fz.angle - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn fz_rodrigues_agrees_with_fz_quat() {
        let mut rng = StdRng::seed_from_u64(21);
        for class in ALL {
            let ops = class.ops();
            for _ in 0..50 {
                let q = Euler::random_uniform(&mut rng).to_quat();
                let expected = ops.fz_quat(&q);
                let reduced = ops.fz_rodrigues(&Rodrigues::from_quat(&q)).to_quat();
                assert!(
                    (reduced.dot(&expected).abs() - 1.0).abs() < 1e-9,
                    "{} {:?} {:?}",
                    ops.name(),
                    reduced,
                    expected
                );
            }
        }
    }

    #[test]
    fn fz_rodrigues_of_half_turn() {
        let half_turn = Quaternion::new(0.0, 0.6, 0.8, 0.0);
        for class in ALL {
            let ops = class.ops();
            let expected = ops.fz_quat(&half_turn);
            let reduced = ops.fz_rodrigues(&Rodrigues::from_quat(&half_turn));
            assert!(reduced.0.iter().all(|c| c.is_finite()), "{:?}", reduced);
            let q = reduced.to_quat();
            assert!(
                (q.dot(&expected).abs() - 1.0).abs() < 1e-9,
                "{} {:?} {:?}",
                ops.name(),
                q,
                expected
            );
        }
    }

    #[test]
    fn hexagonal_axis_folds_into_first_sector() {
        let (s, c) = 50f64.to_radians().sin_cos();
        let aa = AxisAngle::new(0.2, Vector3::new(c, s, 0.5));
        let fz = HexagonalOps.fold_mdf_axis(AxisAngle::new(aa.angle, aa.axis.normalize()));
        let azimuth = fz.axis.y.atan2(fz.axis.x).to_degrees();
        assert!((azimuth - 10.0).abs() < 1e-9, "azimuth {}", azimuth);
        assert!((fz.angle - 0.2).abs() < 1e-12);
        assert!(fz.axis.z > 0.0);
    }

    #[test]
    fn sampled_misorientations_stay_in_their_bin() {
        let mut rng = StdRng::seed_from_u64(9);
        let ops = &CubicOps;
        let bin = ops.misorientation_bin(&AxisAngle::new(0.4, Vector3::new(1.0, 0.5, 0.2)));
        let draw = ops.sample_misorientation_in_bin(bin, &mut rng);
        assert!(draw.angle > 0.0 && draw.angle < 1.1);
    }
}

/// A family of symmetry-equivalent crystal directions for one pole figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoleFamily {
    pub label: &'static str,
    pub directions: &'static [[f64; 3]],
}

/// Orientation-space operations for one crystal symmetry.
pub trait SymmetryOps: Send + Sync {
    fn name(&self) -> &'static str;

    /// Proper rotations of the point group as `[x, y, z, w]`.
    fn quat_syms(&self) -> &'static [[f64; 4]];

    fn odf_dims(&self) -> BinDims;

    fn mdf_dims(&self) -> BinDims {
        self.odf_dims()
    }

    /// Number of 5 degree misorientation histogram bins.
    fn histogram_bins(&self) -> usize;

    fn pole_families(&self) -> &'static [PoleFamily];

    /// Reduces the axis of a nearest-origin misorientation into the MDF fundamental zone.
    fn fold_mdf_axis(&self, aa: AxisAngle) -> AxisAngle;

    fn odf_size(&self) -> usize {
        self.odf_dims().len()
    }

    fn mdf_size(&self) -> usize {
        self.mdf_dims().len()
    }

    fn symmetry_quats(&self) -> Vec<Quat> {
        self.quat_syms()
            .iter()
            .map(|&[x, y, z, w]| Quaternion::new(w, x, y, z))
            .collect()
    }

    /// Symmetry equivalent of `q` closest to the identity, with non-negative scalar part.
    fn fz_quat(&self, q: &Quat) -> Quat {
        let mut best = *q;
        let mut best_w = -1.0;
        for &[x, y, z, w] in self.quat_syms() {
            let candidate = q * Quaternion::new(w, x, y, z);
            if candidate.w.abs() > best_w {
                best_w = candidate.w.abs();
                best = candidate;
            }
        }
        if best.w < 0.0 {
            -best
        } else {
            best
        }
    }

    fn fz_rodrigues(&self, r: &Rodrigues) -> Rodrigues {
        Rodrigues::from_quat(&self.fz_quat(&r.to_quat()))
    }

    fn quat_to_odf_bin(&self, q: &Quat) -> usize {
        self.odf_dims()
            .bin_of(&Homochoric::from_quat(&self.fz_quat(q)))
    }

    fn euler_to_odf_bin(&self, euler: &Euler) -> usize {
        self.quat_to_odf_bin(&euler.to_quat())
    }

    /// Orientation at fractional position `u` inside an ODF bin, reduced to the fundamental zone.
    fn euler_in_odf_bin(&self, bin: usize, u: [f64; 3]) -> Euler {
        let h = self.odf_dims().point_in_bin(bin, u);
        Euler::from_quat(&self.fz_quat(&h.to_quat()))
    }

    /// Representative orientation at the centre of an ODF bin.
    fn odf_bin_to_euler(&self, bin: usize) -> Euler {
        self.euler_in_odf_bin(bin, [0.5; 3])
    }

    /// Uniformly jittered orientation inside an ODF bin.
    fn sample_euler_in_bin(&self, bin: usize, rng: &mut dyn RngCore) -> Euler {
        let u = [rng.random(), rng.random(), rng.random()];
        self.euler_in_odf_bin(bin, u)
    }

    /// Smallest-angle misorientation between two orientations.
    fn misorientation(&self, q1: &Quat, q2: &Quat) -> AxisAngle {
        let relative = q1.conjugate() * q2;
        AxisAngle::from_quat(&self.fz_quat(&relative))
    }

    fn mdf_fz(&self, aa: &AxisAngle) -> AxisAngle {
        let nearest = AxisAngle::from_quat(&self.fz_quat(&aa.to_quat()));
        self.fold_mdf_axis(nearest)
    }

    fn misorientation_bin(&self, aa: &AxisAngle) -> usize {
        let fz = self.mdf_fz(aa);
        self.mdf_dims()
            .bin_of(&Homochoric::from_quat(&fz.to_quat()))
    }

    /// Uniformly jittered misorientation inside an MDF bin, reduced to the MDF fundamental zone.
    fn sample_misorientation_in_bin(&self, bin: usize, rng: &mut dyn RngCore) -> AxisAngle {
        let u = [rng.random(), rng.random(), rng.random()];
        let h = self.mdf_dims().point_in_bin(bin, u);
        self.mdf_fz(&AxisAngle::from_quat(&h.to_quat()))
    }
}

/// Laue class selector used by configuration and bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LaueClass {
    Cubic,
    Hexagonal,
    Orthorhombic,
}

static CUBIC: CubicOps = CubicOps;
static HEXAGONAL: HexagonalOps = HexagonalOps;
static ORTHORHOMBIC: OrthoRhombicOps = OrthoRhombicOps;

impl LaueClass {
    pub fn ops(&self) -> &'static dyn SymmetryOps {
        match self {
            LaueClass::Cubic => &CUBIC,
            LaueClass::Hexagonal => &HEXAGONAL,
            LaueClass::Orthorhombic => &ORTHORHOMBIC,
        }
    }
}

impl std::str::FromStr for LaueClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cubic" | "m-3m" => Ok(LaueClass::Cubic),
            "hexagonal" | "6/mmm" => Ok(LaueClass::Hexagonal),
            "orthorhombic" | "mmm" => Ok(LaueClass::Orthorhombic),
            other => Err(format!("unknown symmetry '{}'", other)),
        }
    }
}

impl std::fmt::Display for LaueClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ops().name())
    }
}

const CUBIC_SYMS: [[f64; 4]; 24] = [
    [0.0, 0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [R2, 0.0, 0.0, R2],
    [0.0, R2, 0.0, R2],
    [0.0, 0.0, R2, R2],
    [-R2, 0.0, 0.0, R2],
    [0.0, -R2, 0.0, R2],
    [0.0, 0.0, -R2, R2],
    [R2, R2, 0.0, 0.0],
    [-R2, R2, 0.0, 0.0],
    [0.0, R2, R2, 0.0],
    [0.0, -R2, R2, 0.0],
    [R2, 0.0, R2, 0.0],
    [-R2, 0.0, R2, 0.0],
    [0.5, 0.5, 0.5, 0.5],
    [-0.5, -0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5, 0.5],
    [-0.5, 0.5, -0.5, 0.5],
    [-0.5, 0.5, 0.5, 0.5],
    [0.5, -0.5, -0.5, 0.5],
    [-0.5, -0.5, 0.5, 0.5],
    [0.5, 0.5, -0.5, 0.5],
];

const HEXAGONAL_SYMS: [[f64; 4]; 12] = [
    [0.0, 0.0, 0.0, 1.0],
    [0.0, 0.0, 0.5, H3],
    [0.0, 0.0, H3, 0.5],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, H3, -0.5],
    [0.0, 0.0, 0.5, -H3],
    [1.0, 0.0, 0.0, 0.0],
    [H3, 0.5, 0.0, 0.0],
    [0.5, H3, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [-0.5, H3, 0.0, 0.0],
    [-H3, 0.5, 0.0, 0.0],
];

const ORTHORHOMBIC_SYMS: [[f64; 4]; 4] = [
    [0.0, 0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

const CUBIC_POLES: [PoleFamily; 3] = [
    PoleFamily {
        label: "001",
        directions: &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    },
    PoleFamily {
        label: "011",
        directions: &[
            [R2, R2, 0.0],
            [0.0, R2, R2],
            [R2, 0.0, R2],
            [R2, -R2, 0.0],
            [0.0, R2, -R2],
            [-R2, 0.0, R2],
        ],
    },
    PoleFamily {
        label: "111",
        directions: &[
            [R3, R3, R3],
            [R3, R3, -R3],
            [R3, -R3, R3],
            [-R3, R3, R3],
        ],
    },
];

const HEXAGONAL_POLES: [PoleFamily; 3] = [
    PoleFamily {
        label: "0001",
        directions: &[[0.0, 0.0, 1.0]],
    },
    PoleFamily {
        label: "11-20",
        directions: &[[1.0, 0.0, 0.0], [0.5, H3, 0.0], [-0.5, H3, 0.0]],
    },
    PoleFamily {
        label: "10-10",
        directions: &[[H3, 0.5, 0.0], [0.0, 1.0, 0.0], [-H3, 0.5, 0.0]],
    },
];

/// m-3m.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubicOps;

impl SymmetryOps for CubicOps {
    fn name(&self) -> &'static str {
        "cubic"
    }

    fn quat_syms(&self) -> &'static [[f64; 4]] {
        &CUBIC_SYMS
    }

    fn odf_dims(&self) -> BinDims {
        let dim = homochoric_radius(FRAC_PI_4);
        BinDims::new([18, 18, 18], [dim; 3])
    }

    fn histogram_bins(&self) -> usize {
        13
    }

    fn pole_families(&self) -> &'static [PoleFamily] {
        &CUBIC_POLES
    }

    fn fold_mdf_axis(&self, aa: AxisAngle) -> AxisAngle {
        let mut n = [aa.axis.x.abs(), aa.axis.y.abs(), aa.axis.z.abs()];
        n.sort_by(|a, b| b.total_cmp(a));
        AxisAngle::new(aa.angle, n.into())
    }
}

/// 6/mmm.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexagonalOps;

impl SymmetryOps for HexagonalOps {
    fn name(&self) -> &'static str {
        "hexagonal"
    }

    fn quat_syms(&self) -> &'static [[f64; 4]] {
        &HEXAGONAL_SYMS
    }

    fn odf_dims(&self) -> BinDims {
        let basal = homochoric_radius(FRAC_PI_2);
        let c_axis = homochoric_radius(FRAC_PI_6);
        BinDims::new([36, 36, 12], [basal, basal, c_axis])
    }

    fn histogram_bins(&self) -> usize {
        20
    }

    fn pole_families(&self) -> &'static [PoleFamily] {
        &HEXAGONAL_POLES
    }

    fn fold_mdf_axis(&self, aa: AxisAngle) -> AxisAngle {
        let mut n = aa.axis;
        if n.z < 0.0 {
            n = -n;
        }
        let mut azimuth = n.y.atan2(n.x).to_degrees();
        if azimuth < 0.0 {
            azimuth += 360.0;
        }
        let sector = (azimuth / 30.0).floor();
        let rem = azimuth - 30.0 * sector;
        let folded = if sector as i64 % 2 == 0 { rem } else { 30.0 - rem };
        let (s, c) = folded.to_radians().sin_cos();
        let basal = n.x.hypot(n.y);
        AxisAngle::new(aa.angle, Vector3::new(basal * c, basal * s, n.z))
    }
}

/// mmm.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrthoRhombicOps;

impl SymmetryOps for OrthoRhombicOps {
    fn name(&self) -> &'static str {
        "orthorhombic"
    }

    fn quat_syms(&self) -> &'static [[f64; 4]] {
        &ORTHORHOMBIC_SYMS
    }

    fn odf_dims(&self) -> BinDims {
        let dim = homochoric_radius(FRAC_PI_2);
        BinDims::new([36, 36, 36], [dim; 3])
    }

    fn histogram_bins(&self) -> usize {
        24
    }

    fn pole_families(&self) -> &'static [PoleFamily] {
        &CUBIC_POLES
    }

    fn fold_mdf_axis(&self, aa: AxisAngle) -> AxisAngle {
        AxisAngle::new(aa.angle, aa.axis.abs())
    }
}
