//! Homochoric bin grids and discrete inverse-CDF sampling.
//!
//! A bin grid is a box `[-extent, extent]` per axis split into equal steps.
//! Bins are flattened with the first axis varying fastest.

use tracing::trace;

use crate::orientation::Homochoric;


/// Shape of a three-axis homochoric bin grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinDims {
    /// Number of bins along each axis.
    pub counts: [usize; 3],
    /// Half width of the grid along each axis.
    pub extents: [f64; 3],
}

impl BinDims {
    pub fn new(counts: [usize; 3], extents: [f64; 3]) -> Self {
        Self { counts, extents }
    }

    /// Total number of bins.
    pub fn len(&self) -> usize {
        self.counts.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn step(&self, axis: usize) -> f64 {
        2.0 * self.extents[axis] / self.counts[axis] as f64
    }

    fn axis_bin(&self, axis: usize, h: f64) -> usize {
        let b = ((h + self.extents[axis]) / self.step(axis)).floor() as i64;
        b.clamp(0, self.counts[axis] as i64 - 1) as usize
    }

    pub fn bin_of(&self, h: &Homochoric) -> usize {
        self.flatten([
            self.axis_bin(0, h.0.x),
            self.axis_bin(1, h.0.y),
            self.axis_bin(2, h.0.z),
        ])
    }

    pub fn flatten(&self, [b1, b2, b3]: [usize; 3]) -> usize {
        let [n1, n2, _] = self.counts;
        b1 + n1 * b2 + n1 * n2 * b3
    }

    pub fn unflatten(&self, bin: usize) -> [usize; 3] {
        let [n1, n2, _] = self.counts;
        [bin % n1, (bin / n1) % n2, bin / (n1 * n2)]
    }

    /// Flat index of `coord + offset` with every axis wrapped modulo its own count.
    pub fn wrap(&self, coord: [usize; 3], offset: [i64; 3]) -> usize {
        let mut wrapped = [0usize; 3];
        for axis in 0..3 {
            let n = self.counts[axis] as i64;
            wrapped[axis] = (coord[axis] as i64 + offset[axis]).rem_euclid(n) as usize;
        }
        self.flatten(wrapped)
    }

    /// Point inside `bin` at fractional position `u` (each in `[0, 1)`) along each axis.
    pub fn point_in_bin(&self, bin: usize, u: [f64; 3]) -> Homochoric {
        let coord = self.unflatten(bin);
        let mut h = [0.0; 3];
        for axis in 0..3 {
            h[axis] = self.step(axis) * (coord[axis] as f64 + u[axis]) - self.extents[axis];
        }
        Homochoric(h.into())
    }

    pub fn centre(&self, bin: usize) -> Homochoric {
        self.point_in_bin(bin, [0.5; 3])
    }
}

/// Running totals of a discrete density for repeated inverse-CDF draws.
#[derive(Debug, Clone)]
pub struct CumulativeDensity {
    totals: Vec<f64>,
    last_positive: Option<usize>,
}

impl CumulativeDensity {
    pub fn new(density: &[f64]) -> Self {
        let totals = density
            .iter()
            .scan(0.0, |acc, &d| {
                *acc += d;
                Some(*acc)
            })
            .collect();
        let last_positive = density.iter().rposition(|&d| d > 0.0);
        Self {
            totals,
            last_positive,
        }
    }

    /// Sum of the density.
    pub fn total(&self) -> f64 {
        self.totals.last().copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Selects the bin whose running total straddles `r`.
    ///
    /// When `r` lies beyond the accumulated total the last bin with
    /// positive density is returned, or the final bin if there is none.
    pub fn choose(&self, r: f64) -> usize {
        let idx = self.totals.partition_point(|&t| t <= r);
        if idx < self.totals.len() {
            return idx;
        }
        let fallback = self
            .last_positive
            .unwrap_or(self.totals.len().saturating_sub(1));
        trace!(r, total = self.total(), fallback, "draw beyond cumulative total");
        fallback
    }
}
