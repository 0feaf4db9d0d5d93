//! Planar pose covariance.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// 3x3 covariance of (x, y, theta), row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Covariance2D {
    data: [f32; 9],
}

impl Covariance2D {
    #[inline]
    pub fn zero() -> Self {
        Self { data: [0.0; 9] }
    }

    /// Diagonal covariance from variances σ²_x, σ²_y, σ²_θ.
    #[inline]
    pub fn diagonal(xx: f32, yy: f32, tt: f32) -> Self {
        Self {
            data: [xx, 0.0, 0.0, 0.0, yy, 0.0, 0.0, 0.0, tt],
        }
    }

    pub fn from_matrix(m: &Matrix3<f32>) -> Self {
        let mut data = [0.0; 9];
        for r in 0..3 {
            for c in 0..3 {
                data[r * 3 + c] = m[(r, c)];
            }
        }
        Self { data }
    }

    #[inline]
    pub fn var_x(&self) -> f32 {
        self.data[0]
    }

    #[inline]
    pub fn var_y(&self) -> f32 {
        self.data[4]
    }

    #[inline]
    pub fn var_theta(&self) -> f32 {
        self.data[8]
    }

    /// Trace (total variance), a cheap scalar summary.
    #[inline]
    pub fn trace(&self) -> f32 {
        self.data[0] + self.data[4] + self.data[8]
    }
}

impl Default for Covariance2D {
    fn default() -> Self {
        Self::zero()
    }
}
