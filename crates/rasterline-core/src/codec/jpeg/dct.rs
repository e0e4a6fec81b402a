//! Separable 8x8 DCT-II / DCT-III on the standard cosine basis.

use std::f32::consts::{FRAC_1_SQRT_2, PI};

/// Cosine basis `c(u)/2 * cos((2x+1) u pi / 16)`, indexed `[x][u]`.
///
/// With this normalization the forward and inverse transforms are both a
/// product of two basis lookups per term.
#[derive(Debug, Clone)]
pub struct Dct {
    basis: [[f32; 8]; 8],
}

impl Default for Dct {
    fn default() -> Self {
        Self::new()
    }
}

impl Dct {
    pub fn new() -> Self {
        let mut basis = [[0.0f32; 8]; 8];
        for (x, row) in basis.iter_mut().enumerate() {
            for (u, b) in row.iter_mut().enumerate() {
                let cu = if u == 0 { FRAC_1_SQRT_2 } else { 1.0 };
                *b = cu / 2.0 * ((2 * x + 1) as f32 * u as f32 * PI / 16.0).cos();
            }
        }
        Self { basis }
    }

    /// Forward transform of level-shifted samples (natural order in and out).
    pub fn forward(&self, samples: &[f32; 64]) -> [f32; 64] {
        let b = &self.basis;
        let mut tmp = [0.0f32; 64];
        for y in 0..8 {
            for u in 0..8 {
                let mut sum = 0.0;
                for x in 0..8 {
                    sum += b[x][u] * samples[y * 8 + x];
                }
                tmp[y * 8 + u] = sum;
            }
        }

        let mut out = [0.0f32; 64];
        for u in 0..8 {
            for v in 0..8 {
                let mut sum = 0.0;
                for y in 0..8 {
                    sum += b[y][v] * tmp[y * 8 + u];
                }
                out[v * 8 + u] = sum;
            }
        }
        out
    }

    /// Inverse transform of dequantized coefficients into clamped samples,
    /// including the +128 level shift.
    pub fn inverse(&self, coeffs: &[i32; 64], out: &mut [u8; 64]) {
        let b = &self.basis;
        let mut tmp = [0.0f32; 64];
        for v in 0..8 {
            let row = &coeffs[v * 8..v * 8 + 8];
            if row.iter().all(|&c| c == 0) {
                continue;
            }
            for x in 0..8 {
                let mut sum = 0.0;
                for u in 0..8 {
                    sum += b[x][u] * row[u] as f32;
                }
                tmp[v * 8 + x] = sum;
            }
        }

        for x in 0..8 {
            for y in 0..8 {
                let mut sum = 0.0;
                for v in 0..8 {
                    sum += b[y][v] * tmp[v * 8 + x];
                }
                out[y * 8 + x] = (sum + 128.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
