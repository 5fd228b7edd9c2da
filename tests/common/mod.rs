#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xpcscorr::{AnyCorrelator, Backend, BinMask, CorrelationMatrix, CorrelatorConfig, PixelType};

/// Relative tolerance for cross-backend agreement.
pub const TOL: f64 = 5e-3;

/// Labels pixels by distance from the frame center into `bins` rings;
/// pixels beyond the last ring are excluded.
pub fn ring_mask(height: usize, width: usize, bins: usize) -> BinMask {
    let cy = (height as f64 - 1.0) / 2.0;
    let cx = (width as f64 - 1.0) / 2.0;
    let r_max = cy.min(cx) + 0.5;
    BinMask::from_fn(height, width, |y, x| {
        let r = ((y as f64 - cy).powi(2) + (x as f64 - cx).powi(2)).sqrt();
        let ring = (r / r_max * bins as f64) as usize;
        if ring < bins {
            ring as u32 + 1
        } else {
            0
        }
    })
    .unwrap()
}

/// Frame-major AR(1) speckle: every pixel decorrelates with coefficient `a`
/// per frame around a mean of 100 counts.
pub fn speckle(seed: u64, frames: usize, height: usize, width: usize, a: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let pixels = height * width;
    let mut state: Vec<f64> = (0..pixels).map(|_| rng.random_range(-1.0..1.0)).collect();
    let gain = (1.0 - a * a).sqrt();
    let mut data = Vec::with_capacity(frames * pixels);
    for _ in 0..frames {
        for s in state.iter_mut() {
            *s = a * *s + gain * rng.random_range(-1.0..1.0);
            data.push((100.0 + 40.0 * *s).max(0.0));
        }
    }
    data
}

pub fn speckle_u16(seed: u64, frames: usize, height: usize, width: usize) -> Vec<u16> {
    speckle(seed, frames, height, width, 0.8)
        .into_iter()
        .map(|v| v.round() as u16)
        .collect()
}

pub fn speckle_f32(seed: u64, frames: usize, height: usize, width: usize) -> Vec<f32> {
    speckle(seed, frames, height, width, 0.9)
        .into_iter()
        .map(|v| v as f32)
        .collect()
}

pub fn build(
    backend: Backend,
    mask: &BinMask,
    frames: usize,
    dtype: PixelType,
) -> AnyCorrelator {
    let (height, width) = mask.shape();
    AnyCorrelator::new(
        backend,
        height,
        width,
        frames,
        CorrelatorConfig::new(mask.clone(), dtype),
    )
    .unwrap()
}

pub fn assert_close(reference: &CorrelationMatrix, other: &CorrelationMatrix, label: &str) {
    assert_eq!(reference.bins(), other.bins(), "{label}: bins");
    assert_eq!(reference.lags(), other.lags(), "{label}: lags");
    for (bin, (a, b)) in reference.rows().zip(other.rows()).enumerate() {
        for (col, (x, y)) in a.iter().zip(b).enumerate() {
            assert!(
                (x - y).abs() <= TOL * x.abs().max(1.0),
                "{label}: bin {bin} lag {}: {x} vs {y}",
                col + 1
            );
        }
    }
}
