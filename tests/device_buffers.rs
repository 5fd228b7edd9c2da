#![cfg(feature = "rayon")]

mod common;

use common::{assert_close, ring_mask, speckle, speckle_u16};
use xpcscorr::{
    Correlator, CorrelatorConfig, DenseCorrelator, ExtraOptions, FrameStack,
    ParallelDenseCorrelator, PixelType,
};

#[test]
fn reused_buffers_match_per_call_buffers() {
    let (frames, height, width) = (20, 8, 8);
    let mask = ring_mask(height, width, 2);
    let reuse = CorrelatorConfig::new(mask.clone(), PixelType::U16).with_options(ExtraOptions {
        reuse_buffers: true,
        ..ExtraOptions::default()
    });
    let reusing = ParallelDenseCorrelator::new(height, width, frames, reuse).unwrap();
    let per_call =
        ParallelDenseCorrelator::new(height, width, frames, CorrelatorConfig::new(mask, PixelType::U16))
            .unwrap();

    for seed in [10, 20, 30] {
        let data = speckle_u16(seed, frames, height, width);
        let stack = FrameStack::new(&data, frames, height, width).unwrap();
        assert_eq!(reusing.correlate(stack).unwrap(), per_call.correlate(stack).unwrap());
    }
    assert!(reusing.has_cached_buffers());
    assert!(!per_call.has_cached_buffers());
}

#[test]
fn integer_and_float_sources_agree() {
    let (frames, height, width) = (15, 6, 6);
    let mask = ring_mask(height, width, 2);
    let counts: Vec<u32> = speckle(8, frames, height, width, 0.7)
        .into_iter()
        .map(|v| v.round() as u32)
        .collect();
    let floats: Vec<f64> = counts.iter().map(|&v| f64::from(v)).collect();

    let from_u32 = ParallelDenseCorrelator::new(
        height,
        width,
        frames,
        CorrelatorConfig::new(mask.clone(), PixelType::U32),
    )
    .unwrap()
    .correlate(FrameStack::new(&counts, frames, height, width).unwrap())
    .unwrap();
    let from_f64 = ParallelDenseCorrelator::new(
        height,
        width,
        frames,
        CorrelatorConfig::new(mask, PixelType::F64),
    )
    .unwrap()
    .correlate(FrameStack::new(&floats, frames, height, width).unwrap())
    .unwrap();
    assert_eq!(from_u32, from_f64);
}

#[test]
fn large_counts_do_not_overflow() {
    // Products of these counts exceed u32::MAX by far.
    let (frames, height, width) = (6, 2, 2);
    let base = u32::MAX - 1000;
    let counts: Vec<u32> = (0..frames * height * width)
        .map(|i| base + (i as u32 * 97) % 1000)
        .collect();
    let mask = xpcscorr::BinMask::new(vec![1; 4], height, width).unwrap();
    let stack = FrameStack::new(&counts, frames, height, width).unwrap();
    let cfg = CorrelatorConfig::new(mask, PixelType::U32);

    let direct = DenseCorrelator::new(height, width, frames, cfg.clone())
        .unwrap()
        .correlate(stack)
        .unwrap();
    let device = ParallelDenseCorrelator::new(height, width, frames, cfg)
        .unwrap()
        .correlate(stack)
        .unwrap();
    for &value in device.as_slice() {
        assert!(value.is_finite());
        assert!((value - 1.0).abs() < 1e-6);
    }
    assert_close(&direct, &device, "device");
}
