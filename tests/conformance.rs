//! Shared conformance suite run against every available backend.

mod common;

use common::{assert_close, build, ring_mask, speckle, speckle_f32, speckle_u16};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xpcscorr::{
    available_backends, AnyCorrelator, Backend, BinMask, Correlator, CorrelatorConfig, CorrError,
    ErrorKind, FrameStack, PixelType,
};

#[test]
fn backends_agree_with_direct_on_integer_speckle() {
    let (frames, height, width) = (40, 16, 12);
    let mask = ring_mask(height, width, 4);
    let data = speckle_u16(7, frames, height, width);
    let stack = FrameStack::new(&data, frames, height, width).unwrap();

    let reference = build(Backend::Direct, &mask, frames, PixelType::U16)
        .correlate(stack)
        .unwrap();
    assert_eq!(reference.bins(), 4);
    assert_eq!(reference.lags(), frames - 1);

    for backend in available_backends() {
        let result = build(backend, &mask, frames, PixelType::U16)
            .correlate(stack)
            .unwrap();
        assert_close(&reference, &result, backend.name());
    }
}

#[test]
fn backends_agree_with_direct_on_float_speckle() {
    let (frames, height, width) = (64, 10, 10);
    let mask = ring_mask(height, width, 2);
    let data = speckle_f32(11, frames, height, width);
    let stack = FrameStack::new(&data, frames, height, width).unwrap();

    let reference = build(Backend::Direct, &mask, frames, PixelType::F32)
        .correlate(stack)
        .unwrap();
    // AR(1) speckle decorrelates: short lags exceed long lags.
    for row in reference.rows() {
        let far = &row[frames / 2..frames / 2 + 8];
        let far_mean = far.iter().sum::<f64>() / far.len() as f64;
        assert!(row[0] > far_mean, "{} vs {far_mean}", row[0]);
    }
    for backend in available_backends() {
        let result = build(backend, &mask, frames, PixelType::F32)
            .correlate(stack)
            .unwrap();
        assert_close(&reference, &result, backend.name());
    }
}

#[test]
fn constant_intensity_gives_unity_at_every_lag() {
    for (frames, height, width, bins) in [(2, 3, 3, 1), (7, 6, 6, 2), (33, 8, 5, 3)] {
        let mask = ring_mask(height, width, bins);
        let data = vec![42u16; frames * height * width];
        let stack = FrameStack::new(&data, frames, height, width).unwrap();
        for backend in available_backends() {
            let result = build(backend, &mask, frames, PixelType::U16)
                .correlate(stack)
                .unwrap();
            for &value in result.as_slice() {
                assert!(
                    (value - 1.0).abs() < 1e-9,
                    "{backend} N={frames}: {value}"
                );
            }
        }
    }
}

#[test]
fn empty_bin_is_a_configuration_error_for_every_backend() {
    // Labels 1 and 3 are present, 2 is not.
    let mask = BinMask::new(vec![1, 1, 3, 3, 0, 0], 2, 3).unwrap();
    for backend in available_backends() {
        let err = AnyCorrelator::new(
            backend,
            2,
            3,
            5,
            CorrelatorConfig::new(mask.clone(), PixelType::U16),
        )
        .err()
        .unwrap();
        assert_eq!(err, CorrError::EmptyBin { bin: 2 });
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}

#[test]
fn unavailable_backends_fail_at_construction() {
    let mask = BinMask::new(vec![1; 4], 2, 2).unwrap();
    for backend in Backend::ALL {
        let built = AnyCorrelator::new(
            backend,
            2,
            2,
            4,
            CorrelatorConfig::new(mask.clone(), PixelType::U8),
        );
        if backend.is_available() {
            assert_eq!(built.unwrap().backend(), backend);
        } else {
            let err = built.err().unwrap();
            assert_eq!(err, CorrError::BackendUnavailable { backend });
            assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        }
    }
}

#[test]
fn mismatched_frames_fail_before_any_work() {
    let mask = ring_mask(6, 6, 2);
    let data = speckle_u16(3, 8, 6, 6);
    for backend in available_backends() {
        let correlator = build(backend, &mask, 8, PixelType::U16);
        let short = FrameStack::new(&data[..7 * 36], 7, 6, 6).unwrap();
        assert_eq!(
            correlator.correlate(short).err(),
            Some(CorrError::FrameCountMismatch {
                expected: 8,
                got: 7,
            })
        );
        let reshaped = FrameStack::new(&data, 8, 4, 9).unwrap();
        assert!(matches!(
            correlator.correlate(reshaped),
            Err(CorrError::ShapeMismatch { .. })
        ));
        let floats = vec![1.0f32; 8 * 36];
        let wrong_dtype = FrameStack::new(&floats, 8, 6, 6).unwrap();
        assert_eq!(
            correlator.correlate(wrong_dtype).err(),
            Some(CorrError::DtypeMismatch {
                expected: PixelType::U16,
                got: PixelType::F32,
            })
        );
    }
}

#[test]
fn repeated_calls_are_idempotent() {
    let (frames, height, width) = (24, 9, 9);
    let mask = ring_mask(height, width, 3);
    let data = speckle_u16(19, frames, height, width);
    let stack = FrameStack::new(&data, frames, height, width).unwrap();
    for backend in available_backends() {
        let correlator = build(backend, &mask, frames, PixelType::U16);
        let first = correlator.correlate(stack).unwrap();
        let second = correlator.correlate(stack).unwrap();
        match backend {
            Backend::Direct | Backend::Device => assert_eq!(first, second, "{backend}"),
            Backend::Fft => {
                for err in first.max_abs_diff_per_bin(&second).unwrap() {
                    assert!(err < 1e-12, "{backend}: {err}");
                }
            }
        }
    }
}

#[test]
fn eleven_frame_sine_matches_hand_computed_lag_one() {
    let (frames, height, width) = (11, 4, 4);
    let mut rng = StdRng::seed_from_u64(2019);
    let mut data = Vec::with_capacity(frames * height * width);
    for t in 0..frames {
        for _ in 0..height * width {
            let noise: f64 = rng.random_range(-0.1..0.1);
            data.push(2.0 + (t as f64).sin() + noise);
        }
    }
    let mask = BinMask::new(vec![1; 16], height, width).unwrap();
    let stack = FrameStack::new(&data, frames, height, width).unwrap();

    // Lag 1 with one bin of 16 pixels over 10 origins.
    let pixels = height * width;
    let at = |t: usize, p: usize| data[t * pixels + p];
    let mut num = 0.0;
    let mut den = 0.0;
    for t in 0..frames - 1 {
        let mut mean_a = 0.0;
        let mut mean_b = 0.0;
        for p in 0..pixels {
            num += at(t, p) * at(t + 1, p);
            mean_a += at(t, p);
            mean_b += at(t + 1, p);
        }
        den += (mean_a / pixels as f64) * (mean_b / pixels as f64);
    }
    let expected = (num / pixels as f64 / 10.0) / (den / 10.0);

    let direct = build(Backend::Direct, &mask, frames, PixelType::F64)
        .correlate(stack)
        .unwrap();
    assert_eq!((direct.bins(), direct.lags()), (1, 10));
    assert!((direct.get(0, 1).unwrap() - expected).abs() < 1e-12);

    for backend in available_backends() {
        let result = build(backend, &mask, frames, PixelType::F64)
            .correlate(stack)
            .unwrap();
        assert_close(&direct, &result, backend.name());
    }
}

#[test]
fn excluded_pixels_do_not_contribute() {
    let (frames, height, width) = (12, 4, 4);
    let mut data = speckle(5, frames, height, width, 0.5);
    // Column 0 is excluded; put huge spikes there.
    for t in 0..frames {
        for y in 0..height {
            data[t * 16 + y * 4] = if t % 2 == 0 { 1e6 } else { 0.0 };
        }
    }
    let mask = BinMask::from_fn(height, width, |_, x| u32::from(x > 0)).unwrap();
    let stack = FrameStack::new(&data, frames, height, width).unwrap();

    let mut cleaned = data.clone();
    for t in 0..frames {
        for y in 0..height {
            cleaned[t * 16 + y * 4] = 100.0;
        }
    }
    let clean_stack = FrameStack::new(&cleaned, frames, height, width).unwrap();
    for backend in available_backends() {
        let correlator = build(backend, &mask, frames, PixelType::F64);
        let spiked = correlator.correlate(stack).unwrap();
        let clean = correlator.correlate(clean_stack).unwrap();
        assert_close(&clean, &spiked, backend.name());
    }
}

#[test]
fn sparse_photon_counts_agree_including_single_pixel_bins() {
    let (frames, height, width) = (50, 6, 6);
    // Bins 1..=6 are single pixels of the first row; bin 7 is the rest.
    let mask = BinMask::from_fn(height, width, |y, x| if y == 0 { x as u32 + 1 } else { 7 })
        .unwrap();
    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let data: Vec<u16> = (0..frames * height * width)
            .map(|_| {
                if rng.random_bool(0.1) {
                    rng.random_range(1..=3)
                } else {
                    0
                }
            })
            .collect();
        let stack = FrameStack::new(&data, frames, height, width).unwrap();
        let reference = build(Backend::Direct, &mask, frames, PixelType::U16)
            .correlate(stack)
            .unwrap();
        for backend in available_backends() {
            let result = build(backend, &mask, frames, PixelType::U16)
                .correlate(stack)
                .unwrap();
            assert_close(&reference, &result, backend.name());
        }
    }
}

#[test]
fn every_dtype_gives_the_same_g2_for_the_same_counts() {
    let (frames, height, width) = (24, 6, 6);
    let mask = ring_mask(height, width, 2);
    let mut rng = StdRng::seed_from_u64(21);
    let counts: Vec<u8> = (0..frames * height * width)
        .map(|_| rng.random_range(0..=40))
        .collect();
    let as_u16: Vec<u16> = counts.iter().copied().map(u16::from).collect();
    let reference = build(Backend::Direct, &mask, frames, PixelType::U16)
        .correlate(FrameStack::new(&as_u16, frames, height, width).unwrap())
        .unwrap();

    let as_u32: Vec<u32> = counts.iter().copied().map(u32::from).collect();
    let as_i32: Vec<i32> = counts.iter().copied().map(i32::from).collect();
    let as_f32: Vec<f32> = counts.iter().copied().map(f32::from).collect();
    let as_f64: Vec<f64> = counts.iter().copied().map(f64::from).collect();
    for backend in available_backends() {
        let label = backend.name();
        let run = |dtype| build(backend, &mask, frames, dtype);
        let u8_result = run(PixelType::U8)
            .correlate(FrameStack::new(&counts, frames, height, width).unwrap())
            .unwrap();
        let u32_result = run(PixelType::U32)
            .correlate(FrameStack::new(&as_u32, frames, height, width).unwrap())
            .unwrap();
        let i32_result = run(PixelType::I32)
            .correlate(FrameStack::new(&as_i32, frames, height, width).unwrap())
            .unwrap();
        let f32_result = run(PixelType::F32)
            .correlate(FrameStack::new(&as_f32, frames, height, width).unwrap())
            .unwrap();
        let f64_result = run(PixelType::F64)
            .correlate(FrameStack::new(&as_f64, frames, height, width).unwrap())
            .unwrap();
        for result in [u8_result, u32_result, i32_result, f32_result, f64_result] {
            assert_close(&reference, &result, label);
        }
    }
}
