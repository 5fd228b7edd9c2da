//! Frame stacks and bin masks.
//!
//! `FrameStack` is a borrowed view of `frames x height x width` intensities in
//! frame-major, row-major order: element `(t, y, x)` lives at
//! `t * height * width + y * width + x`. Correlators only ever read through
//! the view, so the caller keeps ownership of the detector data.

use crate::util::math::stack_len;
use crate::util::{CorrError, CorrResult};
use std::fmt;

mod mask;

#[cfg(feature = "image-io")]
pub mod io;

pub use mask::{BinMask, PixelSelection};

/// Numeric type tag of detector intensities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelType {
    U8,
    U16,
    U32,
    I32,
    F32,
    F64,
}

impl PixelType {
    /// Returns the numpy-style name of the dtype.
    pub fn name(self) -> &'static str {
        match self {
            PixelType::U8 => "uint8",
            PixelType::U16 => "uint16",
            PixelType::U32 => "uint32",
            PixelType::I32 => "int32",
            PixelType::F32 => "float32",
            PixelType::F64 => "float64",
        }
    }

    /// Parses a numpy-style dtype name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "uint8" | "u8" => Some(PixelType::U8),
            "uint16" | "u16" => Some(PixelType::U16),
            "uint32" | "u32" => Some(PixelType::U32),
            "int32" | "i32" => Some(PixelType::I32),
            "float32" | "f32" => Some(PixelType::F32),
            "float64" | "f64" => Some(PixelType::F64),
            _ => None,
        }
    }

    /// Returns true for integer dtypes.
    pub fn is_integer(self) -> bool {
        !matches!(self, PixelType::F32 | PixelType::F64)
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type of a frame stack.
///
/// All accumulation happens in `f64`; `to_f64` is the explicit upcast applied
/// before any product is formed.
pub trait Pixel: Copy + Send + Sync + 'static {
    /// Dtype tag matching this element type.
    const DTYPE: PixelType;

    /// Widens the value to `f64`.
    fn to_f64(self) -> f64;
}

macro_rules! impl_pixel {
    ($($ty:ty => $tag:ident),+ $(,)?) => {
        $(
            impl Pixel for $ty {
                const DTYPE: PixelType = PixelType::$tag;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )+
    };
}

impl_pixel!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    f64 => F64,
);

/// Borrowed view of a stack of equally sized frames.
#[derive(Copy, Clone)]
pub struct FrameStack<'a, T> {
    data: &'a [T],
    frames: usize,
    height: usize,
    width: usize,
}

impl<'a, T> FrameStack<'a, T> {
    /// Creates a view over `frames` contiguous `height x width` frames.
    pub fn new(data: &'a [T], frames: usize, height: usize, width: usize) -> CorrResult<Self> {
        let needed = required_len(frames, height, width)?;
        if data.len() < needed {
            return Err(CorrError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data: &data[..needed],
            frames,
            height,
            width,
        })
    }

    /// Returns the number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns the frame height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the frame width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Returns the number of pixels in one frame.
    pub fn pixels_per_frame(&self) -> usize {
        self.height * self.width
    }

    /// Returns the backing slice of exactly `frames * height * width` values.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns frame `t` as a row-major slice.
    pub fn frame(&self, t: usize) -> Option<&'a [T]> {
        if t >= self.frames {
            return None;
        }
        let plane = self.pixels_per_frame();
        self.data.get(t * plane..(t + 1) * plane)
    }

    /// Iterates over frames in time order.
    pub fn iter_frames(&self) -> impl ExactSizeIterator<Item = &'a [T]> + 'a {
        self.data.chunks_exact(self.height * self.width)
    }
}

impl<T: Pixel> FrameStack<'_, T> {
    /// Returns the dtype of the stack.
    pub fn dtype(&self) -> PixelType {
        T::DTYPE
    }

    /// Copies the time trace of linear pixel `index` into `out` as `f64`.
    ///
    /// `out` must hold exactly `frames` values.
    pub(crate) fn fill_trace(&self, index: usize, out: &mut [f64]) {
        let plane = self.pixels_per_frame();
        for (t, slot) in out.iter_mut().enumerate() {
            *slot = self.data[t * plane + index].to_f64();
        }
    }
}

/// Owned frame stack in contiguous frame-major layout.
#[derive(Clone, Debug)]
pub struct OwnedFrames<T> {
    data: Vec<T>,
    frames: usize,
    height: usize,
    width: usize,
}

impl<T> OwnedFrames<T> {
    /// Creates an owned stack, validating that the buffer length matches.
    pub fn new(data: Vec<T>, frames: usize, height: usize, width: usize) -> CorrResult<Self> {
        let needed = required_len(frames, height, width)?;
        if data.len() != needed {
            return Err(CorrError::BufferLength {
                expected: needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            frames,
            height,
            width,
        })
    }

    /// Returns a borrowed view of the stack.
    pub fn view(&self) -> FrameStack<'_, T> {
        FrameStack {
            data: &self.data,
            frames: self.frames,
            height: self.height,
            width: self.width,
        }
    }

    /// Returns the number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Returns the underlying buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Consumes the stack and returns the underlying buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

fn required_len(frames: usize, height: usize, width: usize) -> CorrResult<usize> {
    if frames == 0 || height == 0 || width == 0 {
        return Err(CorrError::InvalidDimensions {
            frames,
            height,
            width,
        });
    }
    stack_len(frames, height, width).ok_or(CorrError::InvalidDimensions {
        frames,
        height,
        width,
    })
}
