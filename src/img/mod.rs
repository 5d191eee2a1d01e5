//! Double-buffered image raster and PNG codec.
//!
//! An [`Image`] holds two equally-sized RGBA64 planes: a read plane that
//! effects consume and a write plane they produce into. [`Image::swap`]
//! exchanges the roles; after an even number of swaps the planes are back
//! in their original assignment. At any instant exactly one plane is the
//! read source and one the write target for the current step.
//!
//! The strategies' swap discipline (swap after every effect, plus one
//! trailing swap) always leaves the final pixels in the *write* plane, so
//! that is the plane [`Image::save`] encodes. With an empty effect list the
//! trailing swap moves the decoded input there, making output == input.

pub mod effects;

pub use effects::{Effect, CHANNELS};

use std::path::Path;

use image::{ImageBuffer, Rgba};

/// Decode/encode failures from the PNG codec.
pub type CodecError = image::ImageError;

/// A double-buffered RGBA64 raster.
pub struct Image {
    width: usize,
    height: usize,
    /// Read plane for the current step.
    src: Vec<u16>,
    /// Write plane for the current step.
    dst: Vec<u16>,
}

impl Image {
    /// Decode a PNG into the read plane; the write plane starts zeroed.
    pub fn load(path: &Path) -> Result<Self, CodecError> {
        let decoded = image::open(path)?.into_rgba16();
        let (width, height) = (decoded.width() as usize, decoded.height() as usize);
        let src = decoded.into_raw();
        let dst = vec![0u16; src.len()];
        Ok(Self {
            width,
            height,
            src,
            dst,
        })
    }

    /// Build an image from raw RGBA64 samples (row-major, 4 per pixel).
    ///
    /// # Panics
    /// Panics if `pixels.len() != width * height * CHANNELS`.
    pub fn from_raw(width: usize, height: usize, pixels: Vec<u16>) -> Self {
        assert_eq!(pixels.len(), width * height * CHANNELS);
        let dst = vec![0u16; pixels.len()];
        Self {
            width,
            height,
            src: pixels,
            dst,
        }
    }

    /// Encode the write plane as a 16-bit PNG.
    pub fn save(&self, path: &Path) -> Result<(), CodecError> {
        let buffer: ImageBuffer<Rgba<u16>, Vec<u16>> =
            ImageBuffer::from_raw(self.width as u32, self.height as u32, self.dst.clone())
                .expect("plane length matches dimensions by construction");
        buffer.save(path)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Exchange the read/write roles of the two planes.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.src, &mut self.dst);
    }

    /// Apply one effect over rows `[start, end)` (clamped to the image),
    /// reading the read plane and writing the write plane. No swap.
    pub fn apply(&mut self, effect: Effect, start: usize, end: usize) {
        let start = start.min(self.height);
        let end = end.min(self.height);
        if start >= end {
            return;
        }
        let stride = self.width * CHANNELS;
        let band = &mut self.dst[start * stride..end * stride];
        effects::apply_rows(
            effect,
            &self.src,
            self.width,
            self.height,
            band,
            start..end,
            0..self.height,
        );
    }

    /// Apply a full effect sequence over the whole row range with a swap
    /// after every effect, plus the trailing swap that parks the result in
    /// the write plane for [`Image::save`].
    pub fn apply_all(&mut self, effects: &[Effect]) {
        for &effect in effects {
            self.apply(effect, 0, self.height);
            self.swap();
        }
        self.swap();
    }

    /// Split-borrow the planes for one concurrent step: the shared read
    /// plane plus the exclusively-borrowed write plane, which callers may
    /// further split into disjoint row bands.
    pub fn planes_mut(&mut self) -> (&[u16], &mut [u16]) {
        (&self.src, &mut self.dst)
    }

    /// Both planes, read-only (read plane first).
    pub fn planes(&self) -> (&[u16], &[u16]) {
        (&self.src, &self.dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Image {
        let mut pixels = vec![0u16; width * height * CHANNELS];
        for y in 0..height {
            for x in 0..width {
                let i = (y * width + x) * CHANNELS;
                pixels[i] = (x * 911) as u16;
                pixels[i + 1] = (y * 499) as u16;
                pixels[i + 2] = ((x + y) * 137) as u16;
                pixels[i + 3] = 60_000;
            }
        }
        Image::from_raw(width, height, pixels)
    }

    #[test]
    fn swap_parity_restores_roles() {
        let mut img = gradient(3, 3);
        let original = img.planes().0.to_vec();
        img.swap();
        assert_eq!(img.planes().1, original.as_slice());
        img.swap();
        assert_eq!(img.planes().0, original.as_slice());
    }

    #[test]
    fn empty_effect_list_parks_input_in_write_plane() {
        let mut img = gradient(4, 2);
        let original = img.planes().0.to_vec();
        img.apply_all(&[]);
        assert_eq!(img.planes().1, original.as_slice());
    }

    #[test]
    fn apply_all_grayscale_produces_equal_channels() {
        let mut img = gradient(4, 4);
        img.apply_all(&[Effect::Grayscale]);
        let out = img.planes().1;
        for px in out.chunks_exact(CHANNELS) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert_eq!(px[3], 60_000);
        }
    }

    #[test]
    fn apply_clamps_row_range_to_bounds() {
        let mut img = gradient(3, 3);
        // Out-of-range rows are a no-op, not a panic.
        img.apply(Effect::Grayscale, 5, 9);
        img.apply(Effect::Grayscale, 2, 100);
        let stride = 3 * CHANNELS;
        let (src, dst) = img.planes();
        // Row 2 was written, rows 0..2 untouched (still zero).
        assert!(dst[..2 * stride].iter().all(|&v| v == 0));
        let s = 2 * stride;
        assert_ne!(&dst[s..s + CHANNELS], &[0, 0, 0, 0]);
        assert_eq!(dst[s + 3], src[s + 3]);
    }

    #[test]
    fn chained_effects_swap_after_each() {
        // G then E: a uniform plane grayscales to itself, then edge-detect
        // cancels interior pixels — proving the second effect read the
        // first's output, not the original input.
        let width = 5;
        let height = 5;
        let mut pixels = vec![0u16; width * height * CHANNELS];
        for px in pixels.chunks_exact_mut(CHANNELS) {
            px[0] = 900;
            px[1] = 900;
            px[2] = 900;
            px[3] = 500;
        }
        let mut img = Image::from_raw(width, height, pixels);
        img.apply_all(&[Effect::Grayscale, Effect::EdgeDetect]);
        let out = img.planes().1;
        let center = (2 * width + 2) * CHANNELS;
        assert_eq!(&out[center..center + 4], &[0, 0, 0, 500]);
    }
}
