//! Per-pixel boolean masks.
//!
//! A `PixelMask` is either a selection (flood fill result) or an alpha state map
//! (opaque / transparent). Stored row-major as `(height, width)`.

use image::RgbaImage;
use ndarray::{Array2, Zip};

use crate::color::ALPHA_THRESHOLD;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMask {
    bits: Array2<bool>,
}

impl PixelMask {
    /// Empty mask (nothing selected)
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            bits: Array2::from_elem((height as usize, width as usize), false),
        }
    }

    /// Opaque map of an image: `true` where alpha > 128
    pub fn opaque(img: &RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        let bits = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            img.get_pixel(x as u32, y as u32)[3] > ALPHA_THRESHOLD
        });
        Self { bits }
    }

    pub fn width(&self) -> u32 {
        self.bits.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.bits.nrows() as u32
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[[y as usize, x as usize]]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        self.bits[[y as usize, x as usize]] = value;
    }

    /// Number of selected pixels
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }

    /// Coordinates of selected pixels, row-major
    pub fn iter_selected(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.bits
            .indexed_iter()
            .filter(|(_, b)| **b)
            .map(|((y, x), _)| (x as u32, y as u32))
    }

    /// Add every pixel of `other` to this mask. Masks of a different shape are ignored.
    pub fn union_with(&mut self, other: &PixelMask) -> bool {
        if self.bits.dim() != other.bits.dim() {
            return false;
        }
        Zip::from(&mut self.bits)
            .and(&other.bits)
            .for_each(|a, &b| *a |= b);
        true
    }

    pub(crate) fn bits(&self) -> &Array2<bool> {
        &self.bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_opaque_threshold() {
        let mut img = RgbaImage::from_pixel(3, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 128]));
        img.put_pixel(2, 0, Rgba([0, 0, 0, 129]));

        let mask = PixelMask::opaque(&img);
        assert!(mask.get(0, 0));
        assert!(!mask.get(1, 0));
        assert!(mask.get(2, 0));
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn test_set_and_iterate() {
        let mut mask = PixelMask::new(4, 3);
        assert!(mask.is_empty());
        mask.set(3, 0, true);
        mask.set(1, 2, true);
        let selected: Vec<_> = mask.iter_selected().collect();
        assert_eq!(selected, vec![(3, 0), (1, 2)]);
        assert_eq!(mask.dimensions(), (4, 3));
    }

    #[test]
    fn test_union() {
        let mut a = PixelMask::new(2, 2);
        let mut b = PixelMask::new(2, 2);
        a.set(0, 0, true);
        b.set(1, 1, true);
        assert!(a.union_with(&b));
        assert_eq!(a.count(), 2);

        let other_shape = PixelMask::new(3, 2);
        assert!(!a.union_with(&other_shape));
        assert_eq!(a.count(), 2);
    }
}
