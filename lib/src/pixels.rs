//! Backend-agnostic access to grids of RGB samples.
//!
//! The matcher and the distance function only ever read and write whole RGB
//! triples by coordinate, so any pixel store that can do that can be matched
//! against any other. Alpha, where present, is carried along untouched.

use crate::Dims;

/// A single RGB sample
pub type Rgb = [u8; 3];

/// A width x height grid of RGB samples.
pub trait PixelBuffer {
    fn dims(&self) -> Dims;

    /// Gets the sample at `(x, y)`, which must be in bounds
    fn rgb(&self, x: u32, y: u32) -> Rgb;

    /// Sets the sample at `(x, y)`, which must be in bounds
    fn set_rgb(&mut self, x: u32, y: u32, value: Rgb);
}

impl PixelBuffer for image::RgbImage {
    #[inline]
    fn dims(&self) -> Dims {
        Dims::new(self.width(), self.height())
    }

    #[inline]
    fn rgb(&self, x: u32, y: u32) -> Rgb {
        self.get_pixel(x, y).0
    }

    #[inline]
    fn set_rgb(&mut self, x: u32, y: u32, value: Rgb) {
        self.put_pixel(x, y, image::Rgb(value));
    }
}

impl PixelBuffer for image::RgbaImage {
    #[inline]
    fn dims(&self) -> Dims {
        Dims::new(self.width(), self.height())
    }

    #[inline]
    fn rgb(&self, x: u32, y: u32) -> Rgb {
        let p = self.get_pixel(x, y).0;
        [p[0], p[1], p[2]]
    }

    #[inline]
    fn set_rgb(&mut self, x: u32, y: u32, value: Rgb) {
        let alpha = self.get_pixel(x, y)[3];
        self.put_pixel(x, y, image::Rgba([value[0], value[1], value[2], alpha]));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rgba_keeps_alpha() {
        let mut img = image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 40]));
        img.set_rgb(1, 0, [9, 8, 7]);

        assert_eq!(img.rgb(1, 0), [9, 8, 7]);
        assert_eq!(img.get_pixel(1, 0)[3], 40);
        assert_eq!(img.dims(), Dims::new(2, 2));
    }
}
