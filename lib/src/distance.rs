use crate::{nnf::Coord, pixels::PixelBuffer};

/// Sum of squared per-channel differences between two patches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance(pub u32);

impl Distance {
    pub const ZERO: Self = Self(0);
    /// Unbounded distance, also what a sum that would overflow turns into
    pub const MAX: Self = Self(u32::MAX);

    #[inline]
    pub fn is_unbounded(self) -> bool {
        self == Self::MAX
    }
}

/// Measures the distance between the `patch_w` x `patch_w` patches with upper
/// left corners `pa` in `a` and `pb` in `b`.
///
/// Rows are accumulated one at a time, and as soon as the running sum reaches
/// `cutoff` the cutoff itself is returned, since later rows can only add to
/// it. Pass [`Distance::MAX`] to get the exact distance. A sum that doesn't
/// fit is likewise reported as `cutoff`, never as a wrapped small value.
pub fn patch_distance<A, B>(
    a: &A,
    b: &B,
    pa: Coord,
    pb: Coord,
    patch_w: u32,
    cutoff: Distance,
) -> Distance
where
    A: PixelBuffer + ?Sized,
    B: PixelBuffer + ?Sized,
{
    let mut sum: u32 = 0;

    for dy in 0..patch_w {
        for dx in 0..patch_w {
            let ca = a.rgb(pa.x + dx, pa.y + dy);
            let cb = b.rgb(pb.x + dx, pb.y + dy);

            for (&u, &v) in ca.iter().zip(cb.iter()) {
                let diff = u32::from(u.max(v) - u.min(v));
                sum = match sum.checked_add(diff * diff) {
                    Some(s) => s,
                    None => return cutoff,
                };
            }
        }

        if sum >= cutoff.0 {
            return cutoff;
        }
    }

    Distance(sum)
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(w: u32, h: u32, seed: u8) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                (x * 17 + y * 3) as u8 ^ seed,
                (y * 29 + x) as u8,
                seed.wrapping_mul(x as u8),
            ])
        })
    }

    #[test]
    fn identical_patches_are_zero() {
        let img = gradient(8, 8, 3);
        let d = patch_distance(&img, &img, Coord::new(2, 1), Coord::new(2, 1), 4, Distance::MAX);
        assert_eq!(d, Distance::ZERO);
    }

    #[test]
    fn sums_every_channel() {
        let a = RgbImage::from_pixel(3, 3, Rgb([10, 20, 30]));
        let b = RgbImage::from_pixel(3, 3, Rgb([13, 16, 30]));

        // (3^2 + 4^2) per pixel over a 2x2 patch
        let d = patch_distance(&a, &b, Coord::new(0, 0), Coord::new(1, 1), 2, Distance::MAX);
        assert_eq!(d, Distance(4 * 25));
    }

    #[test]
    fn symmetric_without_cutoff() {
        let a = gradient(12, 9, 7);
        let b = gradient(10, 11, 91);

        for &(p, q) in &[
            (Coord::new(0, 0), Coord::new(3, 4)),
            (Coord::new(7, 3), Coord::new(1, 6)),
            (Coord::new(5, 5), Coord::new(5, 5)),
        ] {
            assert_eq!(
                patch_distance(&a, &b, p, q, 4, Distance::MAX),
                patch_distance(&b, &a, q, p, 4, Distance::MAX),
            );
        }
    }

    #[test]
    fn stops_at_cutoff() {
        let a = RgbImage::from_pixel(5, 5, Rgb([0, 0, 0]));
        let b = RgbImage::from_pixel(5, 5, Rgb([255, 255, 255]));

        let exact = patch_distance(&a, &b, Coord::new(0, 0), Coord::new(0, 0), 5, Distance::MAX);
        assert_eq!(exact, Distance(25 * 3 * 255 * 255));

        let cut = patch_distance(&a, &b, Coord::new(0, 0), Coord::new(0, 0), 5, Distance(1000));
        assert_eq!(cut, Distance(1000));
    }

    #[test]
    fn overflow_is_never_small() {
        // 150 * 150 * 3 * 255^2 doesn't fit in a u32
        let a = RgbImage::from_pixel(150, 150, Rgb([0, 0, 0]));
        let b = RgbImage::from_pixel(150, 150, Rgb([255, 255, 255]));

        let d = patch_distance(&a, &b, Coord::new(0, 0), Coord::new(0, 0), 150, Distance::MAX);
        assert!(d.is_unbounded());
    }
}
