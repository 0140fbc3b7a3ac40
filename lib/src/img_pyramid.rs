use crate::{
    constraint::LabelGrid,
    mask::{has_valid_target, HoleMask},
    nnf::placement_dims,
    pixels::PixelBuffer,
    resample::{level_dims, resize_area, resize_bicubic},
    Parameters,
};
use rand::Rng;

/// One resolution step of a completion.
pub(crate) struct PyramidLevel {
    pub scale_log2: i32,
    pub image: image::RgbImage,
    pub hole: HoleMask,
    pub labels: Option<LabelGrid>,
}

/// Produces the levels of a completion from coarsest to finest.
///
/// Every level is derived from the full resolution inputs, never from the
/// previous level, except for the hole estimate which is carried upward.
pub(crate) struct ImagePyramid<'a> {
    original: &'a image::RgbImage,
    mask: image::GrayImage,
    labels: Option<&'a LabelGrid>,
    /// log2 scales of the levels, coarsest first, always ending with 0
    pub scales: Vec<i32>,
}

impl<'a> ImagePyramid<'a> {
    pub fn new(
        original: &'a image::RgbImage,
        hole: &HoleMask,
        labels: Option<&'a LabelGrid>,
        params: &Parameters,
    ) -> Self {
        let mask = hole.to_gray();
        let dims = original.dims();

        // raise the start scale until the coarsest level can hold a patch
        // with at least one valid target, and one for every label in use
        let start = (params.start_scale..=0)
            .find(|&s| {
                let ld = level_dims(dims, s);
                if ld.width <= params.patch_w || ld.height <= params.patch_w {
                    return false;
                }

                let level_hole = HoleMask::from_gray(&resize_area(&mask, ld));
                let exclusion = params.exclusion_mode.build(&level_hole, params.patch_w);
                if !has_valid_target(&exclusion, placement_dims(ld, params.patch_w)) {
                    return false;
                }

                labels.map_or(true, |l| {
                    l.resize_nearest(ld)
                        .unsatisfiable_label(&exclusion, params.patch_w)
                        .is_none()
                })
            })
            .unwrap_or(0);

        if start != params.start_scale {
            tracing::warn!(
                requested = params.start_scale,
                used = start,
                patch_size = params.patch_w,
                "start scale is too coarse for the patch size, raised"
            );
        }

        Self {
            original,
            mask,
            labels,
            scales: (start..=0).collect(),
        }
    }

    /// The known pixels and the hole at `scale_log2`, both area resampled
    /// from the full resolution inputs
    fn level(&self, scale_log2: i32) -> PyramidLevel {
        let dims = level_dims(self.original.dims(), scale_log2);

        PyramidLevel {
            scale_log2,
            image: resize_area(self.original, dims),
            hole: HoleMask::from_gray(&resize_area(&self.mask, dims)),
            labels: self.labels.map(|l| l.resize_nearest(dims)),
        }
    }

    /// The coarsest level, with every hole pixel set to a random color
    pub fn coarsest(&self, rng: &mut impl Rng) -> PyramidLevel {
        let mut level = self.level(self.scales[0]);
        for c in level.hole.iter_holes() {
            level.image.set_rgb(c.x, c.y, rng.gen());
        }
        level
    }

    /// The level at `scale_log2`, its hole seeded with the bicubic upsampled
    /// `completed` image of the previous, coarser level
    pub fn upsample(&self, completed: &image::RgbImage, scale_log2: i32) -> PyramidLevel {
        let mut level = self.level(scale_log2);
        let mut estimate = resize_bicubic(completed, level.image.dims());

        for (x, y, p) in level.image.enumerate_pixels() {
            if !level.hole.is_hole(x, y) {
                estimate.put_pixel(x, y, *p);
            }
        }

        level.image = estimate;
        level
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Dims;
    use rand::SeedableRng;

    fn inputs(size: u32) -> (image::RgbImage, HoleMask) {
        let img = image::RgbImage::from_fn(size, size, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, 128])
        });
        let hole = HoleMask::from_fn(Dims::square(size), |x, y| {
            x >= size / 2 && x < size / 2 + 4 && y >= size / 2 && y < size / 2 + 4
        });
        (img, hole)
    }

    #[test]
    fn scales_run_to_full_resolution() {
        let (img, hole) = inputs(64);
        let params = Parameters {
            patch_w: 3,
            start_scale: -3,
            ..Parameters::default()
        };

        let pyramid = ImagePyramid::new(&img, &hole, None, &params);
        assert_eq!(pyramid.scales, vec![-3, -2, -1, 0]);
    }

    #[test]
    fn start_scale_is_raised_for_large_patches() {
        let (img, hole) = inputs(32);
        let params = Parameters {
            patch_w: 7,
            start_scale: -4,
            ..Parameters::default()
        };

        // at 8x8 every 7x7 placement covers the hole, 16x16 is the first
        // level with somewhere to copy from
        let pyramid = ImagePyramid::new(&img, &hole, None, &params);
        assert_eq!(pyramid.scales, vec![-1, 0]);
    }

    #[test]
    fn upsampled_level_keeps_known_pixels() {
        let (img, hole) = inputs(32);
        let params = Parameters {
            patch_w: 3,
            start_scale: -1,
            ..Parameters::default()
        };
        let pyramid = ImagePyramid::new(&img, &hole, None, &params);
        let mut rng = rand_pcg::Pcg32::seed_from_u64(1);

        let coarse = pyramid.coarsest(&mut rng);
        assert_eq!(coarse.image.dimensions(), (16, 16));
        assert_eq!(coarse.hole.hole_count(), 4);

        let fine = pyramid.upsample(&coarse.image, 0);
        assert_eq!(fine.hole, hole);
        for (x, y, p) in img.enumerate_pixels() {
            if !hole.is_hole(x, y) {
                assert_eq!(fine.image.get_pixel(x, y), p);
            }
        }
    }

    #[test]
    fn start_scale_is_raised_for_unreachable_labels() {
        let img = image::RgbImage::from_fn(64, 64, |x, y| image::Rgb([(x * 4) as u8, (y * 4) as u8, 9]));
        let inside = |v: u32| v >= 24 && v <= 40;
        let hole = HoleMask::from_fn(Dims::square(64), |x, y| inside(x) && inside(y));
        // a thin strip just left of the hole shares label 2 with part of it
        let labels = LabelGrid::from_fn(Dims::square(64), |x, y| {
            let strip = (16..=18).contains(&x) && inside(y);
            if strip || (hole.is_hole(x, y) && x <= 32) {
                2
            } else {
                0
            }
        });
        let params = Parameters {
            patch_w: 5,
            start_scale: -2,
            ..Parameters::default()
        };

        assert_eq!(ImagePyramid::new(&img, &hole, None, &params).scales, vec![-2, -1, 0]);
        // at half size and below every strip patch overlaps the dilated hole
        assert_eq!(ImagePyramid::new(&img, &hole, Some(&labels), &params).scales, vec![0]);
    }
}
