use crate::{
    constraint::LabelGrid,
    errors::{Error, SizeMismatch},
    img_pyramid::{ImagePyramid, PyramidLevel},
    mask::HoleMask,
    matcher::PatchMatcher,
    nnf::Nnf,
    pixels::PixelBuffer,
    session::{CompletionProgress, ProgressStat, ProgressUpdate},
    vote::vote,
    Parameters,
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

pub(crate) struct Completed {
    pub image: image::RgbImage,
    /// The field of the last iteration at full resolution
    pub nnf: Option<Nnf>,
    /// How many times a completed level was upsampled into the next
    pub transitions: u32,
}

/// Fills the holes of `image` with content borrowed from its known pixels.
///
/// If `labels` is given, a patch whose corner pixel carries a non-zero label
/// is only ever filled from patches with the same label.
pub fn complete(
    image: &image::RgbImage,
    hole: &HoleMask,
    labels: Option<&LabelGrid>,
    params: &Parameters,
) -> Result<image::RgbImage, Error> {
    run(image, hole, labels, params, &mut None).map(|c| c.image)
}

pub(crate) fn check_inputs(
    image: &image::RgbImage,
    hole: &HoleMask,
    labels: Option<&LabelGrid>,
    params: &Parameters,
) -> Result<(), Error> {
    params.validate()?;

    let dims = image.dims();
    let mut others = vec![("mask", hole.dims())];
    if let Some(labels) = labels {
        others.push(("constraint map", labels.dims()));
    }

    for (input, other) in others {
        if other != dims {
            return Err(Error::SizeMismatch(SizeMismatch {
                input,
                image: (dims.width, dims.height),
                other: (other.width, other.height),
            }));
        }
    }

    if dims.width < params.patch_w || dims.height < params.patch_w {
        return Err(Error::PatchTooLarge {
            patch_size: params.patch_w,
            width: dims.width,
            height: dims.height,
        });
    }

    Ok(())
}

pub(crate) fn run(
    image: &image::RgbImage,
    hole: &HoleMask,
    labels: Option<&LabelGrid>,
    params: &Parameters,
    progress: &mut Option<Box<dyn CompletionProgress>>,
) -> Result<Completed, Error> {
    check_inputs(image, hole, labels, params)?;

    if hole.is_empty() {
        return Ok(Completed {
            image: image.clone(),
            nnf: None,
            transitions: 0,
        });
    }

    let mut rng = Pcg32::seed_from_u64(params.seed);
    let pyramid = ImagePyramid::new(image, hole, labels, params);
    let levels = ProgressStat {
        current: 0,
        total: pyramid.scales.len(),
    };

    let mut level = pyramid.coarsest(&mut rng);
    let mut nnf = complete_level(&mut level, params, &mut rng, progress, levels)?;
    let mut transitions = 0;

    for (i, &scale) in pyramid.scales.iter().enumerate().skip(1) {
        level = pyramid.upsample(&level.image, scale);
        transitions += 1;

        let levels = ProgressStat {
            current: i,
            total: pyramid.scales.len(),
        };
        nnf = complete_level(&mut level, params, &mut rng, progress, levels)?;
    }

    Ok(Completed {
        image: level.image,
        nnf,
        transitions,
    })
}

/// Runs match and vote rounds on a single level until the hole stops
/// changing or the iteration budget is spent, returning the last field.
pub(crate) fn complete_level(
    level: &mut PyramidLevel,
    params: &Parameters,
    rng: &mut Pcg32,
    progress: &mut Option<Box<dyn CompletionProgress>>,
    levels: ProgressStat,
) -> Result<Option<Nnf>, Error> {
    let dims = level.image.dims();
    let hole_count = level.hole.hole_count();

    let _span = tracing::info_span!(
        "level",
        scale = level.scale_log2,
        width = dims.width,
        height = dims.height,
        holes = hole_count
    )
    .entered();

    if hole_count == 0 {
        tracing::debug!("no holes at this scale");
        return Ok(None);
    }

    let exclusion = params.exclusion_mode.build(&level.hole, params.patch_w);
    let threads = params.thread_count();
    let mut nnf = None;

    for iteration in 0..params.inner_iterations {
        // match against a copy whose hole holds nothing to copy from
        let mut target = level.image.clone();
        level.hole.blank(&mut target);

        let matcher = PatchMatcher::new(&level.image, &target, &exclusion, params, rng.gen())?;
        let mut matcher = match &level.labels {
            Some(labels) => matcher.with_constraints(labels, labels)?,
            None => matcher,
        };

        matcher.initialize()?;
        for _ in 0..params.outer_iterations {
            matcher.iterate();
        }
        let field = matcher.into_nnf();

        let voted = vote(&level.image, &target, &field, &level.hole, params.sigma, threads)?;
        let change = mean_squared_change(&level.image, &voted, &level.hole);
        level.image = voted;

        tracing::debug!(
            iteration,
            change,
            mean_distance = field.mean_distance(),
            "voted"
        );
        nnf = Some(field);

        if let Some(progress) = progress.as_mut() {
            progress.update(ProgressUpdate {
                image: &level.image,
                level: ProgressStat {
                    current: levels.current + 1,
                    total: levels.total,
                },
                iteration: ProgressStat {
                    current: iteration as usize + 1,
                    total: params.inner_iterations as usize,
                },
                change,
            });
        }

        if iteration > 0 && change < params.convergence_threshold {
            tracing::info!(iterations = iteration + 1, change, "converged");
            break;
        }
    }

    Ok(nnf)
}

/// Sum of the squared channel differences over the hole, per hole pixel
fn mean_squared_change(
    before: &image::RgbImage,
    after: &image::RgbImage,
    hole: &HoleMask,
) -> f64 {
    let count = hole.hole_count();
    if count == 0 {
        return 0.0;
    }

    let sum: f64 = hole
        .iter_holes()
        .flat_map(|c| {
            let a = before.rgb(c.x, c.y);
            let b = after.rgb(c.x, c.y);
            (0..3).map(move |i| {
                let d = f64::from(a[i]) - f64::from(b[i]);
                d * d
            })
        })
        .sum();

    sum / count as f64
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Dims;

    fn textured(w: u32, h: u32) -> image::RgbImage {
        image::RgbImage::from_fn(w, h, |x, y| {
            let stripe = if (x / 3 + y / 5) % 2 == 0 { 40 } else { 200 };
            image::Rgb([stripe, (x * 5) as u8, (y * 5) as u8])
        })
    }

    fn centered_hole(w: u32, h: u32, size: u32) -> HoleMask {
        let (x0, y0) = ((w - size) / 2, (h - size) / 2);
        HoleMask::from_fn(Dims::new(w, h), |x, y| {
            x >= x0 && x < x0 + size && y >= y0 && y < y0 + size
        })
    }

    fn params() -> Parameters {
        Parameters {
            patch_w: 3,
            outer_iterations: 3,
            inner_iterations: 4,
            sigma: 9.0,
            max_thread_count: Some(2),
            ..Parameters::default()
        }
    }

    #[test]
    fn squared_change() {
        let a = image::RgbImage::from_pixel(3, 1, image::Rgb([10, 10, 10]));
        let mut b = a.clone();
        b.put_pixel(0, 0, image::Rgb([13, 10, 6]));
        b.put_pixel(2, 0, image::Rgb([0, 0, 0]));
        let hole = HoleMask::from_fn(Dims::new(3, 1), |x, _| x < 2);

        // only the first two pixels count, (9 + 16 + 0) / 2
        assert!((mean_squared_change(&a, &b, &hole) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn single_level_has_no_transitions() {
        let img = textured(24, 20);
        let hole = centered_hole(24, 20, 5);
        let params = Parameters {
            start_scale: 0,
            ..params()
        };

        let completed = run(&img, &hole, None, &params, &mut None).unwrap();
        assert_eq!(completed.transitions, 0);

        // the same thing by hand
        let mut rng = Pcg32::seed_from_u64(params.seed);
        let pyramid = ImagePyramid::new(&img, &hole, None, &params);
        assert_eq!(pyramid.scales, vec![0]);

        let mut level = pyramid.coarsest(&mut rng);
        let levels = ProgressStat {
            current: 0,
            total: 1,
        };
        complete_level(&mut level, &params, &mut rng, &mut None, levels).unwrap();

        assert_eq!(level.image, completed.image);
    }

    #[test]
    fn transitions_per_level() {
        let img = textured(48, 40);
        let hole = centered_hole(48, 40, 8);
        let params = Parameters {
            start_scale: -2,
            ..params()
        };

        let completed = run(&img, &hole, None, &params, &mut None).unwrap();
        assert_eq!(completed.transitions, 2);
        assert_eq!(completed.nnf.map(|n| n.placements()), Some(Dims::new(46, 38)));
    }

    #[test]
    fn known_pixels_survive() {
        let img = textured(32, 32);
        let hole = centered_hole(32, 32, 6);

        let out = complete(&img, &hole, None, &params()).unwrap();
        for (x, y, p) in img.enumerate_pixels() {
            if !hole.is_hole(x, y) {
                assert_eq!(out.get_pixel(x, y), p);
            }
        }
    }

    #[test]
    fn empty_hole_returns_input() {
        let img = textured(16, 16);
        let hole = HoleMask::new(Dims::square(16));

        let completed = run(&img, &hole, None, &params(), &mut None).unwrap();
        assert_eq!(completed.image, img);
        assert!(completed.nnf.is_none());
    }

    #[test]
    fn reports_progress() {
        use std::sync::{Arc, Mutex};

        let img = textured(32, 24);
        let hole = centered_hole(32, 24, 6);
        let params = Parameters {
            start_scale: -1,
            convergence_threshold: 0.0,
            ..params()
        };

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut progress: Option<Box<dyn CompletionProgress>> =
            Some(Box::new(move |update: ProgressUpdate<'_>| {
                sink.lock().unwrap().push((
                    update.level.current,
                    update.iteration.current,
                    update.image.dimensions(),
                ));
            }));

        run(&img, &hole, None, &params, &mut progress).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 8);
        assert_eq!(seen[0], (1, 1, (16, 12)));
        assert_eq!(seen[7], (2, 4, (32, 24)));
    }
}
