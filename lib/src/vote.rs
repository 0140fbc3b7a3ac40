use crate::{
    errors::{Error, SizeMismatch},
    mask::HoleMask,
    nnf::{Coord, Nnf},
    pixels::PixelBuffer,
    Dims,
};

fn check_size(input: &'static str, image: Dims, other: Dims) -> Result<(), Error> {
    if image == other {
        Ok(())
    } else {
        Err(Error::SizeMismatch(SizeMismatch {
            input,
            image: (image.width, image.height),
            other: (other.width, other.height),
        }))
    }
}

/// Rebuilds every hole pixel of `current` as the similarity weighted mean of
/// the target pixels all the patches covering it were matched to.
///
/// A patch with distance `d` votes with weight `exp(-d / (2 sigma^2))`. Known
/// pixels are copied from `current`, as is a hole pixel that received no
/// weight at all. The rows are split between up to `threads` workers, the
/// result doesn't depend on how many.
///
/// `hole` and the field's source must be the size of `current`, and the
/// field's target the size of `target`.
pub fn vote(
    current: &image::RgbImage,
    target: &image::RgbImage,
    nnf: &Nnf,
    hole: &HoleMask,
    sigma: f64,
    threads: usize,
) -> Result<image::RgbImage, Error> {
    let dims = current.dims();
    check_size("mask", dims, hole.dims())?;
    check_size("nearest-neighbor field source", dims, nnf.source_dims())?;
    check_size("nearest-neighbor field target", target.dims(), nnf.target_dims())?;

    let mut out = current.clone();
    if hole.is_empty() {
        return Ok(out);
    }

    let width = out.width() as usize;
    let height = out.height() as usize;
    let denom = 2.0 * sigma * sigma;

    let vote_rows = |first_row: usize, rows: &mut [u8]| {
        for (i, row) in rows.chunks_mut(width * 3).enumerate() {
            let y = (first_row + i) as u32;
            for x in 0..width as u32 {
                if hole.is_hole(x, y) {
                    if let Some(rgb) = gather(target, nnf, Coord::new(x, y), denom) {
                        let p = x as usize * 3;
                        row[p..p + 3].copy_from_slice(&rgb);
                    }
                }
            }
        }
    };

    #[cfg(target_arch = "wasm32")]
    {
        let _ = (threads, height);
        vote_rows(0, &mut *out);
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let workers = threads.max(1).min(height);
        if workers == 1 {
            vote_rows(0, &mut *out);
        } else {
            let rows_per_worker = (height + workers - 1) / workers;
            let vote_rows = &vote_rows;
            let scoped = crossbeam_utils::thread::scope(|scope| {
                for (i, chunk) in out.chunks_mut(rows_per_worker * width * 3).enumerate() {
                    scope.spawn(move |_| vote_rows(i * rows_per_worker, chunk));
                }
            });

            if let Err(panic) = scoped {
                std::panic::resume_unwind(panic);
            }
        }
    }

    Ok(out)
}

/// Rebuilds a whole image the size of the field's source from the `target`
/// pixels its patches were matched to, voting on every pixel.
///
/// Pixels whose votes all have zero weight are left black.
pub fn reconstruct(
    target: &image::RgbImage,
    nnf: &Nnf,
    sigma: f64,
    threads: usize,
) -> Result<image::RgbImage, Error> {
    let dims = nnf.source_dims();
    let blank = image::RgbImage::new(dims.width, dims.height);
    let everything = HoleMask::from_fn(dims, |_, _| true);

    vote(&blank, target, nnf, &everything, sigma, threads)
}

/// Weighted mean of the votes for the hole pixel at `p`, or `None` if every
/// vote had zero weight
fn gather(target: &image::RgbImage, nnf: &Nnf, p: Coord, denom: f64) -> Option<[u8; 3]> {
    let placements = nnf.placements();
    let pw = nnf.patch_w();

    if placements.width == 0 || placements.height == 0 {
        return None;
    }

    let x_lo = (p.x + 1).saturating_sub(pw);
    let x_hi = p.x.min(placements.width - 1);
    let y_lo = (p.y + 1).saturating_sub(pw);
    let y_hi = p.y.min(placements.height - 1);

    let mut acc = [0f64; 3];
    let mut total = 0f64;

    for cy in y_lo..=y_hi {
        for cx in x_lo..=x_hi {
            let m = nnf.at(Coord::new(cx, cy));
            if m.distance.is_unbounded() {
                continue;
            }

            let weight = (-f64::from(m.distance.0) / denom).exp();
            if weight <= 0.0 {
                continue;
            }

            let t = target.get_pixel(m.target.x + p.x - cx, m.target.y + p.y - cy);
            for (a, c) in acc.iter_mut().zip(t.0.iter()) {
                *a += weight * f64::from(*c);
            }
            total += weight;
        }
    }

    if total <= 0.0 {
        return None;
    }

    let mut rgb = [0u8; 3];
    for (v, a) in rgb.iter_mut().zip(acc.iter()) {
        *v = (a / total).round().max(0.0).min(255.0) as u8;
    }
    Some(rgb)
}
