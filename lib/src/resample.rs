use crate::Dims;
use image::{imageops::FilterType, ImageBuffer, Pixel};

/// Size of the pyramid level `2^scale_log2` of an image of size `dims`,
/// never smaller than 1x1
pub fn level_dims(dims: Dims, scale_log2: i32) -> Dims {
    let scale = 2f64.powi(scale_log2);
    let scaled = |d: u32| ((f64::from(d) * scale).round() as u32).max(1);

    Dims::new(scaled(dims.width), scaled(dims.height))
}

/// Source index sampled by destination index `i` when resizing an axis of
/// `src_len` samples to `dst_len` samples
#[inline]
pub fn nearest_index(i: u32, dst_len: u32, src_len: u32) -> u32 {
    let pos = (f64::from(i) + 0.5) * f64::from(src_len) / f64::from(dst_len);
    (pos as u32).min(src_len - 1)
}

/// For every destination index, the source indices it overlaps and the
/// normalized share each of them contributes.
fn area_weights(src_len: u32, dst_len: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = f64::from(src_len) / f64::from(dst_len);

    (0..dst_len)
        .map(|d| {
            let start = f64::from(d) * scale;
            let end = (start + scale).min(f64::from(src_len));

            let mut weights = Vec::new();
            let mut s = start.floor() as u32;
            while f64::from(s) < end && s < src_len {
                let lo = f64::from(s).max(start);
                let hi = f64::from(s + 1).min(end);
                if hi - lo > 1e-6 {
                    weights.push((s, (hi - lo) as f32));
                }
                s += 1;
            }

            let total: f32 = weights.iter().map(|(_, w)| w).sum();
            for w in &mut weights {
                w.1 /= total;
            }
            weights
        })
        .collect()
}

/// Resamples by averaging every source pixel a destination pixel's footprint
/// overlaps, weighted by the overlapping area.
pub fn resize_area<P>(img: &ImageBuffer<P, Vec<u8>>, dims: Dims) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (sw, sh) = img.dimensions();
    if (sw, sh) == (dims.width, dims.height) {
        return img.clone();
    }

    let xw = area_weights(sw, dims.width);
    let yw = area_weights(sh, dims.height);
    let channels = usize::from(P::CHANNEL_COUNT);

    let mut out = ImageBuffer::<P, Vec<u8>>::new(dims.width, dims.height);
    let mut acc = vec![0f32; channels];

    for (y, ys) in yw.iter().enumerate() {
        for (x, xs) in xw.iter().enumerate() {
            acc.iter_mut().for_each(|a| *a = 0.0);

            for &(sy, wy) in ys {
                for &(sx, wx) in xs {
                    let src = img.get_pixel(sx, sy).channels();
                    for (a, s) in acc.iter_mut().zip(src) {
                        *a += f32::from(*s) * wx * wy;
                    }
                }
            }

            let dst = out.get_pixel_mut(x as u32, y as u32).channels_mut();
            for (d, a) in dst.iter_mut().zip(&acc) {
                *d = a.round().max(0.0).min(255.0) as u8;
            }
        }
    }

    out
}

/// Bicubic (Catmull-Rom) resize
pub fn resize_bicubic(img: &image::RgbImage, dims: Dims) -> image::RgbImage {
    if img.dimensions() == (dims.width, dims.height) {
        return img.clone();
    }
    image::imageops::resize(img, dims.width, dims.height, FilterType::CatmullRom)
}
