use crate::{constraint::LabelGrid, mask::HoleMask, Error};
use std::path::Path;

/// Helper type used to define the source of `ImageSource`'s data
#[derive(Clone)]
pub enum ImageSource<'a> {
    /// A raw buffer of image data, see `image::load_from_memory` for details
    /// on what is supported
    Memory(&'a [u8]),
    /// The path to an image to load from disk. The image format is inferred
    /// from the file extension, see `image::open` for details
    Path(&'a Path),
    /// An already decoded image
    Image(image::DynamicImage),
}

impl<'a> ImageSource<'a> {
    pub fn from_path(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<image::DynamicImage> for ImageSource<'a> {
    fn from(img: image::DynamicImage) -> Self {
        Self::Image(img)
    }
}

impl<'a> From<image::RgbImage> for ImageSource<'a> {
    fn from(img: image::RgbImage) -> Self {
        Self::Image(image::DynamicImage::ImageRgb8(img))
    }
}

impl<'a> From<image::GrayImage> for ImageSource<'a> {
    fn from(img: image::GrayImage) -> Self {
        Self::Image(image::DynamicImage::ImageLuma8(img))
    }
}

impl<'a, S> From<&'a S> for ImageSource<'a>
where
    S: AsRef<Path> + 'a,
{
    fn from(path: &'a S) -> Self {
        Self::Path(path.as_ref())
    }
}

pub fn load_dynamic_image(src: ImageSource<'_>) -> Result<image::DynamicImage, image::ImageError> {
    match src {
        ImageSource::Memory(data) => image::load_from_memory(data),
        ImageSource::Path(path) => image::open(path),
        ImageSource::Image(img) => Ok(img),
    }
}

pub(crate) fn load_rgb(src: ImageSource<'_>) -> Result<image::RgbImage, Error> {
    Ok(load_dynamic_image(src)?.to_rgb())
}

/// Loads a hole mask, any color is converted to luma first and then
/// thresholded
pub(crate) fn load_mask(src: ImageSource<'_>) -> Result<HoleMask, Error> {
    let gray = load_dynamic_image(src)?.to_luma();
    Ok(HoleMask::from_gray(&gray))
}

pub(crate) fn load_labels(src: ImageSource<'_>) -> Result<LabelGrid, Error> {
    LabelGrid::from_image(&load_dynamic_image(src)?)
}
