use std::fmt;

#[derive(Debug)]
pub struct InvalidRange {
    pub(crate) min: f32,
    pub(crate) max: f32,
    pub(crate) value: f32,
    pub(crate) name: &'static str,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter '{}' - value '{}' is outside the range of {}-{}",
            self.name, self.value, self.min, self.max
        )
    }
}

#[derive(Debug)]
pub struct SizeMismatch {
    /// Which input disagreed with the image, eg "mask"
    pub(crate) input: &'static str,
    pub(crate) image: (u32, u32),
    pub(crate) other: (u32, u32),
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the {} size ({}x{}) must match the image size ({}x{})",
            self.input, self.other.0, self.other.1, self.image.0, self.image.1
        )
    }
}

#[derive(Debug)]
pub enum Error {
    /// An error in the image library occurred, eg failed to load/save
    Image(image::ImageError),
    /// An input parameter had an invalid range specified
    InvalidRange(InvalidRange),
    /// The mask or constraint map doesn't have the same dimensions as the
    /// image being completed
    SizeMismatch(SizeMismatch),
    /// The image is smaller than a single patch, so no patch placement exists
    PatchTooLarge { patch_size: u32, width: u32, height: u32 },
    /// Every member of a constraint label group lies in the excluded region,
    /// so pixels carrying that label have nothing they are allowed to match
    UnsatisfiableConstraint { label: u8 },
    /// Every target patch placement overlaps the hole
    NoValidTargets,
    /// A constraint image pixel that isn't a discrete gray label
    MalformedLabel { x: u32, y: u32, value: [u8; 3] },
    /// Io is notoriously error free with no problems, but we cover it just in case!
    Io(std::io::Error),
    /// The user specified an image format we don't support as the output
    UnsupportedOutputFormat(String),
    /// No image and mask were given to complete
    NoInput,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(ie) => write!(f, "{}", ie),
            Self::InvalidRange(ir) => write!(f, "{}", ir),
            Self::SizeMismatch(sm) => write!(f, "{}", sm),
            Self::PatchTooLarge {
                patch_size,
                width,
                height,
            } => write!(
                f,
                "a {0}x{0} patch does not fit inside the {1}x{2} image",
                patch_size, width, height
            ),
            Self::UnsatisfiableConstraint { label } => write!(
                f,
                "constraint label {} has no member outside the hole to match against",
                label
            ),
            Self::NoValidTargets => write!(
                f,
                "every patch placement overlaps the hole, there is nothing to copy from"
            ),
            Self::MalformedLabel { x, y, value } => write!(
                f,
                "constraint pixel at ({}, {}) has value {:?}, labels must be gray",
                x, y, value
            ),
            Self::Io(io) => write!(f, "{}", io),
            Self::UnsupportedOutputFormat(fmt) => {
                write!(f, "the output format '{}' is not supported", fmt)
            }
            Self::NoInput => write!(f, "an image and a hole mask must be provided"),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(ie: image::ImageError) -> Self {
        Self::Image(ie)
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::Io(io)
    }
}
