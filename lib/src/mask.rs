use crate::{
    nnf::{placement_dims, Coord},
    pixels::PixelBuffer,
    Dims,
};

/// Gray values above this are holes
pub const HOLE_THRESHOLD: u8 = 127;

/// Inclusive pixel rectangle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub min: Coord,
    pub max: Coord,
}

/// Marks which pixels of an image are unknown and need to be filled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HoleMask {
    dims: Dims,
    holes: Vec<bool>,
}

impl HoleMask {
    /// A mask with no holes
    pub fn new(dims: Dims) -> Self {
        Self {
            dims,
            holes: vec![false; (dims.width * dims.height) as usize],
        }
    }

    pub fn from_fn<F>(dims: Dims, mut is_hole: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut holes = Vec::with_capacity((dims.width * dims.height) as usize);
        for y in 0..dims.height {
            for x in 0..dims.width {
                holes.push(is_hole(x, y));
            }
        }

        Self { dims, holes }
    }

    /// Thresholds a grayscale mask, values above 127 are holes
    pub fn from_gray(gray: &image::GrayImage) -> Self {
        Self {
            dims: Dims::new(gray.width(), gray.height()),
            holes: gray.pixels().map(|p| p[0] > HOLE_THRESHOLD).collect(),
        }
    }

    /// Holes are white, known pixels are black
    pub fn to_gray(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.dims.width, self.dims.height, |x, y| {
            image::Luma([if self.is_hole(x, y) { 255 } else { 0 }])
        })
    }

    #[inline]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[inline]
    pub fn is_hole(&self, x: u32, y: u32) -> bool {
        self.holes[(y * self.dims.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, hole: bool) {
        self.holes[(y * self.dims.width + x) as usize] = hole;
    }

    pub fn hole_count(&self) -> usize {
        self.holes.iter().filter(|h| **h).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.holes.iter().any(|h| *h)
    }

    /// Iterates the hole pixels in row-major order
    pub fn iter_holes(&self) -> impl Iterator<Item = Coord> + '_ {
        let width = self.dims.width;
        self.holes
            .iter()
            .enumerate()
            .filter(|(_, h)| **h)
            .map(move |(i, _)| Coord::new(i as u32 % width, i as u32 / width))
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        let mut holes = self.iter_holes();
        let first = holes.next()?;

        Some(holes.fold(Rect { min: first, max: first }, |r, c| Rect {
            min: Coord::new(r.min.x.min(c.x), r.min.y.min(c.y)),
            max: Coord::new(r.max.x.max(c.x), r.max.y.max(c.y)),
        }))
    }

    /// Zeroes every hole pixel of `img`, so matching can never lean on stale
    /// content inside the hole
    pub fn blank<P: PixelBuffer + ?Sized>(&self, img: &mut P) {
        for c in self.iter_holes() {
            img.set_rgb(c.x, c.y, [0, 0, 0]);
        }
    }
}

/// Decides which patch placements may not be used as match targets.
pub trait Exclusion {
    /// Returns true if the placement with its upper left corner at `corner`
    /// must not be a target
    fn excludes(&self, corner: Coord) -> bool;
}

/// Every placement is a valid target
#[derive(Clone, Copy, Debug, Default)]
pub struct NoExclusion;

impl Exclusion for NoExclusion {
    #[inline]
    fn excludes(&self, _corner: Coord) -> bool {
        false
    }
}

impl<F> Exclusion for F
where
    F: Fn(Coord) -> bool,
{
    #[inline]
    fn excludes(&self, corner: Coord) -> bool {
        (self)(corner)
    }
}

/// Excludes every placement whose corner lies in the hole's bounding box
/// grown by `patch_w - 1` up and left, clamped to the placement range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExclusionBox {
    region: Option<Rect>,
}

impl ExclusionBox {
    pub fn from_hole(hole: &HoleMask, patch_w: u32) -> Self {
        let placements = placement_dims(hole.dims(), patch_w);

        let region = hole.bounding_box().and_then(|bb| {
            if placements.width == 0 || placements.height == 0 {
                return None;
            }

            Some(Rect {
                min: Coord::new(
                    (bb.min.x + 1).saturating_sub(patch_w),
                    (bb.min.y + 1).saturating_sub(patch_w),
                ),
                max: Coord::new(
                    bb.max.x.min(placements.width - 1),
                    bb.max.y.min(placements.height - 1),
                ),
            })
        });

        Self { region }
    }

    pub fn region(&self) -> Option<Rect> {
        self.region
    }
}

impl Exclusion for ExclusionBox {
    #[inline]
    fn excludes(&self, c: Coord) -> bool {
        match self.region {
            Some(r) => c.x >= r.min.x && c.x <= r.max.x && c.y >= r.min.y && c.y <= r.max.y,
            None => false,
        }
    }
}

/// Excludes exactly the placements whose patch covers at least one hole
/// pixel, ie the hole dilated by the patch footprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExclusionMask {
    placements: Dims,
    excluded: Vec<bool>,
}

impl ExclusionMask {
    pub fn from_hole(hole: &HoleMask, patch_w: u32) -> Self {
        let dims = hole.dims();
        let placements = placement_dims(dims, patch_w);

        // summed area table with a zero row and column in front
        let sw = (dims.width + 1) as usize;
        let mut sat = vec![0u32; sw * (dims.height + 1) as usize];
        for y in 0..dims.height as usize {
            let mut row = 0;
            for x in 0..dims.width as usize {
                row += u32::from(hole.is_hole(x as u32, y as u32));
                sat[(y + 1) * sw + x + 1] = sat[y * sw + x + 1] + row;
            }
        }

        let pw = patch_w as usize;
        let mut excluded = Vec::with_capacity((placements.width * placements.height) as usize);
        for y in 0..placements.height as usize {
            for x in 0..placements.width as usize {
                let covered = sat[(y + pw) * sw + x + pw] + sat[y * sw + x]
                    - sat[y * sw + x + pw]
                    - sat[(y + pw) * sw + x];
                excluded.push(covered > 0);
            }
        }

        Self {
            placements,
            excluded,
        }
    }
}

impl Exclusion for ExclusionMask {
    #[inline]
    fn excludes(&self, c: Coord) -> bool {
        if c.x >= self.placements.width || c.y >= self.placements.height {
            return true;
        }
        self.excluded[(c.y * self.placements.width + c.x) as usize]
    }
}

/// How the region of forbidden match targets is derived from a hole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExclusionMode {
    /// The hole's bounding box grown by the patch size. Cheap, but wastes
    /// every valid target inside a concave or scattered hole's box.
    BoundingBox,
    /// The exact set of placements overlapping a hole pixel
    Dilated,
}

impl Default for ExclusionMode {
    fn default() -> Self {
        Self::Dilated
    }
}

impl ExclusionMode {
    pub fn build(self, hole: &HoleMask, patch_w: u32) -> Exclusions {
        match self {
            Self::BoundingBox => Exclusions::Box(ExclusionBox::from_hole(hole, patch_w)),
            Self::Dilated => Exclusions::Mask(ExclusionMask::from_hole(hole, patch_w)),
        }
    }
}

/// An exclusion region built by an [`ExclusionMode`]
#[derive(Clone, Debug)]
pub enum Exclusions {
    Box(ExclusionBox),
    Mask(ExclusionMask),
}

impl Exclusion for Exclusions {
    #[inline]
    fn excludes(&self, c: Coord) -> bool {
        match self {
            Self::Box(b) => b.excludes(c),
            Self::Mask(m) => m.excludes(c),
        }
    }
}

/// True if at least one placement in the `placements` grid isn't excluded
pub fn has_valid_target<E: Exclusion + ?Sized>(exclusion: &E, placements: Dims) -> bool {
    (0..placements.height)
        .any(|y| (0..placements.width).any(|x| !exclusion.excludes(Coord::new(x, y))))
}
