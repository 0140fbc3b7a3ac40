//! Optional labeling of pixels into groups that may only match each other.
//!
//! A source patch whose corner pixel carries a non-zero label may only take
//! its target from placements whose corner pixel has the same label. Label 0
//! is unconstrained and can match, and be matched by, anything.

use crate::{
    errors::Error,
    mask::Exclusion,
    nnf::{placement_dims, Coord},
    resample, Dims,
};
use std::collections::{BTreeMap, BTreeSet};

/// A constraint group id, 0 means unconstrained
pub type Label = u8;

/// The unconstrained label
pub const UNCONSTRAINED: Label = 0;

/// Per pixel labels for an image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelGrid {
    dims: Dims,
    labels: Vec<Label>,
}

impl LabelGrid {
    pub fn from_fn<F>(dims: Dims, mut label: F) -> Self
    where
        F: FnMut(u32, u32) -> Label,
    {
        let mut labels = Vec::with_capacity((dims.width * dims.height) as usize);
        for y in 0..dims.height {
            for x in 0..dims.width {
                labels.push(label(x, y));
            }
        }

        Self { dims, labels }
    }

    pub fn from_gray(gray: &image::GrayImage) -> Self {
        Self {
            dims: Dims::new(gray.width(), gray.height()),
            labels: gray.pixels().map(|p| p[0]).collect(),
        }
    }

    /// Reads labels from a decoded image. Every pixel must be gray, ie have
    /// equal red, green and blue channels, its value is the label.
    pub fn from_image(img: &image::DynamicImage) -> Result<Self, Error> {
        let rgb = img.to_rgb();
        let dims = Dims::new(rgb.width(), rgb.height());

        let mut labels = Vec::with_capacity((dims.width * dims.height) as usize);
        for (x, y, p) in rgb.enumerate_pixels() {
            let [r, g, b] = p.0;
            if r != g || g != b {
                return Err(Error::MalformedLabel {
                    x,
                    y,
                    value: p.0,
                });
            }
            labels.push(r);
        }

        Ok(Self { dims, labels })
    }

    #[inline]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[inline]
    pub fn label(&self, x: u32, y: u32) -> Label {
        self.labels[(y * self.dims.width + x) as usize]
    }

    /// Nearest neighbor resize, labels are never blended
    pub fn resize_nearest(&self, dims: Dims) -> Self {
        if dims == self.dims {
            return self.clone();
        }

        Self::from_fn(dims, |x, y| {
            self.label(
                resample::nearest_index(x, dims.width, self.dims.width),
                resample::nearest_index(y, dims.height, self.dims.height),
            )
        })
    }

    /// The lowest label found at a patch placement's corner that no placement
    /// allowed by `exclusion` carries, so matching the grid's image against
    /// itself under these constraints can't succeed
    pub fn unsatisfiable_label<E: Exclusion + ?Sized>(
        &self,
        exclusion: &E,
        patch_w: u32,
    ) -> Option<Label> {
        let placements = placement_dims(self.dims, patch_w);
        let mut used = BTreeSet::new();
        let mut available = BTreeSet::new();

        for y in 0..placements.height {
            for x in 0..placements.width {
                let label = self.label(x, y);
                if label == UNCONSTRAINED {
                    continue;
                }

                used.insert(label);
                if !exclusion.excludes(Coord::new(x, y)) {
                    available.insert(label);
                }
            }
        }

        used.difference(&available).next().copied()
    }
}

/// Every labeled coordinate, grouped by label in row-major order.
///
/// Unconstrained coordinates are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintMap {
    groups: BTreeMap<Label, Vec<Coord>>,
}

impl ConstraintMap {
    pub fn from_grid(grid: &LabelGrid) -> Self {
        let mut groups: BTreeMap<Label, Vec<Coord>> = BTreeMap::new();

        for y in 0..grid.dims.height {
            for x in 0..grid.dims.width {
                let label = grid.label(x, y);
                if label != UNCONSTRAINED {
                    groups.entry(label).or_default().push(Coord::new(x, y));
                }
            }
        }

        Self { groups }
    }

    /// The labels present, in ascending order
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.groups.keys().copied()
    }

    /// The coordinates carrying `label`, empty for unknown labels and for
    /// [`UNCONSTRAINED`]
    pub fn group(&self, label: Label) -> &[Coord] {
        self.groups.get(&label).map_or(&[], |g| g.as_slice())
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
