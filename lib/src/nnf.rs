use crate::{distance::Distance, Dims};

/// A pixel coordinate, or the upper left corner of a patch placement
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    #[inline]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// The best target found so far for a single source placement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub target: Coord,
    pub distance: Distance,
}

impl Default for Match {
    fn default() -> Self {
        Self {
            target: Coord::default(),
            distance: Distance::MAX,
        }
    }
}

/// Number of patch placements that fit entirely inside an image.
#[inline]
pub fn placement_dims(dims: Dims, patch_w: u32) -> Dims {
    Dims::new(
        (dims.width + 1).saturating_sub(patch_w),
        (dims.height + 1).saturating_sub(patch_w),
    )
}

/// A nearest-neighbor field, holding one [`Match`] for every source patch
/// placement, in row-major order.
#[derive(Clone, Debug)]
pub struct Nnf {
    source: Dims,
    target: Dims,
    placements: Dims,
    target_placements: Dims,
    patch_w: u32,
    matches: Vec<Match>,
}

impl Nnf {
    pub(crate) fn new(source: Dims, target: Dims, patch_w: u32) -> Self {
        let placements = placement_dims(source, patch_w);
        let target_placements = placement_dims(target, patch_w);

        Self {
            source,
            target,
            placements,
            target_placements,
            patch_w,
            matches: vec![Match::default(); (placements.width * placements.height) as usize],
        }
    }

    /// Width and height of the grid of source placements
    #[inline]
    pub fn placements(&self) -> Dims {
        self.placements
    }

    /// Size of the image the source placements were taken from
    #[inline]
    pub fn source_dims(&self) -> Dims {
        self.source
    }

    /// Size of the image the matches point into
    #[inline]
    pub fn target_dims(&self) -> Dims {
        self.target
    }

    #[inline]
    pub fn patch_w(&self) -> u32 {
        self.patch_w
    }

    #[inline]
    fn index(&self, source: Coord) -> usize {
        debug_assert!(source.x < self.placements.width && source.y < self.placements.height);
        (source.y * self.placements.width + source.x) as usize
    }

    /// Gets the match for the placement with its corner at `source`, or `None`
    /// if no patch fits there
    #[inline]
    pub fn get(&self, source: Coord) -> Option<Match> {
        if source.x < self.placements.width && source.y < self.placements.height {
            Some(self.matches[self.index(source)])
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn at(&self, source: Coord) -> Match {
        self.matches[self.index(source)]
    }

    #[inline]
    pub(crate) fn set(&mut self, source: Coord, m: Match) {
        let i = self.index(source);
        self.matches[i] = m;
    }

    /// Iterates over every `(source, match)` pair in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (Coord, Match)> + '_ {
        let width = self.placements.width;
        self.matches.iter().enumerate().map(move |(i, m)| {
            let i = i as u32;
            (Coord::new(i % width, i / width), *m)
        })
    }

    /// Mean distance over every placement
    pub fn mean_distance(&self) -> f64 {
        self.mean_distance_in(|_| true).unwrap_or(0.0)
    }

    /// Mean distance over the placements accepted by `pred`, or `None` when
    /// it accepts none of them
    pub fn mean_distance_in<P>(&self, mut pred: P) -> Option<f64>
    where
        P: FnMut(Coord) -> bool,
    {
        let (sum, count) = self
            .iter()
            .filter(|(c, _)| pred(*c))
            .fold((0f64, 0u64), |(sum, count), (_, m)| {
                (sum + f64::from(m.distance.0), count + 1)
            });

        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Visualizes the field, red and green encode the target x and y relative
    /// to the target placement range, blue is the distance from the source
    pub fn offset_map(&self) -> image::RgbImage {
        let tw = self.target_placements.width.max(2) - 1;
        let th = self.target_placements.height.max(2) - 1;
        let diag = f64::from(tw * tw + th * th).sqrt().max(1.0);

        image::RgbImage::from_fn(self.placements.width, self.placements.height, |x, y| {
            let m = self.at(Coord::new(x, y));
            let dx = f64::from(m.target.x) - f64::from(x);
            let dy = f64::from(m.target.y) - f64::from(y);

            image::Rgb([
                (m.target.x * 255 / tw).min(255) as u8,
                (m.target.y * 255 / th).min(255) as u8,
                ((dx * dx + dy * dy).sqrt() / diag * 255.0).min(255.0) as u8,
            ])
        })
    }

    /// Visualizes the match distances, brighter is worse
    pub fn distance_map(&self) -> image::GrayImage {
        let max = self
            .matches
            .iter()
            .filter(|m| !m.distance.is_unbounded())
            .map(|m| m.distance.0)
            .max()
            .unwrap_or(0)
            .max(1);
        let scale = f64::from(max).ln_1p();

        image::GrayImage::from_fn(self.placements.width, self.placements.height, |x, y| {
            let d = self.at(Coord::new(x, y)).distance;
            let v = if d.is_unbounded() {
                255
            } else {
                (f64::from(d.0).ln_1p() / scale * 255.0).round().min(255.0) as u8
            };
            image::Luma([v])
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn placement_grid() {
        assert_eq!(placement_dims(Dims::new(10, 8), 3), Dims::new(8, 6));
        assert_eq!(placement_dims(Dims::new(3, 3), 3), Dims::new(1, 1));
        assert_eq!(placement_dims(Dims::new(2, 9), 3), Dims::new(0, 7));
    }

    #[test]
    fn get_out_of_range() {
        let nnf = Nnf::new(Dims::new(6, 5), Dims::new(6, 5), 3);
        assert!(nnf.get(Coord::new(3, 2)).is_some());
        assert!(nnf.get(Coord::new(4, 0)).is_none());
        assert!(nnf.get(Coord::new(0, 3)).is_none());
    }

    #[test]
    fn mean_over_subset() {
        let mut nnf = Nnf::new(Dims::new(4, 3), Dims::new(4, 3), 2);
        for (i, (c, _)) in nnf.clone().iter().enumerate() {
            nnf.set(
                c,
                Match {
                    target: c,
                    distance: Distance(i as u32 * 2),
                },
            );
        }

        // 3x2 placements, distances 0 2 4 / 6 8 10
        assert!((nnf.mean_distance() - 5.0).abs() < 1e-9);
        assert_eq!(nnf.mean_distance_in(|c| c.y == 1), Some(8.0));
        assert_eq!(nnf.mean_distance_in(|c| c.x > 10), None);
    }

    #[test]
    fn visualizations_match_placements() {
        let nnf = Nnf::new(Dims::new(9, 7), Dims::new(9, 7), 3);
        assert_eq!(nnf.offset_map().dimensions(), (7, 5));
        assert_eq!(nnf.distance_map().dimensions(), (7, 5));
    }
}
