//! Randomized nearest-neighbor field search.
//!
//! Every source patch placement starts with a random valid target. Each pass
//! then visits the placements in scan order, alternating direction, and
//! tries the shifted targets of the already visited neighbors followed by a
//! shrinking random search around the current best. Improvements are written
//! back immediately so later placements in the same pass see them.

use crate::{
    constraint::{ConstraintMap, Label, LabelGrid, UNCONSTRAINED},
    distance::{patch_distance, Distance},
    errors::{Error, SizeMismatch},
    mask::Exclusion,
    nnf::{placement_dims, Coord, Match, Nnf},
    pixels::PixelBuffer,
    Dims, Parameters,
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::collections::BTreeMap;

/// Random draws tried before an unconstrained placement falls back to
/// sampling from the exact list of valid targets
const MAX_INIT_ATTEMPTS: u32 = 64;
/// Draws tried within a single random search round before it's skipped
const MAX_SEARCH_ATTEMPTS: u32 = 32;

/// What a random search round does when its candidate is not a valid target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Skip the round for unconstrained placements, resample for
    /// constrained ones
    Asymmetric,
    /// Always skip the round
    Skip,
    /// Always resample within the round
    Resample,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Asymmetric
    }
}

impl RetryPolicy {
    #[inline]
    fn resamples(self, label: Label) -> bool {
        match self {
            Self::Asymmetric => label != UNCONSTRAINED,
            Self::Skip => false,
            Self::Resample => true,
        }
    }
}

struct Constraints<'a> {
    source: &'a LabelGrid,
    target: &'a LabelGrid,
    groups: ConstraintMap,
}

/// Computes an [`Nnf`] from the patches of `source` to the patches of
/// `target`, one pass at a time.
pub struct PatchMatcher<'a, S: ?Sized, T: ?Sized, E: ?Sized> {
    source: &'a S,
    target: &'a T,
    exclusion: &'a E,
    constraints: Option<Constraints<'a>>,
    patch_w: u32,
    random_search_cap: u32,
    retry_policy: RetryPolicy,
    target_placements: Dims,
    nnf: Nnf,
    rng: Pcg32,
    passes: u32,
}

impl<'a, S, T, E> PatchMatcher<'a, S, T, E>
where
    S: PixelBuffer + ?Sized,
    T: PixelBuffer + ?Sized,
    E: Exclusion + ?Sized,
{
    pub fn new(
        source: &'a S,
        target: &'a T,
        exclusion: &'a E,
        params: &Parameters,
        seed: u64,
    ) -> Result<Self, Error> {
        params.validate()?;

        let patch_w = params.patch_w;
        for dims in &[source.dims(), target.dims()] {
            if dims.width < patch_w || dims.height < patch_w {
                return Err(Error::PatchTooLarge {
                    patch_size: patch_w,
                    width: dims.width,
                    height: dims.height,
                });
            }
        }

        Ok(Self {
            source,
            target,
            exclusion,
            constraints: None,
            patch_w,
            random_search_cap: params.random_search_cap,
            retry_policy: params.retry_policy,
            target_placements: placement_dims(target.dims(), patch_w),
            nnf: Nnf::new(source.dims(), target.dims(), patch_w),
            rng: Pcg32::seed_from_u64(seed),
            passes: 0,
        })
    }

    /// Restricts every labeled source placement to targets carrying the same
    /// label. The grids must match the source and target sizes.
    pub fn with_constraints(
        mut self,
        source_labels: &'a LabelGrid,
        target_labels: &'a LabelGrid,
    ) -> Result<Self, Error> {
        let checks = [
            ("source constraint map", self.source.dims(), source_labels.dims()),
            ("target constraint map", self.target.dims(), target_labels.dims()),
        ];
        for &(input, image, labels) in checks.iter() {
            if image != labels {
                return Err(Error::SizeMismatch(SizeMismatch {
                    input,
                    image: (image.width, image.height),
                    other: (labels.width, labels.height),
                }));
            }
        }

        self.constraints = Some(Constraints {
            source: source_labels,
            target: target_labels,
            groups: ConstraintMap::from_grid(target_labels),
        });
        Ok(self)
    }

    /// The field as it currently stands
    pub fn nnf(&self) -> &Nnf {
        &self.nnf
    }

    pub fn into_nnf(self) -> Nnf {
        self.nnf
    }

    /// Number of refinement passes run since the last initialization
    pub fn passes(&self) -> u32 {
        self.passes
    }

    #[inline]
    fn source_label(&self, c: Coord) -> Label {
        match &self.constraints {
            Some(cons) => cons.source.label(c.x, c.y),
            None => UNCONSTRAINED,
        }
    }

    #[inline]
    fn in_target_range(&self, c: Coord) -> bool {
        c.x < self.target_placements.width && c.y < self.target_placements.height
    }

    #[inline]
    fn valid_target(&self, label: Label, c: Coord) -> bool {
        if !self.in_target_range(c) || self.exclusion.excludes(c) {
            return false;
        }

        match &self.constraints {
            Some(cons) if label != UNCONSTRAINED => cons.target.label(c.x, c.y) == label,
            _ => true,
        }
    }

    fn label_candidates(&self, label: Label) -> Vec<Coord> {
        match &self.constraints {
            Some(cons) => cons
                .groups
                .group(label)
                .iter()
                .copied()
                .filter(|c| self.in_target_range(*c) && !self.exclusion.excludes(*c))
                .collect(),
            None => Vec::new(),
        }
    }

    fn all_valid_targets(&self) -> Vec<Coord> {
        let tp = self.target_placements;
        let mut targets = Vec::new();
        for y in 0..tp.height {
            for x in 0..tp.width {
                let c = Coord::new(x, y);
                if !self.exclusion.excludes(c) {
                    targets.push(c);
                }
            }
        }
        targets
    }

    fn draw_unconstrained(&mut self) -> Option<Coord> {
        let tp = self.target_placements;
        for _ in 0..MAX_INIT_ATTEMPTS {
            let c = Coord::new(
                self.rng.gen_range(0..tp.width),
                self.rng.gen_range(0..tp.height),
            );
            if !self.exclusion.excludes(c) {
                return Some(c);
            }
        }
        None
    }

    /// Assigns every source placement a random valid target and its distance.
    ///
    /// Fails with [`Error::UnsatisfiableConstraint`] when a label used by the
    /// source has no valid target placement, and [`Error::NoValidTargets`]
    /// when an unconstrained placement has none.
    pub fn initialize(&mut self) -> Result<(), Error> {
        let mut groups: BTreeMap<Label, Vec<Coord>> = BTreeMap::new();
        let mut everything: Option<Vec<Coord>> = None;

        let placements = self.nnf.placements();
        for y in 0..placements.height {
            for x in 0..placements.width {
                let s = Coord::new(x, y);
                let label = self.source_label(s);

                let target = if label != UNCONSTRAINED {
                    if !groups.contains_key(&label) {
                        let candidates = self.label_candidates(label);
                        groups.insert(label, candidates);
                    }
                    let candidates = &groups[&label];
                    if candidates.is_empty() {
                        return Err(Error::UnsatisfiableConstraint { label });
                    }
                    candidates[self.rng.gen_range(0..candidates.len())]
                } else if let Some(c) = self.draw_unconstrained() {
                    c
                } else {
                    if everything.is_none() {
                        everything = Some(self.all_valid_targets());
                    }
                    let candidates = everything.as_deref().unwrap_or(&[]);
                    if candidates.is_empty() {
                        return Err(Error::NoValidTargets);
                    }
                    candidates[self.rng.gen_range(0..candidates.len())]
                };

                let distance = patch_distance(
                    self.source,
                    self.target,
                    s,
                    target,
                    self.patch_w,
                    Distance::MAX,
                );
                self.nnf.set(s, Match { target, distance });
            }
        }

        self.passes = 0;
        Ok(())
    }

    /// Runs a single propagation and random search pass over every source
    /// placement. Even passes scan forward, odd passes backward.
    pub fn iterate(&mut self) {
        let placements = self.nnf.placements();
        let forward = self.passes % 2 == 0;
        let step: i64 = if forward { 1 } else { -1 };

        for yi in 0..placements.height {
            let y = if forward { yi } else { placements.height - 1 - yi };
            for xi in 0..placements.width {
                let x = if forward { xi } else { placements.width - 1 - xi };
                self.improve(Coord::new(x, y), step);
            }
        }

        self.passes += 1;
    }

    fn improve(&mut self, s: Coord, step: i64) {
        let placements = self.nnf.placements();
        let label = self.source_label(s);
        let mut best = self.nnf.at(s);

        let px = i64::from(s.x) - step;
        if px >= 0 && px < i64::from(placements.width) {
            let prev = self.nnf.at(Coord::new(px as u32, s.y));
            self.consider(
                s,
                label,
                i64::from(prev.target.x) + step,
                i64::from(prev.target.y),
                &mut best,
            );
        }

        let py = i64::from(s.y) - step;
        if py >= 0 && py < i64::from(placements.height) {
            let prev = self.nnf.at(Coord::new(s.x, py as u32));
            self.consider(
                s,
                label,
                i64::from(prev.target.x),
                i64::from(prev.target.y) + step,
                &mut best,
            );
        }

        self.random_search(s, label, &mut best);

        self.nnf.set(s, best);
    }

    /// Replaces `best` with the candidate if it's a valid target that is
    /// strictly closer than `best`
    fn consider(&self, s: Coord, label: Label, x: i64, y: i64, best: &mut Match) -> bool {
        if x < 0 || y < 0 {
            return false;
        }

        let t = Coord::new(x as u32, y as u32);
        if t == s || t == best.target || !self.valid_target(label, t) {
            return false;
        }

        let distance = patch_distance(self.source, self.target, s, t, self.patch_w, best.distance);
        if distance < best.distance {
            *best = Match {
                target: t,
                distance,
            };
            true
        } else {
            false
        }
    }

    fn random_search(&mut self, s: Coord, label: Label, best: &mut Match) {
        let dims = self.target.dims();
        let attempts = if self.retry_policy.resamples(label) {
            MAX_SEARCH_ATTEMPTS
        } else {
            1
        };

        let mut mag = self.random_search_cap.min(dims.width.max(dims.height));
        while mag >= 1 {
            for _ in 0..attempts {
                let c = self.sample_window(best.target, mag);
                if self.valid_target(label, c) {
                    self.consider(s, label, i64::from(c.x), i64::from(c.y), best);
                    break;
                }
            }
            mag /= 2;
        }
    }

    /// Uniform sample in the square window of half-width `mag` around
    /// `center`, clipped to the target placement range
    fn sample_window(&mut self, center: Coord, mag: u32) -> Coord {
        let tp = self.target_placements;
        let lo_x = center.x.saturating_sub(mag);
        let hi_x = center.x.saturating_add(mag).saturating_add(1).min(tp.width);
        let lo_y = center.y.saturating_sub(mag);
        let hi_y = center.y.saturating_add(mag).saturating_add(1).min(tp.height);

        Coord::new(
            self.rng.gen_range(lo_x..hi_x),
            self.rng.gen_range(lo_y..hi_y),
        )
    }
}

/// Computes the nearest-neighbor field from `source` to `target`, never
/// choosing a target placement `exclusion` rejects.
pub fn match_patches<S, T, E>(
    source: &S,
    target: &T,
    exclusion: &E,
    params: &Parameters,
) -> Result<Nnf, Error>
where
    S: PixelBuffer + ?Sized,
    T: PixelBuffer + ?Sized,
    E: Exclusion + ?Sized,
{
    let mut matcher = PatchMatcher::new(source, target, exclusion, params, params.seed)?;
    matcher.initialize()?;
    for _ in 0..params.outer_iterations {
        matcher.iterate();
    }
    Ok(matcher.into_nnf())
}

/// Like [`match_patches`], but a source placement whose corner carries a
/// non-zero label only matches target placements with the same label.
pub fn match_patches_constrained<S, T, E>(
    source: &S,
    target: &T,
    exclusion: &E,
    source_labels: &LabelGrid,
    target_labels: &LabelGrid,
    params: &Parameters,
) -> Result<Nnf, Error>
where
    S: PixelBuffer + ?Sized,
    T: PixelBuffer + ?Sized,
    E: Exclusion + ?Sized,
{
    let mut matcher = PatchMatcher::new(source, target, exclusion, params, params.seed)?
        .with_constraints(source_labels, target_labels)?;
    matcher.initialize()?;
    for _ in 0..params.outer_iterations {
        matcher.iterate();
    }
    Ok(matcher.into_nnf())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mask::NoExclusion;

    fn params(patch_w: u32) -> Parameters {
        Parameters {
            patch_w,
            ..Parameters::default()
        }
    }

    fn noise(w: u32, h: u32, seed: u64) -> image::RgbImage {
        let mut rng = Pcg32::seed_from_u64(seed);
        image::RgbImage::from_fn(w, h, |_, _| image::Rgb(rng.gen()))
    }

    #[test]
    fn retry_policies() {
        assert!(!RetryPolicy::Asymmetric.resamples(UNCONSTRAINED));
        assert!(RetryPolicy::Asymmetric.resamples(3));
        assert!(!RetryPolicy::Skip.resamples(3));
        assert!(RetryPolicy::Resample.resamples(UNCONSTRAINED));
    }

    #[test]
    fn patch_larger_than_image() {
        let img = image::RgbImage::new(4, 9);
        match match_patches(&img, &img, &NoExclusion, &params(5)) {
            Err(Error::PatchTooLarge {
                patch_size: 5,
                width: 4,
                height: 9,
            }) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn finds_shifted_copy() {
        // the target is the source shifted right by 3, so nearly every
        // placement has an exact match
        let source = noise(24, 20, 1);
        let target = image::RgbImage::from_fn(24, 20, |x, y| {
            *source.get_pixel(x.saturating_sub(3), y)
        });

        let nnf = match_patches(
            &source,
            &target,
            &NoExclusion,
            &Parameters {
                patch_w: 5,
                outer_iterations: 6,
                ..Parameters::default()
            },
        )
        .unwrap();

        let exact = nnf
            .iter()
            .filter(|(s, m)| s.x + 3 < 20 && m.target == Coord::new(s.x + 3, s.y))
            .count();
        let candidates = nnf.iter().filter(|(s, _)| s.x + 3 < 20).count();
        assert!(exact * 10 >= candidates * 9, "{}/{}", exact, candidates);
    }

    #[test]
    fn self_match_is_never_taken() {
        let img = noise(16, 16, 9);
        let nnf = match_patches(&img, &img, &NoExclusion, &params(3)).unwrap();

        // initialization may land on itself, refinement never moves there
        let self_matches = nnf.iter().filter(|(s, m)| *s == m.target).count();
        let total = nnf.iter().count();
        assert!(self_matches * 10 < total);
    }

    #[test]
    fn full_exclusion_fails() {
        let img = noise(8, 8, 4);
        let all = |_: Coord| true;
        match match_patches(&img, &img, &all, &params(3)) {
            Err(Error::NoValidTargets) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn label_without_targets_fails() {
        let img = noise(10, 10, 2);
        let source_labels = LabelGrid::from_fn(Dims::square(10), |x, _| if x < 5 { 1 } else { 2 });
        // label 2 only exists on the right edge where no 3x3 patch fits
        let target_labels = LabelGrid::from_fn(Dims::square(10), |x, _| if x < 9 { 1 } else { 2 });

        match match_patches_constrained(
            &img,
            &img,
            &NoExclusion,
            &source_labels,
            &target_labels,
            &params(3),
        ) {
            Err(Error::UnsatisfiableConstraint { label: 2 }) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn constraint_size_mismatch() {
        let img = noise(10, 10, 2);
        let labels = LabelGrid::from_fn(Dims::new(10, 9), |_, _| 1);
        let matcher = PatchMatcher::new(&img, &img, &NoExclusion, &params(3), 0)
            .unwrap()
            .with_constraints(&labels, &labels);

        assert!(matches!(matcher, Err(Error::SizeMismatch(_))));
    }

    #[test]
    fn deterministic_for_a_seed() {
        let a = noise(20, 14, 5);
        let b = noise(18, 16, 6);

        let first = match_patches(&a, &b, &NoExclusion, &params(4)).unwrap();
        let second = match_patches(&a, &b, &NoExclusion, &params(4)).unwrap();

        assert!(first.iter().zip(second.iter()).all(|(l, r)| l == r));
    }
}
