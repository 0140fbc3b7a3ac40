// BEGIN - Embark standard lints v0.4
// do not change or add/remove here, but one can add exceptions after this section
// for more info see: <https://github.com/EmbarkStudios/rust-ecosystem/issues/59>
#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_on_vec_items,
    clippy::match_same_arms,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mismatched_target_os,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
// END - Embark standard lints v0.4

//! `patchfill` fills holes in images with content borrowed from the rest of
//! the image.
//!
//! At its core is a randomized nearest-neighbor field search between the
//! patches of two images (PatchMatch). Completion runs that search over an
//! image pyramid, coarse to fine: at every level each hole pixel is rebuilt
//! from the patches that cover it, weighted by how well they matched, until
//! the image stops changing.
//!
//! First, you build a `Session` via a `SessionBuilder`, which follows the builder pattern. Calling
//! `build` on the `SessionBuilder` loads the image, the hole mask and the optional constraint
//! map and checks them and the parameters for errors.
//!
//! `Session` has a `run()` method that completes the image and returns it as a
//! `CompletedImage`, which can be saved or inspected.
//!
//! ## Usage
//!
//! ```no_run
//! let session = patchfill::Session::builder()
//!     // Set some parameters
//!     .patch_size(7)
//!     .seed(10)
//!     // The image to complete, and a mask where white marks the hole
//!     .inpaint(&"imgs/wall.png", &"imgs/wall-mask.png")
//!     // Build the session
//!     .build().expect("failed to build session");
//!
//! let completed = session.run(None).expect("failed to complete image");
//! completed.save("wall-filled.png").expect("failed to save image");
//! ```
//!
//! The lower level pieces, [`match_patches`] and [`complete`], work on images
//! that are already in memory.
mod completion;
pub mod constraint;
pub mod distance;
mod errors;
mod img_pyramid;
pub mod mask;
pub mod matcher;
pub mod nnf;
pub mod pixels;
pub mod resample;
pub mod session;
mod utils;
pub mod vote;

pub use image;
use std::path::Path;

pub use completion::complete;
pub use constraint::{ConstraintMap, Label, LabelGrid};
pub use distance::{patch_distance, Distance};
pub use errors::Error;
pub use mask::{Exclusion, ExclusionBox, ExclusionMask, ExclusionMode, HoleMask};
pub use matcher::{match_patches, match_patches_constrained, PatchMatcher, RetryPolicy};
pub use nnf::{Coord, Match, Nnf};
pub use pixels::PixelBuffer;
pub use session::{
    CompletionProgress, ProgressStat, ProgressUpdate, Session, SessionBuilder,
};
pub use utils::{load_dynamic_image, ImageSource};
pub use vote::reconstruct;

/// Simple dimensions struct
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Every knob of matching and completion.
///
/// The `Default` values are a reasonable starting point for photographs, see
/// the [`SessionBuilder`] setters for what each one does.
#[derive(Clone, Debug)]
pub struct Parameters {
    /// Side length of the square patches
    pub patch_w: u32,
    /// Propagation and random search passes per match
    pub outer_iterations: u32,
    /// Upper bound of match and vote rounds per pyramid level
    pub inner_iterations: u32,
    /// Upper bound of the initial random search radius
    pub random_search_cap: u32,
    /// Falloff of the voting weight with patch distance
    pub sigma: f64,
    /// log2 of the scale of the coarsest pyramid level
    pub start_scale: i32,
    /// Mean squared change per hole pixel below which a level is done
    pub convergence_threshold: f64,
    pub seed: u64,
    /// Voting threads, `None` uses every logical core
    pub max_thread_count: Option<usize>,
    pub exclusion_mode: ExclusionMode,
    pub retry_policy: RetryPolicy,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            patch_w: 7,
            outer_iterations: 5,
            inner_iterations: 30,
            random_search_cap: u32::MAX,
            sigma: 49.0,
            start_scale: -2,
            convergence_threshold: 0.02,
            seed: 0,
            max_thread_count: None,
            exclusion_mode: ExclusionMode::Dilated,
            retry_policy: RetryPolicy::Asymmetric,
        }
    }
}

impl Parameters {
    /// The largest patch size accepted
    pub const MAX_PATCH_SIZE: u32 = 64;
    /// The coarsest pyramid scale accepted, as log2
    pub const MIN_START_SCALE: i32 = -16;

    /// Checks every parameter against its allowed range
    pub fn validate(&self) -> Result<(), Error> {
        fn invalid(name: &'static str, value: f32, min: f32, max: f32) -> Error {
            Error::InvalidRange(errors::InvalidRange {
                min,
                max,
                value,
                name,
            })
        }

        if self.patch_w == 0 || self.patch_w > Self::MAX_PATCH_SIZE {
            return Err(invalid(
                "patch-size",
                self.patch_w as f32,
                1.0,
                Self::MAX_PATCH_SIZE as f32,
            ));
        }

        if self.sigma.is_nan() || self.sigma <= 0.0 || self.sigma.is_infinite() {
            return Err(invalid("sigma", self.sigma as f32, 0.0, f32::MAX));
        }

        if self.start_scale < Self::MIN_START_SCALE || self.start_scale > 0 {
            return Err(invalid(
                "start-scale",
                self.start_scale as f32,
                Self::MIN_START_SCALE as f32,
                0.0,
            ));
        }

        if self.convergence_threshold.is_nan() || self.convergence_threshold < 0.0 {
            return Err(invalid(
                "threshold",
                self.convergence_threshold as f32,
                0.0,
                f32::MAX,
            ));
        }

        for &(name, value) in &[
            ("pm-iters", self.outer_iterations),
            ("im-iters", self.inner_iterations),
            ("rs-max", self.random_search_cap),
        ] {
            if value == 0 {
                return Err(invalid(name, 0.0, 1.0, u32::MAX as f32));
            }
        }

        if self.max_thread_count == Some(0) {
            return Err(invalid("max-thread-count", 0.0, 1.0, 1024.0));
        }

        Ok(())
    }

    /// The number of threads voting uses
    #[inline]
    pub fn thread_count(&self) -> usize {
        self.max_thread_count.unwrap_or_else(num_cpus::get)
    }
}

/// An image completed by a `Session::run()`
pub struct CompletedImage {
    image: image::RgbImage,
    nnf: Option<Nnf>,
}

impl CompletedImage {
    pub(crate) fn new(image: image::RgbImage, nnf: Option<Nnf>) -> Self {
        Self { image, nnf }
    }

    /// Saves the completed image to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent_path) = path.parent() {
            std::fs::create_dir_all(&parent_path)?;
        }

        self.image.save(&path)?;
        Ok(())
    }

    /// Writes the completed image to the specified stream
    pub fn write<W: std::io::Write>(
        self,
        writer: &mut W,
        fmt: image::ImageOutputFormat,
    ) -> Result<(), Error> {
        let dyn_img = self.into_image();
        Ok(dyn_img.write_to(writer, fmt)?)
    }

    /// Saves visualizations of the nearest-neighbor field of the last
    /// iteration at full resolution. Nothing is written if the mask had no
    /// holes, since no field was computed.
    pub fn save_debug<P: AsRef<Path>>(&self, dir: P) -> Result<(), Error> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(&dir)?;

        if let Some(nnf) = &self.nnf {
            nnf.offset_map().save(&dir.join("nnf_offsets.png"))?;
            nnf.distance_map().save(&dir.join("nnf_distance.png"))?;
        }

        Ok(())
    }

    /// The nearest-neighbor field of the last iteration, if any
    pub fn nnf(&self) -> Option<&Nnf> {
        self.nnf.as_ref()
    }

    /// Returns the completed output image
    pub fn into_image(self) -> image::DynamicImage {
        image::DynamicImage::ImageRgb8(self.image)
    }
}

impl AsRef<image::RgbImage> for CompletedImage {
    fn as_ref(&self) -> &image::RgbImage {
        &self.image
    }
}
