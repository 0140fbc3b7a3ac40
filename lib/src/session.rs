use crate::{
    completion,
    constraint::LabelGrid,
    mask::{ExclusionMode, HoleMask},
    matcher::RetryPolicy,
    utils::{load_labels, load_mask, load_rgb, ImageSource},
    CompletedImage, Error, Parameters,
};

/// Image completion session.
///
/// Calling `run()` will fill the holes of the image and return the result,
/// consuming the session in the process. You can provide a
/// `CompletionProgress` implementation to get an update with the current
/// image after every match and vote round.
///
/// # Example
/// ```no_run
/// let session = patchfill::Session::builder()
///     .seed(10)
///     .inpaint(&"imgs/wall.png", &"imgs/wall-mask.png")
///     .build().expect("failed to build session");
///
/// let completed = session.run(None).expect("failed to complete image");
/// completed.save("wall-filled.png").expect("failed to save image");
/// ```
pub struct Session {
    image: image::RgbImage,
    hole: HoleMask,
    labels: Option<LabelGrid>,
    params: Parameters,
}

impl Session {
    /// Creates a new session with default parameters.
    pub fn builder<'a>() -> SessionBuilder<'a> {
        SessionBuilder::default()
    }

    /// Completes the image.
    pub fn run(
        self,
        mut progress: Option<Box<dyn CompletionProgress>>,
    ) -> Result<CompletedImage, Error> {
        let completed = completion::run(
            &self.image,
            &self.hole,
            self.labels.as_ref(),
            &self.params,
            &mut progress,
        )?;

        Ok(CompletedImage::new(completed.image, completed.nnf))
    }

    /// The loaded hole mask
    pub fn hole(&self) -> &HoleMask {
        &self.hole
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }
}

/// Builds a session by setting parameters and adding input images, calling
/// `build` will check all of the provided inputs to verify that completion
/// can run on them
#[derive(Default)]
pub struct SessionBuilder<'a> {
    inpaint: Option<(ImageSource<'a>, ImageSource<'a>)>,
    constraints: Option<ImageSource<'a>>,
    params: Parameters,
}

impl<'a> SessionBuilder<'a> {
    /// Creates a new `SessionBuilder`, can also be created via
    /// `Session::builder()`
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the image to complete and the mask marking its hole.
    ///
    /// The mask must be the same size as the image. It is converted to luma
    /// and every pixel brighter than 127 is part of the hole.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// let session = patchfill::Session::builder()
    ///     .inpaint(&"imgs/wall.png", &"imgs/wall-mask.png")
    ///     .build().expect("failed to build session");
    /// ```
    pub fn inpaint<I: Into<ImageSource<'a>>, M: Into<ImageSource<'a>>>(
        mut self,
        image: I,
        mask: M,
    ) -> Self {
        self.inpaint = Some((image.into(), mask.into()));
        self
    }

    /// Restricts which parts of the image may fill which parts of the hole.
    ///
    /// Every pixel of the map must be gray, its value is a label. A patch
    /// whose corner pixel has a non-zero label is only filled from patches
    /// with the same label, label 0 is unconstrained. The map must be the
    /// same size as the image.
    pub fn constraint_map<C: Into<ImageSource<'a>>>(mut self, labels: C) -> Self {
        self.constraints = Some(labels.into());
        self
    }

    /// Side length of the square patches that are matched and voted with.
    ///
    /// Larger patches capture larger structures, but need more known pixels
    /// around the hole.
    ///
    /// Default: 7
    pub fn patch_size(mut self, size: u32) -> Self {
        self.params.patch_w = size;
        self
    }

    /// Propagation and random search passes run for every match.
    ///
    /// Default: 5
    pub fn outer_iterations(mut self, count: u32) -> Self {
        self.params.outer_iterations = count;
        self
    }

    /// Upper bound of match and vote rounds per pyramid level, a level
    /// stops early once the hole stops changing.
    ///
    /// Default: 30
    pub fn inner_iterations(mut self, count: u32) -> Self {
        self.params.inner_iterations = count;
        self
    }

    /// Upper bound of the radius the random search starts from, it is also
    /// limited by the image size.
    ///
    /// Default: unbounded
    pub fn random_search_cap(mut self, radius: u32) -> Self {
        self.params.random_search_cap = radius;
        self
    }

    /// How fast a patch's voting weight falls off with its match distance,
    /// smaller values favor the best matches more strongly.
    ///
    /// Default: 49.0
    pub fn sigma(mut self, value: f64) -> Self {
        self.params.sigma = value;
        self
    }

    /// log2 of the scale of the coarsest pyramid level, eg -2 starts at a
    /// quarter of the size. It is raised automatically if the image is too
    /// small at that scale to fit a patch.
    ///
    /// Default: -2
    pub fn start_scale(mut self, scale_log2: i32) -> Self {
        self.params.start_scale = scale_log2;
        self
    }

    /// A level is done once the mean squared change per hole pixel between
    /// two rounds falls below this.
    ///
    /// Default: 0.02
    pub fn convergence_threshold(mut self, value: f64) -> Self {
        self.params.convergence_threshold = value;
        self
    }

    /// Changes the seed, the same seed and inputs always give the same
    /// output.
    ///
    /// Default: 0
    pub fn seed(mut self, value: u64) -> Self {
        self.params.seed = value;
        self
    }

    /// The maximum number of threads used for voting.
    ///
    /// The output doesn't depend on the thread count.
    ///
    /// Default: The number of logical cores on this system.
    pub fn max_thread_count(mut self, count: usize) -> Self {
        self.params.max_thread_count = Some(count);
        self
    }

    /// How the placements a patch may not be copied from are derived from
    /// the hole.
    ///
    /// Default: `ExclusionMode::Dilated`
    pub fn exclusion_mode(mut self, mode: ExclusionMode) -> Self {
        self.params.exclusion_mode = mode;
        self
    }

    /// What the random search does when it draws a candidate it may not use.
    ///
    /// Default: `RetryPolicy::Asymmetric`
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.params.retry_policy = policy;
        self
    }

    /// Creates a `Session`, or returns an error if invalid parameters or input
    /// images were specified.
    pub fn build(self) -> Result<Session, Error> {
        self.params.validate()?;

        let (image, mask) = self.inpaint.ok_or(Error::NoInput)?;
        let image = load_rgb(image)?;
        let hole = load_mask(mask)?;
        let labels = match self.constraints {
            Some(src) => Some(load_labels(src)?),
            None => None,
        };

        completion::check_inputs(&image, &hole, labels.as_ref(), &self.params)?;

        Ok(Session {
            image,
            hole,
            labels,
            params: self.params,
        })
    }
}

/// Helper struct for passing progress information to external callers
#[derive(Clone, Copy, Debug)]
pub struct ProgressStat {
    /// The current amount of work that has been done
    pub current: usize,
    /// The total amount of work to do
    pub total: usize,
}

/// The state of a completion after a match and vote round
pub struct ProgressUpdate<'a> {
    /// The current image at the current pyramid level's size
    pub image: &'a image::RgbImage,
    /// Pyramid levels, coarsest is 1
    pub level: ProgressStat,
    /// Rounds within the current level, the level may end before the total
    pub iteration: ProgressStat,
    /// Mean squared change per hole pixel caused by this round
    pub change: f64,
}

/// Allows the completion to update external callers with the current
/// progress
pub trait CompletionProgress {
    fn update(&mut self, info: ProgressUpdate<'_>);
}

impl<G> CompletionProgress for G
where
    G: FnMut(ProgressUpdate<'_>) + Send,
{
    fn update(&mut self, info: ProgressUpdate<'_>) {
        self(info)
    }
}
