mod debug_frames;
mod progress_window;

use structopt::StructOpt;

use debug_frames::DebugFrames;
use patchfill::{
    image::{self, ImageOutputFormat as ImgFmt},
    mask::NoExclusion,
    CompletionProgress, Error, ExclusionMode, ImageSource, Parameters, RetryPolicy, Session,
};
use progress_window::ProgressWindow;
use std::path::{Path, PathBuf};

fn parse_img_fmt(input: &str) -> Result<ImgFmt, String> {
    let fmt = match input {
        "png" => ImgFmt::Png,
        "jpg" => ImgFmt::Jpeg(75),
        "bmp" => ImgFmt::Bmp,
        other => {
            return Err(format!(
                "image format `{}` not one of: 'png', 'jpg', 'bmp'",
                other
            ))
        }
    };

    Ok(fmt)
}

fn parse_exclusion(input: &str) -> Result<ExclusionMode, String> {
    match input {
        "box" => Ok(ExclusionMode::BoundingBox),
        "dilated" => Ok(ExclusionMode::Dilated),
        other => Err(format!(
            "exclusion mode `{}` not one of: 'box', 'dilated'",
            other
        )),
    }
}

fn parse_retry(input: &str) -> Result<RetryPolicy, String> {
    match input {
        "asymmetric" => Ok(RetryPolicy::Asymmetric),
        "skip" => Ok(RetryPolicy::Skip),
        "resample" => Ok(RetryPolicy::Resample),
        other => Err(format!(
            "retry policy `{}` not one of: 'asymmetric', 'skip', 'resample'",
            other
        )),
    }
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Tweaks {
    /// Side length of the square patches that are matched and voted with.
    /// Larger patches capture larger structures but need more known pixels
    /// around the hole.
    #[structopt(long, default_value = "7")]
    patch_size: u32,
    /// Propagation and random search passes for every match
    #[structopt(long = "pm-iters", default_value = "5")]
    outer_iterations: u32,
    /// Upper bound of match and vote rounds per pyramid level
    #[structopt(long = "im-iters", default_value = "30")]
    inner_iterations: u32,
    /// log2 of the scale of the coarsest pyramid level, raised automatically
    /// when a patch doesn't fit at that size
    #[structopt(long, default_value = "-2", allow_hyphen_values = true)]
    start_scale: i32,
    /// Falloff of the voting weight with the match distance, smaller values
    /// favor the best matches more strongly
    #[structopt(long, default_value = "49.0")]
    sigma: f64,
    /// Upper bound of the radius the random search starts from
    #[structopt(long = "rs-max")]
    random_search_cap: Option<u32>,
    /// A level is done once the mean squared change per hole pixel between
    /// two rounds falls below this
    #[structopt(long, default_value = "0.02")]
    threshold: f64,
    /// A seed value for the random generator, the same seed and inputs always
    /// produce the same output
    #[structopt(long)]
    seed: Option<u64>,
    /// Which placements may not be copied from: `box` excludes every patch
    /// overlapping the hole's bounding box, `dilated` only those overlapping
    /// the hole itself
    #[structopt(long, default_value = "dilated", parse(try_from_str = parse_exclusion))]
    exclusion: ExclusionMode,
    /// What the random search does with a candidate it may not use: `asymmetric`
    /// redraws for labeled patches and skips otherwise, `skip` always skips,
    /// `resample` always redraws
    #[structopt(long, default_value = "asymmetric", parse(try_from_str = parse_retry))]
    retry: RetryPolicy,
    /// Don't show progress bars
    #[structopt(long)]
    no_progress: bool,
    /// Log each level and iteration to stderr, `RUST_LOG` can be used to
    /// change the verbosity
    #[structopt(long)]
    trace: bool,
}

#[derive(StructOpt)]
struct Complete {
    /// Path to the image to complete
    #[structopt(parse(from_os_str))]
    image: PathBuf,
    /// Path to the mask image, the same size as the image, where white pixels
    /// are filled and black pixels are kept
    #[structopt(long, parse(from_os_str))]
    mask: PathBuf,
    /// Path to a constraint map, the same size as the image. Every pixel must
    /// be gray, a patch whose corner has a non-zero value is only filled from
    /// patches with the same value.
    #[structopt(long, parse(from_os_str))]
    constraints: Option<PathBuf>,
}

#[derive(StructOpt)]
struct Match {
    /// The image whose patches are looked up
    #[structopt(parse(from_os_str))]
    source: PathBuf,
    /// The image the matches are taken from
    #[structopt(parse(from_os_str))]
    target: PathBuf,
    /// Saves the offset of every source patch to its match, red and green are
    /// the target x and y
    #[structopt(long, parse(from_os_str))]
    offsets: Option<PathBuf>,
    /// Saves how far every source patch is from its match, brighter is worse
    #[structopt(long, parse(from_os_str))]
    distances: Option<PathBuf>,
}

#[derive(StructOpt)]
enum Subcommand {
    /// Fills the holes of an image with patches from the rest of it
    #[structopt(name = "complete")]
    Complete(Complete),
    /// Matches the patches of one image to another and rebuilds the first
    /// from the second
    #[structopt(name = "match")]
    Match(Match),
}

#[derive(StructOpt)]
#[structopt(
    name = "patchfill",
    about = "Patch based image completion and matching",
    rename_all = "kebab-case"
)]
struct Opt {
    /// The format to save the output image as.
    ///
    /// NOTE: this will only apply when stdout is specified via `-o -`, otherwise the image
    /// format is determined by the file extension of the path provided to `-o`
    #[structopt(
        long,
        default_value = "png",
        parse(try_from_str = parse_img_fmt)
    )]
    out_fmt: ImgFmt,
    /// The path to save the completed, or for `match` the rebuilt, image to, the file
    /// extensions of the path determines the image format used. You may use `-` for stdout.
    #[structopt(long = "out", short, parse(from_os_str))]
    output_path: PathBuf,
    /// A directory into which debug images are also saved.
    ///
    /// * `nnf_offsets.png` - The offset of every patch to its match, red and green are x and y
    /// * `nnf_distance.png` - How far every patch is from its match, brighter is worse
    /// * `level{n}_iter{m}.png` - The image after every match and vote round of `complete`
    #[structopt(long, parse(from_os_str))]
    debug_out_dir: Option<PathBuf>,
    /// The maximum number of worker threads used for voting.
    /// Defaults to the logical core count.
    #[structopt(short = "t", long = "threads")]
    max_threads: Option<usize>,
    #[structopt(flatten)]
    tweaks: Tweaks,
    #[structopt(subcommand)]
    cmd: Subcommand,
}

fn main() {
    if let Err(e) = real_main() {
        if atty::is(atty::Stream::Stderr) {
            eprintln!("\x1b[31merror\x1b[0m: {}", e);
        } else {
            eprintln!("error: {}", e);
        }

        std::process::exit(1);
    }
}

fn real_main() -> Result<(), Error> {
    let args = Opt::from_args();

    if args.tweaks.trace {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("patchfill=debug"));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    // Check that the extension for the path supplied by the user is one of the ones we support
    {
        match args.output_path.extension().and_then(|ext| ext.to_str()) {
            Some("png") | Some("jpg") | Some("bmp") => {}
            None => {}
            Some(other) => return Err(Error::UnsupportedOutputFormat(other.to_owned())),
        }
    }

    match &args.cmd {
        Subcommand::Complete(complete) => run_complete(&args, complete),
        Subcommand::Match(m) => run_match(&args, m),
    }
}

fn run_complete(args: &Opt, complete: &Complete) -> Result<(), Error> {
    let mut sb = Session::builder()
        .inpaint(&complete.image, &complete.mask)
        .patch_size(args.tweaks.patch_size)
        .outer_iterations(args.tweaks.outer_iterations)
        .inner_iterations(args.tweaks.inner_iterations)
        .start_scale(args.tweaks.start_scale)
        .sigma(args.tweaks.sigma)
        .convergence_threshold(args.tweaks.threshold)
        .seed(args.tweaks.seed.unwrap_or_default())
        .exclusion_mode(args.tweaks.exclusion)
        .retry_policy(args.tweaks.retry);

    if let Some(ref constraints) = complete.constraints {
        sb = sb.constraint_map(constraints);
    }

    if let Some(cap) = args.tweaks.random_search_cap {
        sb = sb.random_search_cap(cap);
    }

    if let Some(mt) = args.max_threads {
        sb = sb.max_thread_count(mt);
    }

    let session = sb.build()?;
    tracing::info!(
        holes = session.hole().hole_count(),
        patch_size = session.params().patch_w,
        "session built"
    );

    let mut progress: Option<Box<dyn CompletionProgress>> =
        if !args.tweaks.no_progress && !args.tweaks.trace {
            Some(Box::new(ProgressWindow::new()))
        } else {
            None
        };

    if let Some(ref dir) = args.debug_out_dir {
        progress = Some(Box::new(DebugFrames::new(dir, progress)?));
    }

    let completed = session.run(progress)?;

    if let Some(ref dir) = args.debug_out_dir {
        completed.save_debug(dir)?;
    }

    save_output(completed.into_image(), &args.output_path, &args.out_fmt)
}

fn run_match(args: &Opt, m: &Match) -> Result<(), Error> {
    let source = patchfill::load_dynamic_image(ImageSource::from(&m.source))?.to_rgb();
    let target = patchfill::load_dynamic_image(ImageSource::from(&m.target))?.to_rgb();

    let mut params = Parameters {
        patch_w: args.tweaks.patch_size,
        outer_iterations: args.tweaks.outer_iterations,
        sigma: args.tweaks.sigma,
        seed: args.tweaks.seed.unwrap_or_default(),
        max_thread_count: args.max_threads,
        retry_policy: args.tweaks.retry,
        ..Parameters::default()
    };
    if let Some(cap) = args.tweaks.random_search_cap {
        params.random_search_cap = cap;
    }

    let nnf = patchfill::match_patches(&source, &target, &NoExclusion, &params)?;
    tracing::info!(mean_distance = nnf.mean_distance(), "matched");

    if let Some(ref path) = m.offsets {
        nnf.offset_map().save(path)?;
    }

    if let Some(ref path) = m.distances {
        nnf.distance_map().save(path)?;
    }

    if let Some(ref dir) = args.debug_out_dir {
        std::fs::create_dir_all(dir)?;
        nnf.offset_map().save(dir.join("nnf_offsets.png"))?;
        nnf.distance_map().save(dir.join("nnf_distance.png"))?;
    }

    let rebuilt = patchfill::reconstruct(&target, &nnf, params.sigma, params.thread_count())?;
    save_output(
        image::DynamicImage::ImageRgb8(rebuilt),
        &args.output_path,
        &args.out_fmt,
    )
}

fn save_output(img: image::DynamicImage, path: &Path, fmt: &ImgFmt) -> Result<(), Error> {
    if path.to_str() == Some("-") {
        let out = std::io::stdout();
        let mut out = out.lock();
        img.write_to(&mut out, fmt.clone())?;
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        img.save(path)?;
    }

    Ok(())
}
