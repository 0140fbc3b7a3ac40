use patchfill::{CompletionProgress, Error, ProgressUpdate};
use std::path::{Path, PathBuf};

/// Saves the image after every match and vote round as
/// `level{n}_iter{m}.png`, then passes the update on
pub struct DebugFrames {
    dir: PathBuf,
    inner: Option<Box<dyn CompletionProgress>>,
}

impl DebugFrames {
    pub fn new(dir: &Path, inner: Option<Box<dyn CompletionProgress>>) -> Result<Self, Error> {
        std::fs::create_dir_all(dir)?;

        Ok(Self {
            dir: dir.to_owned(),
            inner,
        })
    }

    fn frame_path(&self, update: &ProgressUpdate<'_>) -> PathBuf {
        self.dir.join(format!(
            "level{}_iter{}.png",
            update.level.current, update.iteration.current
        ))
    }
}

impl CompletionProgress for DebugFrames {
    fn update(&mut self, update: ProgressUpdate<'_>) {
        let path = self.frame_path(&update);

        // A missing frame shouldn't abort the completion
        if let Err(e) = update.image.save(&path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to save debug frame");
        }

        if let Some(inner) = self.inner.as_mut() {
            inner.update(update);
        }
    }
}
