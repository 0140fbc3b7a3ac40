use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub struct ProgressWindow {
    level_pb: ProgressBar,
    iter_pb: ProgressBar,

    level_len: usize,
    level_num: usize,
}

impl ProgressWindow {
    pub fn new() -> Self {
        let multi_pb = MultiProgress::new();
        let sty = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] level {pos}/{len} {bar:40.cyan/blue}")
            .progress_chars("##-");

        let level_pb = multi_pb.add(ProgressBar::new(1));
        level_pb.set_style(sty);

        let sty = ProgressStyle::default_bar()
            .template(" {msg:>16} {bar:40.cyan/blue} {pos}/{len}")
            .progress_chars("##-");
        let iter_pb = multi_pb.add(ProgressBar::new(1));
        iter_pb.set_style(sty);

        std::thread::spawn(move || {
            let _ = multi_pb.join();
        });

        Self {
            level_pb,
            iter_pb,
            level_len: 1,
            level_num: 0,
        }
    }
}

impl Drop for ProgressWindow {
    fn drop(&mut self) {
        self.level_pb.finish();
        self.iter_pb.finish();
    }
}

impl patchfill::CompletionProgress for ProgressWindow {
    fn update(&mut self, update: patchfill::ProgressUpdate<'_>) {
        if update.level.total != self.level_len {
            self.level_len = update.level.total;
            self.level_pb.set_length(self.level_len as u64);
        }

        // finished levels, the current one is still running
        if update.level.current != self.level_num {
            self.level_num = update.level.current;
            self.level_pb.set_position(self.level_num as u64 - 1);
            self.iter_pb.reset();
            self.iter_pb.set_length(update.iteration.total as u64);
        }

        self.iter_pb.set_message(&format!("change {:.3}", update.change));
        self.iter_pb.set_position(update.iteration.current as u64);
    }
}
