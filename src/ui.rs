//! Application UI: a progress bar over input files, and a stderr writer
//! that keeps log output from tearing it.
//!
//! This is adapted from `substudy` by Eric Kidd, which is licensed under
//! Apache-2.0 OR MIT. Used with permission.

use std::{io, sync::Arc, time::Duration};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Application UI state.
#[derive(Clone)]
pub struct Ui {
    /// Our progress bars, shared with every [`SafeStderrWriter`].
    multi_progress: Arc<MultiProgress>,
}

impl Ui {
    /// Create a new UI, drawing progress bars to stderr.
    pub fn init() -> Ui {
        let multi_progress = Arc::new(MultiProgress::new());
        Ui { multi_progress }
    }

    /// Create a new UI for unit tests.
    #[cfg(test)]
    pub fn init_for_tests() -> Ui {
        let multi_progress =
            Arc::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()));
        Ui { multi_progress }
    }

    /// Hide all our progress bars completely, for when we're writing actual
    /// output to `stdout`.
    pub fn hide_progress_bars(&self) {
        self.multi_progress
            .set_draw_target(ProgressDrawTarget::hidden());
    }

    /// Get a writer than can be used to write to stderr, for use with `tracing`
    /// and other output code.
    pub fn get_stderr_writer(&self) -> SafeStderrWriter {
        SafeStderrWriter { ui: self.clone() }
    }

    /// Get a reference to our progress bars.
    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi_progress
    }

    /// Create a progress bar over a batch of `file_count` input files.
    pub fn new_file_progress(&self, file_count: usize) -> FileProgress {
        let pb = ProgressBar::new(file_count as u64).with_style(file_progress_style());
        let pb = self.multi_progress.add(pb);
        #[cfg(test)]
        pb.set_draw_target(ProgressDrawTarget::hidden());
        pb.set_prefix("📄");
        pb.enable_steady_tick(Duration::from_millis(250));
        FileProgress { pb }
    }
}

/// Progress through a batch of files, showing the file being read.
pub struct FileProgress {
    pb: ProgressBar,
}

impl FileProgress {
    /// Show `name` as the file we're working on.
    pub fn start_file(&self, name: &str) {
        self.pb.set_message(format!("Reading {name}"));
    }

    /// Count the current file as done.
    pub fn finish_file(&self) {
        self.pb.inc(1);
    }

    /// Leave a summary line in place of the bar.
    pub fn finish(self, failed: usize) {
        let done = self.pb.position();
        let msg = if failed == 0 {
            format!("Read {done} files")
        } else {
            format!("Read {done} files, {failed} with problems")
        };
        self.pb.finish_with_message(msg);
    }

    #[cfg(test)]
    fn message(&self) -> String {
        self.pb.message()
    }
}

fn file_progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {prefix:3}{wide_msg} {pos:>4}/{len:4} files {elapsed_precise} {bar:30.cyan/blue}")
        .expect("bad progress bar template")
}

/// A writer which can used to write to `stderr`. It will hide and show progress
/// bars as needed, so that they don't interfere with the output.
#[derive(Clone)]
pub struct SafeStderrWriter {
    ui: Ui,
}

// The `tracing-indicatif` crate suggests that we should implement the following
// methods.
impl io::Write for SafeStderrWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ui.multi_progress().suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ui.multi_progress().suspend(|| io::stderr().flush())
    }

    fn write_vectored(&mut self, bufs: &[io::IoSlice<'_>]) -> io::Result<usize> {
        self.ui
            .multi_progress()
            .suspend(|| io::stderr().write_vectored(bufs))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.ui
            .multi_progress()
            .suspend(|| io::stderr().write_all(buf))
    }

    fn write_fmt(&mut self, fmt: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.ui
            .multi_progress()
            .suspend(|| io::stderr().write_fmt(fmt))
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SafeStderrWriter {
    type Writer = SafeStderrWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_progress_names_the_current_file_and_counts_problems() {
        let ui = Ui::init_for_tests();
        let progress = ui.new_file_progress(2);
        progress.start_file("scan.pdf");
        assert_eq!(progress.message(), "Reading scan.pdf");
        progress.finish_file();
        progress.start_file("photo.png");
        progress.finish_file();
        let pb = progress.pb.clone();
        progress.finish(1);
        assert_eq!(pb.message(), "Read 2 files, 1 with problems");
        assert!(pb.is_finished());
    }
}
