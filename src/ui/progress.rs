use crate::indexer::RunSummary;
use crate::ui::progress_message::{ProgressMessage, ProgressPhase};
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

/// Drives the indexing progress bar from `ProgressMessage`s sent by the
/// indexer. The bar is hidden when stdout is not a terminal.
pub struct ProgressManager {
    bar: ProgressBar,
    handle: thread::JoinHandle<()>,
}

impl ProgressManager {
    /// `verbose` also prints one line per new, modified or removed file
    pub fn new(verbose: bool) -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let bar = if console::Term::stdout().is_term() {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }

        let bar_clone = bar.clone();
        let handle = thread::spawn(move || {
            for msg in rx {
                match msg {
                    ProgressMessage::Started { phase: ProgressPhase::Parsing, total } => {
                        bar_clone.set_length(total as u64);
                        bar_clone.set_position(0);
                        bar_clone.enable_steady_tick(Duration::from_millis(100));
                        bar_clone.set_message("Parsing files");
                    }
                    ProgressMessage::Progress { current, file, .. } => {
                        bar_clone.set_position(current as u64);
                        if let Some(f) = file {
                            bar_clone.set_message(format!("Parsing: {}", f));
                        }
                    }
                    ProgressMessage::Started { phase: ProgressPhase::Cleanup, total } => {
                        bar_clone.set_message(format!("Removing {} vanished files", total));
                    }
                    ProgressMessage::Finished { .. } => {
                        bar_clone.set_message("Done");
                    }
                    ProgressMessage::FileNew(path) if verbose => {
                        bar_clone.println(format!("{} {}", Icons::NEW.style(theme().success.clone()), path));
                    }
                    ProgressMessage::FileModified(path) if verbose => {
                        bar_clone.println(format!("{} {}", Icons::MOD.style(theme().warn.clone()), path));
                    }
                    ProgressMessage::FileDeleted(path) if verbose => {
                        bar_clone.println(format!("{} {}", Icons::DEL.style(theme().error.clone()), path));
                    }
                    _ => {}
                }
            }
        });

        (Self { bar, handle }, tx)
    }

    /// Wait for the indexer's sender to drop, clear the bar and print totals
    pub fn finish_with_summary(self, summary: &RunSummary) {
        self.handle.join().ok();
        self.bar.finish_and_clear();
        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success.clone()),
            format!("Complete in {}", HumanDuration(summary.elapsed)).style(theme().success.clone())
        );
        println!(
            "  {} {}  {} {}  {} {}  {} {}",
            Icons::FILE.style(theme().info.clone()),
            summary.files_indexed,
            Icons::PACKAGE.style(theme().info.clone()),
            summary.symbols,
            Icons::LINK.style(theme().info.clone()),
            summary.imports,
            Icons::MAG.style(theme().info.clone()),
            summary.references
        );
    }
}
