//! Terminal rendering of a download's events.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tributary::download::DownloadOptions;
//! use tributary::progress::{ProgressBarOpts, ProgressDisplay};
//!
//! # async fn example() {
//! let mut events = tributary::download("https://example.com/file.zip", DownloadOptions::new());
//! let display = ProgressDisplay::new(ProgressBarOpts::default());
//!
//! while let Some(event) = events.next_event().await {
//!     display.observe(&event);
//! }
//! # }
//! ```

use crate::download::DownloadEvent;
use crate::progress::ProgressBarOpts;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};

/// Draws one progress bar per download.
pub struct ProgressDisplay {
    multi: MultiProgress,
    bar: ProgressBar,
    opts: ProgressBarOpts,
}

impl ProgressDisplay {
    /// Creates a display drawing to the terminal.
    pub fn new(opts: ProgressBarOpts) -> Self {
        let multi = match opts.enabled {
            true => MultiProgress::new(),
            false => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };
        Self::with_multi(multi, opts)
    }

    /// Creates a display sharing `multi` with other displays, so that
    /// concurrent downloads draw their bars together.
    pub fn with_multi(multi: MultiProgress, opts: ProgressBarOpts) -> Self {
        let bar = multi.add(ProgressBar::no_length());
        bar.set_style(opts.to_spinner_style());
        Self { multi, bar, opts }
    }

    /// Creates a display that draws nothing.
    pub fn hidden() -> Self {
        Self::new(ProgressBarOpts::hidden())
    }

    /// The bar of this download.
    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    /// The group the bar belongs to.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }

    /// Updates the bar with an event.
    pub fn observe(&self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Progress(snapshot) => {
                match snapshot.total_bytes {
                    Some(total) if self.bar.length() != Some(total) => {
                        self.bar.set_length(total);
                        self.bar.set_style(self.opts.to_progress_style());
                    }
                    _ => {}
                }
                self.bar.set_position(snapshot.bytes_written);
            }
            DownloadEvent::Peers(peers) => {
                self.bar.set_message(format!("{} peers", peers.count));
            }
            DownloadEvent::Finished(path) => {
                if self.opts.clear {
                    self.bar.finish_and_clear();
                } else {
                    self.bar.finish_with_message(format!("saved to {}", path.display()));
                }
            }
            DownloadEvent::Cancelled => self.bar.abandon_with_message("cancelled"),
            DownloadEvent::Error(e) => self.bar.abandon_with_message(e.to_string()),
            DownloadEvent::Closed => {}
        }
    }
}
