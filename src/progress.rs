//! Progress bar for a crawl run.

use std::io::{self, IsTerminal};

use booru_crawler::Completion;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str = "{spinner} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})";

/// Counts completions against the up-front total.
///
/// The count is advisory, so the bar grows if more items arrive than were
/// announced.
#[derive(Debug)]
pub(crate) struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Creates a bar drawn on stderr, hidden when `quiet` or when stderr is
    /// not a terminal.
    pub(crate) fn new(total: u64, quiet: bool) -> Self {
        let visible = !quiet && io::stderr().is_terminal();
        Self::with_visibility(total, visible)
    }

    fn with_visibility(total: u64, visible: bool) -> Self {
        let bar = ProgressBar::with_draw_target(
            Some(total),
            if visible {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        bar.set_style(
            ProgressStyle::with_template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }

    /// Advances by one, whatever the outcome.
    pub(crate) fn record(&self, _completion: &Completion) {
        let position = self.bar.position() + 1;
        if self.bar.length().is_some_and(|len| position > len) {
            self.bar.set_length(position);
        }
        self.bar.set_position(position);
    }

    /// Completions recorded so far.
    pub(crate) fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Leaves the final count on screen.
    pub(crate) fn finish(&self) {
        self.bar.abandon();
    }
}
