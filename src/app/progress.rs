//! Progress bar driven by acquisition events.

use indicatif::{ProgressBar, ProgressStyle};
use series_downloader::collection::CollectionRef;
use series_downloader::orchestrator::{AcquisitionObserver, MemberOutcome, MemberState};

/// Renders one bar per run; each collection extends its length.
pub(crate) struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} members {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl AcquisitionObserver for ProgressObserver {
    fn members_resolved(&self, collection: &CollectionRef, count: usize) {
        self.bar.inc_length(count as u64);
        self.bar.set_message(collection.title.clone());
    }

    fn member_finished(&self, collection: &CollectionRef, outcome: &MemberOutcome) {
        let label = match outcome.state {
            MemberState::Skipped => "skipped",
            MemberState::Failed => "failed",
            _ => "done",
        };
        self.bar
            .set_message(format!("{} #{} {label}", collection.title, outcome.member.id));
        self.bar.inc(1);
    }
}
