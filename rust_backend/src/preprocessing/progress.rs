//! Progress notifications pushed onto a channel.
//!
//! The pipeline never waits on a consumer: events go onto an unbounded
//! channel and a dropped receiver is ignored. Every event is also logged.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// One (stage, percent) notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub stage: String,
    pub percent: f64,
}

/// Creates a connected sender/receiver pair.
pub fn progress_channel() -> (UnboundedSender<ProgressEvent>, UnboundedReceiver<ProgressEvent>) {
    unbounded_channel()
}

/// Sending half used by the pipeline and the engine.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Reporter that only logs.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&self, stage: impl Into<String>, percent: f64) {
        let stage = stage.into();
        log::info!("{} - {}%", stage, percent);
        if let Some(sender) = &self.sender {
            let _ = sender.send(ProgressEvent { stage, percent });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (tx, mut rx) = progress_channel();
        let reporter = ProgressReporter::new(tx);
        reporter.report("Loading CSV data...", 10.0);
        reporter.report("Filtering pole permissions...", 25.0);
        drop(reporter);

        let first = rx.blocking_recv().unwrap();
        assert_eq!(first.stage, "Loading CSV data...");
        assert_eq!(rx.blocking_recv().unwrap().percent, 25.0);
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = progress_channel();
        drop(rx);
        ProgressReporter::new(tx).report("Processing complete!", 100.0);
        ProgressReporter::silent().report("nobody listening", 50.0);
    }
}
