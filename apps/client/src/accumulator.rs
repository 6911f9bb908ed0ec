//! Incremental text accumulator: folds fragments into growing, observable strings.

use serde::Serialize;
use tokio::sync::watch;

/// Independent text channels fed by streamed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Summary,
    CoverLetter,
}

/// Holds one append-only string per channel and publishes every change.
///
/// Ordering and staleness are not checked here; the session engine decides
/// whether a fragment may be applied.
#[derive(Debug)]
pub struct TextAccumulator {
    summary: watch::Sender<String>,
    cover_letter: watch::Sender<String>,
}

impl Default for TextAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TextAccumulator {
    pub fn new() -> Self {
        let (summary, _) = watch::channel(String::new());
        let (cover_letter, _) = watch::channel(String::new());
        Self {
            summary,
            cover_letter,
        }
    }

    fn sender(&self, channel: Channel) -> &watch::Sender<String> {
        match channel {
            Channel::Summary => &self.summary,
            Channel::CoverLetter => &self.cover_letter,
        }
    }

    pub fn reset(&self, channel: Channel) {
        self.sender(channel).send_replace(String::new());
    }

    pub fn apply(&self, channel: Channel, fragment: &str) {
        self.sender(channel)
            .send_modify(|text| text.push_str(fragment));
    }

    pub fn current(&self, channel: Channel) -> String {
        self.sender(channel).borrow().clone()
    }

    pub fn subscribe(&self, channel: Channel) -> watch::Receiver<String> {
        self.sender(channel).subscribe()
    }
}
