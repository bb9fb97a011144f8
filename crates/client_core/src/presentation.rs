//! View-facing state: the cached post list, the draft input, and four status
//! message channels that each run a fixed fade-in / hold / fade-out schedule.

use std::time::Duration;

use shared::domain::Post;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTiming {
    pub fade_in: Duration,
    pub hold: Duration,
    pub fade_out: Duration,
}

impl MessageTiming {
    pub fn total(&self) -> Duration {
        self.fade_in + self.hold + self.fade_out
    }
}

impl Default for MessageTiming {
    fn default() -> Self {
        Self {
            fade_in: Duration::from_millis(600),
            hold: Duration::from_millis(3000),
            fade_out: Duration::from_millis(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FadingIn,
    Visible,
    Decaying,
}

/// Result of writing a message into a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    Started,
    /// The channel was still on screen; the schedule restarted from `Visible`.
    Restarted { interrupted: Phase },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    ListSuccess,
    ListError,
    PostSuccess,
    PostError,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::ListSuccess,
        Channel::ListError,
        Channel::PostSuccess,
        Channel::PostError,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Channel::ListSuccess => "list",
            Channel::ListError => "list-error",
            Channel::PostSuccess => "post",
            Channel::PostError => "post-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageChannel {
    text: Option<String>,
    shown_at: Option<Instant>,
    shows: u64,
    timing: MessageTiming,
}

impl MessageChannel {
    pub fn new(timing: MessageTiming) -> Self {
        Self {
            text: None,
            shown_at: None,
            shows: 0,
            timing,
        }
    }

    pub fn show(&mut self, text: impl Into<String>, now: Instant) -> ShowOutcome {
        let previous = self.phase_at(now);
        self.text = Some(text.into());
        self.shows += 1;

        match previous {
            Phase::Idle => {
                self.shown_at = Some(now);
                ShowOutcome::Started
            }
            interrupted => {
                // Backdate the start so the channel sits at the beginning of the hold.
                self.shown_at = Some(now.checked_sub(self.timing.fade_in).unwrap_or(now));
                ShowOutcome::Restarted { interrupted }
            }
        }
    }

    pub fn phase_at(&self, now: Instant) -> Phase {
        let Some(shown_at) = self.shown_at else {
            return Phase::Idle;
        };
        let elapsed = now.saturating_duration_since(shown_at);
        let timing = self.timing;

        if elapsed < timing.fade_in {
            Phase::FadingIn
        } else if elapsed < timing.fade_in + timing.hold {
            Phase::Visible
        } else if elapsed < timing.total() {
            Phase::Decaying
        } else {
            Phase::Idle
        }
    }

    pub fn opacity_at(&self, now: Instant) -> f32 {
        let Some(shown_at) = self.shown_at else {
            return 0.0;
        };
        let elapsed = now.saturating_duration_since(shown_at);
        let timing = self.timing;

        match self.phase_at(now) {
            Phase::Idle => 0.0,
            Phase::Visible => 1.0,
            Phase::FadingIn => elapsed.as_secs_f32() / timing.fade_in.as_secs_f32(),
            Phase::Decaying => {
                let into_fade = elapsed - timing.fade_in - timing.hold;
                1.0 - into_fade.as_secs_f32() / timing.fade_out.as_secs_f32()
            }
        }
    }

    /// Last text written, kept after the channel goes idle.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn visible_text(&self, now: Instant) -> Option<&str> {
        match self.phase_at(now) {
            Phase::Idle => None,
            _ => self.text(),
        }
    }

    /// Number of times a message was written; lets a view spot repeats of the same text.
    pub fn shows(&self) -> u64 {
        self.shows
    }

    pub fn timing(&self) -> MessageTiming {
        self.timing
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessages {
    pub list_success: MessageChannel,
    pub list_error: MessageChannel,
    pub post_success: MessageChannel,
    pub post_error: MessageChannel,
}

impl StatusMessages {
    pub fn new(timing: MessageTiming) -> Self {
        Self {
            list_success: MessageChannel::new(timing),
            list_error: MessageChannel::new(timing),
            post_success: MessageChannel::new(timing),
            post_error: MessageChannel::new(timing),
        }
    }

    pub fn channel(&self, channel: Channel) -> &MessageChannel {
        match channel {
            Channel::ListSuccess => &self.list_success,
            Channel::ListError => &self.list_error,
            Channel::PostSuccess => &self.post_success,
            Channel::PostError => &self.post_error,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut MessageChannel {
        match channel {
            Channel::ListSuccess => &mut self.list_success,
            Channel::ListError => &mut self.list_error,
            Channel::PostSuccess => &mut self.post_success,
            Channel::PostError => &mut self.post_error,
        }
    }

    pub fn visible(&self, now: Instant) -> Vec<(Channel, &str)> {
        Channel::ALL
            .into_iter()
            .filter_map(|channel| {
                self.channel(channel)
                    .visible_text(now)
                    .map(|text| (channel, text))
            })
            .collect()
    }
}

/// Everything a view renders. Published through the controller's watch channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub posts: Vec<Post>,
    pub draft: String,
    pub messages: StatusMessages,
}

impl ViewState {
    pub fn new(timing: MessageTiming) -> Self {
        Self {
            posts: Vec::new(),
            draft: String::new(),
            messages: StatusMessages::new(timing),
        }
    }
}

#[cfg(test)]
#[path = "tests/presentation_tests.rs"]
mod tests;
