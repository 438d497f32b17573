//! Progressive reveal of formatted messages.
//!
//! A [`RevealScheduler`] walks a [`Fragment`] from `Idle` through `Revealing`
//! to `Complete`, exposing `chars_per_tick` more characters on every tick.
//! Each intermediate view is a truncated copy of the tree, so element
//! structure is never broken. The caller drives ticks (directly, or through
//! [`RevealScheduler::advance_to`] with its own clock) and forwards
//! user-driven scroll events so auto-scroll stops while the user reads
//! further up.

use std::fmt;
use std::time::{Duration, Instant};

use crate::markup::Fragment;

/// Distance from the bottom, in the container's units, still treated as
/// "at the bottom".
pub const DEFAULT_SCROLL_THRESHOLD: u32 = 100;
pub const DEFAULT_CHARS_PER_TICK: usize = 3;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RevealError {
    #[error("a message is already being revealed")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Idle,
    Revealing,
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealConfig {
    pub chars_per_tick: usize,
    pub tick_interval: Duration,
    pub scroll_threshold: u32,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            chars_per_tick: DEFAULT_CHARS_PER_TICK,
            tick_interval: DEFAULT_TICK_INTERVAL,
            scroll_threshold: DEFAULT_SCROLL_THRESHOLD,
        }
    }
}

/// Scroll position of the container a message is revealed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: u32,
    pub scroll_height: u32,
    pub client_height: u32,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> u32 {
        self.scroll_height
            .saturating_sub(self.scroll_top)
            .saturating_sub(self.client_height)
    }
}

/// Infers whether the user wants to stay where they scrolled to.
#[derive(Debug, Clone)]
pub struct ScrollIntentTracker {
    threshold: u32,
    user_scrolled_up: bool,
}

impl ScrollIntentTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            user_scrolled_up: false,
        }
    }

    /// Re-evaluate intent from a user-driven scroll event.
    pub fn observe(&mut self, metrics: ScrollMetrics) {
        self.user_scrolled_up = metrics.distance_from_bottom() > self.threshold;
    }

    pub fn user_scrolled_up(&self) -> bool {
        self.user_scrolled_up
    }
}

/// Container a message is revealed into.
pub trait RevealTarget {
    fn write(&mut self, view: &Fragment);
    fn scroll_to_bottom(&mut self);
}

pub struct RevealScheduler {
    config: RevealConfig,
    state: RevealState,
    fragment: Fragment,
    total: usize,
    visible: usize,
    tracker: ScrollIntentTracker,
    cancel_requested: bool,
    last_tick: Option<Instant>,
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl RevealScheduler {
    pub fn new(config: RevealConfig) -> Self {
        let chars_per_tick = config.chars_per_tick.max(1);
        Self {
            config: RevealConfig { chars_per_tick, ..config },
            state: RevealState::Idle,
            fragment: Fragment::default(),
            total: 0,
            visible: 0,
            tracker: ScrollIntentTracker::new(config.scroll_threshold),
            cancel_requested: false,
            last_tick: None,
            on_complete: None,
        }
    }

    pub fn config(&self) -> &RevealConfig {
        &self.config
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn is_revealing(&self) -> bool {
        self.state == RevealState::Revealing
    }

    pub fn visible_chars(&self) -> usize {
        self.visible
    }

    pub fn total_chars(&self) -> usize {
        self.total
    }

    pub fn user_scrolled_up(&self) -> bool {
        self.tracker.user_scrolled_up()
    }

    /// Begin revealing `fragment`. Scroll intent starts fresh for every reveal.
    pub fn start(&mut self, fragment: Fragment) -> Result<(), RevealError> {
        if self.is_revealing() {
            return Err(RevealError::Busy);
        }
        self.total = fragment.char_len();
        self.fragment = fragment;
        self.visible = 0;
        self.tracker = ScrollIntentTracker::new(self.config.scroll_threshold);
        self.cancel_requested = false;
        self.last_tick = None;
        self.state = RevealState::Revealing;
        tracing::debug!(chars = self.total, "reveal started");
        Ok(())
    }

    /// Callback fired once when the current reveal completes.
    pub fn on_complete(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn observe_scroll(&mut self, metrics: ScrollMetrics) {
        self.tracker.observe(metrics);
    }

    /// Stop at the next tick without writing anything further.
    pub fn cancel(&mut self) {
        if self.is_revealing() {
            self.cancel_requested = true;
        }
    }

    /// Show the whole message now.
    pub fn skip(&mut self, target: &mut dyn RevealTarget) -> RevealState {
        let remaining = self.total.saturating_sub(self.visible);
        self.step(remaining.max(1), target)
    }

    /// Advance by exactly one tick.
    pub fn tick(&mut self, target: &mut dyn RevealTarget) -> RevealState {
        self.step(self.config.chars_per_tick, target)
    }

    /// Run every tick that is due at `now`. The first call ticks immediately.
    pub fn advance_to(&mut self, now: Instant, target: &mut dyn RevealTarget) -> RevealState {
        if !self.is_revealing() {
            return self.state;
        }
        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return self.tick(target);
        };

        let interval = self.config.tick_interval.as_nanos().max(1);
        let due = now.saturating_duration_since(last).as_nanos() / interval;
        if due == 0 {
            return self.state;
        }
        self.last_tick = Some(now);
        let due = usize::try_from(due).unwrap_or(usize::MAX);
        self.step(due.saturating_mul(self.config.chars_per_tick), target)
    }

    fn step(&mut self, chars: usize, target: &mut dyn RevealTarget) -> RevealState {
        if !self.is_revealing() {
            return self.state;
        }
        if self.cancel_requested {
            self.state = RevealState::Cancelled;
            self.on_complete = None;
            tracing::debug!(visible = self.visible, total = self.total, "reveal cancelled");
            return self.state;
        }

        // Read scroll intent before touching the container.
        let follow = !self.tracker.user_scrolled_up();

        self.visible = self.visible.saturating_add(chars).min(self.total);
        if self.visible >= self.total {
            target.write(&self.fragment);
            self.state = RevealState::Complete;
        } else {
            target.write(&self.fragment.truncated(self.visible));
        }

        if follow {
            target.scroll_to_bottom();
        }

        if self.state == RevealState::Complete {
            tracing::debug!(chars = self.total, "reveal complete");
            if let Some(callback) = self.on_complete.take() {
                callback();
            }
        }
        self.state
    }
}

impl fmt::Debug for RevealScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevealScheduler")
            .field("state", &self.state)
            .field("visible", &self.visible)
            .field("total", &self.total)
            .field("user_scrolled_up", &self.tracker.user_scrolled_up())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::render_reply;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingTarget {
        writes: Vec<Fragment>,
        scrolls: usize,
    }

    impl RevealTarget for RecordingTarget {
        fn write(&mut self, view: &Fragment) {
            self.writes.push(view.clone());
        }

        fn scroll_to_bottom(&mut self) {
            self.scrolls += 1;
        }
    }

    fn reply() -> Fragment {
        render_reply(
            "## Bali in 5 days\nStay in **Ubud** and visit [the temple](https://example.com/temple).\n\
             | Day | Plan |\n|---|---|\n| 1 | *Beach* |\n| 2 | `Rice terraces` |\nBook early: 1. flights 2. hotels",
        )
    }

    /// Checks that every opened tag is closed in order.
    fn assert_balanced(markup: &str) {
        let mut stack: Vec<String> = Vec::new();
        let mut rest = markup;
        while let Some(open) = rest.find('<') {
            let close = rest[open..].find('>').expect("unterminated tag") + open;
            let tag = &rest[open + 1..close];
            let name = tag.trim_start_matches('/').split_whitespace().next().unwrap_or("");
            if tag.starts_with('/') {
                assert_eq!(stack.pop().as_deref(), Some(name), "mismatched close in {markup}");
            } else if name != "br" {
                stack.push(name.to_string());
            }
            rest = &rest[close + 1..];
        }
        assert!(stack.is_empty(), "unclosed {stack:?} in {markup}");
    }

    #[test]
    fn test_visible_count_is_monotonic_and_completes_in_bounded_ticks() {
        let fragment = reply();
        let total = fragment.char_len();
        let mut scheduler = RevealScheduler::new(RevealConfig::default());
        let mut target = RecordingTarget::default();
        scheduler.start(fragment.clone()).unwrap();

        let mut previous = 0;
        let mut ticks = 0;
        while scheduler.tick(&mut target) == RevealState::Revealing {
            ticks += 1;
            assert!(scheduler.visible_chars() >= previous);
            previous = scheduler.visible_chars();
        }
        ticks += 1;

        assert_eq!(scheduler.state(), RevealState::Complete);
        assert_eq!(scheduler.visible_chars(), total);
        assert_eq!(ticks, total.div_ceil(DEFAULT_CHARS_PER_TICK));
        assert_eq!(target.writes.last(), Some(&fragment));
    }

    #[test]
    fn test_every_intermediate_view_is_well_formed_prefix() {
        let fragment = reply();
        let full_text = fragment.plain_text();
        let mut scheduler = RevealScheduler::new(RevealConfig {
            chars_per_tick: 1,
            ..RevealConfig::default()
        });
        let mut target = RecordingTarget::default();
        scheduler.start(fragment.clone()).unwrap();
        while scheduler.tick(&mut target) == RevealState::Revealing {}

        for (i, view) in target.writes.iter().enumerate() {
            assert_balanced(&view.to_markup());
            assert_eq!(view.char_len(), i + 1);
            assert!(full_text.starts_with(&view.plain_text()));
        }
        assert_eq!(target.writes.last().unwrap().to_markup(), fragment.to_markup());
    }

    #[test]
    fn test_scroll_up_suspends_auto_scroll() {
        let mut scheduler = RevealScheduler::new(RevealConfig {
            chars_per_tick: 1,
            ..RevealConfig::default()
        });
        let mut target = RecordingTarget::default();
        scheduler.start(Fragment::plain("a long enough answer")).unwrap();

        scheduler.tick(&mut target);
        scheduler.tick(&mut target);
        assert_eq!(target.scrolls, 2);

        scheduler.observe_scroll(ScrollMetrics {
            scroll_top: 100,
            scroll_height: 1000,
            client_height: 400,
        });
        assert!(scheduler.user_scrolled_up());
        for _ in 0..5 {
            scheduler.tick(&mut target);
        }
        assert_eq!(target.scrolls, 2);
        assert_eq!(target.writes.len(), 7);

        // Back within the threshold: auto-scroll resumes.
        scheduler.observe_scroll(ScrollMetrics {
            scroll_top: 520,
            scroll_height: 1000,
            client_height: 400,
        });
        scheduler.tick(&mut target);
        assert_eq!(target.scrolls, 3);
    }

    #[test]
    fn test_threshold_boundary_counts_as_bottom() {
        let mut tracker = ScrollIntentTracker::new(DEFAULT_SCROLL_THRESHOLD);
        tracker.observe(ScrollMetrics { scroll_top: 500, scroll_height: 1000, client_height: 400 });
        assert!(!tracker.user_scrolled_up());
        tracker.observe(ScrollMetrics { scroll_top: 499, scroll_height: 1000, client_height: 400 });
        assert!(tracker.user_scrolled_up());
    }

    #[test]
    fn test_start_while_revealing_is_rejected() {
        let mut scheduler = RevealScheduler::new(RevealConfig::default());
        scheduler.start(Fragment::plain("first message")).unwrap();
        assert_eq!(scheduler.start(Fragment::plain("second")), Err(RevealError::Busy));
    }

    #[test]
    fn test_restart_after_completion_resets_scroll_intent() {
        let mut scheduler = RevealScheduler::new(RevealConfig::default());
        let mut target = RecordingTarget::default();
        scheduler.start(Fragment::plain("hi")).unwrap();
        scheduler.observe_scroll(ScrollMetrics { scroll_top: 0, scroll_height: 900, client_height: 100 });
        assert_eq!(scheduler.tick(&mut target), RevealState::Complete);

        scheduler.start(Fragment::plain("again")).unwrap();
        assert!(!scheduler.user_scrolled_up());
    }

    #[test]
    fn test_cancel_stops_without_writing() {
        let mut scheduler = RevealScheduler::new(RevealConfig::default());
        let mut target = RecordingTarget::default();
        scheduler.start(Fragment::plain("a cancelled reveal")).unwrap();
        scheduler.tick(&mut target);
        scheduler.cancel();
        assert_eq!(scheduler.tick(&mut target), RevealState::Cancelled);
        assert_eq!(target.writes.len(), 1);
        assert_eq!(scheduler.tick(&mut target), RevealState::Cancelled);
    }

    #[test]
    fn test_skip_writes_full_message_and_fires_callback_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let fragment = reply();
        let mut scheduler = RevealScheduler::new(RevealConfig::default());
        let mut target = RecordingTarget::default();
        scheduler.start(fragment.clone()).unwrap();
        scheduler.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.tick(&mut target);
        assert_eq!(scheduler.skip(&mut target), RevealState::Complete);
        assert_eq!(target.writes.last(), Some(&fragment));
        scheduler.tick(&mut target);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_message_completes_on_first_tick() {
        let mut scheduler = RevealScheduler::new(RevealConfig::default());
        let mut target = RecordingTarget::default();
        scheduler.start(Fragment::default()).unwrap();
        assert_eq!(scheduler.tick(&mut target), RevealState::Complete);
        assert_eq!(target.writes, vec![Fragment::default()]);
    }

    #[test]
    fn test_advance_to_uses_injected_clock() {
        let mut scheduler = RevealScheduler::new(RevealConfig {
            chars_per_tick: 3,
            tick_interval: Duration::from_millis(10),
            ..RevealConfig::default()
        });
        let mut target = RecordingTarget::default();
        scheduler.start(Fragment::plain("x".repeat(30))).unwrap();

        let t0 = Instant::now();
        scheduler.advance_to(t0, &mut target);
        assert_eq!(scheduler.visible_chars(), 3);

        scheduler.advance_to(t0 + Duration::from_millis(5), &mut target);
        assert_eq!(scheduler.visible_chars(), 3);

        scheduler.advance_to(t0 + Duration::from_millis(25), &mut target);
        assert_eq!(scheduler.visible_chars(), 9);

        assert_eq!(
            scheduler.advance_to(t0 + Duration::from_secs(10), &mut target),
            RevealState::Complete
        );
        assert_eq!(scheduler.visible_chars(), 30);
    }
}
