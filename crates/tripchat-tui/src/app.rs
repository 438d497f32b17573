use std::path::PathBuf;
use std::time::{Duration, Instant};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tripchat_core::{
    ChatBackend, ChatRole, ClientState, Conversation, Destination, Fragment, PlannerClient,
    RevealScheduler, RevealState, RevealTarget, ScrollMetrics, TripPreferences, TurnOutcome,
    DESTINATIONS,
};
use crate::config::Config;

pub const TOAST_DURATION: Duration = Duration::from_secs(3);
pub const LOADING_MESSAGE_INTERVAL: Duration = Duration::from_secs(2);

pub const LOADING_MESSAGES: [&str; 6] = [
    "Finding the best options...",
    "Comparing prices across airlines...",
    "Discovering hidden gems...",
    "Checking availability...",
    "Crafting your itinerary...",
    "Analyzing weather patterns...",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Steps of the progress bar shown while a turn runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TurnProgress {
    Sending,
    Waiting,
    Parsing,
    Rendering,
}

impl TurnProgress {
    pub const STEPS: u8 = 4;

    pub fn step(&self) -> u8 {
        match self {
            TurnProgress::Sending => 1,
            TurnProgress::Waiting => 2,
            TurnProgress::Parsing => 3,
            TurnProgress::Rendering => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TurnProgress::Sending => "Sending",
            TurnProgress::Waiting => "Waiting",
            TurnProgress::Parsing => "Parsing",
            TurnProgress::Rendering => "Rendering",
        }
    }
}

/// "Thinking" line shown until the reply arrives.
#[derive(Debug, Clone)]
pub struct LoadingIndicator {
    started: Instant,
    frame: u8,
}

impl LoadingIndicator {
    pub fn new(now: Instant) -> Self {
        Self { started: now, frame: 0 }
    }

    pub fn tick(&mut self) {
        self.frame = (self.frame + 1) % 3;
    }

    /// Rotates every two seconds.
    pub fn message(&self, now: Instant) -> &'static str {
        let elapsed = now.saturating_duration_since(self.started);
        let idx = (elapsed.as_millis() / LOADING_MESSAGE_INTERVAL.as_millis()) as usize;
        LOADING_MESSAGES[idx % LOADING_MESSAGES.len()]
    }

    pub fn dots(&self) -> String {
        ".".repeat(usize::from(self.frame) + 1)
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub expires_at: Instant,
}

/// Scroll state of the chat pane. Also receives the message being revealed.
#[derive(Debug, Default)]
pub struct ChatViewport {
    pub scroll: u16,
    pub height: u16,
    pub content_rows: u16,
    live: Option<Fragment>,
    pin_bottom: bool,
}

impl ChatViewport {
    /// Partial view of the message currently being revealed.
    pub fn live(&self) -> Option<&Fragment> {
        self.live.as_ref()
    }

    pub fn clear_live(&mut self) {
        self.live = None;
    }

    pub fn max_scroll(&self) -> u16 {
        self.content_rows.saturating_sub(self.height)
    }

    pub fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: u32::from(self.scroll),
            scroll_height: u32::from(self.content_rows),
            client_height: u32::from(self.height),
        }
    }

    /// User-driven scroll. Returns the resulting position.
    pub fn scroll_by(&mut self, delta: i32) -> ScrollMetrics {
        self.pin_bottom = false;
        let target = (i32::from(self.scroll) + delta).clamp(0, i32::from(self.max_scroll()));
        self.scroll = target as u16;
        self.metrics()
    }

    pub fn request_bottom(&mut self) {
        self.pin_bottom = true;
    }

    /// Called on every draw with the measured content size.
    pub fn set_layout(&mut self, height: u16, content_rows: u16) {
        self.height = height;
        self.content_rows = content_rows;
        if self.pin_bottom {
            self.scroll = self.max_scroll();
            self.pin_bottom = false;
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }
}

impl RevealTarget for ChatViewport {
    fn write(&mut self, view: &Fragment) {
        self.live = Some(view.clone());
    }

    fn scroll_to_bottom(&mut self) {
        self.pin_bottom = true;
    }
}

/// Entries of the home screen list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeEntry {
    Destination(Destination),
    Recent(String),
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Conversation
    pub conversation: Conversation,
    pub preferences: TripPreferences,
    pub client: PlannerClient,
    pub turn_task: Option<JoinHandle<TurnOutcome>>,
    pub loading: Option<LoadingIndicator>,
    pub progress: Option<TurnProgress>,

    // Reveal of the latest reply
    pub reveal: RevealScheduler,
    pub viewport: ChatViewport,
    pub revealing_index: Option<usize>,

    // Persisted client state
    pub client_state: ClientState,
    state_path: Option<PathBuf>,

    // Home screen and saved trips panel
    pub home_state: ListState,
    pub show_saved_trips: bool,
    pub saved_state: ListState,

    pub toasts: Vec<Toast>,

    // Chat area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(config: &Config, client_state: ClientState, state_path: Option<PathBuf>) -> Self {
        let mut home_state = ListState::default();
        home_state.select(Some(0));

        Self {
            should_quit: false,
            screen: Screen::Home,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            conversation: Conversation::new(config.request_timeout()),
            preferences: TripPreferences::new(client_state.currency),
            client: PlannerClient::new(&config.server_url),
            turn_task: None,
            loading: None,
            progress: None,

            reveal: RevealScheduler::new(config.reveal_config()),
            viewport: ChatViewport::default(),
            revealing_index: None,

            client_state,
            state_path,

            home_state,
            show_saved_trips: false,
            saved_state: ListState::default(),

            toasts: Vec::new(),

            chat_area: None,
        }
    }

    /// Send the input box contents. The text stays in the box when the
    /// submission is refused.
    pub fn submit_input(&mut self) {
        let text = self.input.clone();
        if self.submit(&text) {
            self.input.clear();
            self.cursor = 0;
        }
    }

    /// Start a turn. Returns false for blank input or while a turn runs.
    pub fn submit(&mut self, text: &str) -> bool {
        let Some(turn) = self.conversation.submit(text, &self.preferences) else {
            if self.conversation.turn_in_progress() && !text.trim().is_empty() {
                self.toast("Please wait for the current reply");
            }
            return false;
        };

        self.client_state.record_query(text);
        self.persist();

        self.screen = Screen::Chat;
        self.viewport.request_bottom();
        self.loading = Some(LoadingIndicator::new(Instant::now()));
        self.progress = Some(TurnProgress::Sending);

        let client = self.client.clone();
        self.turn_task = Some(tokio::spawn(async move { turn.dispatch(&client).await }));
        true
    }

    /// Periodic work: loading animation, toast expiry, request polling and
    /// the reveal.
    pub async fn on_tick(&mut self, now: Instant) {
        if let Some(loading) = &mut self.loading {
            loading.tick();
        }
        self.toasts.retain(|t| t.expires_at > now);
        self.poll_turn().await;
        self.advance_reveal(now);
    }

    async fn poll_turn(&mut self) {
        let Some(task) = self.turn_task.take() else { return };
        if !task.is_finished() {
            self.progress = Some(TurnProgress::Waiting);
            self.turn_task = Some(task);
            return;
        }

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("chat task failed: {}", e);
                TurnOutcome::Failed
            }
        };
        self.resolve_turn(outcome);
    }

    /// Append the reply for `outcome` and start revealing it.
    pub fn resolve_turn(&mut self, outcome: TurnOutcome) {
        self.loading = None;
        self.progress = Some(TurnProgress::Parsing);

        let Some(message) = self.conversation.resolve(outcome) else {
            self.progress = None;
            return;
        };
        let fragment = message.fragment().clone();
        self.revealing_index = Some(self.conversation.transcript().len() - 1);
        self.progress = Some(TurnProgress::Rendering);

        if let Err(e) = self.reveal.start(fragment) {
            tracing::warn!("could not start reveal: {}", e);
            self.finish_turn();
        }
    }

    fn advance_reveal(&mut self, now: Instant) {
        if !self.reveal.is_revealing() {
            return;
        }
        let state = self.reveal.advance_to(now, &mut self.viewport);
        if state != RevealState::Revealing {
            self.finish_turn();
        }
    }

    /// Show the rest of the reply at once.
    pub fn skip_reveal(&mut self) {
        if self.reveal.is_revealing() {
            self.reveal.skip(&mut self.viewport);
            self.finish_turn();
        }
    }

    fn finish_turn(&mut self) {
        self.viewport.clear_live();
        self.revealing_index = None;
        self.progress = None;
        self.conversation.complete_turn();
    }

    pub fn is_busy(&self) -> bool {
        self.conversation.turn_in_progress()
    }

    pub fn scroll_chat(&mut self, delta: i32) {
        let metrics = self.viewport.scroll_by(delta);
        self.reveal.observe_scroll(metrics);
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        let bottom = i32::from(self.viewport.max_scroll());
        self.scroll_chat(bottom);
    }

    /// Start over: forget the server session and clear the chat.
    pub fn reset(&mut self) {
        if let Some(task) = self.turn_task.take() {
            task.abort();
        }
        self.reveal.cancel();
        self.reveal.tick(&mut self.viewport);
        self.finish_turn();
        self.loading = None;

        self.conversation.reset();
        self.viewport = ChatViewport::default();
        self.screen = Screen::Home;

        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.reset().await {
                tracing::warn!("reset request failed: {}", e);
            }
        });

        self.toast("New trip started!");
    }

    pub fn cycle_currency(&mut self) {
        let currency = self.preferences.currency.next();
        self.preferences.currency = currency;
        self.client_state.currency = currency;
        self.persist();

        if self.conversation.transcript().is_empty() {
            self.toast(format!("Currency changed to {} {}", currency.symbol(), currency.code()));
        } else {
            self.conversation.notice(format!(
                "Currency changed to {} {}. Future prices will be in {}.",
                currency.symbol(),
                currency.code(),
                currency.code()
            ));
            self.viewport.request_bottom();
        }
    }

    pub fn toggle_theme(&mut self) {
        self.client_state.theme = self.client_state.theme.toggled();
        self.persist();
    }

    pub fn clear_history(&mut self) {
        self.client_state.clear_history();
        self.persist();
        self.home_state.select(Some(0));
        self.toast("History cleared");
    }

    /// Bookmark the current chat: its first question and the start of the
    /// latest answer.
    pub fn save_current_trip(&mut self) {
        let messages = self.conversation.transcript().messages();
        let title = messages
            .iter()
            .find(|m| m.role() == ChatRole::User)
            .map(|m| m.raw_text().to_string());
        let summary = messages
            .iter()
            .rev()
            .find(|m| m.role() == ChatRole::Assistant)
            .and_then(|m| {
                m.raw_text()
                    .lines()
                    .map(|line| line.trim_start_matches('#').trim())
                    .find(|line| !line.is_empty())
                    .map(String::from)
            });

        match (title, summary) {
            (Some(title), Some(summary)) => {
                self.client_state.save_trip(title, summary);
                self.persist();
                self.toast("Trip saved");
            }
            _ => self.toast("Nothing to save yet"),
        }
    }

    pub fn home_entries(&self) -> Vec<HomeEntry> {
        DESTINATIONS
            .iter()
            .copied()
            .map(HomeEntry::Destination)
            .chain(
                self.client_state
                    .recent_queries()
                    .iter()
                    .take(tripchat_core::store::RECENT_QUERIES_SHOWN)
                    .cloned()
                    .map(HomeEntry::Recent),
            )
            .collect()
    }

    pub fn home_nav_down(&mut self) {
        let len = self.home_entries().len();
        if len > 0 {
            let i = self.home_state.selected().unwrap_or(0);
            self.home_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn home_nav_up(&mut self) {
        let i = self.home_state.selected().unwrap_or(0);
        self.home_state.select(Some(i.saturating_sub(1)));
    }

    pub fn activate_home_entry(&mut self) {
        let entries = self.home_entries();
        let Some(entry) = self.home_state.selected().and_then(|i| entries.get(i)) else {
            return;
        };
        let prompt = match entry {
            HomeEntry::Destination(dest) => dest.prompt(),
            HomeEntry::Recent(query) => query.clone(),
        };
        self.submit(&prompt);
    }

    pub fn toggle_saved_trips(&mut self) {
        self.show_saved_trips = !self.show_saved_trips;
        if self.show_saved_trips && !self.client_state.saved_trips().is_empty() {
            self.saved_state.select(Some(0));
        }
    }

    pub fn saved_nav_down(&mut self) {
        let len = self.client_state.saved_trips().len();
        if len > 0 {
            let i = self.saved_state.selected().unwrap_or(0);
            self.saved_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn saved_nav_up(&mut self) {
        let i = self.saved_state.selected().unwrap_or(0);
        self.saved_state.select(Some(i.saturating_sub(1)));
    }

    /// Ask the saved trip's question again.
    pub fn reopen_saved_trip(&mut self) {
        let Some(trip) = self
            .saved_state
            .selected()
            .and_then(|i| self.client_state.saved_trips().get(i))
        else {
            return;
        };
        let title = trip.title.clone();
        self.submit(&title);
    }

    pub fn delete_saved_trip(&mut self) {
        let Some(i) = self.saved_state.selected() else { return };
        if self.client_state.remove_trip(i).is_some() {
            self.persist();
            let len = self.client_state.saved_trips().len();
            self.saved_state
                .select(if len == 0 { None } else { Some(i.min(len - 1)) });
        }
    }

    pub fn toast(&mut self, message: impl Into<String>) {
        self.toasts.push(Toast {
            message: message.into(),
            expires_at: Instant::now() + TOAST_DURATION,
        });
    }

    fn persist(&self) {
        let Some(path) = &self.state_path else { return };
        if let Err(e) = self.client_state.save_to(path) {
            tracing::warn!(path = %path.display(), "failed to save client state: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tripchat_core::{Currency, TurnPhase};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_with(server_url: &str, dir: &TempDir) -> App {
        let config = Config {
            server_url: server_url.to_string(),
            ..Config::new()
        };
        App::new(&config, ClientState::default(), Some(dir.path().join("state.json")))
    }

    fn test_app(dir: &TempDir) -> App {
        app_with("http://127.0.0.1:9", dir)
    }

    /// Drive ticks far enough apart that the reveal finishes.
    async fn run_reveal(app: &mut App) {
        let start = Instant::now();
        for i in 1..=2000u32 {
            app.on_tick(start + Duration::from_millis(u64::from(i) * 10)).await;
            if !app.reveal.is_revealing() {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_reply_is_revealed_then_turn_released() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.conversation.submit("Plan a trip to Bali", &app.preferences);

        app.resolve_turn(TurnOutcome::Reply {
            text: "## Bali\nDay 1: **Ubud**".into(),
            session_id: Some("s-1".into()),
        });
        assert_eq!(app.revealing_index, Some(1));
        assert_eq!(app.conversation.phase(), TurnPhase::Revealing);

        run_reveal(&mut app).await;

        assert_eq!(app.reveal.state(), RevealState::Complete);
        assert!(app.viewport.live().is_none());
        assert!(app.revealing_index.is_none());
        assert!(!app.is_busy());
        assert_eq!(app.conversation.session_id(), Some("s-1"));
    }

    #[tokio::test]
    async fn test_partial_view_is_written_to_viewport() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.conversation.submit("x", &app.preferences);
        app.resolve_turn(TurnOutcome::Reply {
            text: "**Day one** on the beach".into(),
            session_id: None,
        });

        app.on_tick(Instant::now()).await;
        let live = app.viewport.live().expect("partial view");
        assert_eq!(live.char_len(), 3);
        assert!(live.to_markup().starts_with("<strong>"));
        assert!(live.to_markup().ends_with("</strong>"));
    }

    #[tokio::test]
    async fn test_scrolling_up_suspends_auto_scroll() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.conversation.submit("x", &app.preferences);
        app.resolve_turn(TurnOutcome::Reply {
            text: "a long reply ".repeat(50),
            session_id: None,
        });
        app.viewport.set_layout(10, 100);
        app.scroll_chat_to_bottom();
        assert_eq!(app.viewport.scroll, 90);

        app.scroll_chat(-20);
        assert!(app.reveal.user_scrolled_up());

        app.on_tick(Instant::now()).await;
        app.viewport.set_layout(10, 110);
        assert_eq!(app.viewport.scroll, 70);

        app.scroll_chat(1000);
        assert!(!app.reveal.user_scrolled_up());
    }

    #[tokio::test]
    async fn test_skip_completes_turn() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.conversation.submit("x", &app.preferences);
        app.resolve_turn(TurnOutcome::Failed);
        app.skip_reveal();
        assert!(!app.is_busy());
        assert_eq!(
            app.conversation.transcript().last().unwrap().raw_text(),
            tripchat_core::session::FAILURE_NOTICE
        );
    }

    #[tokio::test]
    async fn test_reset_clears_chat_and_notifies() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.conversation.submit("x", &app.preferences);
        app.resolve_turn(TurnOutcome::Reply {
            text: "reply".into(),
            session_id: Some("s".into()),
        });

        app.reset();
        assert!(app.conversation.transcript().is_empty());
        assert_eq!(app.conversation.session_id(), None);
        assert!(!app.is_busy());
        assert_eq!(app.screen, Screen::Home);
        assert_eq!(app.toasts.last().unwrap().message, "New trip started!");
    }

    #[tokio::test]
    async fn test_currency_change_notice_depends_on_chat() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);

        app.cycle_currency();
        assert_eq!(app.preferences.currency, Currency::Usd);
        assert_eq!(app.toasts.last().unwrap().message, "Currency changed to $ USD");

        app.conversation.submit("x", &app.preferences);
        app.cycle_currency();
        let notice = app.conversation.transcript().last().unwrap();
        assert_eq!(notice.role(), ChatRole::System);
        assert_eq!(
            notice.raw_text(),
            "Currency changed to € EUR. Future prices will be in EUR."
        );

        let saved = ClientState::load_from(&dir.path().join("state.json"));
        assert_eq!(saved.currency, Currency::Eur);
    }

    #[tokio::test]
    async fn test_save_trip_requires_an_answer() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.save_current_trip();
        assert_eq!(app.toasts.last().unwrap().message, "Nothing to save yet");

        app.conversation.submit("Plan a trip to Tokyo", &app.preferences);
        app.resolve_turn(TurnOutcome::Reply {
            text: "## Tokyo\nFive days".into(),
            session_id: None,
        });
        app.skip_reveal();
        app.save_current_trip();

        let trip = &app.client_state.saved_trips()[0];
        assert_eq!(trip.title, "Plan a trip to Tokyo");
        assert_eq!(trip.summary, "Tokyo");
    }

    #[tokio::test]
    async fn test_full_turn_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "Try **Ubud**",
                "session_id": "abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut app = app_with(&server.uri(), &dir);
        app.home_state.select(Some(0));
        app.activate_home_entry();
        assert_eq!(app.screen, Screen::Chat);
        assert!(app.loading.is_some());
        assert!(!app.submit("another question"));

        for _ in 0..500 {
            app.on_tick(Instant::now()).await;
            if app.turn_task.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        run_reveal(&mut app).await;

        let messages = app.conversation.transcript().messages();
        assert_eq!(messages[0].raw_text(), "Plan a trip to Bali");
        assert_eq!(messages[1].rendered_markup(), "Try <strong>Ubud</strong>");
        assert_eq!(app.client_state.recent_queries()[0], "Plan a trip to Bali");
        assert!(!app.is_busy());
    }

    #[test]
    fn test_loading_messages_rotate_every_two_seconds() {
        let start = Instant::now();
        let loading = LoadingIndicator::new(start);
        assert_eq!(loading.message(start), LOADING_MESSAGES[0]);
        assert_eq!(loading.message(start + Duration::from_millis(2100)), LOADING_MESSAGES[1]);
        assert_eq!(loading.message(start + Duration::from_secs(12)), LOADING_MESSAGES[0]);
    }
}
