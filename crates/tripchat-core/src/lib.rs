pub mod api;
pub mod format;
pub mod markup;
pub mod preferences;
pub mod reveal;
pub mod sanitize;
pub mod session;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use api::{ApiError, ChatBackend, ChatRequest, ChatResponse, PlannerClient};
pub use format::{format, render_reply};
pub use markup::{Element, Fragment, Node, Tag};
pub use preferences::{Budget, Currency, Destination, TripPreferences, TripType, DESTINATIONS};
pub use reveal::{
    RevealConfig, RevealError, RevealScheduler, RevealState, RevealTarget, ScrollIntentTracker,
    ScrollMetrics,
};
pub use sanitize::sanitize;
pub use session::{Conversation, OutboundTurn, Session, TurnOutcome, TurnPhase};
pub use state::{ChatMessage, ChatRole, Transcript};
pub use store::{ClientState, SavedTrip, StoreError, Theme};
