use std::time::Instant;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.on_tick(Instant::now()).await,
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    if app.show_saved_trips && handle_saved_trips(app, key) {
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Char('/') => app.input_mode = InputMode::Editing,

        // Esc and space finish the reply that is being typed out
        KeyCode::Esc | KeyCode::Char(' ') => app.skip_reveal(),

        KeyCode::Tab => {
            app.screen = match app.screen {
                Screen::Home => Screen::Chat,
                Screen::Chat => Screen::Home,
            };
        }

        KeyCode::Char('j') | KeyCode::Down => match app.screen {
            Screen::Home => app.home_nav_down(),
            Screen::Chat => app.scroll_chat(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.screen {
            Screen::Home => app.home_nav_up(),
            Screen::Chat => app.scroll_chat(-1),
        },
        KeyCode::PageDown | KeyCode::Char('d') if app.screen == Screen::Chat => {
            let half = i32::from(app.viewport.height / 2).max(1);
            app.scroll_chat(half);
        }
        KeyCode::PageUp | KeyCode::Char('u') if app.screen == Screen::Chat => {
            let half = i32::from(app.viewport.height / 2).max(1);
            app.scroll_chat(-half);
        }
        KeyCode::Char('g') if app.screen == Screen::Chat => {
            let top = i32::from(app.viewport.scroll);
            app.scroll_chat(-top);
        }
        KeyCode::Char('G') if app.screen == Screen::Chat => app.scroll_chat_to_bottom(),
        KeyCode::Enter if app.screen == Screen::Home => app.activate_home_entry(),

        // Trip
        KeyCode::Char('n') => app.reset(),
        KeyCode::Char('s') => app.save_current_trip(),
        KeyCode::Char('S') => app.toggle_saved_trips(),
        KeyCode::Char('H') => app.clear_history(),

        // Preferences
        KeyCode::Char('+') | KeyCode::Char('=') => app.preferences.adjust_travelers(1),
        KeyCode::Char('-') => app.preferences.adjust_travelers(-1),
        KeyCode::Char(']') => app.preferences.shift_travel_date(1),
        KeyCode::Char('[') => app.preferences.shift_travel_date(-1),
        KeyCode::Char('}') => app.preferences.shift_return_date(1),
        KeyCode::Char('{') => app.preferences.shift_return_date(-1),
        KeyCode::Char('o') => app.preferences.trip_type = app.preferences.trip_type.toggled(),
        KeyCode::Char('b') => app.preferences.budget = app.preferences.budget.next(),
        KeyCode::Char('c') => app.cycle_currency(),
        KeyCode::Char('T') => app.toggle_theme(),
        _ => {}
    }
}

/// Keys for the saved trips panel. Returns true when the key was used.
fn handle_saved_trips(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.saved_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.saved_nav_up(),
        KeyCode::Enter => app.reopen_saved_trip(),
        KeyCode::Char('x') | KeyCode::Delete => app.delete_saved_trip(),
        KeyCode::Esc | KeyCode::Char('S') => app.show_saved_trips = false,
        _ => return false,
    }
    true
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_input();
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Up => app.scroll_chat(-1),
        KeyCode::Down => app.scroll_chat(1),
        KeyCode::PageUp => {
            let half = i32::from(app.viewport.height / 2).max(1);
            app.scroll_chat(-half);
        }
        KeyCode::PageDown => {
            let half = i32::from(app.viewport.height / 2).max(1);
            app.scroll_chat(half);
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat || app.screen != Screen::Chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_chat(3),
        MouseEventKind::ScrollUp => app.scroll_chat(-3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use tempfile::TempDir;
    use tripchat_core::ClientState;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn test_app(dir: &TempDir) -> App {
        let config = Config {
            server_url: "http://127.0.0.1:9".into(),
            ..Config::new()
        };
        App::new(&config, ClientState::default(), Some(dir.path().join("state.json")))
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("Zürich", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_editing_handles_multibyte_input() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        for c in "Zürich".chars() {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        handle_key(&mut app, key(KeyCode::Left));
        handle_key(&mut app, key(KeyCode::Left));
        handle_key(&mut app, key(KeyCode::Backspace));
        assert_eq!(app.input, "Zürch");
        assert_eq!(app.cursor, 3);
    }

    #[test]
    fn test_preference_keys() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        handle_key(&mut app, key(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_key(&mut app, key(KeyCode::Char('+')));
        handle_key(&mut app, key(KeyCode::Char('+')));
        handle_key(&mut app, key(KeyCode::Char('b')));
        assert_eq!(app.preferences.travelers, 3);
        assert_eq!(app.preferences.budget, tripchat_core::Budget::Budget);

        handle_key(&mut app, key(KeyCode::Char('T')));
        assert_eq!(app.client_state.theme, tripchat_core::Theme::Light);
    }

    #[test]
    fn test_home_navigation_is_bounded() {
        let dir = TempDir::new().unwrap();
        let mut app = test_app(&dir);
        app.input_mode = InputMode::Normal;
        for _ in 0..20 {
            handle_key(&mut app, key(KeyCode::Char('j')));
        }
        assert_eq!(app.home_state.selected(), Some(app.home_entries().len() - 1));
        for _ in 0..20 {
            handle_key(&mut app, key(KeyCode::Char('k')));
        }
        assert_eq!(app.home_state.selected(), Some(0));
    }
}
