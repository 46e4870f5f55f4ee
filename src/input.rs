//! Key bindings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Digit(u8),
    Erase,
    Submit,
    Pause,
    Restart,
    /// Re-read the override file mid-game.
    Reload,
    /// Next difficulty preset; game over screen only.
    CycleDifficulty,
    Quit,
    None,
}

/// Map key event to game action. Digits type the answer; Enter or Space submits.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    match code {
        KeyCode::Char('c') if modifiers == KeyModifiers::CONTROL => Action::Quit,
        _ if !no_mod => Action::None,
        KeyCode::Char(c @ '0'..='9') => Action::Digit(c as u8 - b'0'),
        KeyCode::Backspace | KeyCode::Delete => Action::Erase,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Submit,
        KeyCode::Char('p') | KeyCode::Tab => Action::Pause,
        KeyCode::Char('r') => Action::Restart,
        KeyCode::Char('c') => Action::Reload,
        KeyCode::Char('d') => Action::CycleDifficulty,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn digits_and_controls() {
        assert_eq!(key_to_action(key(KeyCode::Char('7'))), Action::Digit(7));
        assert_eq!(key_to_action(key(KeyCode::Char('0'))), Action::Digit(0));
        assert_eq!(key_to_action(key(KeyCode::Enter)), Action::Submit);
        assert_eq!(key_to_action(key(KeyCode::Backspace)), Action::Erase);
        assert_eq!(key_to_action(key(KeyCode::Esc)), Action::Quit);
        assert_eq!(key_to_action(key(KeyCode::Char('d'))), Action::CycleDifficulty);
        assert_eq!(key_to_action(key(KeyCode::Char('z'))), Action::None);
    }

    #[test]
    fn modified_keys_are_ignored_except_ctrl_c() {
        let ctrl = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(ctrl('c')), Action::Quit);
        assert_eq!(key_to_action(ctrl('5')), Action::None);
    }
}
