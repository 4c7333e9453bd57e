//! Key handling: maps terminal keys to controller commands.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use kubedeck_engine::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Typing into the filter bar; every keystroke re-filters.
    Filter,
    /// Typing a screen name after `:`.
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Back,
    Open(String),
    Screen(Action),
}

#[derive(Debug)]
pub struct Input {
    mode: Mode,
    buffer: String,
}

impl Input {
    pub fn new() -> Self { Self { mode: Mode::Normal, buffer: String::new() } }

    pub fn mode(&self) -> Mode { self.mode }
    pub fn buffer(&self) -> &str { &self.buffer }

    /// `filter` is the current screen's filter text, used to seed the filter bar.
    pub fn handle_key(&mut self, key: KeyEvent, filter: &str) -> Option<Command> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Command::Quit),
                KeyCode::Char('r') => Some(Command::Screen(Action::Refresh)),
                _ => None,
            };
        }
        match self.mode {
            Mode::Normal => self.normal(key, filter),
            Mode::Filter => self.filter(key),
            Mode::Command => self.command(key),
        }
    }

    fn normal(&mut self, key: KeyEvent, filter: &str) -> Option<Command> {
        let action = match key.code {
            KeyCode::Char('q') => return Some(Command::Quit),
            KeyCode::Esc => return Some(Command::Back),
            KeyCode::Char('/') => {
                self.mode = Mode::Filter;
                self.buffer = filter.to_string();
                return None;
            }
            KeyCode::Char(':') => {
                self.mode = Mode::Command;
                self.buffer.clear();
                return None;
            }
            KeyCode::Up | KeyCode::Char('k') => Action::Up,
            KeyCode::Down | KeyCode::Char('j') => Action::Down,
            KeyCode::PageUp => Action::PageUp,
            KeyCode::PageDown => Action::PageDown,
            KeyCode::Home | KeyCode::Char('g') => Action::Top,
            KeyCode::End | KeyCode::Char('G') => Action::Bottom,
            KeyCode::Enter => Action::Enter,
            KeyCode::F(5) => Action::Refresh,
            KeyCode::Char(c) => Action::Shortcut(c),
            _ => return None,
        };
        Some(Command::Screen(action))
    }

    fn filter(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                None
            }
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.buffer.clear();
                Some(Command::Screen(Action::SetFilter(String::new())))
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                Some(Command::Screen(Action::SetFilter(self.buffer.clone())))
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                Some(Command::Screen(Action::SetFilter(self.buffer.clone())))
            }
            _ => None,
        }
    }

    fn command(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                let name = std::mem::take(&mut self.buffer);
                if name.trim().is_empty() { None } else { Some(Command::Open(name)) }
            }
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.buffer.clear();
                None
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                None
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent { KeyEvent::new(code, KeyModifiers::NONE) }

    fn type_str(input: &mut Input, s: &str) -> Vec<Command> {
        s.chars().filter_map(|c| input.handle_key(key(KeyCode::Char(c)), "")).collect()
    }

    #[test]
    fn normal_mode_maps_navigation_and_shortcuts() {
        let mut input = Input::new();
        assert_eq!(input.handle_key(key(KeyCode::Char('j')), ""), Some(Command::Screen(Action::Down)));
        assert_eq!(input.handle_key(key(KeyCode::Up), ""), Some(Command::Screen(Action::Up)));
        assert_eq!(input.handle_key(key(KeyCode::Char('G')), ""), Some(Command::Screen(Action::Bottom)));
        assert_eq!(input.handle_key(key(KeyCode::Char('l')), ""), Some(Command::Screen(Action::Shortcut('l'))));
        assert_eq!(input.handle_key(key(KeyCode::Esc), ""), Some(Command::Back));
        assert_eq!(input.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), ""), Some(Command::Quit));
    }

    #[test]
    fn filter_mode_refilters_on_every_keystroke() {
        let mut input = Input::new();
        assert_eq!(input.handle_key(key(KeyCode::Char('/')), "we"), None);
        assert_eq!(input.mode(), Mode::Filter);
        assert_eq!(input.buffer(), "we");
        let cmds = type_str(&mut input, "b");
        assert_eq!(cmds, vec![Command::Screen(Action::SetFilter("web".into()))]);
        // Keys that are shortcuts in normal mode are text here.
        assert_eq!(input.handle_key(key(KeyCode::Char('q')), ""), Some(Command::Screen(Action::SetFilter("webq".into()))));
        assert_eq!(input.handle_key(key(KeyCode::Backspace), ""), Some(Command::Screen(Action::SetFilter("web".into()))));
        assert_eq!(input.handle_key(key(KeyCode::Enter), ""), None);
        assert_eq!(input.mode(), Mode::Normal);

        input.handle_key(key(KeyCode::Char('/')), "web");
        assert_eq!(input.handle_key(key(KeyCode::Esc), ""), Some(Command::Screen(Action::SetFilter(String::new()))));
        assert_eq!(input.mode(), Mode::Normal);
    }

    #[test]
    fn command_mode_opens_screens() {
        let mut input = Input::new();
        input.handle_key(key(KeyCode::Char(':')), "");
        assert!(type_str(&mut input, "deploy").is_empty());
        assert_eq!(input.handle_key(key(KeyCode::Enter), ""), Some(Command::Open("deploy".into())));
        input.handle_key(key(KeyCode::Char(':')), "");
        assert_eq!(input.handle_key(key(KeyCode::Enter), ""), None);
        assert_eq!(input.mode(), Mode::Normal);
    }
}
