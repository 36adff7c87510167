use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode};

use crate::domain::{AVConfig, AVError, Message};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &AVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, AVError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                // While a prompt is open the model consumes keys unmapped
                if model.raw_keyevents() {
                    Ok(Some(Message::RawKey(key)))
                } else {
                    Ok(self.handle_key(key))
                }
            }
            Event::Resize(width, height) => {
                Ok(Some(Message::Resize(width as usize, height as usize)))
            }
            _ => Ok(None),
        }
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
            KeyCode::PageUp | KeyCode::Char('<') => Some(Message::PrevPage),
            KeyCode::PageDown | KeyCode::Char('>') => Some(Message::NextPage),
            KeyCode::Char('g') => Some(Message::MoveBeginning),
            KeyCode::Char('G') => Some(Message::MoveEnd),
            KeyCode::Char('[') => Some(Message::ShrinkRowsPerPage),
            KeyCode::Char(']') => Some(Message::GrowRowsPerPage),
            KeyCode::Char('s') => Some(Message::SortAscending),
            KeyCode::Char('S') => Some(Message::SortDescending),
            KeyCode::Char('x') => Some(Message::ToggleColumnState),
            KeyCode::Char('X') => Some(Message::ToggleExpandColumnState),
            KeyCode::Char('i') => Some(Message::ToggleIndex),
            KeyCode::Char('c') => Some(Message::CopyCell),
            KeyCode::Char('y') => Some(Message::CopyRow),
            KeyCode::Char(':') => Some(Message::EnterCommand),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('n') => Some(Message::SearchNext),
            KeyCode::Char('N') => Some(Message::SearchPrev),
            KeyCode::Char('r') => Some(Message::Refresh),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Enter => Some(Message::Enter),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> Controller {
        Controller::new(&AVConfig::default())
    }

    #[test]
    fn keys_map_to_messages() {
        let c = controller();
        assert_eq!(c.handle_key(KeyCode::Char('q').into()), Some(Message::Quit));
        assert_eq!(c.handle_key(KeyCode::Down.into()), Some(Message::MoveDown));
        assert_eq!(
            c.handle_key(KeyCode::Char('j').into()),
            Some(Message::MoveDown)
        );
        assert_eq!(
            c.handle_key(KeyCode::Char('/').into()),
            Some(Message::Search)
        );
        assert_eq!(
            c.handle_key(KeyCode::Char(']').into()),
            Some(Message::GrowRowsPerPage)
        );
        assert_eq!(
            c.handle_key(KeyCode::PageDown.into()),
            Some(Message::NextPage)
        );
        assert_eq!(
            c.handle_key(KeyCode::Char('r').into()),
            Some(Message::Refresh)
        );
    }

    #[test]
    fn unmapped_keys_are_dropped() {
        let c = controller();
        assert_eq!(c.handle_key(KeyCode::Char('Z').into()), None);
        assert_eq!(c.handle_key(KeyCode::Tab.into()), None);
    }
}
