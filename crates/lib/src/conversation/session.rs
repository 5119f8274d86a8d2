//! Session registry: chat identity -> (current handler, key memory) for one channel.

use crate::channels::ChatId;
use crate::conversation::context::KeyMemory;
use crate::conversation::handler::BoxedHandler;
use std::collections::HashMap;

/// State of one chat. `handler` is `None` before first contact and after `close()`.
#[derive(Default)]
pub struct Session {
    pub handler: Option<BoxedHandler>,
    pub memory: KeyMemory,
}

/// Sessions of one channel. Owned by that channel's dispatch loop, so it needs no lock.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<ChatId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for `chat`, created empty on first contact.
    pub fn get_or_create(&mut self, chat: &ChatId) -> &mut Session {
        if !self.sessions.contains_key(chat) {
            log::debug!("session: new chat {}", chat);
        }
        self.sessions.entry(chat.clone()).or_default()
    }

    pub fn get(&self, chat: &ChatId) -> Option<&Session> {
        self.sessions.get(chat)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
