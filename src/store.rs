//! Bounded in-memory message store

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::message::{Address, Message};

/// Optional predicates for [`MessageStore::find_messages`].
///
/// All supplied predicates are ANDed; absent predicates impose no
/// constraint. Each predicate is applied as its own pass so adding a
/// filter dimension never touches the others.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessageFilter {
    /// Exact match on the `x-message-type` header value
    pub message_type: Option<String>,
    /// Exact match on the sender's bare address
    pub from: Option<String>,
    /// Match when any `to` entry has this address
    pub to: Option<String>,
    /// Match when any `cc` entry has this address
    pub cc: Option<String>,
}

/// Insertion-ordered collection of received messages with a fixed
/// capacity and strict FIFO eviction.
///
/// Shared between the SMTP listener (writer) and the HTTP listener
/// (reader/clearer); every operation runs to completion under the
/// interior lock, so no reader observes a partial append or eviction.
#[derive(Debug)]
pub struct MessageStore {
    capacity: usize,
    messages: Mutex<Vec<Message>>,
}

impl MessageStore {
    /// Create a store that retains at most `capacity` messages
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Normalize the parsed mail into a [`Message`], append it, and evict
    /// the oldest entries if the store exceeds its capacity. Returns the
    /// constructed message.
    pub fn add_message(&self, parsed: &mail_parser::Message<'_>) -> Message {
        let message = Message::from_parsed(parsed);
        debug!(
            message_id = message.message_id.as_deref().unwrap_or(""),
            message_type = message.message_type.as_deref().unwrap_or(""),
            "adding new message to the store"
        );

        let mut messages = self.lock();
        messages.push(message.clone());
        if messages.len() > self.capacity {
            let excess = messages.len() - self.capacity;
            messages.drain(..excess);
        }
        message
    }

    /// Return the messages matching `filter`, ordered oldest-first, or
    /// newest-first when `reverse` is set. Ordering is applied before
    /// filtering, and `count` then keeps only the first entries of the
    /// already-ordered, already-filtered sequence.
    pub fn find_messages(
        &self,
        filter: &MessageFilter,
        count: Option<usize>,
        reverse: bool,
    ) -> Vec<Message> {
        let messages = self.lock();
        let mut filtered: Vec<&Message> = if reverse {
            messages.iter().rev().collect()
        } else {
            messages.iter().collect()
        };

        if let Some(message_type) = &filter.message_type {
            filtered.retain(|message| message.message_type.as_deref() == Some(message_type.as_str()));
        }
        if let Some(from) = &filter.from {
            filtered.retain(|message| message.from.address.as_deref() == Some(from.as_str()));
        }
        if let Some(to) = &filter.to {
            filtered.retain(|message| has_address(message.to.as_deref(), to));
        }
        if let Some(cc) = &filter.cc {
            filtered.retain(|message| has_address(message.cc.as_deref(), cc));
        }

        if let Some(count) = count {
            filtered.truncate(count);
        }

        filtered.into_iter().cloned().collect()
    }

    /// Empty the store
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of messages currently retained
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The configured maximum number of retained messages
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        // Keep serving if a handler thread panicked mid-operation
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn has_address(list: Option<&[Address]>, address: &str) -> bool {
    list.is_some_and(|list| {
        list.iter()
            .any(|entry| entry.address.as_deref() == Some(address))
    })
}
