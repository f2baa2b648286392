//! Events raised by the view layer and their arrival queue.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// Arrival-ordered identifier of an event within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    /// Numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Buttons the view can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    /// "Agregar otra factura".
    AddAnother,
    /// "Finalizar y exportar".
    FinishExport,
    /// "Procesar nuevas facturas".
    ResetSession,
}

impl ButtonId {
    /// Label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            ButtonId::AddAnother => "Agregar otra factura",
            ButtonId::FinishExport => "Finalizar y exportar",
            ButtonId::ResetSession => "Procesar nuevas facturas",
        }
    }
}

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A PDF was picked in the upload affordance.
    FileUploaded {
        /// Original file name, for logs and messages.
        file_name: String,
        /// Full file contents.
        bytes: Vec<u8>,
    },
    /// A chat message was submitted.
    ChatMessageSubmitted(String),
    /// A button was pressed.
    ButtonActivated(ButtonId),
}

impl Event {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::FileUploaded { .. } => "file_uploaded",
            Event::ChatMessageSubmitted(_) => "chat_message",
            Event::ButtonActivated(_) => "button",
        }
    }
}

/// An event tagged with its arrival id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Arrival id.
    pub id: EventId,
    /// The event.
    pub event: Event,
}

/// FIFO of pending events with exactly-once bookkeeping.
///
/// Ids grow monotonically for the lifetime of the queue and are never
/// reused, so an envelope delivered twice is recognized by id alone.
/// Every id below `consumed_below` has run; `consumed_above` holds the
/// ones that ran out of order past it.
#[derive(Debug, Default)]
pub struct EventQueue {
    next_id: u64,
    pending: VecDeque<Envelope>,
    consumed_below: u64,
    consumed_above: BTreeSet<u64>,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a new event and return its id.
    pub fn push(&mut self, event: Event) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.pending.push_back(Envelope { id, event });
        id
    }

    /// Re-offer an envelope. Returns `false` when it was already consumed,
    /// is still pending, or was never issued by this queue.
    pub fn redeliver(&mut self, envelope: Envelope) -> bool {
        if !self.is_issued(envelope.id)
            || self.is_consumed(envelope.id)
            || self.pending.iter().any(|e| e.id == envelope.id)
        {
            return false;
        }
        // Popped but never consumed; put it back in arrival order.
        let at = self
            .pending
            .iter()
            .position(|e| e.id > envelope.id)
            .unwrap_or(self.pending.len());
        self.pending.insert(at, envelope);
        true
    }

    /// Take the oldest pending event.
    pub fn pop(&mut self) -> Option<Envelope> {
        self.pending.pop_front()
    }

    /// Record that an envelope's turn has run. Returns `false` if it already
    /// had or the id was never issued here.
    pub fn mark_consumed(&mut self, id: EventId) -> bool {
        if !self.is_issued(id) || self.is_consumed(id) {
            return false;
        }
        self.consumed_above.insert(id.0);
        while self.consumed_above.remove(&self.consumed_below) {
            self.consumed_below += 1;
        }
        true
    }

    /// Whether a turn already ran for this id.
    pub fn is_consumed(&self, id: EventId) -> bool {
        id.0 < self.consumed_below || self.consumed_above.contains(&id.0)
    }

    /// Whether this queue handed out the id.
    pub fn is_issued(&self, id: EventId) -> bool {
        id.0 < self.next_id
    }

    /// Number of events waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(text: &str) -> Event {
        Event::ChatMessageSubmitted(text.to_string())
    }

    #[test]
    fn test_ids_follow_arrival_not_content() {
        let mut queue = EventQueue::new();
        let first = queue.push(chat("hola"));
        let second = queue.push(chat("hola"));

        assert_ne!(first, second);
        assert!(first < second);
        assert_eq!(queue.pop().unwrap().id, first);
        assert_eq!(queue.pop().unwrap().id, second);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_consumed_envelope_not_redelivered() {
        let mut queue = EventQueue::new();
        queue.push(chat("hola"));

        let envelope = queue.pop().unwrap();
        assert!(queue.mark_consumed(envelope.id));
        assert!(!queue.mark_consumed(envelope.id));
        assert!(!queue.redeliver(envelope));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pending_envelope_not_duplicated() {
        let mut queue = EventQueue::new();
        let id = queue.push(chat("hola"));

        let copy = Envelope {
            id,
            event: chat("hola"),
        };
        assert!(!queue.redeliver(copy));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_unknown_id_rejected() {
        let mut queue = EventQueue::new();
        let forged = Envelope {
            id: EventId(42),
            event: chat("hola"),
        };
        assert!(!queue.redeliver(forged));
    }

    #[test]
    fn test_out_of_order_consumption() {
        let mut queue = EventQueue::new();
        let ids: Vec<EventId> = ["uno", "dos", "tres"].map(|t| queue.push(chat(t))).to_vec();

        assert!(queue.mark_consumed(ids[2]));
        assert!(!queue.is_consumed(ids[0]));
        assert!(!queue.is_consumed(ids[1]));

        assert!(queue.mark_consumed(ids[0]));
        assert!(queue.mark_consumed(ids[1]));
        assert!(ids.iter().all(|id| queue.is_consumed(*id)));
        assert!(queue.consumed_above.is_empty());
        assert_eq!(queue.consumed_below, 3);
    }

    #[test]
    fn test_foreign_id_not_consumed() {
        let mut queue = EventQueue::new();
        let forged = EventId(7);

        assert!(!queue.mark_consumed(forged));
        for _ in 0..8 {
            queue.push(chat("hola"));
        }
        assert!(!queue.is_consumed(forged));
        assert!(queue.mark_consumed(forged));
    }

    #[test]
    fn test_popped_but_unconsumed_can_return() {
        let mut queue = EventQueue::new();
        queue.push(chat("uno"));
        queue.push(chat("dos"));

        let first = queue.pop().unwrap();
        assert!(queue.redeliver(first.clone()));
        assert_eq!(queue.pop().unwrap(), first);
    }
}
