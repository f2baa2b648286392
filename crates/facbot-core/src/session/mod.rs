//! Conversation state machine.
//!
//! A [`Session`] owns everything one conversation accumulates. Front-ends
//! push [`Event`]s into it and let a [`ConversationController`] consume them;
//! after every turn they render [`Session::view`].

mod controller;
mod event;
mod state;

pub use controller::{ConversationController, Notice, NoticeLevel, TurnOutcome, TurnReport};
pub use event::{ButtonId, Envelope, Event, EventId, EventQueue};
pub use state::{Phase, Session, View};
