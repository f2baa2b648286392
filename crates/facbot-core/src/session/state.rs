//! Per-conversation state and the view snapshot derived from it.

use super::event::{ButtonId, Envelope, Event, EventId, EventQueue};
use crate::export::ExportArtifact;
use crate::invoice::{InvoiceRecordStore, LineItemRow};
use crate::models::config::ChatConfig;
use crate::models::message::ChatMessage;

/// Which affordances the conversation currently offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for an upload or a chat message.
    #[default]
    Idle,
    /// An invoice was just processed; add another or finish.
    AwaitingContinueDecision,
    /// Export ran; only a reset leaves this phase.
    Finished,
}

/// Everything the view needs to render one frame.
#[derive(Debug)]
pub struct View<'a> {
    /// Full transcript, oldest first.
    pub transcript: &'a [ChatMessage],
    /// Whether the file picker is shown.
    pub upload_enabled: bool,
    /// Buttons to show, in display order.
    pub actions: Vec<ButtonId>,
    /// File offered for download.
    pub download: Option<&'a ExportArtifact>,
}

/// State owned by one conversation.
#[derive(Debug)]
pub struct Session {
    pub(crate) chat_log: Vec<ChatMessage>,
    pub(crate) phase: Phase,
    pub(crate) store: InvoiceRecordStore,
    pub(crate) inbox: EventQueue,
    pub(crate) export: Option<ExportArtifact>,
    greeting: ChatMessage,
}

impl Session {
    /// Start a conversation with the given greeting.
    pub fn new(greeting: ChatMessage) -> Self {
        Self {
            chat_log: vec![greeting.clone()],
            phase: Phase::Idle,
            store: InvoiceRecordStore::new(),
            inbox: EventQueue::new(),
            export: None,
            greeting,
        }
    }

    /// Start a conversation from the chat configuration.
    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(ChatMessage::assistant(
            config.greeting.clone(),
            config.avatar.clone(),
        ))
    }

    /// Queue an event for the controller. Returns its arrival id.
    pub fn submit(&mut self, event: Event) -> EventId {
        self.inbox.push(event)
    }

    /// Offer an envelope again, e.g. after a view re-render.
    ///
    /// Returns `false` when it was already consumed or is still queued.
    pub fn redeliver(&mut self, envelope: Envelope) -> bool {
        self.inbox.redeliver(envelope)
    }

    /// Number of events waiting for the controller.
    pub fn pending_events(&self) -> usize {
        self.inbox.len()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Transcript, oldest first.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.chat_log
    }

    /// Accumulated invoices and rows.
    pub fn store(&self) -> &InvoiceRecordStore {
        &self.store
    }

    /// Accumulated rows.
    pub fn line_items(&self) -> &[LineItemRow] {
        self.store.line_items()
    }

    /// File produced by the last export, if any.
    pub fn export(&self) -> Option<&ExportArtifact> {
        self.export.as_ref()
    }

    /// Whether the file picker is offered.
    pub fn upload_enabled(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Buttons offered in the current phase.
    pub fn available_actions(&self) -> Vec<ButtonId> {
        match self.phase {
            Phase::Idle if !self.store.is_empty() => vec![ButtonId::FinishExport],
            Phase::Idle => Vec::new(),
            Phase::AwaitingContinueDecision => {
                vec![ButtonId::AddAnother, ButtonId::FinishExport]
            }
            Phase::Finished => vec![ButtonId::ResetSession],
        }
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> View<'_> {
        View {
            transcript: &self.chat_log,
            upload_enabled: self.upload_enabled(),
            actions: self.available_actions(),
            download: self.export.as_ref(),
        }
    }

    /// Forget all invoices and return to the greeting.
    ///
    /// Queued events and the id sequence survive, so events delivered
    /// before the reset are still recognized.
    pub fn reset(&mut self) {
        self.store.reset();
        self.chat_log = vec![self.greeting.clone()];
        self.export = None;
        self.phase = Phase::Idle;
    }

    pub(crate) fn push_message(&mut self, message: ChatMessage) {
        self.chat_log.push(message);
    }
}
