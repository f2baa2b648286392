//! Turn-by-turn processing of session events.

use tracing::{debug, error, info, info_span, warn, Instrument};

use super::event::{ButtonId, Envelope, Event, EventId};
use super::state::{Phase, Session};
use crate::assistant::Assistant;
use crate::export::{ExportFormat, ExportService};
use crate::invoice::{InvoiceRecord, ResponseParser};
use crate::models::config::ChatConfig;
use crate::models::message::ChatMessage;
use crate::pdf::TextExtractor;

const MSG_ANALYZED: &str = "He analizado la factura. Aquí está la información de los productos:";
const MSG_UNSTRUCTURED: &str =
    "He analizado la factura pero no pude estructurar la información correctamente.";
const MSG_ADD_ANOTHER: &str = "Puedes subir otra factura.";
const MSG_EXPORT_XLSX: &str =
    "Aquí está el archivo Excel con todos los productos de las facturas procesadas:";
const MSG_EXPORT_CSV: &str = "No se pudo generar el archivo Excel. Aquí está el archivo CSV con todos los productos de las facturas procesadas:";

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something degraded but the turn went on.
    Warning,
    /// The requested work did not happen.
    Error,
}

/// Transient feedback from one turn. Not part of the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text shown to the user.
    pub text: String,
}

/// How an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The event ran.
    Processed,
    /// The event is not accepted in the current phase; nothing changed.
    Rejected,
    /// The event had already been consumed; nothing changed.
    Duplicate,
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    /// Which event this turn consumed.
    pub event: EventId,
    /// How it was handled.
    pub outcome: TurnOutcome,
    /// Feedback to show next to the transcript.
    pub notices: Vec<Notice>,
}

impl TurnReport {
    fn new(event: EventId) -> Self {
        Self {
            event,
            outcome: TurnOutcome::Processed,
            notices: Vec::new(),
        }
    }

    fn notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push(Notice {
            level,
            text: text.into(),
        });
    }

    fn reject(&mut self, text: impl Into<String>) {
        self.outcome = TurnOutcome::Rejected;
        self.notice(NoticeLevel::Warning, text);
    }

    /// Whether any notice is an error.
    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(|n| n.level == NoticeLevel::Error)
    }
}

/// Drives a [`Session`] through uploads, chat turns and export.
///
/// The controller holds no conversation state of its own; every operation
/// receives the session it acts on.
#[derive(Debug)]
pub struct ConversationController<A, X> {
    assistant: A,
    extractor: X,
    parser: ResponseParser,
    exporter: ExportService,
    chat: ChatConfig,
}

impl<A: Assistant, X: TextExtractor> ConversationController<A, X> {
    /// Create a controller over the given collaborators.
    pub fn new(assistant: A, extractor: X, exporter: ExportService, chat: ChatConfig) -> Self {
        Self {
            assistant,
            extractor,
            parser: ResponseParser::new(),
            exporter,
            chat,
        }
    }

    /// The assistant this controller talks to.
    pub fn assistant(&self) -> &A {
        &self.assistant
    }

    /// A fresh session greeting with this controller's configuration.
    pub fn new_session(&self) -> Session {
        Session::from_config(&self.chat)
    }

    /// Run one turn per queued event, in arrival order.
    pub async fn process_pending(&self, session: &mut Session) -> Vec<TurnReport> {
        let mut reports = Vec::with_capacity(session.pending_events());
        while let Some(envelope) = session.inbox.pop() {
            reports.push(self.handle(session, envelope).await);
        }
        reports
    }

    /// Run the turn for a single envelope.
    ///
    /// An envelope whose id was already consumed is reported as
    /// [`TurnOutcome::Duplicate`] and has no effect. An id this session
    /// never issued is [`TurnOutcome::Rejected`].
    pub async fn handle(&self, session: &mut Session, envelope: Envelope) -> TurnReport {
        let mut report = TurnReport::new(envelope.id);

        if !session.inbox.is_issued(envelope.id) {
            warn!("Event {} was not issued by this session", envelope.id);
            report.outcome = TurnOutcome::Rejected;
            return report;
        }
        if !session.inbox.mark_consumed(envelope.id) {
            debug!("Event {} already consumed, skipping", envelope.id);
            report.outcome = TurnOutcome::Duplicate;
            return report;
        }

        let span = info_span!("turn", id = envelope.id.get(), kind = envelope.event.kind());
        async {
            match envelope.event {
                Event::FileUploaded { file_name, bytes } => {
                    self.on_upload(session, &file_name, &bytes, &mut report).await
                }
                Event::ChatMessageSubmitted(text) => {
                    self.on_chat(session, &text, &mut report).await
                }
                Event::ButtonActivated(button) => self.on_button(session, button, &mut report),
            }
            info!(
                outcome = ?report.outcome,
                phase = ?session.phase,
                invoices = session.store.len(),
                "Turn complete"
            );
        }
        .instrument(span)
        .await;

        report
    }

    async fn on_upload(
        &self,
        session: &mut Session,
        file_name: &str,
        bytes: &[u8],
        report: &mut TurnReport,
    ) {
        if !session.upload_enabled() {
            report.reject("Elige \"Agregar otra factura\" antes de subir otro archivo.");
            return;
        }

        let text = match self.extractor.extract(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not read {}: {}", file_name, e);
                report.notice(
                    NoticeLevel::Error,
                    format!("No se pudo leer el PDF {}: {}", file_name, e),
                );
                return;
            }
        };
        debug!("Extracted {} chars from {}", text.len(), file_name);

        match self.assistant.extract_invoice(&text).await {
            Ok(reply) => {
                let parsed = self.parser.parse(&reply);
                let rows = session.store.append(parsed.record).to_vec();

                let message = match parsed.warning {
                    None => self.bot(MSG_ANALYZED).with_table(rows),
                    Some(warning) => {
                        warn!("Reply for {} not structured: {}", file_name, warning);
                        report.notice(
                            NoticeLevel::Warning,
                            format!("No se pudo extraer JSON estructurado: {}", warning),
                        );
                        self.bot(format!("{}\n\n{}", MSG_UNSTRUCTURED, reply))
                    }
                };
                session.push_message(message);
            }
            Err(e) => {
                error!("Extraction request for {} failed: {}", file_name, e);
                session.store.append(InvoiceRecord::fallback(e.to_string()));
                report.notice(NoticeLevel::Error, format!("Error: {}", e));
                session.push_message(
                    self.bot(format!("Ocurrió un error al procesar la factura: {}", e)),
                );
            }
        }

        session.phase = Phase::AwaitingContinueDecision;
    }

    async fn on_chat(&self, session: &mut Session, text: &str, report: &mut TurnReport) {
        let text = text.trim();
        if text.is_empty() {
            report.outcome = TurnOutcome::Rejected;
            return;
        }

        session.push_message(ChatMessage::user(text));

        if session.phase == Phase::AwaitingContinueDecision && self.chat.keyword_decisions {
            if self.is_affirmative(text) {
                debug!("Free-text answer read as: add another");
                self.add_another(session);
            } else {
                debug!("Free-text answer read as: finish");
                self.finish(session, report);
            }
            return;
        }

        match self.assistant.chat(text).await {
            Ok(reply) => session.push_message(self.bot(reply)),
            Err(e) => {
                error!("Chat request failed: {}", e);
                report.notice(NoticeLevel::Error, format!("Error: {}", e));
            }
        }
    }

    fn on_button(&self, session: &mut Session, button: ButtonId, report: &mut TurnReport) {
        if !session.available_actions().contains(&button) {
            report.reject(format!("\"{}\" no está disponible ahora.", button.label()));
            return;
        }

        match button {
            ButtonId::AddAnother => self.add_another(session),
            ButtonId::FinishExport => self.finish(session, report),
            ButtonId::ResetSession => {
                info!("Resetting session");
                session.reset();
                report.notice(NoticeLevel::Info, "Sesión reiniciada.");
            }
        }
    }

    fn add_another(&self, session: &mut Session) {
        session.push_message(self.bot(MSG_ADD_ANOTHER));
        session.phase = Phase::Idle;
    }

    fn finish(&self, session: &mut Session, report: &mut TurnReport) {
        session.phase = Phase::Finished;
        session.export = None;

        let rows = session.store.line_items().to_vec();
        match self.exporter.export(&rows) {
            Ok(result) => {
                if let Some(e) = &result.spreadsheet_error {
                    report.notice(
                        NoticeLevel::Error,
                        format!("No se pudo generar el archivo Excel: {}", e),
                    );
                }
                let text = match result.artifact.format {
                    ExportFormat::Xlsx => MSG_EXPORT_XLSX,
                    ExportFormat::Csv => MSG_EXPORT_CSV,
                };
                info!(
                    "Exported {} rows as {}",
                    result.artifact.rows, result.artifact.file_name
                );
                session.push_message(self.bot(text).with_table(rows));
                session.export = Some(result.artifact);
            }
            Err(e) => {
                error!("Export failed: {}", e);
                report.notice(NoticeLevel::Error, format!("No se pudo exportar: {}", e));
            }
        }
    }

    fn is_affirmative(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.chat
            .affirmative_keywords
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()))
    }

    fn bot(&self, text: impl Into<String>) -> ChatMessage {
        ChatMessage::assistant(text, self.chat.avatar.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PdfError, RemoteServiceError};
    use crate::models::config::ExportConfig;
    use crate::models::message::Role;
    use calamine::{Data, Reader, Xlsx};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::Cursor;

    const WIDGET_REPLY: &str = "Here is the data: {\"Fecha\":\"2024-01-01\",\"Número de Factura\":\"A1\",\"Detalle de Productos\":[{\"Descripción\":\"Widget\",\"Cantidad\":\"2\",\"Precio Unitario\":\"5\",\"Subtotal\":\"10\"}]}";
    const GADGET_REPLY: &str = r#"{"Fecha": "2024-01-05", "Número de Factura": "B2", "Importe Total": "300", "Detalle de Productos": [{"Descripción": "Gadget", "Subtotal": "100"}, {"Descripción": "Gizmo", "Subtotal": "200"}]}"#;

    /// Treats anything starting with `%PDF` as a PDF whose text is its bytes.
    struct FakeExtractor;

    impl TextExtractor for FakeExtractor {
        fn extract(&self, pdf: &[u8]) -> crate::pdf::Result<String> {
            if pdf.starts_with(b"%PDF") {
                Ok(String::from_utf8_lossy(&pdf[4..]).into_owned())
            } else {
                Err(PdfError::Parse("invalid file header".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct ScriptedAssistant {
        replies: RefCell<VecDeque<Result<String, RemoteServiceError>>>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedAssistant {
        fn with(replies: Vec<Result<String, RemoteServiceError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn next(&self, call: String) -> Result<String, RemoteServiceError> {
            self.calls.borrow_mut().push(call);
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(RemoteServiceError::EmptyReply))
        }
    }

    impl Assistant for ScriptedAssistant {
        async fn extract_invoice(&self, invoice_text: &str) -> crate::assistant::Result<String> {
            self.next(format!("extract:{invoice_text}"))
        }

        async fn chat(&self, message: &str) -> crate::assistant::Result<String> {
            self.next(format!("chat:{message}"))
        }
    }

    fn ok(reply: &str) -> Result<String, RemoteServiceError> {
        Ok(reply.to_string())
    }

    fn controller_with(
        replies: Vec<Result<String, RemoteServiceError>>,
        chat: ChatConfig,
        export: ExportConfig,
    ) -> ConversationController<ScriptedAssistant, FakeExtractor> {
        ConversationController::new(
            ScriptedAssistant::with(replies),
            FakeExtractor,
            ExportService::from_config(&export),
            chat,
        )
    }

    fn controller(
        replies: Vec<Result<String, RemoteServiceError>>,
    ) -> ConversationController<ScriptedAssistant, FakeExtractor> {
        let export = ExportConfig {
            timestamped: false,
            ..ExportConfig::default()
        };
        controller_with(replies, ChatConfig::default(), export)
    }

    fn upload(name: &str) -> Event {
        Event::FileUploaded {
            file_name: name.to_string(),
            bytes: format!("%PDF{name}").into_bytes(),
        }
    }

    fn button(id: ButtonId) -> Event {
        Event::ButtonActivated(id)
    }

    async fn run(
        controller: &ConversationController<ScriptedAssistant, FakeExtractor>,
        session: &mut Session,
        event: Event,
    ) -> TurnReport {
        session.submit(event);
        let mut reports = controller.process_pending(session).await;
        assert_eq!(reports.len(), 1);
        reports.remove(0)
    }

    #[tokio::test]
    async fn test_upload_structured_reply() {
        let controller = controller(vec![ok(WIDGET_REPLY)]);
        let mut session = controller.new_session();

        let report = run(&controller, &mut session, upload("a.pdf")).await;

        assert_eq!(report.outcome, TurnOutcome::Processed);
        assert!(report.notices.is_empty());
        assert_eq!(session.phase(), Phase::AwaitingContinueDecision);
        assert_eq!(session.store().invoices().len(), 1);
        assert_eq!(session.store().invoices()[0].get("Fecha"), "2024-01-01");

        let rows = session.line_items();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Descripción"), Some("Widget"));
        assert_eq!(rows[0].get("Subtotal"), Some("10"));
        assert_eq!(rows[0].get("Fecha"), Some("2024-01-01"));

        let last = session.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.text, MSG_ANALYZED);
        assert_eq!(last.table.len(), 1);
        assert_eq!(controller.assistant().calls.borrow()[0], "extract:a.pdf");
    }

    #[tokio::test]
    async fn test_upload_unstructured_reply() {
        let controller = controller(vec![ok("La factura es de ACME por 100 pesos.")]);
        let mut session = controller.new_session();

        let report = run(&controller, &mut session, upload("a.pdf")).await;

        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].level, NoticeLevel::Warning);
        assert!(session.store().invoices()[0].fallback);
        assert_eq!(
            session.store().invoices()[0].get("Datos"),
            "La factura es de ACME por 100 pesos."
        );
        assert_eq!(
            session.line_items()[0].get("Descripción"),
            Some("Información general")
        );
        assert!(session.transcript().last().unwrap().text.ends_with("por 100 pesos."));
        assert_eq!(session.phase(), Phase::AwaitingContinueDecision);
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_not_recorded() {
        let controller = controller(vec![ok(WIDGET_REPLY)]);
        let mut session = controller.new_session();

        let event = Event::FileUploaded {
            file_name: "foto.png".to_string(),
            bytes: b"\x89PNG".to_vec(),
        };
        let report = run(&controller, &mut session, event).await;

        assert!(report.has_errors());
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.store().is_empty());
        assert_eq!(session.transcript().len(), 1);
        assert!(controller.assistant().calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_still_recorded() {
        let controller = controller(vec![Err(RemoteServiceError::Status {
            status: 500,
            body: "upstream".to_string(),
        })]);
        let mut session = controller.new_session();

        let report = run(&controller, &mut session, upload("a.pdf")).await;

        assert!(report.has_errors());
        assert_eq!(session.phase(), Phase::AwaitingContinueDecision);
        let record = &session.store().invoices()[0];
        assert!(record.fallback);
        assert!(record.get("Datos").contains("upstream"));
        assert!(session
            .transcript()
            .last()
            .unwrap()
            .text
            .starts_with("Ocurrió un error al procesar la factura"));
    }

    #[tokio::test]
    async fn test_chat_turn() {
        let controller = controller(vec![ok("¡Hola! ¿En qué te ayudo?")]);
        let mut session = controller.new_session();

        let report = run(
            &controller,
            &mut session,
            Event::ChatMessageSubmitted("hola".to_string()),
        )
        .await;

        assert!(report.notices.is_empty());
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1], ChatMessage::user("hola"));
        assert_eq!(transcript[2].text, "¡Hola! ¿En qué te ayudo?");
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_chat_failure_keeps_user_message_only() {
        let controller = controller(vec![Err(RemoteServiceError::EmptyReply)]);
        let mut session = controller.new_session();

        let report = run(
            &controller,
            &mut session,
            Event::ChatMessageSubmitted("hola".to_string()),
        )
        .await;

        assert!(report.has_errors());
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[1].role, Role::User);
    }

    #[tokio::test]
    async fn test_empty_chat_rejected() {
        let controller = controller(vec![]);
        let mut session = controller.new_session();

        let report = run(
            &controller,
            &mut session,
            Event::ChatMessageSubmitted("   ".to_string()),
        )
        .await;

        assert_eq!(report.outcome, TurnOutcome::Rejected);
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_event_consumed_exactly_once() {
        let controller = controller(vec![ok("respuesta"), ok("otra respuesta")]);
        let mut session = controller.new_session();

        let id = session.submit(Event::ChatMessageSubmitted("hola".to_string()));
        let envelope = Envelope {
            id,
            event: Event::ChatMessageSubmitted("hola".to_string()),
        };

        // Re-render while still queued
        assert!(!session.redeliver(envelope.clone()));
        let reports = controller.process_pending(&mut session).await;
        assert_eq!(reports.len(), 1);

        // Re-render after the turn ran
        assert!(!session.redeliver(envelope.clone()));
        let report = controller.handle(&mut session, envelope).await;
        assert_eq!(report.outcome, TurnOutcome::Duplicate);

        assert_eq!(controller.assistant().calls.borrow().len(), 1);
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_same_content_twice_is_two_events() {
        let controller = controller(vec![ok("uno"), ok("dos")]);
        let mut session = controller.new_session();

        session.submit(Event::ChatMessageSubmitted("hola".to_string()));
        session.submit(Event::ChatMessageSubmitted("hola".to_string()));
        let reports = controller.process_pending(&mut session).await;

        assert_eq!(reports.len(), 2);
        assert_eq!(session.transcript().len(), 5);
    }

    #[tokio::test]
    async fn test_upload_rejected_while_awaiting_decision() {
        let controller = controller(vec![ok(WIDGET_REPLY), ok(GADGET_REPLY)]);
        let mut session = controller.new_session();

        run(&controller, &mut session, upload("a.pdf")).await;
        let report = run(&controller, &mut session, upload("b.pdf")).await;

        assert_eq!(report.outcome, TurnOutcome::Rejected);
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.phase(), Phase::AwaitingContinueDecision);
    }

    #[tokio::test]
    async fn test_button_not_offered_is_rejected() {
        let controller = controller(vec![]);
        let mut session = controller.new_session();

        for id in [ButtonId::AddAnother, ButtonId::FinishExport, ButtonId::ResetSession] {
            let report = run(&controller, &mut session, button(id)).await;
            assert_eq!(report.outcome, TurnOutcome::Rejected);
        }
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_two_uploads_then_finish() {
        let controller = controller(vec![ok(WIDGET_REPLY), ok(GADGET_REPLY)]);
        let mut session = controller.new_session();

        run(&controller, &mut session, upload("a.pdf")).await;
        run(&controller, &mut session, button(ButtonId::AddAnother)).await;
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.upload_enabled());
        assert_eq!(session.transcript().last().unwrap().text, MSG_ADD_ANOTHER);

        run(&controller, &mut session, upload("b.pdf")).await;
        let report = run(&controller, &mut session, button(ButtonId::FinishExport)).await;

        assert!(report.notices.is_empty());
        assert_eq!(session.phase(), Phase::Finished);
        assert!(!session.upload_enabled());
        assert_eq!(session.view().actions, vec![ButtonId::ResetSession]);

        let artifact = session.export().unwrap();
        assert_eq!(artifact.format, ExportFormat::Xlsx);
        assert_eq!(artifact.file_name, "productos_facturas.xlsx");
        assert_eq!(artifact.rows, 3);

        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(artifact.bytes.clone())).unwrap();
        let range = workbook.worksheet_range("Productos").unwrap();
        let header: Vec<String> = range.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
        let col = header.iter().position(|h| h == "Descripción").unwrap();
        let descriptions: Vec<String> = range
            .rows()
            .skip(1)
            .map(|row| match &row[col] {
                Data::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        assert_eq!(descriptions, vec!["Widget", "Gadget", "Gizmo"]);
    }

    #[tokio::test]
    async fn test_n_uploads_yield_at_least_n_rows() {
        let replies = vec![ok(WIDGET_REPLY), ok("sin datos"), ok(GADGET_REPLY)];
        let controller = controller(replies);
        let mut session = controller.new_session();

        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            run(&controller, &mut session, upload(name)).await;
            run(&controller, &mut session, button(ButtonId::AddAnother)).await;
        }

        assert_eq!(session.store().invoices().len(), 3);
        assert!(session.line_items().len() >= 3);
        assert_eq!(session.available_actions(), vec![ButtonId::FinishExport]);
    }

    #[tokio::test]
    async fn test_finish_falls_back_to_csv() {
        let export = ExportConfig {
            sheet_name: "Productos [rotos]".to_string(),
            file_stem: "productos_facturas".to_string(),
            timestamped: false,
        };
        let controller = controller_with(vec![ok(WIDGET_REPLY)], ChatConfig::default(), export);
        let mut session = controller.new_session();

        run(&controller, &mut session, upload("a.pdf")).await;
        let report = run(&controller, &mut session, button(ButtonId::FinishExport)).await;

        assert!(report.has_errors());
        let artifact = session.export().unwrap();
        assert_eq!(artifact.format, ExportFormat::Csv);
        assert_eq!(artifact.file_name, "productos_facturas.csv");
        assert!(String::from_utf8_lossy(&artifact.bytes).contains("Widget"));
        assert_eq!(session.transcript().last().unwrap().text, MSG_EXPORT_CSV);
    }

    #[tokio::test]
    async fn test_envelope_from_another_session_is_rejected() {
        let controller = controller(vec![ok("respuesta")]);
        let mut other = controller.new_session();
        let mut session = controller.new_session();

        let foreign = Envelope {
            id: other.submit(Event::ChatMessageSubmitted("hola".to_string())),
            event: Event::ChatMessageSubmitted("hola".to_string()),
        };
        let report = controller.handle(&mut session, foreign).await;
        assert_eq!(report.outcome, TurnOutcome::Rejected);
        assert!(controller.assistant().calls.borrow().is_empty());

        // The id is still free for this session's own first event
        let report = run(
            &controller,
            &mut session,
            Event::ChatMessageSubmitted("hola".to_string()),
        )
        .await;
        assert_eq!(report.outcome, TurnOutcome::Processed);
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_reset_after_finish() {
        let controller = controller(vec![ok(WIDGET_REPLY)]);
        let mut session = controller.new_session();
        let greeting = session.transcript().to_vec();

        run(&controller, &mut session, upload("a.pdf")).await;
        run(&controller, &mut session, button(ButtonId::FinishExport)).await;
        let report = run(&controller, &mut session, button(ButtonId::ResetSession)).await;

        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.store().invoices().is_empty());
        assert!(session.line_items().is_empty());
        assert!(session.export().is_none());
        assert_eq!(session.transcript(), greeting.as_slice());
        assert_eq!(report.notices[0].level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_keyword_decisions() {
        let chat = ChatConfig {
            keyword_decisions: true,
            ..ChatConfig::default()
        };
        let export = ExportConfig {
            timestamped: false,
            ..ExportConfig::default()
        };
        let controller = controller_with(vec![ok(WIDGET_REPLY), ok(GADGET_REPLY)], chat, export);
        let mut session = controller.new_session();

        run(&controller, &mut session, upload("a.pdf")).await;
        run(
            &controller,
            &mut session,
            Event::ChatMessageSubmitted("Sí, OTRA por favor".to_string()),
        )
        .await;
        assert_eq!(session.phase(), Phase::Idle);

        run(&controller, &mut session, upload("b.pdf")).await;
        run(
            &controller,
            &mut session,
            Event::ChatMessageSubmitted("no gracias".to_string()),
        )
        .await;
        assert_eq!(session.phase(), Phase::Finished);
        assert!(session.export().is_some());

        // Only the two extraction calls reached the assistant
        assert_eq!(controller.assistant().calls.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_while_awaiting_without_keywords() {
        let controller = controller(vec![ok(WIDGET_REPLY), ok("Claro, te explico.")]);
        let mut session = controller.new_session();

        run(&controller, &mut session, upload("a.pdf")).await;
        run(
            &controller,
            &mut session,
            Event::ChatMessageSubmitted("¿qué es el IVA? ok".to_string()),
        )
        .await;

        assert_eq!(session.phase(), Phase::AwaitingContinueDecision);
        assert_eq!(session.transcript().last().unwrap().text, "Claro, te explico.");
    }
}
