// 📱 Notification Listener - OS notification → parser → sink
//
// The listener is the only place that knows about packages, the on/off
// toggle, ids and sinks. The parser stays pure.

use crate::config::YAPE_PACKAGE;
use crate::parser::TransactionParser;
use crate::sink::TransactionSink;
use crate::transaction::ParsedTransaction;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, info};

// ============================================================================
// NOTIFICATION EVENT
// ============================================================================

/// NotificationEvent - What the OS hands us for each posted notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Source application id (e.g. "com.bcp.innovacxion.yapeapp")
    pub package_name: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Notification body; this is what gets parsed
    #[serde(default)]
    pub text: Option<String>,

    /// Epoch milliseconds when the notification was posted
    pub post_time: i64,
}

impl NotificationEvent {
    pub fn new(package_name: &str, text: &str, post_time: i64) -> Self {
        NotificationEvent {
            package_name: package_name.to_string(),
            title: None,
            text: Some(text.to_string()),
            post_time,
        }
    }

    /// Builder pattern: add optional title
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Body text, empty when the notification had none
    pub fn message(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Read a CSV of events (package_name,title,text,post_time) for batch replay
pub fn load_notifications(csv_path: &Path) -> Result<Vec<NotificationEvent>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {}", csv_path.display()))?;

    let mut events = Vec::new();

    for (line_num, result) in rdr.deserialize().enumerate() {
        let event: NotificationEvent = result.with_context(|| {
            format!(
                "Failed to parse CSV line {} in {}",
                line_num + 2,
                csv_path.display()
            )
        })?;
        events.push(event);
    }

    Ok(events)
}

// ============================================================================
// LISTENER OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ListenerOutcome {
    /// Service toggle is off; nothing parsed
    Paused,

    /// Notification came from another app
    Ignored { package: String },

    /// Parsed and accepted by the sink
    Delivered {
        push_key: String,
        record: ParsedTransaction,
    },

    /// Parsed, but the sink rejected it. Not retried.
    SinkFailed {
        record: ParsedTransaction,
        error: String,
    },
}

impl ListenerOutcome {
    pub fn record(&self) -> Option<&ParsedTransaction> {
        match self {
            ListenerOutcome::Delivered { record, .. } | ListenerOutcome::SinkFailed { record, .. } => {
                Some(record)
            }
            ListenerOutcome::Paused | ListenerOutcome::Ignored { .. } => None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, ListenerOutcome::Delivered { .. })
    }
}

// ============================================================================
// NOTIFICATION LISTENER
// ============================================================================

pub struct NotificationListener<S: TransactionSink> {
    parser: TransactionParser,
    sink: S,
    source_package: String,
    device_id: String,
}

impl<S: TransactionSink> NotificationListener<S> {
    /// Listener for the Yape package with the built-in rules
    pub fn new(sink: S, device_id: &str) -> Self {
        NotificationListener {
            parser: TransactionParser::new(),
            sink,
            source_package: YAPE_PACKAGE.to_string(),
            device_id: device_id.to_string(),
        }
    }

    /// Builder pattern: accept another source package
    pub fn with_source_package(mut self, package: &str) -> Self {
        self.source_package = package.to_string();
        self
    }

    /// Builder pattern: use a parser with custom rules
    pub fn with_parser(mut self, parser: TransactionParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn parser(&self) -> &TransactionParser {
        &self.parser
    }

    pub fn source_package(&self) -> &str {
        &self.source_package
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Handle one posted notification.
    ///
    /// `service_enabled` is the user toggle, passed in by the caller.
    pub fn on_notification_posted(
        &self,
        event: &NotificationEvent,
        service_enabled: bool,
    ) -> ListenerOutcome {
        if !service_enabled {
            debug!("⏸️ Servicio pausado - Notificación ignorada");
            return ListenerOutcome::Paused;
        }

        if event.package_name != self.source_package {
            return ListenerOutcome::Ignored {
                package: event.package_name.clone(),
            };
        }

        let title = event.title.as_deref().unwrap_or("");
        let message = event.message();
        debug!(title = %title, message = %message, "📱 Yape detectado");

        let id = uuid::Uuid::new_v4().to_string();
        let record = self
            .parser
            .parse(message, &id, event.post_time, &self.device_id);

        info!(
            amount = %record.amount,
            counterparty = %record.counterparty,
            category = %record.category,
            "💰 transaction parsed"
        );

        match self.sink.push(&record) {
            Ok(push_key) => {
                info!(sink = self.sink.name(), push_key = %push_key, "✅ Transacción enviada");
                ListenerOutcome::Delivered { push_key, record }
            }
            Err(e) => {
                error!(sink = self.sink.name(), error = %e, "❌ Error al enviar");
                ListenerOutcome::SinkFailed {
                    record,
                    error: format!("{:#}", e),
                }
            }
        }
    }

    /// Run a batch of events with the same toggle value
    pub fn replay(&self, events: &[NotificationEvent], service_enabled: bool) -> Vec<ListenerOutcome> {
        events
            .iter()
            .map(|event| self.on_notification_posted(event, service_enabled))
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CategoryClassifier, CategoryRule};
    use crate::sink::MemorySink;
    use crate::transaction::Category;
    use anyhow::anyhow;
    use std::io::Write;

    /// Sink that always fails, to check nothing is retried
    struct FailingSink {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl TransactionSink for FailingSink {
        fn push(&self, _record: &ParsedTransaction) -> Result<String> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(anyhow!("network unreachable"))
        }
    }

    fn yape_event(text: &str) -> NotificationEvent {
        NotificationEvent::new(YAPE_PACKAGE, text, 1_710_943_509_000).with_title("Yape")
    }

    #[test]
    fn test_delivers_yape_notification() {
        let listener = NotificationListener::new(MemorySink::new(), "device-1");
        let outcome = listener.on_notification_posted(
            &yape_event("Yape! Juan Perez te envió un pago de S/ 150.50"),
            true,
        );

        assert!(outcome.is_delivered());
        let record = outcome.record().unwrap();
        assert_eq!(record.amount, "150.50");
        assert_eq!(record.counterparty, "Juan Perez");
        assert_eq!(record.category, Category::Income);
        assert_eq!(record.timestamp, 1_710_943_509_000);
        assert_eq!(record.device_id, "device-1");
        assert!(uuid::Uuid::parse_str(&record.id).is_ok());

        let stored = listener.sink().records();
        assert_eq!(stored.len(), 1);
        assert_eq!(&stored[0].1, record);
    }

    #[test]
    fn test_paused_service_ignores_everything() {
        let listener = NotificationListener::new(MemorySink::new(), "device-1");
        let outcome = listener.on_notification_posted(&yape_event("Recibiste S/ 10"), false);

        assert_eq!(outcome, ListenerOutcome::Paused);
        assert!(listener.sink().is_empty());
    }

    #[test]
    fn test_other_packages_ignored() {
        let listener = NotificationListener::new(MemorySink::new(), "device-1");
        let event = NotificationEvent::new("com.whatsapp", "Recibiste S/ 10", 0);

        assert_eq!(
            listener.on_notification_posted(&event, true),
            ListenerOutcome::Ignored {
                package: "com.whatsapp".to_string()
            }
        );
        assert!(listener.sink().is_empty());
    }

    #[test]
    fn test_custom_source_package() {
        let listener = NotificationListener::new(MemorySink::new(), "d")
            .with_source_package("com.example.wallet");
        let event = NotificationEvent::new("com.example.wallet", "Pagaste a Tambo por S/ 3.50", 0);

        let outcome = listener.on_notification_posted(&event, true);
        assert_eq!(outcome.record().unwrap().category, Category::Payment);
        assert_eq!(listener.source_package(), "com.example.wallet");
    }

    #[test]
    fn test_missing_text_parses_as_empty() {
        let listener = NotificationListener::new(MemorySink::new(), "d");
        let event = NotificationEvent {
            package_name: YAPE_PACKAGE.to_string(),
            title: Some("Yape".to_string()),
            text: None,
            post_time: 5,
        };

        let outcome = listener.on_notification_posted(&event, true);
        let record = outcome.record().unwrap();
        assert_eq!(record.amount, "0.00");
        assert_eq!(record.counterparty, "Desconocido");
        assert_eq!(record.category, Category::Other);
        assert_eq!(record.raw_message, "");
    }

    #[test]
    fn test_sink_failure_reported_not_retried() {
        let sink = FailingSink {
            calls: std::sync::atomic::AtomicUsize::new(0),
        };
        let listener = NotificationListener::new(sink, "d");

        let outcome =
            listener.on_notification_posted(&yape_event("Enviaste a Luis Rojas por S/ 4.00"), true);

        match outcome {
            ListenerOutcome::SinkFailed { record, error } => {
                assert_eq!(record.counterparty, "Luis Rojas");
                assert!(error.contains("network unreachable"));
            }
            other => panic!("expected SinkFailed, got {:?}", other),
        }
        assert_eq!(
            listener.sink().calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[test]
    fn test_each_notification_gets_fresh_id() {
        let listener = NotificationListener::new(MemorySink::new(), "d");
        let event = yape_event("Recibiste de Ana Torres por S/ 10.00");

        let outcomes = listener.replay(&[event.clone(), event], true);
        let a = outcomes[0].record().unwrap();
        let b = outcomes[1].record().unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.extraction(), b.extraction());
    }

    #[test]
    fn test_custom_parser_rules() {
        let parser = TransactionParser::with_classifier(CategoryClassifier::from_rules(vec![
            CategoryRule::new("recarga", "Recargaste", Category::Payment),
        ]));
        let listener = NotificationListener::new(MemorySink::new(), "d").with_parser(parser);

        let outcome = listener.on_notification_posted(&yape_event("Recargaste S/ 15"), true);
        assert_eq!(outcome.record().unwrap().category, Category::Payment);
    }

    #[test]
    fn test_outcome_json_is_tagged() {
        let json = serde_json::to_value(ListenerOutcome::Ignored {
            package: "x".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "ignored");
        assert_eq!(json["package"], "x");

        let json = serde_json::to_value(ListenerOutcome::Paused).unwrap();
        assert_eq!(json["status"], "paused");
    }

    #[test]
    fn test_load_notifications_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "package_name,title,text,post_time").unwrap();
        writeln!(
            file,
            "com.bcp.innovacxion.yapeapp,Yape,\"Yape! Juan Perez te envió un pago de S/ 1,234.00\",1710943509000"
        )
        .unwrap();
        writeln!(file, "com.whatsapp,,hola,1710943510000").unwrap();
        file.flush().unwrap();

        let events = load_notifications(file.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, Some("Yape".to_string()));
        assert_eq!(events[0].post_time, 1_710_943_509_000);
        assert_eq!(events[1].title, None);

        let listener = NotificationListener::new(MemorySink::new(), "d");
        let outcomes = listener.replay(&events, true);
        assert_eq!(outcomes[0].record().unwrap().amount, "1234.00");
        assert!(matches!(outcomes[1], ListenerOutcome::Ignored { .. }));
    }

    #[test]
    fn test_load_notifications_bad_row() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "package_name,title,text,post_time").unwrap();
        writeln!(file, "com.bcp.innovacxion.yapeapp,Yape,hola,not-a-number").unwrap();
        file.flush().unwrap();

        assert!(load_notifications(file.path()).is_err());
    }
}
