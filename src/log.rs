use crate::config::Severity;

/// Logging sink caught exceptions are reported to.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, severity: Severity, type_name: &str, message: &str);
}

/// Default sink, forwarding to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, type_name: &str, message: &str) {
        // `tracing` macros need the level at compile time.
        match severity {
            Severity::Error | Severity::Critical => tracing::error!(
                exception.name = type_name,
                exception.message = message,
                "({}) {}",
                type_name,
                message
            ),
            Severity::Warn => tracing::warn!(
                exception.name = type_name,
                exception.message = message,
                "({}) {}",
                type_name,
                message
            ),
            Severity::Info => tracing::info!(
                exception.name = type_name,
                exception.message = message,
                "({}) {}",
                type_name,
                message
            ),
            Severity::Debug => tracing::debug!(
                exception.name = type_name,
                exception.message = message,
                "({}) {}",
                type_name,
                message
            ),
            Severity::Trace => tracing::trace!(
                exception.name = type_name,
                exception.message = message,
                "({}) {}",
                type_name,
                message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::Registry;

    type Captured = Arc<Mutex<Vec<(Level, BTreeMap<String, String>)>>>;

    #[derive(Default)]
    struct Fields(BTreeMap<String, String>);

    impl Visit for Fields {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    struct CaptureLayer(Captured);

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = Fields::default();
            event.record(&mut fields);
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), fields.0));
        }
    }

    #[test]
    fn test_tracing_sink_fields_and_levels() {
        let captured = Captured::default();
        let subscriber = Registry::default().with(CaptureLayer(Arc::clone(&captured)));

        tracing::subscriber::with_default(subscriber, || {
            for severity in [
                Severity::Trace,
                Severity::Debug,
                Severity::Info,
                Severity::Warn,
                Severity::Error,
                Severity::Critical,
            ] {
                TracingSink.log(severity, "ReportableValueError", "bad input");
            }
        });

        let events = captured.lock().unwrap();
        let levels: Vec<Level> = events.iter().map(|(level, _)| *level).collect();
        assert_eq!(
            levels,
            vec![
                Level::TRACE,
                Level::DEBUG,
                Level::INFO,
                Level::WARN,
                Level::ERROR,
                Level::ERROR
            ]
        );

        let (_, fields) = &events[0];
        assert_eq!(fields["exception.name"], "ReportableValueError");
        assert_eq!(fields["exception.message"], "bad input");
        assert_eq!(fields["message"], "(ReportableValueError) bad input");
    }
}
