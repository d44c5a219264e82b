//! Line format shared by the file and console layers:
//! `DD/MM/YYYY HH:MM [LEVEL] message`

use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::{self, Write as _};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use super::record::Level;

pub const TIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Field carrying a relayed record's original timestamp (unix millis)
pub const RECORD_TS_FIELD: &str = "record_ts";
/// Field carrying a relayed record's logger name; not printed
pub const LOGGER_FIELD: &str = "logger";

#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

#[derive(Default)]
struct LineVisitor {
    message: String,
    extra: String,
    record_ts: Option<i64>,
}

impl LineVisitor {
    fn push_extra(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        let _ = write!(self.extra, " {}={}", field.name(), value);
    }
}

impl Visit for LineVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == RECORD_TS_FIELD {
            self.record_ts = Some(value);
        } else {
            self.push_extra(field, format_args!("{value}"));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message.push_str(value),
            LOGGER_FIELD => {}
            _ => self.push_extra(field, format_args!("{value}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => {
                let _ = write!(self.message, "{value:?}");
            }
            LOGGER_FIELD => {}
            _ => self.push_extra(field, format_args!("{value:?}")),
        }
    }
}

fn event_time(record_ts: Option<i64>) -> DateTime<Local> {
    record_ts
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|utc| utc.with_timezone(&Local))
        .unwrap_or_else(Local::now)
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let level = Level::from(event.metadata().level());
        let time = event_time(visitor.record_ts).format(TIME_FORMAT);
        writeln!(writer, "{time} [{level}] {}{}", visitor.message, visitor.extra)
    }
}
