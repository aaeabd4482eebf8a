//! Service logging: local-time lines on stdout, mirrored to a file once the
//! config names one. Request spans opened by the HTTP trace layer prefix
//! every line logged while the request is handled.

use std::{
    fmt::Display,
    fs::File,
    io::{self, IsTerminal, Write},
    path::Path,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{Event, Level, Subscriber, info};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{
        FmtContext, FormattedFields, MakeWriter,
        format::{FormatEvent, FormatFields, Writer},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
};

use crate::config::LoggingConfig;

const TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";

/// `2025-06-01T10:15:42.123456+02:00  INFO api.rs:88 request{method=POST uri=/resolve}: message key=value`
struct LocalFmt;

fn level_style(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[1;31m",
        Level::WARN => "\x1b[1;33m",
        Level::INFO => "\x1b[1;32m",
        Level::DEBUG => "\x1b[1;34m",
        Level::TRACE => "\x1b[1;35m",
    }
}

fn styled(
    writer: &mut Writer<'_>,
    ansi: bool,
    style: &str,
    text: impl Display,
) -> std::fmt::Result {
    if ansi {
        write!(writer, "{style}{text}{RESET}")
    } else {
        write!(writer, "{text}")
    }
}

/// Workspace builds report `tax-service/src/api.rs`; keeps the part after `src/`.
fn source_path(file: &str) -> &str {
    file.rsplit_once("src/")
        .or_else(|| file.rsplit_once("src\\"))
        .map_or(file, |(_, rest)| rest)
}

impl<S, N> FormatEvent<S, N> for LocalFmt
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let ansi = writer.has_ansi_escapes();

        styled(&mut writer, ansi, DIM, Local::now().format(TIMESTAMP))?;
        write!(writer, " ")?;
        styled(&mut writer, ansi, level_style(meta.level()), format_args!("{:>5}", meta.level()))?;
        write!(writer, " ")?;

        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            styled(&mut writer, ansi, CYAN, format_args!("{}:{line}", source_path(file)))?;
            write!(writer, " ")?;
        }

        if let Some(scope) = ctx.event_scope() {
            let mut any = false;
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                if let Some(fields) = span.extensions().get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ":")?;
                any = true;
            }
            if any {
                write!(writer, " ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// A MakeWriter that can be pointed at a file after initialization.
/// While no file is set, all writes are discarded.
#[derive(Clone, Default)]
struct FileSlot(Arc<Mutex<Option<File>>>);

impl FileSlot {
    fn replace(
        &self,
        file: File,
    ) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(file);
    }
}

struct SlotWriter<'a>(MutexGuard<'a, Option<File>>);

impl Write for SlotWriter<'_> {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        match &mut *self.0 {
            Some(f) => f.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.0 {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for FileSlot {
    type Writer = SlotWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SlotWriter(self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Runtime controls kept after the global subscriber is installed.
struct Handles {
    level: reload::Handle<EnvFilter, Registry>,
    file: FileSlot,
}

static HANDLES: OnceLock<Handles> = OnceLock::new();

fn handles() -> Result<&'static Handles> {
    HANDLES.get().context("logging not yet initialized")
}

/// Changes the active log filter at runtime.
/// Accepts a bare level ("error", "warn", "info", "debug", "trace")
/// or any full EnvFilter directive.
pub fn set_log_level(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?;
    handles()?
        .level
        .reload(filter)
        .context("filter reload failed")
}

/// Starts appending log output to `path`, replacing any open log file.
/// The directory must already exist.
pub fn enable_file_logging(path: &Path) -> Result<()> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file '{}'", path.display()))?;
    handles()?.file.replace(file);
    Ok(())
}

/// Installs the global subscriber. Call once at startup, before the config
/// is read, so configuration errors are logged too.
///
/// Stdout is colored only when attached to a terminal. The level comes from
/// `RUST_LOG` when set, INFO otherwise.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (level_filter, level) = reload::Layer::new(filter);
    let file = FileSlot::default();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .event_format(LocalFmt)
        .with_ansi(io::stdout().is_terminal());
    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(LocalFmt)
        .with_ansi(false)
        .with_writer(file.clone());

    if tracing_subscriber::registry()
        .with(level_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
    {
        let _ = HANDLES.set(Handles { level, file });
    }
}

/// Applies the `[logging]` section once the config is known.
///
/// The configured level is ignored while `RUST_LOG` is set.
pub fn apply_config(config: &LoggingConfig) -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        set_log_level(&config.level)?;
    }
    if let Some(path) = &config.file {
        enable_file_logging(path)?;
        info!(file = %path.display(), "file logging enabled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tracing::info_span;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn render(log: impl FnOnce()) -> String {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(LocalFmt)
            .with_writer(move || sink.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, log);

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn request_span_fields_prefix_the_message() {
        let output = render(|| {
            let span = info_span!("request", method = %"POST");
            let _entered = span.enter();
            info!(status = 200, "finished processing request");
        });

        assert!(output.contains(" INFO logging.rs:"), "got: {output}");
        assert!(
            output.contains("request{method=POST}: finished processing request status=200"),
            "got: {output}"
        );
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn nested_spans_are_listed_from_the_root() {
        let output = render(|| {
            let outer = info_span!("reload");
            let _outer = outer.enter();
            let inner = info_span!("request", method = %"GET");
            let _inner = inner.enter();
            info!("inside");
        });

        assert!(output.contains("reload:request{method=GET}: inside"), "got: {output}");
    }

    #[test]
    fn event_outside_any_span_has_no_prefix() {
        let output = render(|| info!(periods = 3, "tables loaded"));

        let (_, rest) = output.split_once("logging.rs:").unwrap();
        let (_, message) = rest.split_once(' ').unwrap();
        assert_eq!(message, "tables loaded periods=3\n");
    }

    #[test]
    fn source_path_keeps_the_part_after_src() {
        assert_eq!(source_path("tax-service/src/api.rs"), "api.rs");
        assert_eq!(source_path("tax-data/src/bin/loader.rs"), "bin/loader.rs");
        assert_eq!(source_path("tax-service\\src\\app.rs"), "app.rs");
        assert_eq!(source_path("main.rs"), "main.rs");
    }

    #[test]
    fn file_slot_discards_until_a_file_is_set() {
        let slot = FileSlot::default();
        let mut writer = slot.make_writer();

        assert_eq!(writer.write(b"dropped").unwrap(), 7);
        writer.flush().unwrap();
    }
}
