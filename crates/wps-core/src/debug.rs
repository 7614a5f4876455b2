use core::fmt;
use std::fs::OpenOptions;
use std::io;
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt as tracingfmt};

/// if `cond` is false, logs a warning with your message.
#[macro_export]
macro_rules! assert_warn {
    ($cond:expr, $($arg:tt)+) => {{
        if !$cond {
            tracing::warn!(
                target: module_path!(),
                "assertion warning: `{}` failed: {} at {}:{}",
                stringify!($cond),
                format_args!($($arg)+),
                file!(),
                line!(),
            );
        }
    }};
}

struct AlignedFormatter;

/// Pulls the optional `frame` field out of an event so it can be printed in the prefix
struct FrameVisitor {
    frame: Option<String>,
}

impl tracing::field::Visit for FrameVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "frame" {
            self.frame = Some(format!("{:>8?}", value));
        }
    }
}

impl<S, N> FormatEvent<S, N> for AlignedFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: format::Writer<'_>, event: &tracing::Event<'_>) -> fmt::Result {
        let metadata = event.metadata();

        let mut visitor = FrameVisitor { frame: None };
        event.record(&mut visitor);
        let has_frame = visitor.frame.is_some();
        let frame_str = visitor.frame.unwrap_or_else(|| "        ".to_string());

        let (color_level, color_reset) = if writer.has_ansi_escapes() {
            match *metadata.level() {
                tracing::Level::ERROR => ("\x1b[31m", "\x1b[0m"),
                tracing::Level::WARN => ("\x1b[33m", "\x1b[0m"),
                tracing::Level::INFO => ("\x1b[32m", "\x1b[0m"),
                tracing::Level::DEBUG => ("\x1b[34m", "\x1b[0m"),
                tracing::Level::TRACE => ("\x1b[35m", "\x1b[0m"),
            }
        } else {
            ("", "")
        };

        // "crates/wps-link/src/multi_radio.rs" becomes "frame [link] multi_radio.rs"
        let file_path = metadata.file().unwrap_or("unknown");
        let formatted_path = if let Some(src_idx) = file_path.find("/src/") {
            let before_src = &file_path[..src_idx];
            let after_src = &file_path[src_idx + 5..];
            let crate_name = if let Some(wps_idx) = before_src.rfind("wps-") {
                &before_src[wps_idx + 4..]
            } else {
                before_src.rsplit('/').next().unwrap_or("unknown")
            };
            format!("{} [{}] {}", frame_str, crate_name, after_src)
        } else {
            file_path.to_string()
        };

        let location = format!(
            "{}{:<5}{} {}:{}:",
            color_level,
            metadata.level(),
            color_reset,
            formatted_path,
            metadata.line().unwrap_or(0)
        );

        let mut message_buf = String::new();
        let message_writer = format::Writer::new(&mut message_buf);
        ctx.field_format().format_fields(message_writer, event)?;

        // The frame number is already in the prefix
        if has_frame {
            if let Some(frame_idx) = message_buf.find("frame=") {
                if let Some(space_idx) = message_buf[frame_idx..].find(' ') {
                    message_buf.replace_range(frame_idx..frame_idx + space_idx + 1, "");
                } else {
                    message_buf.truncate(frame_idx);
                }
            }
        }

        write!(writer, "{:<width$} {}", location, message_buf, width = 60)?;
        writeln!(writer)
    }
}

static INIT_LOG: Once = Once::new();

/// Sets up logging with maximum verbosity (trace level)
/// Mainly for unit tests
pub fn setup_logging_verbose() {
    setup_logging(EnvFilter::new("trace"), None);
}

/// Sets up default logging to stdout and optionally, a verbose log file
/// Returns a guard, that needs to be kept alive for logging to file to work
pub fn setup_logging_default(verbose_logfile: Option<String>) -> io::Result<Option<WorkerGuard>> {
    let stdout_filter = get_default_stdout_filter();
    let outfile = match verbose_logfile {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some((file, get_default_logfile_filter()))
        }
        None => None,
    };
    Ok(setup_logging(stdout_filter, outfile))
}

pub fn get_default_stdout_filter() -> EnvFilter {
    // Per-frame paths stay quiet on stdout, decisions and state changes are shown
    EnvFilter::new(
        [
            "info",
            "wps_link::link_protocol=info",
            "wps_link::rdo=info",
            "wps_link::lqi=info",
            "wps_link::tdma_sync=info",
            "wps_link::saw_arq=info",
            "wps_link::channel_hopping=debug",
            "wps_link::multi_radio=debug",
            "wps_link::header=debug",
            "wps_core::fixed_point=warn",
        ]
        .join(","),
    )
}

fn get_default_logfile_filter() -> EnvFilter {
    EnvFilter::new("debug")
}

/// Sets up logging to stdout and optionally, a verbose log file
/// If an output file is requested, returns Some<WorkerGuard>. Keep this value alive
/// or logging to file may cease working. If no output file is provided, returns None.
fn setup_logging(stdout_filter: EnvFilter, outfile: Option<(std::fs::File, EnvFilter)>) -> Option<WorkerGuard> {
    if let Some((file, outfile_filter)) = outfile {
        let (file_writer, guard) = tracing_appender::non_blocking(file);

        INIT_LOG.call_once(|| {
            let file_layer = tracingfmt::layer()
                .event_format(AlignedFormatter)
                .with_writer(file_writer)
                .with_ansi(false);
            let stdout_layer = tracingfmt::layer().event_format(AlignedFormatter);

            // try_init: a test harness may already have installed a global subscriber
            let _ = tracing_subscriber::registry()
                .with(file_layer.with_filter(outfile_filter))
                .with(stdout_layer.with_filter(stdout_filter))
                .try_init();
        });

        Some(guard)
    } else {
        INIT_LOG.call_once(|| {
            let stdout_layer = tracingfmt::layer().event_format(AlignedFormatter).with_test_writer();
            let _ = tracing_subscriber::registry()
                .with(stdout_layer.with_filter(stdout_filter))
                .try_init();
        });
        None
    }
}
