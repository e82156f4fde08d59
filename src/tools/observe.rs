//! `observe`: read the passive capture buffers and the command registry.

use super::{Param, ParamType, ToolArgs, ToolContext, ToolDef, ToolName, param, to_json};
use crate::capture::{
    ActionFilter, EnhancedAction, LogEntry, LogFilter, NetworkBody, NetworkFilter, Page,
    PageRequest, Pagination, Stamped, WebSocketEvent, WebSocketFilter,
};
use crate::mcp::{ErrorCode, StructuredError, ToolResult};
use crate::pending::{CommandStatus, PendingCommand};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString, VariantNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum ObserveWhat {
    Errors,
    Logs,
    ExtensionLogs,
    NetworkBodies,
    WebsocketEvents,
    WebsocketStatus,
    Actions,
    Vitals,
    Page,
    Pilot,
    Timeline,
    ErrorBundles,
    CommandResult,
    PendingCommands,
    FailedCommands,
}

const PARAMS: &[Param] = &[
    param("limit", ParamType::Integer, "Maximum entries to return (default 100, max 1000)"),
    param("last_n", ParamType::Integer, "Alias of limit"),
    param("after_cursor", ParamType::String, "Return entries newer than this cursor"),
    param("before_cursor", ParamType::String, "Return entries older than this cursor"),
    param("since_cursor", ParamType::String, "Return this cursor's entry and newer"),
    param(
        "restart_on_eviction",
        ParamType::Boolean,
        "Resume from the oldest entry when the cursor was evicted",
    ),
    param("level", ParamType::String, "logs: exact level (error, warn, info, debug, trace)"),
    param("min_level", ParamType::String, "logs: this level and above"),
    param("source", ParamType::String, "logs: exact source"),
    param("url", ParamType::String, "Substring filter on the URL"),
    param("method", ParamType::String, "network_bodies: HTTP method"),
    param("status_min", ParamType::Integer, "network_bodies: minimum status"),
    param("status_max", ParamType::Integer, "network_bodies: maximum status"),
    param("connection_id", ParamType::String, "websocket_*: connection id"),
    param("direction", ParamType::String, "websocket_events: incoming or outgoing"),
    param("event", ParamType::String, "websocket_events: open, message, close or error"),
    param("action_type", ParamType::String, "actions: click, input, navigate, ..."),
    param("correlation_id", ParamType::String, "command_result: id returned by analyze/interact"),
    param(
        "window_seconds",
        ParamType::Integer,
        "error_bundles: context window before each error (default 3)",
    ),
];

pub static DEFINITION: ToolDef = ToolDef {
    name: ToolName::Observe,
    description: "Read captured browser telemetry: console errors and logs, network bodies, \
                  WebSocket traffic, user actions, Web Vitals, the tracked page, and results of \
                  async commands. Reads are paginated with cursors in metadata.",
    discriminator: "what",
    modes: ObserveWhat::VARIANTS,
    params: PARAMS,
};

pub fn handle(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let what: ObserveWhat = args.mode("what")?;
    match what {
        ObserveWhat::Errors => errors(ctx, args),
        ObserveWhat::Logs => logs(ctx, args),
        ObserveWhat::ExtensionLogs => extension_logs(ctx, args),
        ObserveWhat::NetworkBodies => network_bodies(ctx, args),
        ObserveWhat::WebsocketEvents => websocket_events(ctx, args),
        ObserveWhat::WebsocketStatus => websocket_status(ctx, args),
        ObserveWhat::Actions => actions(ctx, args),
        ObserveWhat::Vitals => vitals(ctx, args),
        ObserveWhat::Page => page(ctx),
        ObserveWhat::Pilot => pilot(ctx),
        ObserveWhat::Timeline => timeline(ctx, args),
        ObserveWhat::ErrorBundles => error_bundles(ctx, args),
        ObserveWhat::CommandResult => command_result(ctx, args),
        ObserveWhat::PendingCommands => pending_commands(ctx),
        ObserveWhat::FailedCommands => failed_commands(ctx),
    }
}

fn page_request(args: &ToolArgs) -> Result<PageRequest, StructuredError> {
    let paging: Pagination = args.decode()?;
    Ok(paging.to_request()?)
}

fn page_result<T: Serialize>(
    key: &str,
    noun: &str,
    page: &Page<T>,
) -> Result<ToolResult, StructuredError> {
    let mut data = Map::new();
    data.insert(key.to_string(), to_json(&page.entries)?);
    data.insert("metadata".into(), to_json(&page.meta)?);

    let mut summary = format!("{} {noun} (total {})", page.meta.count, page.meta.total);
    if page.meta.has_more {
        summary.push_str(", more available");
    }
    if let Some(warning) = &page.meta.warning {
        summary.push_str(&format!(". {warning}"));
    }
    Ok(ToolResult::json(&summary, &Value::Object(data)))
}

// ─── Buffer reads ────────────────────────────────────────────────────────────

fn errors(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let filter = LogFilter {
        url: args.str("url").map(str::to_string),
        source: args.str("source").map(str::to_string),
        ..LogFilter::errors_only()
    };
    let page = ctx.daemon.capture.read_logs_without_noise(
        &page_request(args)?,
        &filter,
        &ctx.daemon.noise,
    )?;
    page_result("errors", "errors", &page)
}

fn logs(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let filter: LogFilter = args.decode()?;
    let page = ctx.daemon.capture.read_logs_without_noise(
        &page_request(args)?,
        &filter,
        &ctx.daemon.noise,
    )?;
    page_result("logs", "log entries", &page)
}

fn extension_logs(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let page = ctx
        .daemon
        .capture
        .read_extension_logs(&page_request(args)?)?;
    page_result("logs", "extension log entries", &page)
}

fn network_bodies(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let filter: NetworkFilter = args.decode()?;
    let page = ctx
        .daemon
        .capture
        .read_network(&page_request(args)?, &filter)?;
    page_result("network_request_response_pairs", "network bodies", &page)
}

fn websocket_events(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let filter: WebSocketFilter = args.decode()?;
    let page = ctx
        .daemon
        .capture
        .read_websocket(&page_request(args)?, &filter)?;
    page_result("events", "WebSocket events", &page)
}

fn websocket_status(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let status = ctx
        .daemon
        .capture
        .websocket_status(args.str("url"), args.str("connection_id"));
    let summary = format!(
        "{} open, {} recently closed WebSocket connections",
        status.connections.len(),
        status.closed.len()
    );
    Ok(ToolResult::json(&summary, &to_json(&status)?))
}

fn actions(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let filter: ActionFilter = args.decode()?;
    let page = ctx
        .daemon
        .capture
        .read_actions(&page_request(args)?, &filter)?;
    page_result("entries", "user actions", &page)
}

fn vitals(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let page = ctx.daemon.capture.read_vitals(&page_request(args)?)?;
    let mut result = page_result("snapshots", "vitals snapshots", &page)?;
    if page.entries.is_empty() {
        result.push_text(
            "No Web Vitals yet. Vitals are reported after the page finishes loading; \
             reload the tracked tab if needed.",
        );
    }
    Ok(result)
}

// ─── Tracking ────────────────────────────────────────────────────────────────

fn page(ctx: ToolContext<'_>) -> Result<ToolResult, StructuredError> {
    let state = ctx.daemon.tracking.snapshot();
    let connected = ctx.daemon.tracking.is_connected();
    let data = json!({
        "url": state.tracked_tab_url,
        "title": state.tracked_tab_title,
        "tab_id": state.tracked_tab_id,
        "tracking_enabled": state.tracking_enabled,
        "extension_connected": connected,
    });
    let summary = match (&state.tracked_tab_url, connected) {
        (Some(url), true) => format!("Tracked page: {url}"),
        (_, false) => "Extension is not connected".to_string(),
        (None, true) => "No tab is being tracked".to_string(),
    };
    Ok(ToolResult::json(&summary, &data))
}

fn pilot(ctx: ToolContext<'_>) -> Result<ToolResult, StructuredError> {
    let state = ctx.daemon.tracking.snapshot();
    let connected = ctx.daemon.tracking.is_connected();
    let data = json!({
        "enabled": state.pilot_enabled,
        "reported": state.reported_once,
        "extension_connected": connected,
        "source": if state.reported_once { "extension_sync" } else { "unknown" },
    });
    let summary = if state.pilot_enabled {
        "AI Web Pilot is enabled"
    } else if state.reported_once {
        "AI Web Pilot is disabled"
    } else {
        "AI Web Pilot state not reported yet"
    };
    Ok(ToolResult::json(summary, &data))
}

// ─── Cross-buffer views ──────────────────────────────────────────────────────

const TIMELINE_DEFAULT_LIMIT: usize = 50;
const BUNDLE_DEFAULT_LIMIT: usize = 5;
const BUNDLE_MAX_LIMIT: usize = 20;
const BUNDLE_CONTEXT_ITEMS: usize = 10;
const SCAN_DEPTH: usize = 1000;

#[derive(Debug, Serialize)]
struct TimelineEntry {
    at: String,
    kind: &'static str,
    summary: String,
    #[serde(skip)]
    instant: DateTime<Utc>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn log_line(entry: &LogEntry) -> String {
    let level = entry.level().map_or_else(|| "log".to_string(), |l| l.to_string());
    format!("[{level}] {}", entry.message())
}

fn network_line(body: &NetworkBody) -> String {
    format!("{} {} -> {}", body.method, body.url, body.status)
}

fn action_line(action: &EnhancedAction) -> String {
    match (action.kind.as_str(), action.preferred_selector()) {
        ("navigate", _) => format!(
            "navigate to {}",
            action.to_url.as_deref().unwrap_or(&action.url)
        ),
        (kind, Some(selector)) => format!("{kind} {selector}"),
        (kind, None) => kind.to_string(),
    }
}

fn websocket_line(event: &WebSocketEvent) -> String {
    match event.direction.as_deref() {
        Some(direction) => format!("{} {direction} {}", event.event, event.url),
        None => format!("{} {}", event.event, event.url),
    }
}

fn timeline_entries<T>(
    entries: &[Stamped<T>],
    kind: &'static str,
    line: impl Fn(&T) -> String,
) -> impl Iterator<Item = TimelineEntry> {
    entries.iter().map(move |stamped| TimelineEntry {
        at: timestamp(stamped.ingested_at),
        kind,
        summary: line(&stamped.record),
        instant: stamped.ingested_at,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimelineParams {
    limit: Option<usize>,
    last_n: Option<usize>,
}

fn timeline(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let params: TimelineParams = args.decode()?;
    let limit = params
        .limit
        .or(params.last_n)
        .unwrap_or(TIMELINE_DEFAULT_LIMIT)
        .clamp(1, SCAN_DEPTH);
    let request = PageRequest::newest(limit);
    let capture = &ctx.daemon.capture;

    let logs = capture.read_logs(&request, &LogFilter::default())?;
    let network = capture.read_network(&request, &NetworkFilter::default())?;
    let actions = capture.read_actions(&request, &ActionFilter::default())?;
    let websocket = capture.read_websocket(&request, &WebSocketFilter::default())?;

    let mut entries: Vec<TimelineEntry> = timeline_entries(&logs.entries, "log", log_line)
        .chain(timeline_entries(&network.entries, "network", network_line))
        .chain(timeline_entries(&actions.entries, "action", action_line))
        .chain(timeline_entries(&websocket.entries, "websocket", websocket_line))
        .collect();
    entries.sort_by_key(|e| e.instant);
    let skip = entries.len().saturating_sub(limit);
    let entries: Vec<TimelineEntry> = entries.into_iter().skip(skip).collect();

    let summary = format!("{} timeline entries, oldest first", entries.len());
    Ok(ToolResult::json(
        &summary,
        &json!({ "entries": to_json(&entries)?, "count": entries.len() }),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BundleParams {
    limit: Option<usize>,
    last_n: Option<usize>,
    window_seconds: Option<u64>,
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBundle<'a> {
    error: &'a Stamped<LogEntry>,
    network: Vec<&'a Stamped<NetworkBody>>,
    actions: Vec<&'a Stamped<EnhancedAction>>,
    logs: Vec<&'a Stamped<LogEntry>>,
}

/// Entries at or before `at` and inside the window, nearest last.
fn in_window<'a, T>(
    entries: &'a [Stamped<T>],
    at: DateTime<Utc>,
    window: ChronoDuration,
    keep: impl Fn(&T) -> bool,
) -> Vec<&'a Stamped<T>> {
    let start = at - window;
    let matching: Vec<&Stamped<T>> = entries
        .iter()
        .filter(|e| e.ingested_at >= start && e.ingested_at <= at && keep(&e.record))
        .collect();
    let skip = matching.len().saturating_sub(BUNDLE_CONTEXT_ITEMS);
    matching.into_iter().skip(skip).collect()
}

fn error_bundles(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let params: BundleParams = args.decode()?;
    let limit = params
        .limit
        .or(params.last_n)
        .unwrap_or(BUNDLE_DEFAULT_LIMIT)
        .clamp(1, BUNDLE_MAX_LIMIT);
    let window = ChronoDuration::seconds(
        i64::try_from(params.window_seconds.unwrap_or(3).min(60)).unwrap_or(3),
    );
    let capture = &ctx.daemon.capture;

    let error_filter = LogFilter {
        url: params.url,
        ..LogFilter::errors_only()
    };
    let errors = capture.read_logs(&PageRequest::newest(limit), &error_filter)?;
    let scan = PageRequest::newest(SCAN_DEPTH);
    let logs = capture.read_logs(&scan, &LogFilter::default())?;
    let network = capture.read_network(&scan, &NetworkFilter::default())?;
    let actions = capture.read_actions(&scan, &ActionFilter::default())?;

    let bundles: Vec<ErrorBundle<'_>> = errors
        .entries
        .iter()
        .map(|error| ErrorBundle {
            error,
            network: in_window(&network.entries, error.ingested_at, window, |_| true),
            actions: in_window(&actions.entries, error.ingested_at, window, |_| true),
            logs: in_window(&logs.entries, error.ingested_at, window, |l| !l.is_error()),
        })
        .collect();

    let summary = if bundles.is_empty() {
        "No errors captured".to_string()
    } else {
        format!("{} error bundles with surrounding context", bundles.len())
    };
    Ok(ToolResult::json(
        &summary,
        &json!({ "bundles": to_json(&bundles)?, "count": bundles.len() }),
    ))
}

// ─── Async commands ──────────────────────────────────────────────────────────

fn command_result(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let id = args.require_str("correlation_id")?;
    let command = ctx.daemon.pending.get(id).ok_or_else(|| {
        StructuredError::new(
            ErrorCode::NoData,
            format!("No command with correlation_id '{id}'. It may have expired or never existed."),
        )
        .with_param("correlation_id")
        .with_retry("Check the correlation_id, or queue the command again.")
    })?;
    command_outcome(&command)
}

/// Tool result for a command in any state.
pub(crate) fn command_outcome(command: &PendingCommand) -> Result<ToolResult, StructuredError> {
    let id = &command.correlation_id;
    match command.status {
        CommandStatus::Pending => Ok(ToolResult::json(
            &format!("Command {id} is still pending"),
            &to_json(command)?,
        )),
        CommandStatus::Complete => Ok(ToolResult::json(
            &format!("Command {id} complete"),
            &to_json(command)?,
        )),
        CommandStatus::Error => Err(StructuredError::new(
            ErrorCode::ExtensionError,
            format!(
                "Command {id} failed: {}",
                command.error.as_deref().unwrap_or("no error message")
            ),
        )),
        CommandStatus::Expired | CommandStatus::Timeout => Err(StructuredError::new(
            ErrorCode::ExtensionTimeout,
            format!(
                "Command {id} {} before the extension returned a result",
                if command.status == CommandStatus::Expired {
                    "expired"
                } else {
                    "timed out"
                }
            ),
        )
        .with_hint(format!("status: {}", command.status))),
    }
}

fn pending_commands(ctx: ToolContext<'_>) -> Result<ToolResult, StructuredError> {
    let registry = &ctx.daemon.pending;
    let client = Some(ctx.client_id);
    let pending = registry.list_by_status(CommandStatus::Pending, client);
    let completed = registry.list_by_status(CommandStatus::Complete, client);
    let failed = failed_for(ctx);

    let summary = format!(
        "{} pending, {} completed, {} failed commands",
        pending.len(),
        completed.len(),
        failed.len()
    );
    Ok(ToolResult::json(
        &summary,
        &json!({
            "pending": to_json(&pending)?,
            "completed": to_json(&completed)?,
            "failed": to_json(&failed)?,
        }),
    ))
}

fn failed_for(ctx: ToolContext<'_>) -> Vec<PendingCommand> {
    let mut failed: Vec<PendingCommand> = [
        CommandStatus::Error,
        CommandStatus::Expired,
        CommandStatus::Timeout,
    ]
    .into_iter()
    .flat_map(|status| ctx.daemon.pending.list_by_status(status, Some(ctx.client_id)))
    .collect();
    failed.sort_by_key(|c| c.created_at);
    failed
}

fn failed_commands(ctx: ToolContext<'_>) -> Result<ToolResult, StructuredError> {
    let failed = failed_for(ctx);
    let summary = format!("{} failed commands", failed.len());
    Ok(ToolResult::json(
        &summary,
        &json!({ "failed": to_json(&failed)?, "count": failed.len() }),
    ))
}
