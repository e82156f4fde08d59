//! `interact`: browser actions executed by the extension's AI Web Pilot.

use super::observe::command_outcome;
use super::{Param, ParamType, ToolArgs, ToolContext, ToolDef, ToolName, param, queue_command, to_json};
use crate::mcp::{ErrorCode, StructuredError, ToolContent, ToolResult};
use crate::pending::{CommandStatus, PendingCommand};
use serde_json::{Value, json};
use std::time::Duration;
use strum::{AsRefStr, EnumString, VariantNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum InteractAction {
    Navigate,
    Refresh,
    Back,
    Forward,
    NewTab,
    Click,
    Type,
    Select,
    KeyPress,
    Focus,
    ScrollTo,
    WaitFor,
    GetText,
    GetAttribute,
    Highlight,
    ExecuteJs,
    ListInteractive,
    Screenshot,
}

impl InteractAction {
    fn required_params(self) -> &'static [&'static str] {
        match self {
            Self::Navigate | Self::NewTab => &["url"],
            Self::Click
            | Self::Focus
            | Self::ScrollTo
            | Self::WaitFor
            | Self::GetText
            | Self::Highlight => &["selector"],
            Self::Type => &["selector", "text"],
            Self::Select => &["selector", "value"],
            Self::KeyPress => &["text"],
            Self::GetAttribute => &["selector", "name"],
            Self::ExecuteJs => &["script"],
            Self::Refresh | Self::Back | Self::Forward | Self::ListInteractive | Self::Screenshot => {
                &[]
            }
        }
    }
}

const PARAMS: &[Param] = &[
    param("url", ParamType::String, "navigate, new_tab: destination URL"),
    param("selector", ParamType::String, "CSS selector of the target element"),
    param("text", ParamType::String, "type: text to enter; key_press: key name"),
    param("value", ParamType::String, "select: option value"),
    param("name", ParamType::String, "get_attribute: attribute name"),
    param("script", ParamType::String, "execute_js: JavaScript to evaluate"),
    param("tab_id", ParamType::Integer, "Target tab; defaults to the tracked tab"),
    param(
        "sync",
        ParamType::Boolean,
        "Wait for the result instead of returning a correlation_id",
    ),
    param(
        "timeout_ms",
        ParamType::Integer,
        "sync: how long to wait (capped by the server)",
    ),
];

pub static DEFINITION: ToolDef = ToolDef {
    name: ToolName::Interact,
    description: "Drive the tracked browser tab: navigate, click, type, select, press keys, \
                  read text and attributes, run JavaScript, list interactive elements, take \
                  screenshots. Requires AI Web Pilot to be enabled in the extension.",
    discriminator: "action",
    modes: InteractAction::VARIANTS,
    params: PARAMS,
};

const DEFAULT_SYNC_WAIT: Duration = Duration::from_secs(10);

pub async fn handle(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let action: InteractAction = args.mode("action")?;

    if ctx.daemon.tracking.pilot_disabled() {
        return Err(StructuredError::new(
            ErrorCode::PilotDisabled,
            "AI Web Pilot is disabled in the extension",
        )
        .with_hint("Open the extension popup and enable AI Web Pilot, then retry."));
    }
    for name in action.required_params() {
        args.require_str(name)?;
    }

    let tab_id = args.get("tab_id").and_then(Value::as_i64);
    let params = args.without(&["action", "tab_id", "sync", "timeout_ms", "telemetry_mode"]);
    let correlation_id = queue_command(ctx, action.as_ref(), params, tab_id);
    tracing::debug!(kind = action.as_ref(), %correlation_id, "interact command queued");

    if !args.bool("sync").unwrap_or(false) {
        return queued(ctx, action, &correlation_id);
    }

    let max_wait = ctx.daemon.config().pending.max_wait();
    let wait = args
        .u64("timeout_ms")
        .map_or(DEFAULT_SYNC_WAIT, Duration::from_millis)
        .min(max_wait);
    match ctx.daemon.pending.wait(&correlation_id, wait).await {
        Some(command) if command.status.is_terminal() => finished(action, &command),
        Some(_) => {
            let mut result = queued(ctx, action, &correlation_id)?;
            result.push_text(format!(
                "Still pending after {} ms; poll observe(what:\"command_result\") for the outcome.",
                wait.as_millis()
            ));
            Ok(result)
        }
        None => Err(StructuredError::new(
            ErrorCode::NoData,
            format!("Command {correlation_id} disappeared before completing"),
        )),
    }
}

fn queued(
    ctx: ToolContext<'_>,
    action: InteractAction,
    correlation_id: &str,
) -> Result<ToolResult, StructuredError> {
    let connected = ctx.daemon.tracking.is_connected();
    Ok(ToolResult::json(
        &format!("{} queued", action.as_ref()),
        &json!({
            "status": "queued",
            "correlation_id": correlation_id,
            "action": action.as_ref(),
            "extension_connected": connected,
            "hint": format!(
                "Poll observe(what:\"command_result\", correlation_id:\"{correlation_id}\") for the result."
            ),
        }),
    ))
}

fn finished(action: InteractAction, command: &PendingCommand) -> Result<ToolResult, StructuredError> {
    if action == InteractAction::Screenshot
        && command.status == CommandStatus::Complete
        && let Some((mime_type, data)) = command.result.as_ref().and_then(screenshot_image)
    {
        let mut meta = command.clone();
        if let Some(Value::Object(result)) = meta.result.as_mut() {
            result.remove("data_url");
            result.remove("data");
        }
        let mut result = ToolResult::json(
            &format!("Screenshot captured ({mime_type})"),
            &to_json(&meta)?,
        );
        result.content.push(ToolContent::Image { data, mime_type });
        return Ok(result);
    }
    command_outcome(command)
}

/// Accepts `{data_url:"data:image/png;base64,..."}` or `{data, mime_type}`.
fn screenshot_image(result: &Value) -> Option<(String, String)> {
    if let Some(url) = result.get("data_url").and_then(Value::as_str) {
        let (header, data) = url.strip_prefix("data:")?.split_once(";base64,")?;
        return Some((header.to_string(), data.to_string()));
    }
    let data = result.get("data").and_then(Value::as_str)?;
    let mime_type = result
        .get("mime_type")
        .and_then(Value::as_str)
        .unwrap_or("image/png");
    Some((mime_type.to_string(), data.to_string()))
}
