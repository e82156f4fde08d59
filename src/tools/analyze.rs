//! `analyze`: queue an inspection of the tracked page for the extension.

use super::{Param, ParamType, ToolArgs, ToolContext, ToolDef, ToolName, param, queue_command};
use crate::mcp::{StructuredError, ToolResult};
use serde_json::json;
use strum::{AsRefStr, EnumString, VariantNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AnalyzeWhat {
    Dom,
    Accessibility,
    Performance,
    SecurityAudit,
    PageSummary,
    LinkHealth,
}

const PARAMS: &[Param] = &[
    param("selector", ParamType::String, "dom: CSS selector to query (required)"),
    param("scope", ParamType::String, "accessibility: CSS selector limiting the audit"),
    param(
        "tags",
        ParamType::StringArray,
        "accessibility: axe rule tags, e.g. wcag2a",
    ),
    param("checks", ParamType::StringArray, "security_audit: checks to run"),
    param("domain", ParamType::String, "link_health: restrict to links on this host"),
    param("tab_id", ParamType::Integer, "Target tab; defaults to the tracked tab"),
];

pub static DEFINITION: ToolDef = ToolDef {
    name: ToolName::Analyze,
    description: "Run an active analysis in the browser: DOM queries, accessibility audits, \
                  performance and security checks, page summaries, link health. Returns a \
                  correlation_id; read the result with observe(what:\"command_result\").",
    discriminator: "what",
    modes: AnalyzeWhat::VARIANTS,
    params: PARAMS,
};

pub fn handle(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let what: AnalyzeWhat = args.mode("what")?;
    if what == AnalyzeWhat::Dom {
        args.require_str("selector")?;
    }

    let tab_id = args.get("tab_id").and_then(serde_json::Value::as_i64);
    let params = args.without(&["what", "tab_id", "telemetry_mode"]);
    let correlation_id = queue_command(ctx, what.as_ref(), params, tab_id);
    let connected = ctx.daemon.tracking.is_connected();
    tracing::debug!(kind = what.as_ref(), %correlation_id, "analyze command queued");

    let mut hint = format!(
        "Poll observe(what:\"command_result\", correlation_id:\"{correlation_id}\") for the result."
    );
    if !connected {
        hint.push_str(" The extension is not connected; the command runs once it syncs.");
    }

    Ok(ToolResult::json(
        &format!("{} queued", what.as_ref()),
        &json!({
            "status": "queued",
            "correlation_id": correlation_id,
            "what": what.as_ref(),
            "extension_connected": connected,
            "hint": hint,
        }),
    ))
}
