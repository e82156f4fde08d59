//! The five assistant-facing tools.
//!
//! Each tool is a two-level switch: the tool name, then a discriminator
//! argument (`what`, `format` or `action`) selecting the leaf handler.

pub mod analyze;
pub mod args;
pub mod configure;
pub mod generate;
pub mod interact;
pub mod observe;

pub use args::ToolArgs;

use crate::daemon::Daemon;
use crate::mcp::{ErrorCode, StructuredError, ToolResult};
use crate::pending::NewCommand;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ToolName {
    Observe,
    Analyze,
    Generate,
    Configure,
    Interact,
}

// ─── Declarations ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    StringArray,
}

impl ParamType {
    /// JSON Schema `type` keyword.
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::StringArray => "array",
        }
    }
}

/// One declared tool argument.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
}

pub const fn param(name: &'static str, kind: ParamType, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
    }
}

/// Static description of a tool: its discriminator, the values it accepts
/// and every other argument it understands.
#[derive(Debug, Clone, Copy)]
pub struct ToolDef {
    pub name: ToolName,
    pub description: &'static str,
    pub discriminator: &'static str,
    pub modes: &'static [&'static str],
    pub params: &'static [Param],
}

/// Accepted by every tool.
pub const TELEMETRY_MODE_PARAM: Param = param(
    "telemetry_mode",
    ParamType::String,
    "Passive telemetry for this call: off, auto (default) or full",
);

impl ToolDef {
    pub fn known_params(&self) -> Vec<&'static str> {
        std::iter::once(self.discriminator)
            .chain(self.params.iter().map(|p| p.name))
            .chain(std::iter::once(TELEMETRY_MODE_PARAM.name))
            .collect()
    }
}

pub fn definitions() -> [&'static ToolDef; 5] {
    [
        &observe::DEFINITION,
        &analyze::DEFINITION,
        &generate::DEFINITION,
        &configure::DEFINITION,
        &interact::DEFINITION,
    ]
}

pub fn definition(name: ToolName) -> &'static ToolDef {
    match name {
        ToolName::Observe => &observe::DEFINITION,
        ToolName::Analyze => &analyze::DEFINITION,
        ToolName::Generate => &generate::DEFINITION,
        ToolName::Configure => &configure::DEFINITION,
        ToolName::Interact => &interact::DEFINITION,
    }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// Collaborators a leaf handler may use for one call.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    pub daemon: &'a Daemon,
    pub client_id: &'a str,
}

/// Routes a validated tool call to its leaf handler.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    daemon: Arc<Daemon>,
}

impl ToolDispatcher {
    pub fn new(daemon: Arc<Daemon>) -> Self {
        Self { daemon }
    }

    pub async fn call(
        &self,
        tool: ToolName,
        args: &ToolArgs,
        client_id: &str,
    ) -> Result<ToolResult, StructuredError> {
        let ctx = ToolContext {
            daemon: &self.daemon,
            client_id,
        };
        match tool {
            ToolName::Observe => observe::handle(ctx, args),
            ToolName::Analyze => analyze::handle(ctx, args),
            ToolName::Generate => generate::handle(ctx, args),
            ToolName::Configure => configure::handle(ctx, args),
            ToolName::Interact => interact::handle(ctx, args).await,
        }
    }
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, StructuredError> {
    serde_json::to_value(value).map_err(|e| {
        StructuredError::new(
            ErrorCode::MarshalFailed,
            format!("failed to serialize response: {e}"),
        )
    })
}

/// Queue a browser command for the extension and return its correlation id.
/// The tracked tab is used unless the caller names one.
pub(crate) fn queue_command(
    ctx: ToolContext<'_>,
    kind: &str,
    params: Value,
    tab_id: Option<i64>,
) -> String {
    let tab_id = tab_id.or_else(|| ctx.daemon.tracking.snapshot().tracked_tab_id);
    ctx.daemon.pending.create(NewCommand {
        kind: kind.to_string(),
        params,
        tab_id,
        client_id: ctx.client_id.to_string(),
        timeout: ctx.daemon.config().pending.command_timeout(),
    })
}
