//! `configure`: daemon health, buffer clearing, the telemetry default, the
//! audit trail, noise rules and a capability listing.

use super::{
    Param, ParamType, ToolArgs, ToolContext, ToolDef, ToolName, definitions, param, to_json,
};
use crate::capture::{Category, NoiseMatchSpec, NoiseRuleError};
use crate::daemon::VERSION;
use crate::diagnostics::audit::AuditQuery;
use crate::diagnostics::health::daemon_health;
use crate::mcp::handler::LATEST_PROTOCOL_VERSION;
use crate::mcp::{StructuredError, ToolResult};
use crate::telemetry::TelemetryMode;
use serde_json::{Map, Value, json};
use strum::{EnumString, IntoEnumIterator, VariantNames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum ConfigureAction {
    Health,
    Clear,
    Telemetry,
    AuditLog,
    NoiseRule,
    DescribeCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
enum AuditOperation {
    Report,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
enum NoiseAction {
    Add,
    List,
    Remove,
    Reset,
}

const PARAMS: &[Param] = &[
    param(
        "buffer",
        ParamType::String,
        "clear: logs, network, websocket, actions, vitals, extension_logs or all (default)",
    ),
    param(
        "operation",
        ParamType::String,
        "audit_log: report (default) or clear",
    ),
    param("client_id", ParamType::String, "audit_log: only this client's calls"),
    param("tool_name", ParamType::String, "audit_log: only calls to this tool"),
    param(
        "limit",
        ParamType::Integer,
        "audit_log: most recent entries to return (default 100)",
    ),
    param(
        "noise_action",
        ParamType::String,
        "noise_rule: add, list (default), remove or reset",
    ),
    param(
        "classification",
        ParamType::String,
        "noise_rule add: label for the rule, e.g. extension or analytics",
    ),
    param("message_regex", ParamType::String, "noise_rule add: pattern for the message"),
    param("source_regex", ParamType::String, "noise_rule add: pattern for the source"),
    param("url_regex", ParamType::String, "noise_rule add: pattern for the page url"),
    param("level", ParamType::String, "noise_rule add: exact console level"),
    param("rule_id", ParamType::String, "noise_rule remove: id returned by add"),
];

pub static DEFINITION: ToolDef = ToolDef {
    name: ToolName::Configure,
    description: "Inspect and adjust the session: daemon and extension health, clear capture \
                  buffers, read or set the default telemetry_mode, review the per-client \
                  audit_log, manage noise_rule filters for console output, and \
                  describe_capabilities of every tool.",
    discriminator: "action",
    modes: ConfigureAction::VARIANTS,
    params: PARAMS,
};

pub fn handle(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    match args.mode::<ConfigureAction>("action")? {
        ConfigureAction::Health => health(ctx),
        ConfigureAction::Clear => clear(ctx, args),
        ConfigureAction::Telemetry => telemetry(ctx, args),
        ConfigureAction::AuditLog => audit_log(ctx, args),
        ConfigureAction::NoiseRule => noise_rule(ctx, args),
        ConfigureAction::DescribeCapabilities => describe_capabilities(),
    }
}

fn health(ctx: ToolContext<'_>) -> Result<ToolResult, StructuredError> {
    let health = daemon_health(ctx.daemon);
    let summary = format!(
        "Daemon {} (v{}), extension {}",
        health.status,
        health.version,
        if health.extension.connected {
            "connected"
        } else {
            "not connected"
        }
    );
    Ok(ToolResult::json(&summary, &to_json(&health)?))
}

fn clear(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let capture = &ctx.daemon.capture;
    let before = capture.sizes();
    let cleared: Vec<String> = match args.str("buffer").unwrap_or("all") {
        "all" => {
            capture.clear_all();
            Category::iter().map(|c| c.to_string()).collect()
        }
        raw => {
            let category: Category = raw.parse().map_err(|_| {
                let mut valid: Vec<String> = Category::iter().map(|c| c.to_string()).collect();
                valid.push("all".into());
                let valid: Vec<&str> = valid.iter().map(String::as_str).collect();
                StructuredError::unknown_mode("buffer", raw, &valid)
            })?;
            capture.clear(category);
            vec![category.to_string()]
        }
    };
    tracing::info!(buffers = ?cleared, "capture buffers cleared");

    let removed = before.total() - capture.sizes().total().min(before.total());
    Ok(ToolResult::json(
        &format!("Cleared {} ({removed} entries removed)", cleared.join(", ")),
        &json!({
            "cleared": cleared,
            "entries_removed": removed,
            "buffers": capture.sizes(),
        }),
    ))
}

fn telemetry(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let telemetry = &ctx.daemon.telemetry;
    let previous = telemetry.default_mode();
    if args.get("telemetry_mode").is_some() {
        let mode: TelemetryMode = args.mode("telemetry_mode")?;
        telemetry.set_default_mode(mode);
        tracing::info!(%previous, %mode, "default telemetry mode changed");
    }
    let current = telemetry.default_mode();

    let summary = if current == previous {
        format!("Telemetry mode is {current}")
    } else {
        format!("Telemetry mode changed from {previous} to {current}")
    };
    Ok(ToolResult::json(
        &summary,
        &json!({
            "telemetry_mode": current,
            "previous": previous,
            "valid_modes": TelemetryMode::VARIANTS,
        }),
    ))
}

fn audit_log(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let audit = &ctx.daemon.audit;
    let operation = match args.get("operation") {
        None => AuditOperation::Report,
        Some(_) => args.mode("operation")?,
    };
    if operation == AuditOperation::Clear {
        let cleared = audit.clear();
        tracing::info!(cleared, "audit trail cleared");
        return Ok(ToolResult::json(
            &format!("Cleared {cleared} audit entries"),
            &json!({"cleared": cleared}),
        ));
    }

    let limit = match args.get("limit") {
        None => None,
        Some(_) => {
            let raw = args.u64("limit").filter(|n| *n > 0).ok_or_else(|| {
                StructuredError::invalid_param("limit", "'limit' must be a positive integer")
            })?;
            Some(usize::try_from(raw).unwrap_or(usize::MAX))
        }
    };
    let entries = audit.query(&AuditQuery {
        client_id: args.str("client_id"),
        tool: args.str("tool_name"),
        limit,
    });
    let summary = match args.str("client_id") {
        Some(client) => format!("{} audit entries for {client}", entries.len()),
        None => format!("{} audit entries", entries.len()),
    };
    Ok(ToolResult::json(
        &summary,
        &json!({
            "count": entries.len(),
            "total_recorded": audit.len(),
            "entries": to_json(&entries)?,
        }),
    ))
}

fn noise_rule(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let noise = &ctx.daemon.noise;
    let action = match args.get("noise_action") {
        None => NoiseAction::List,
        Some(_) => args.mode("noise_action")?,
    };
    match action {
        NoiseAction::Add => {
            let spec: NoiseMatchSpec = args.decode()?;
            let classification = args.str("classification").unwrap_or("user");
            let id = noise
                .add(classification, spec)
                .map_err(noise_error)?;
            tracing::info!(rule = %id, classification, "noise rule added");
            Ok(ToolResult::json(
                &format!("Noise rule {id} added"),
                &json!({"rule_id": id, "total_rules": noise.len()}),
            ))
        }
        NoiseAction::Remove => {
            let id = args.require_str("rule_id")?;
            noise.remove(id).map_err(noise_error)?;
            Ok(ToolResult::json(
                &format!("Noise rule {id} removed"),
                &json!({"removed": id, "total_rules": noise.len()}),
            ))
        }
        NoiseAction::Reset => {
            let removed = noise.reset();
            Ok(ToolResult::json(
                &format!("Removed {removed} noise rules"),
                &json!({"removed": removed, "total_rules": 0}),
            ))
        }
        NoiseAction::List => {
            let rules = noise.list();
            Ok(ToolResult::json(
                &format!("{} noise rules", rules.len()),
                &json!({
                    "rules": to_json(&rules)?,
                    "statistics": to_json(&noise.statistics())?,
                }),
            ))
        }
    }
}

fn noise_error(err: NoiseRuleError) -> StructuredError {
    let message = err.to_string();
    match err {
        NoiseRuleError::InvalidPattern { field, .. } => StructuredError::invalid_param(field, message),
        NoiseRuleError::NotFound(_) => StructuredError::invalid_param("rule_id", message),
        NoiseRuleError::EmptySpec => StructuredError::invalid_param("message_regex", message)
            .with_hint("Pass message_regex, source_regex, url_regex or level"),
        NoiseRuleError::TooManyRules => StructuredError::invalid_param("noise_action", message)
            .with_hint("Remove unused rules or reset them first"),
    }
}

fn describe_capabilities() -> Result<ToolResult, StructuredError> {
    let mut tools = Map::new();
    for def in definitions() {
        let mut params: Vec<Value> = def
            .params
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "type": p.kind.json_type(),
                    "description": p.description,
                })
            })
            .collect();
        params.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        tools.insert(
            def.name.to_string(),
            json!({
                "dispatch_param": def.discriminator,
                "modes": def.modes,
                "params": params,
                "description": def.description,
            }),
        );
    }
    Ok(ToolResult::json(
        &format!("{} tools", tools.len()),
        &json!({
            "version": VERSION,
            "protocol_version": LATEST_PROTOCOL_VERSION,
            "tools": tools,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::LogEntry;
    use crate::mcp::ErrorCode;
    use crate::tools::test_support::{args, ctx, daemon, payload};

    #[test]
    fn health_reports_version_and_buffers() {
        let daemon = daemon();
        let data = payload(&handle(ctx(&daemon), &args(json!({"action": "health"}))).unwrap());
        assert_eq!(data["status"], "ok");
        assert_eq!(data["buffers"]["logs"], 0);
        assert_eq!(data["extension"]["connected"], false);
    }

    #[test]
    fn clear_single_buffer_and_all() {
        let daemon = daemon();
        daemon
            .capture
            .add_logs(vec![LogEntry::from(json!({"level": "info"}))]);
        daemon.capture.add_vitals(vec![Default::default()]);

        let data = payload(
            &handle(ctx(&daemon), &args(json!({"action": "clear", "buffer": "logs"}))).unwrap(),
        );
        assert_eq!(data["cleared"], json!(["logs"]));
        assert_eq!(data["buffers"]["logs"], 0);
        assert_eq!(data["buffers"]["vitals"], 1);

        let data = payload(&handle(ctx(&daemon), &args(json!({"action": "clear"}))).unwrap());
        assert_eq!(data["entries_removed"], 1);
        assert_eq!(data["buffers"]["vitals"], 0);
    }

    #[test]
    fn clear_unknown_buffer_lists_valid_values() {
        let daemon = daemon();
        let err = handle(
            ctx(&daemon),
            &args(json!({"action": "clear", "buffer": "cookies"})),
        )
        .unwrap_err();
        assert_eq!(err.error, ErrorCode::UnknownMode);
        assert!(err.hint.unwrap().contains("extension_logs"));
    }

    #[test]
    fn telemetry_sets_default_mode() {
        let daemon = daemon();
        let data = payload(
            &handle(
                ctx(&daemon),
                &args(json!({"action": "telemetry", "telemetry_mode": "full"})),
            )
            .unwrap(),
        );
        assert_eq!(data["telemetry_mode"], "full");
        assert_eq!(data["previous"], "auto");
        assert_eq!(daemon.telemetry.default_mode(), TelemetryMode::Full);

        let err = handle(
            ctx(&daemon),
            &args(json!({"action": "telemetry", "telemetry_mode": "loud"})),
        )
        .unwrap_err();
        assert_eq!(err.error, ErrorCode::UnknownMode);
    }

    #[test]
    fn audit_log_filters_by_client_and_clears() {
        use crate::diagnostics::audit::{AuditEntry, AuditOutcome};
        use std::time::Duration;

        let daemon = daemon();
        for (client, tool) in [("a", "observe"), ("b", "analyze"), ("a", "configure")] {
            daemon.audit.record(AuditEntry::new(
                client,
                tool,
                AuditOutcome::Ok,
                Duration::from_millis(1),
            ));
        }

        let data = payload(
            &handle(
                ctx(&daemon),
                &args(json!({"action": "audit_log", "client_id": "a"})),
            )
            .unwrap(),
        );
        assert_eq!(data["count"], 2);
        assert_eq!(data["total_recorded"], 3);
        assert_eq!(data["entries"][1]["tool"], "configure");

        let data = payload(
            &handle(ctx(&daemon), &args(json!({"action": "audit_log", "limit": 1}))).unwrap(),
        );
        assert_eq!(data["entries"][0]["client_id"], "a");
        assert_eq!(data["count"], 1);

        let err = handle(ctx(&daemon), &args(json!({"action": "audit_log", "limit": 0})))
            .unwrap_err();
        assert_eq!(err.error, ErrorCode::InvalidParam);

        let data = payload(
            &handle(
                ctx(&daemon),
                &args(json!({"action": "audit_log", "operation": "clear"})),
            )
            .unwrap(),
        );
        assert_eq!(data["cleared"], 3);
        assert!(daemon.audit.is_empty());
    }

    #[test]
    fn noise_rules_hide_matching_logs_until_removed() {
        use crate::tools::observe;

        let daemon = daemon();
        daemon.capture.add_logs(vec![
            LogEntry::from(json!({"level": "info", "message": "[HMR] connected"})),
            LogEntry::from(json!({"level": "error", "message": "TypeError: x is undefined"})),
        ]);
        let logs = |daemon: &crate::daemon::Daemon| {
            payload(&observe::handle(ctx(daemon), &args(json!({"what": "logs"}))).unwrap())
        };
        assert_eq!(logs(&daemon)["metadata"]["count"], 2);

        let added = payload(
            &handle(
                ctx(&daemon),
                &args(json!({"action": "noise_rule", "noise_action": "add",
                             "classification": "framework", "message_regex": "^\\[HMR\\]"})),
            )
            .unwrap(),
        );
        let rule_id = added["rule_id"].as_str().unwrap().to_string();
        assert_eq!(logs(&daemon)["metadata"]["count"], 1);

        let listed = payload(&handle(ctx(&daemon), &args(json!({"action": "noise_rule"}))).unwrap());
        assert_eq!(listed["rules"][0]["classification"], "framework");
        assert_eq!(listed["statistics"]["total_filtered"], 1);

        handle(
            ctx(&daemon),
            &args(json!({"action": "noise_rule", "noise_action": "remove", "rule_id": rule_id})),
        )
        .unwrap();
        assert_eq!(logs(&daemon)["metadata"]["count"], 2);
    }

    #[test]
    fn noise_rule_errors_name_the_bad_parameter() {
        let daemon = daemon();
        let err = handle(
            ctx(&daemon),
            &args(json!({"action": "noise_rule", "noise_action": "add", "url_regex": "("})),
        )
        .unwrap_err();
        assert_eq!(err.error, ErrorCode::InvalidParam);
        assert_eq!(err.param.as_deref(), Some("url_regex"));

        let err = handle(
            ctx(&daemon),
            &args(json!({"action": "noise_rule", "noise_action": "remove"})),
        )
        .unwrap_err();
        assert_eq!(err.error, ErrorCode::MissingParam);

        let err = handle(
            ctx(&daemon),
            &args(json!({"action": "noise_rule", "noise_action": "remove", "rule_id": "user_9"})),
        )
        .unwrap_err();
        assert_eq!(err.param.as_deref(), Some("rule_id"));

        let err = handle(
            ctx(&daemon),
            &args(json!({"action": "noise_rule", "noise_action": "mute"})),
        )
        .unwrap_err();
        assert_eq!(err.error, ErrorCode::UnknownMode);
    }

    #[test]
    fn describe_capabilities_lists_every_tool() {
        let daemon = daemon();
        let data = payload(
            &handle(ctx(&daemon), &args(json!({"action": "describe_capabilities"}))).unwrap(),
        );
        assert_eq!(data["protocol_version"], LATEST_PROTOCOL_VERSION);
        let tools = data["tools"].as_object().unwrap();
        assert_eq!(tools.len(), 5);
        assert_eq!(tools["observe"]["dispatch_param"], "what");

        let configure = &tools["configure"];
        assert!(configure["modes"]
            .as_array()
            .unwrap()
            .contains(&json!("describe_capabilities")));
        let names: Vec<&str> = configure["params"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"rule_id"));
    }
}
