//! `generate`: turn captured activity into artifacts (replay scripts, tests,
//! HAR archives, session summaries).

use super::{Param, ParamType, ToolArgs, ToolContext, ToolDef, ToolName, param, to_json};
use crate::capture::{
    EnhancedAction, LogFilter, NetworkBody, NetworkFilter, PageRequest, Stamped,
};
use crate::daemon::{SERVER_NAME, VERSION};
use crate::mcp::{ErrorCode, StructuredError, ToolResult};
use crate::pending::CommandStatus;
use crate::security::redact_value;
use axum::http::StatusCode;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use strum::{EnumString, VariantNames};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum GenerateFormat {
    Reproduction,
    Test,
    Har,
    PrSummary,
}

const PARAMS: &[Param] = &[
    param("last_n", ParamType::Integer, "Only use the most recent N actions"),
    param("base_url", ParamType::String, "Replace the captured origin in URLs"),
    param(
        "output_format",
        ParamType::String,
        "reproduction: gasoline (numbered steps, default) or playwright",
    ),
    param("error_message", ParamType::String, "reproduction: error being reproduced"),
    param("test_name", ParamType::String, "test: name of the describe block"),
    param("assert_no_errors", ParamType::Boolean, "test: fail on console errors"),
    param("assert_network", ParamType::Boolean, "test: fail on failed requests"),
    param("url", ParamType::String, "har: URL substring filter"),
    param("method", ParamType::String, "har: HTTP method filter"),
    param("status_min", ParamType::Integer, "har: minimum status"),
    param("status_max", ParamType::Integer, "har: maximum status"),
    param(
        "save_to",
        ParamType::String,
        "har: write the archive to this path (temp dir, state dir, or relative)",
    ),
];

pub static DEFINITION: ToolDef = ToolDef {
    name: ToolName::Generate,
    description: "Generate artifacts from captured activity: reproduction scripts, Playwright \
                  tests, HAR 1.2 archives of network traffic, and PR-ready session summaries.",
    discriminator: "format",
    modes: GenerateFormat::VARIANTS,
    params: PARAMS,
};

pub fn handle(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    match args.mode::<GenerateFormat>("format")? {
        GenerateFormat::Reproduction => reproduction(ctx, args),
        GenerateFormat::Test => playwright_test(ctx, args),
        GenerateFormat::Har => har(ctx, args),
        GenerateFormat::PrSummary => pr_summary(ctx),
    }
}

fn all_actions(ctx: ToolContext<'_>) -> Result<Vec<EnhancedAction>, StructuredError> {
    let page = ctx
        .daemon
        .capture
        .read_actions(&PageRequest::default(), &Default::default())?;
    Ok(page.entries.into_iter().map(|e| e.record).collect())
}

fn last_n(actions: &[EnhancedAction], n: Option<usize>) -> &[EnhancedAction] {
    match n {
        Some(n) if n > 0 && n < actions.len() => &actions[actions.len() - n..],
        _ => actions,
    }
}

/// Swap the scheme, host and port of `raw` for those of `base`.
fn rewrite_url(raw: &str, base: Option<&str>) -> String {
    let Some(base) = base else {
        return raw.to_string();
    };
    match (Url::parse(raw), Url::parse(base)) {
        (Ok(original), Ok(mut rebased)) => {
            rebased.set_path(original.path());
            rebased.set_query(original.query());
            rebased.set_fragment(original.fragment());
            rebased.to_string()
        }
        _ => raw.to_string(),
    }
}

fn escape_js(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
}

fn typed_value(action: &EnhancedAction) -> &str {
    match action.value.as_deref() {
        Some("[redacted]" | "[REDACTED]") => "[user-provided]",
        Some(value) => value,
        None => "",
    }
}

fn start_url(actions: &[EnhancedAction]) -> String {
    actions
        .first()
        .map(|first| match (&*first.kind, &first.to_url) {
            ("navigate", Some(to)) => to.clone(),
            _ => first.url.clone(),
        })
        .unwrap_or_default()
}

/// Gaps longer than two seconds between actions, in whole seconds.
fn pause_before(prev_ts: Option<i64>, ts: i64) -> Option<i64> {
    prev_ts
        .filter(|prev| *prev > 0 && ts - prev > 2000)
        .map(|prev| (ts - prev) / 1000)
}

fn playwright_step(action: &EnhancedAction, base_url: Option<&str>) -> Option<String> {
    let locator = || {
        action
            .preferred_selector()
            .map(|s| format!("page.locator('{}')", escape_js(&s)))
    };
    let line = match action.kind.as_str() {
        "navigate" => format!(
            "await page.goto('{}');",
            escape_js(&rewrite_url(action.to_url.as_deref()?, base_url))
        ),
        "click" => format!("await {}.click();", locator()?),
        "input" => format!(
            "await {}.fill('{}');",
            locator()?,
            escape_js(typed_value(action))
        ),
        "select" => format!(
            "await {}.selectOption('{}');",
            locator()?,
            escape_js(typed_value(action))
        ),
        "keypress" => format!(
            "await page.keyboard.press('{}');",
            escape_js(action.key.as_deref()?)
        ),
        "focus" => format!("await {}.focus();", locator()?),
        "scroll_element" => format!("await {}.scrollIntoViewIfNeeded();", locator()?),
        "refresh" => "await page.reload();".to_string(),
        "back" => "await page.goBack();".to_string(),
        "forward" => "await page.goForward();".to_string(),
        _ => return None,
    };
    Some(line)
}

fn gasoline_step(action: &EnhancedAction, base_url: Option<&str>) -> Option<String> {
    let element = || action.preferred_selector().unwrap_or_else(|| "(element)".into());
    let line = match action.kind.as_str() {
        "navigate" => format!(
            "Navigate to: {}",
            rewrite_url(action.to_url.as_deref()?, base_url)
        ),
        "click" => format!("Click: {}", element()),
        "input" => format!("Type \"{}\" into: {}", typed_value(action), element()),
        "select" => format!("Select \"{}\" in: {}", typed_value(action), element()),
        "keypress" => format!("Press: {}", action.key.as_deref()?),
        "focus" => format!("Focus: {}", element()),
        "scroll_element" => format!("Scroll to element: {}", element()),
        "refresh" => "Refresh page".to_string(),
        "back" => "Navigate back".to_string(),
        "forward" => "Navigate forward".to_string(),
        _ => return None,
    };
    Some(line)
}

// ─── reproduction ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
enum ReproFormat {
    #[default]
    Gasoline,
    Playwright,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReproParams {
    last_n: Option<usize>,
    base_url: Option<String>,
    output_format: Option<String>,
    error_message: Option<String>,
}

fn reproduction(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let params: ReproParams = args.decode()?;
    let format = match params.output_format.as_deref().map(str::trim) {
        None | Some("") => ReproFormat::default(),
        Some(raw) => serde_json::from_value(json!(raw)).map_err(|_| {
            StructuredError::invalid_param("output_format", format!("Invalid output_format: {raw}"))
                .with_hint("Valid values: gasoline, playwright")
        })?,
    };

    let all = all_actions(ctx)?;
    let actions = last_n(&all, params.last_n);
    let base_url = params.base_url.as_deref();
    let script = match format {
        ReproFormat::Gasoline => gasoline_script(actions, base_url, params.error_message.as_deref()),
        ReproFormat::Playwright => playwright_script(actions, base_url, params.error_message.as_deref()),
    };

    let duration_ms = match (actions.first(), actions.last()) {
        (Some(first), Some(last)) if actions.len() > 1 => last.timestamp - first.timestamp,
        _ => 0,
    };
    let data = json!({
        "script": script,
        "format": format,
        "action_count": actions.len(),
        "duration_ms": duration_ms,
        "start_url": rewrite_url(&start_url(actions), base_url),
        "metadata": {
            "generated_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "actions_available": all.len(),
            "actions_included": actions.len(),
        },
    });
    let summary = format!(
        "Reproduction script ({}, {} actions)",
        if format == ReproFormat::Gasoline { "gasoline" } else { "playwright" },
        actions.len()
    );
    Ok(ToolResult::json(&summary, &data))
}

fn gasoline_script(
    actions: &[EnhancedAction],
    base_url: Option<&str>,
    error_message: Option<&str>,
) -> String {
    if actions.is_empty() {
        return "# No actions captured\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "# Reproduction: {}",
        error_message.unwrap_or("captured user actions")
    );
    let _ = writeln!(
        out,
        "# Captured: {} | {} actions | {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        actions.len(),
        rewrite_url(&start_url(actions), base_url)
    );

    let mut step = 0;
    let mut prev_ts = None;
    for action in actions {
        if let Some(gap) = pause_before(prev_ts, action.timestamp) {
            let _ = writeln!(out, "   [{gap}s pause]");
        }
        prev_ts = Some(action.timestamp);
        if let Some(line) = gasoline_step(action, base_url) {
            step += 1;
            let _ = writeln!(out, "{step}. {line}");
        }
    }
    if let Some(message) = error_message {
        let _ = writeln!(out, "\n# Error: {message}");
    }
    out
}

fn playwright_script(
    actions: &[EnhancedAction],
    base_url: Option<&str>,
    error_message: Option<&str>,
) -> String {
    let mut out = String::from("import { test } from '@playwright/test';\n\n");
    let name = error_message.map_or_else(
        || "reproduction: captured user actions".to_string(),
        |m| format!("reproduction: {m}"),
    );
    let _ = writeln!(out, "test('{}', async ({{ page }}) => {{", escape_js(&name));
    let mut prev_ts = None;
    for action in actions {
        if let Some(gap) = pause_before(prev_ts, action.timestamp) {
            let _ = writeln!(out, "  // [{gap}s pause]");
        }
        prev_ts = Some(action.timestamp);
        if let Some(line) = playwright_step(action, base_url) {
            let _ = writeln!(out, "  {line}");
        }
    }
    if let Some(message) = error_message {
        let _ = writeln!(out, "  // Error observed: {message}");
    }
    out.push_str("});\n");
    out
}

// ─── test ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TestParams {
    test_name: Option<String>,
    last_n: Option<usize>,
    base_url: Option<String>,
    assert_no_errors: bool,
    assert_network: bool,
}

/// Split at every navigation; each group becomes one `test()` block.
fn group_by_navigation(actions: &[EnhancedAction]) -> Vec<&[EnhancedAction]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for (i, action) in actions.iter().enumerate() {
        if action.kind == "navigate" && i > start {
            groups.push(&actions[start..i]);
            start = i;
        }
    }
    if start < actions.len() {
        groups.push(&actions[start..]);
    }
    groups
}

fn group_label(group: &[EnhancedAction], index: usize) -> String {
    let path = group
        .first()
        .filter(|a| a.kind == "navigate")
        .and_then(|a| a.to_url.as_deref())
        .and_then(|to| Url::parse(to).ok())
        .map(|u| u.path().to_string());
    match path.as_deref() {
        Some("/" | "") => "should work on homepage".to_string(),
        Some(path) => format!("should work on {path}"),
        None => format!("step {}", index + 1),
    }
}

fn playwright_test(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let params: TestParams = args.decode()?;
    let test_name = params
        .test_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("generated test");

    let all = all_actions(ctx)?;
    let actions = last_n(&all, params.last_n);
    let base_url = params.base_url.as_deref();

    let mut script = String::from("import { test, expect } from '@playwright/test';\n\n");
    let _ = writeln!(script, "test.describe('{}', () => {{", escape_js(test_name));
    if actions.is_empty() {
        script.push_str("  test('should load page', async ({ page }) => {\n");
        script.push_str("    await page.goto('/');\n");
        script.push_str("    await expect(page).toHaveTitle(/.+/);\n");
        script.push_str("  });\n");
    }
    for (index, group) in group_by_navigation(actions).into_iter().enumerate() {
        let _ = writeln!(
            script,
            "  test('{}', async ({{ page }}) => {{",
            escape_js(&group_label(group, index))
        );
        if params.assert_no_errors {
            script.push_str("    const errors = [];\n");
            script.push_str(
                "    page.on('console', msg => { if (msg.type() === 'error') errors.push(msg.text()); });\n",
            );
        }
        if params.assert_network {
            script.push_str("    const failedRequests = [];\n");
            script.push_str("    page.on('requestfailed', req => failedRequests.push(req.url()));\n");
        }
        for line in group.iter().filter_map(|a| playwright_step(a, base_url)) {
            let _ = writeln!(script, "    {line}");
        }
        if group.iter().any(|a| a.kind == "navigate") {
            script.push_str("    await expect(page).toHaveTitle(/.+/);\n");
        }
        if params.assert_no_errors {
            script.push_str("    expect(errors).toHaveLength(0);\n");
        }
        if params.assert_network {
            script.push_str("    expect(failedRequests).toHaveLength(0);\n");
        }
        script.push_str("  });\n");
    }
    script.push_str("});\n");

    let data = json!({
        "script": script,
        "test_name": test_name,
        "action_count": actions.len(),
        "metadata": {
            "generated_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "actions_available": all.len(),
            "actions_included": actions.len(),
            "assert_network": params.assert_network,
            "assert_no_errors": params.assert_no_errors,
        },
    });
    Ok(ToolResult::json(
        &format!("Playwright test '{test_name}' ({} actions)", actions.len()),
        &data,
    ))
}

// ─── har ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct HarArchive {
    log: HarLog,
}

#[derive(Debug, Serialize)]
struct HarLog {
    version: &'static str,
    creator: HarCreator,
    entries: Vec<HarEntry>,
}

#[derive(Debug, Serialize)]
struct HarCreator {
    name: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarEntry {
    started_date_time: String,
    time: f64,
    request: HarRequest,
    response: HarResponse,
    cache: BTreeMap<String, String>,
    timings: HarTimings,
}

#[derive(Debug, Serialize)]
struct NameValue {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarRequest {
    method: String,
    url: String,
    http_version: &'static str,
    headers: Vec<NameValue>,
    query_string: Vec<NameValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_data: Option<HarPostData>,
    headers_size: i64,
    body_size: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarPostData {
    mime_type: String,
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarResponse {
    status: u16,
    status_text: String,
    http_version: &'static str,
    headers: Vec<NameValue>,
    content: HarContent,
    #[serde(rename = "redirectURL")]
    redirect_url: String,
    headers_size: i64,
    body_size: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HarContent {
    size: u64,
    mime_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct HarTimings {
    send: f64,
    wait: f64,
    receive: f64,
}

fn query_string(raw: &str) -> Vec<NameValue> {
    Url::parse(raw)
        .map(|u| {
            u.query_pairs()
                .map(|(name, value)| NameValue {
                    name: name.into_owned(),
                    value: value.into_owned(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn har_entry(stamped: &Stamped<NetworkBody>) -> HarEntry {
    let body = &stamped.record;
    let started = body.ts.clone().unwrap_or_else(|| {
        stamped
            .ingested_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    });
    let (text, encoding) = if body.binary_format.is_some() {
        (BASE64.encode(body.response_body.as_bytes()), Some("base64"))
    } else {
        (body.response_body.clone(), None)
    };
    let response_size = if body.response_size > 0 {
        body.response_size
    } else {
        body.response_body.len() as u64
    };

    HarEntry {
        started_date_time: started,
        time: body.duration_ms,
        request: HarRequest {
            method: body.method.clone(),
            url: body.url.clone(),
            http_version: "HTTP/1.1",
            headers: Vec::new(),
            query_string: query_string(&body.url),
            post_data: (!body.request_body.is_empty()).then(|| HarPostData {
                mime_type: body.content_type.clone(),
                text: body.request_body.clone(),
            }),
            headers_size: -1,
            body_size: body.request_body.len(),
        },
        response: HarResponse {
            status: body.status,
            status_text: StatusCode::from_u16(body.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            http_version: "HTTP/1.1",
            headers: Vec::new(),
            content: HarContent {
                size: response_size,
                mime_type: body.content_type.clone(),
                text,
                encoding,
            },
            redirect_url: String::new(),
            headers_size: -1,
            body_size: response_size,
        },
        cache: BTreeMap::new(),
        timings: HarTimings {
            send: -1.0,
            wait: body.duration_ms,
            receive: -1.0,
        },
    }
}

/// Writable export targets: the temp dir, the state dir, or a relative path
/// that stays below the working directory.
fn export_path_allowed(path: &Path, state_dir: &Path) -> bool {
    if path.components().any(|c| c == Component::ParentDir) {
        return false;
    }
    if path.is_relative() {
        return true;
    }
    [std::env::temp_dir(), PathBuf::from("/tmp"), state_dir.to_path_buf()]
        .iter()
        .any(|root| path.starts_with(root))
}

fn har(ctx: ToolContext<'_>, args: &ToolArgs) -> Result<ToolResult, StructuredError> {
    let filter: NetworkFilter = args.decode()?;
    let page = ctx
        .daemon
        .capture
        .read_network(&PageRequest::default(), &filter)?;
    let archive = HarArchive {
        log: HarLog {
            version: "1.2",
            creator: HarCreator {
                name: SERVER_NAME,
                version: VERSION,
            },
            entries: page.entries.iter().map(har_entry).collect(),
        },
    };
    let count = archive.log.entries.len();
    let mut value = to_json(&archive)?;

    let Some(save_to) = args.str("save_to") else {
        return Ok(ToolResult::json(&format!("HAR 1.2 archive, {count} entries"), &value));
    };

    let path = PathBuf::from(save_to);
    if !export_path_allowed(&path, &ctx.daemon.config().state_dir_path()) {
        return Err(StructuredError::new(
            ErrorCode::PathNotAllowed,
            format!("Path not allowed: {save_to}"),
        )
        .with_param("save_to")
        .with_hint("Use a path under the temp directory, the state directory, or a relative path without '..'"));
    }

    redact_value(&mut value);
    let bytes = serde_json::to_vec_pretty(&value).map_err(|e| {
        StructuredError::new(ErrorCode::MarshalFailed, format!("failed to serialize HAR: {e}"))
    })?;
    std::fs::write(&path, &bytes).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "HAR export failed");
        StructuredError::new(
            ErrorCode::ExportFailed,
            format!("Failed to save HAR file: {e}"),
        )
        .with_param("save_to")
    })?;
    tracing::info!(path = %path.display(), entries = count, "HAR exported");

    Ok(ToolResult::json(
        &format!("HAR saved to {save_to}"),
        &json!({
            "saved_to": save_to,
            "entries_count": count,
            "file_size_bytes": bytes.len(),
        }),
    ))
}

// ─── pr_summary ──────────────────────────────────────────────────────────────

fn pr_summary(ctx: ToolContext<'_>) -> Result<ToolResult, StructuredError> {
    let daemon = ctx.daemon;
    let actions = all_actions(ctx)?;
    let errors = daemon
        .capture
        .read_logs(&PageRequest::default(), &LogFilter::errors_only())?;
    let network = daemon
        .capture
        .read_network(&PageRequest::default(), &NetworkFilter::default())?;
    let completed = daemon
        .pending
        .list_by_status(CommandStatus::Complete, None)
        .len();
    let failed = [CommandStatus::Error, CommandStatus::Expired, CommandStatus::Timeout]
        .into_iter()
        .map(|status| daemon.pending.list_by_status(status, None).len())
        .sum::<usize>();
    let network_errors: Vec<&NetworkBody> = network
        .entries
        .iter()
        .map(|e| &e.record)
        .filter(|b| b.is_error())
        .collect();
    let tracked_url = daemon.tracking.snapshot().tracked_tab_url.clone();

    let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for action in &actions {
        *by_kind.entry(action.kind.as_str()).or_default() += 1;
    }

    let mut md = String::from("## Session Summary\n\n");
    let activity = actions.len() + completed + failed + network.entries.len();
    if activity == 0 && errors.entries.is_empty() {
        md.push_str("No activity captured during this session.\n");
    } else {
        if let Some(url) = &tracked_url {
            let _ = writeln!(md, "- **Page:** {url}");
        }
        let _ = write!(md, "- **Actions:** {} total", actions.len());
        if !by_kind.is_empty() {
            let parts: Vec<String> = by_kind.iter().map(|(k, n)| format!("{k}: {n}")).collect();
            let _ = write!(md, " ({})", parts.join(", "));
        }
        md.push('\n');
        let _ = writeln!(md, "- **Commands:** {completed} completed, {failed} failed");
        let _ = writeln!(md, "- **Console errors:** {}", errors.entries.len());
        let _ = writeln!(
            md,
            "- **Network:** {} requests, {} failed",
            network.entries.len(),
            network_errors.len()
        );
        if !errors.entries.is_empty() {
            md.push_str("\n### Console errors\n\n");
            for error in errors.entries.iter().rev().take(5) {
                let _ = writeln!(md, "- {}", error.record.message());
            }
        }
        if !network_errors.is_empty() {
            md.push_str("\n### Failed requests\n\n");
            for body in network_errors.iter().rev().take(5) {
                let _ = writeln!(md, "- `{} {}` → {}", body.method, body.url, body.status);
            }
        }
    }

    Ok(ToolResult::json(
        "PR summary",
        &json!({
            "summary": md,
            "stats": {
                "actions": actions.len(),
                "commands_completed": completed,
                "commands_failed": failed,
                "console_errors": errors.entries.len(),
                "network_requests": network.entries.len(),
                "network_errors": network_errors.len(),
            },
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::LogEntry;
    use crate::tools::test_support::{args, ctx, daemon, payload};
    use tempfile::TempDir;

    fn navigate(to: &str, ts: i64) -> EnhancedAction {
        EnhancedAction {
            kind: "navigate".into(),
            timestamp: ts,
            url: to.into(),
            to_url: Some(to.into()),
            ..EnhancedAction::default()
        }
    }

    fn click(test_id: &str, ts: i64) -> EnhancedAction {
        EnhancedAction {
            kind: "click".into(),
            timestamp: ts,
            selectors: [("testId".to_string(), json!(test_id))].into_iter().collect(),
            ..EnhancedAction::default()
        }
    }

    #[test]
    fn playwright_reproduction_rewrites_origin() {
        let daemon = daemon();
        daemon.capture.add_actions(vec![
            navigate("https://prod.example.com/cart?x=1", 1_000),
            click("checkout", 5_000),
        ]);

        let data = payload(
            &handle(
                ctx(&daemon),
                &args(json!({
                    "format": "reproduction",
                    "output_format": "playwright",
                    "base_url": "http://localhost:3000",
                })),
            )
            .unwrap(),
        );
        let script = data["script"].as_str().unwrap();
        assert!(script.contains("await page.goto('http://localhost:3000/cart?x=1');"));
        assert!(script.contains("page.locator('[data-testid=\"checkout\"]').click()"));
        assert!(script.contains("[4s pause]"));
        assert_eq!(data["action_count"], 2);
        assert_eq!(data["duration_ms"], 4000);
    }

    #[test]
    fn gasoline_reproduction_numbers_steps() {
        let daemon = daemon();
        daemon
            .capture
            .add_actions(vec![navigate("https://app.test/", 1), click("save", 2)]);
        let data = payload(&handle(ctx(&daemon), &args(json!({"format": "reproduction"}))).unwrap());
        let script = data["script"].as_str().unwrap();
        assert!(script.contains("1. Navigate to: https://app.test/"));
        assert!(script.contains("2. Click: [data-testid=\"save\"]"));
    }

    #[test]
    fn invalid_output_format_is_rejected() {
        let daemon = daemon();
        let err = handle(
            ctx(&daemon),
            &args(json!({"format": "reproduction", "output_format": "cypress"})),
        )
        .unwrap_err();
        assert_eq!(err.error, ErrorCode::InvalidParam);
        assert_eq!(err.param.as_deref(), Some("output_format"));
    }

    #[test]
    fn test_groups_by_navigation_and_asserts_errors() {
        let daemon = daemon();
        daemon.capture.add_actions(vec![
            navigate("https://app.test/", 1),
            click("a", 2),
            navigate("https://app.test/settings", 3),
        ]);
        let data = payload(
            &handle(
                ctx(&daemon),
                &args(json!({"format": "test", "test_name": "checkout flow", "assert_no_errors": true})),
            )
            .unwrap(),
        );
        let script = data["script"].as_str().unwrap();
        assert!(script.contains("test.describe('checkout flow'"));
        assert!(script.contains("should work on homepage"));
        assert!(script.contains("should work on /settings"));
        assert_eq!(script.matches("expect(errors).toHaveLength(0)").count(), 2);
    }

    #[test]
    fn har_archive_includes_query_and_status_text() {
        let daemon = daemon();
        daemon.capture.add_network_bodies(vec![NetworkBody {
            method: "GET".into(),
            url: "https://api.test/items?page=2&q=shoes".into(),
            status: 404,
            duration_ms: 12.5,
            response_body: "{\"error\":\"missing\"}".into(),
            content_type: "application/json".into(),
            ..NetworkBody::default()
        }]);

        let data = payload(&handle(ctx(&daemon), &args(json!({"format": "har"}))).unwrap());
        assert_eq!(data["log"]["version"], "1.2");
        let entry = &data["log"]["entries"][0];
        assert_eq!(entry["request"]["queryString"][0]["name"], "page");
        assert_eq!(entry["request"]["queryString"][1]["value"], "shoes");
        assert_eq!(entry["response"]["statusText"], "Not Found");
        assert!(entry["response"]["content"].get("encoding").is_none());
    }

    #[test]
    fn har_save_to_rejects_traversal() {
        let daemon = daemon();
        let err = handle(
            ctx(&daemon),
            &args(json!({"format": "har", "save_to": "../../etc/out.har"})),
        )
        .unwrap_err();
        assert_eq!(err.error, ErrorCode::PathNotAllowed);

        let err = handle(
            ctx(&daemon),
            &args(json!({"format": "har", "save_to": "/etc/out.har"})),
        )
        .unwrap_err();
        assert_eq!(err.error, ErrorCode::PathNotAllowed);
    }

    #[test]
    fn har_save_to_writes_file() {
        let tmp = TempDir::new_in(std::env::temp_dir()).unwrap();
        let path = tmp.path().join("session.har");
        let daemon = daemon();
        daemon.capture.add_network_bodies(vec![NetworkBody {
            url: "https://api.test/".into(),
            status: 200,
            ..NetworkBody::default()
        }]);

        let data = payload(
            &handle(
                ctx(&daemon),
                &args(json!({"format": "har", "save_to": path.to_string_lossy()})),
            )
            .unwrap(),
        );
        assert_eq!(data["entries_count"], 1);
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["log"]["entries"][0]["response"]["status"], 200);
    }

    #[test]
    fn pr_summary_counts_activity() {
        let daemon = daemon();
        let empty = payload(&handle(ctx(&daemon), &args(json!({"format": "pr_summary"}))).unwrap());
        assert!(empty["summary"].as_str().unwrap().contains("No activity"));

        daemon.capture.add_actions(vec![click("a", 1), click("b", 2)]);
        daemon
            .capture
            .add_logs(vec![LogEntry::from(json!({"level": "error", "message": "boom"}))]);
        let data = payload(&handle(ctx(&daemon), &args(json!({"format": "pr_summary"}))).unwrap());
        let md = data["summary"].as_str().unwrap();
        assert!(md.contains("**Actions:** 2 total (click: 2)"));
        assert!(md.contains("- boom"));
        assert_eq!(data["stats"]["console_errors"], 1);
    }
}
