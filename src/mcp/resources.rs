//! Static markdown served through `resources/list` and `resources/read`.

use serde::Serialize;

pub const MIME_MARKDOWN: &str = "text/markdown";

const CAPABILITIES: &str = include_str!("resources/capabilities.md");
const GUIDE: &str = include_str!("resources/guide.md");
const QUICKSTART: &str = include_str!("resources/quickstart.md");

const PLAYBOOKS: &[(&str, &str)] = &[
    (
        "performance/quick",
        include_str!("resources/playbooks/performance_quick.md"),
    ),
    (
        "performance/full",
        include_str!("resources/playbooks/performance_full.md"),
    ),
    (
        "accessibility/quick",
        include_str!("resources/playbooks/accessibility_quick.md"),
    ),
    (
        "accessibility/full",
        include_str!("resources/playbooks/accessibility_full.md"),
    ),
    (
        "security/quick",
        include_str!("resources/playbooks/security_quick.md"),
    ),
    (
        "security/full",
        include_str!("resources/playbooks/security_full.md"),
    ),
];

const DEMOS: &[(&str, &str)] = &[
    ("ws", include_str!("resources/demos/ws.md")),
    ("annotations", include_str!("resources/demos/annotations.md")),
    ("recording", include_str!("resources/demos/recording.md")),
    ("dependencies", include_str!("resources/demos/dependencies.md")),
];

/// Entry in the `resources/list` result.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceInfo {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

/// One item of `resources/read` `contents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
    pub text: &'static str,
}

pub fn list() -> Vec<ResourceInfo> {
    vec![
        ResourceInfo {
            uri: "gasoline://capabilities",
            name: "Gasoline Capability Index",
            description: "Which playbook to read for which task",
            mime_type: MIME_MARKDOWN,
        },
        ResourceInfo {
            uri: "gasoline://guide",
            name: "Gasoline Usage Guide",
            description: "How to use the Gasoline tools for browser debugging",
            mime_type: MIME_MARKDOWN,
        },
        ResourceInfo {
            uri: "gasoline://quickstart",
            name: "Gasoline Quickstart",
            description: "Short list of working tool calls",
            mime_type: MIME_MARKDOWN,
        },
    ]
}

fn canonical_capability(raw: &str) -> Option<&'static str> {
    match raw {
        "performance" | "performance_analysis" | "perf" => Some("performance"),
        "accessibility" | "accessibility_audit" | "a11y" => Some("accessibility"),
        "security" | "security_audit" => Some("security"),
        _ => None,
    }
}

/// Resolve `<capability>[/<level>]` to a playbook key. A bare capability
/// means its quick variant.
fn playbook_key(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/').to_lowercase();
    let mut parts = trimmed.split('/');
    let capability = canonical_capability(parts.next()?.trim())?;
    let level = parts.next().map_or("quick", str::trim);
    if level.is_empty() || parts.next().is_some() {
        return None;
    }
    Some(format!("{capability}/{level}"))
}

/// Look up a resource, returning its canonical URI and text.
pub fn read(uri: &str) -> Option<ResourceContent> {
    let found = |uri: String, text: &'static str| ResourceContent {
        uri,
        mime_type: MIME_MARKDOWN,
        text,
    };

    match uri {
        "gasoline://capabilities" => Some(found(uri.into(), CAPABILITIES)),
        "gasoline://guide" => Some(found(uri.into(), GUIDE)),
        "gasoline://quickstart" => Some(found(uri.into(), QUICKSTART)),
        _ => {
            if let Some(rest) = uri.strip_prefix("gasoline://playbook/") {
                let key = playbook_key(rest)?;
                let (_, text) = PLAYBOOKS.iter().find(|(k, _)| *k == key)?;
                Some(found(format!("gasoline://playbook/{key}"), text))
            } else if let Some(name) = uri.strip_prefix("gasoline://demo/") {
                let (_, text) = DEMOS.iter().find(|(k, _)| *k == name)?;
                Some(found(uri.into(), text))
            } else {
                None
            }
        }
    }
}
