//! `tools/list` payload, derived from the static tool declarations.

use crate::capture::BufferSizes;
use crate::telemetry::TelemetryMode;
use crate::tools::{Param, ParamType, TELEMETRY_MODE_PARAM, ToolDef, ToolName, definitions};
use serde::Serialize;
use serde_json::{Map, Value, json};
use strum::VariantNames;

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

fn param_schema(param: &Param) -> Value {
    let mut schema = json!({"type": param.kind.json_type()});
    if param.kind == ParamType::StringArray {
        schema["items"] = json!({"type": "string"});
    }
    schema["description"] = json!(param.description);
    schema
}

pub fn input_schema(def: &ToolDef) -> Value {
    let mut properties = Map::new();
    properties.insert(
        def.discriminator.to_string(),
        json!({
            "type": "string",
            "enum": def.modes,
            "description": format!("Which {} operation to run", def.name),
        }),
    );
    for param in def.params {
        properties.insert(param.name.to_string(), param_schema(param));
    }
    let mut telemetry = param_schema(&TELEMETRY_MODE_PARAM);
    telemetry["enum"] = json!(TelemetryMode::VARIANTS);
    properties.insert(TELEMETRY_MODE_PARAM.name.to_string(), telemetry);

    json!({
        "type": "object",
        "properties": properties,
        "required": [def.discriminator],
    })
}

/// Tool descriptors; `observe` carries the current buffer counts so the
/// assistant can tell where data is waiting.
pub fn tools_list(sizes: &BufferSizes) -> Vec<ToolDescriptor> {
    definitions()
        .into_iter()
        .map(|def| ToolDescriptor {
            name: def.name.to_string(),
            description: def.description,
            input_schema: input_schema(def),
            meta: (def.name == ToolName::Observe).then(|| json!({ "data_counts": sizes })),
        })
        .collect()
}
