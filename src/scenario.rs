use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::classify::Classification;
use crate::error::ProbeError;
use crate::tools::{FunctionDefinition, Tool, ToolChoice};

/// One fixed request/expected-outcome pair. Scenarios are independent; the
/// runner never carries state from one into the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolDecl>,
    #[serde(default = "ToolChoice::auto")]
    pub tool_choice: ToolChoice,
    pub expect: Classification,
    /// Tool names that must each appear among the extracted invocations when
    /// the response is structured.
    #[serde(default)]
    pub required_tools: Vec<String>,
    #[serde(default)]
    pub follow_up: Option<FollowUp>,
}

/// A tool as declared to the server, plus an optional canned `result` the
/// runner returns as the synthesized tool message in follow-up scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDecl {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl ToolDecl {
    pub fn to_tool(&self) -> Tool {
        let mut definition = FunctionDefinition::new(self.name.clone());
        if let Some(description) = self.description.clone() {
            definition = definition.with_description(description);
        }
        if let Some(parameters) = self.parameters.clone() {
            definition.parameters =
                serde_json::from_value(parameters).unwrap_or_else(|_| definition.parameters);
        }
        definition.to_tool()
    }
}

/// Second turn of a multi-turn scenario: tool results go back to the server
/// and the reply is classified again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub expect: Classification,
    #[serde(default)]
    pub answer_contains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub id: String,
    pub expected: Classification,
    /// `None` when the request never completed (transport or server failure).
    pub observed: Option<Classification>,
    pub pass: bool,
    pub diagnostics: Vec<String>,
}

/// The built-in probe set, mirroring the documented manual tests: one obvious
/// single-tool request, one request that should fan out into two calls in a
/// single response, and one two-turn exchange through a synthesized tool
/// result.
pub fn builtin_scenarios() -> Vec<Scenario> {
    let get_weather = ToolDecl {
        name: "get_weather".to_string(),
        description: Some("Get current weather for a location".to_string()),
        parameters: Some(json!({
            "type": "object",
            "properties": {
                "location": {"type": "string", "description": "City name"}
            },
            "required": ["location"]
        })),
        result: Some(json!({
            "location": "Paris",
            "temperature": 22,
            "condition": "Sunny"
        })),
    };

    let get_time = ToolDecl {
        name: "get_time".to_string(),
        description: Some("Get the current local time for a location".to_string()),
        parameters: Some(json!({
            "type": "object",
            "properties": {
                "location": {"type": "string", "description": "City name"}
            },
            "required": ["location"]
        })),
        result: Some(json!({
            "location": "Paris",
            "time": "14:05"
        })),
    };

    vec![
        Scenario {
            id: "weather-single".to_string(),
            description: Some("single tool call for an obviously matching request".to_string()),
            prompt: "What is the weather in Paris?".to_string(),
            system_prompt: None,
            tools: vec![get_weather.clone()],
            tool_choice: ToolChoice::auto(),
            expect: Classification::Structured,
            required_tools: vec!["get_weather".to_string()],
            follow_up: None,
        },
        Scenario {
            id: "weather-time-parallel".to_string(),
            description: Some("two independent tool calls in one response".to_string()),
            prompt: "What is the weather in Paris, and what time is it there right now?"
                .to_string(),
            system_prompt: None,
            tools: vec![get_weather.clone(), get_time],
            tool_choice: ToolChoice::auto(),
            expect: Classification::Structured,
            required_tools: vec!["get_weather".to_string(), "get_time".to_string()],
            follow_up: None,
        },
        Scenario {
            id: "weather-follow-up".to_string(),
            description: Some(
                "tool result round trip ends in a natural-language answer".to_string(),
            ),
            prompt: "What is the weather in Paris?".to_string(),
            system_prompt: None,
            tools: vec![get_weather],
            tool_choice: ToolChoice::auto(),
            expect: Classification::Structured,
            required_tools: vec!["get_weather".to_string()],
            follow_up: Some(FollowUp {
                expect: Classification::None,
                answer_contains: Vec::new(),
            }),
        },
    ]
}

/// Load scenarios from a YAML/JSON file, or every such file in a directory
/// (sorted by scenario id).
pub fn load_scenarios(path: impl AsRef<Path>) -> Result<Vec<Scenario>, ProbeError> {
    let path = path.as_ref();
    if path.is_dir() {
        let mut scenarios = Vec::new();
        let entries = fs::read_dir(path)
            .map_err(|err| ProbeError::Scenario(format!("{}: {err}", path.display())))?;
        for entry in entries {
            let entry =
                entry.map_err(|err| ProbeError::Scenario(format!("{}: {err}", path.display())))?;
            let file = entry.path();
            let ext = file.extension().and_then(|s| s.to_str()).unwrap_or("");
            if matches!(ext, "yaml" | "yml" | "json") {
                scenarios.push(load_scenario_file(&file)?);
            }
        }
        scenarios.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(scenarios)
    } else {
        Ok(vec![load_scenario_file(path)?])
    }
}

fn load_scenario_file(path: &Path) -> Result<Scenario, ProbeError> {
    let bytes =
        fs::read(path).map_err(|err| ProbeError::Scenario(format!("{}: {err}", path.display())))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    if ext == "json" {
        serde_json::from_slice(&bytes)
            .map_err(|err| ProbeError::Scenario(format!("{}: {err}", path.display())))
    } else {
        serde_yaml::from_slice(&bytes)
            .map_err(|err| ProbeError::Scenario(format!("{}: {err}", path.display())))
    }
}
