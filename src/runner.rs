use std::sync::Arc;

use jsonschema::{Draft, JSONSchema};

use crate::classify::{classify, Classification, ToolInvocation};
use crate::client::ChatEndpoint;
use crate::scenario::{FollowUp, Scenario, ScenarioOutcome};
use crate::tools::{FunctionCall, ToolCall};
use crate::types::{ChatMessage, CompletionRequest};

/// Drives scenarios against one endpoint, strictly in order. A failing
/// scenario never blocks the ones after it.
pub struct ScenarioRunner {
    endpoint: Arc<dyn ChatEndpoint>,
    model: String,
}

impl ScenarioRunner {
    pub fn new(endpoint: Arc<dyn ChatEndpoint>, model: impl Into<String>) -> Self {
        Self {
            endpoint,
            model: model.into(),
        }
    }

    pub async fn run(&self, scenarios: &[Scenario]) -> Vec<ScenarioOutcome> {
        let mut outcomes = Vec::with_capacity(scenarios.len());

        for scenario in scenarios {
            tracing::info!(scenario = %scenario.id, "running scenario");
            let outcome = self.run_scenario(scenario).await;
            if outcome.pass {
                tracing::info!(scenario = %scenario.id, "pass");
            } else {
                tracing::warn!(scenario = %scenario.id, diagnostics = ?outcome.diagnostics, "fail");
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn run_scenario(&self, scenario: &Scenario) -> ScenarioOutcome {
        let mut messages = Vec::new();
        if let Some(system) = &scenario.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(scenario.prompt.clone()));

        let request = self.build_request(scenario, messages.clone());
        let payload = match self.endpoint.complete(&request).await {
            Ok(payload) => payload,
            Err(err) => {
                return ScenarioOutcome {
                    id: scenario.id.clone(),
                    expected: scenario.expect,
                    observed: None,
                    pass: false,
                    diagnostics: vec![format!("request failed: {err}")],
                }
            }
        };

        let result = classify(&payload);
        let mut diagnostics = result.diagnostics.clone();
        let mut pass = result.classification == scenario.expect;

        if !pass {
            diagnostics.push(format!(
                "classification mismatch: expected {}, observed {}",
                scenario.expect, result.classification
            ));
        }

        if result.classification == Classification::Structured
            && !self.check_invocations(scenario, &result.invocations, &mut diagnostics)
        {
            pass = false;
        }

        if pass {
            if let Some(follow_up) = &scenario.follow_up {
                pass = self
                    .run_follow_up(scenario, follow_up, messages, &result.invocations, &mut diagnostics)
                    .await;
            }
        }

        ScenarioOutcome {
            id: scenario.id.clone(),
            expected: scenario.expect,
            observed: Some(result.classification),
            pass,
            diagnostics,
        }
    }

    fn build_request(&self, scenario: &Scenario, messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest::new(self.model.clone(), messages)
            .with_tools(scenario.tools.iter().map(|tool| tool.to_tool()))
            .with_tool_choice(scenario.tool_choice.clone())
            .with_temperature(0.0)
            .with_max_tokens(2048)
    }

    /// Structured invocations must name declared tools, carry decodable
    /// arguments, satisfy the declared parameter schema, and cover every
    /// required tool.
    fn check_invocations(
        &self,
        scenario: &Scenario,
        invocations: &[ToolInvocation],
        diagnostics: &mut Vec<String>,
    ) -> bool {
        let mut ok = true;

        for invocation in invocations {
            let Some(decl) = scenario.tools.iter().find(|t| t.name == invocation.name) else {
                diagnostics.push(format!("call names undeclared tool: {}", invocation.name));
                ok = false;
                continue;
            };

            let Some(arguments) = &invocation.arguments else {
                diagnostics.push(format!(
                    "arguments for {} could not be decoded: {}",
                    invocation.name, invocation.raw_arguments
                ));
                ok = false;
                continue;
            };

            let Some(schema) = &decl.parameters else {
                continue;
            };

            match JSONSchema::options().with_draft(Draft::Draft7).compile(schema) {
                Ok(compiled) => {
                    if let Err(errors) = compiled.validate(arguments) {
                        for error in errors.take(5) {
                            diagnostics.push(format!(
                                "schema violation for {}: {error}",
                                invocation.name
                            ));
                        }
                        ok = false;
                    }
                }
                Err(err) => {
                    diagnostics.push(format!(
                        "parameter schema for {} does not compile: {err}",
                        invocation.name
                    ));
                    ok = false;
                }
            }
        }

        for required in &scenario.required_tools {
            if !invocations.iter().any(|i| &i.name == required) {
                diagnostics.push(format!("missing required call: {required}"));
                ok = false;
            }
        }

        ok
    }

    async fn run_follow_up(
        &self,
        scenario: &Scenario,
        follow_up: &FollowUp,
        mut messages: Vec<ChatMessage>,
        invocations: &[ToolInvocation],
        diagnostics: &mut Vec<String>,
    ) -> bool {
        let mut calls = Vec::with_capacity(invocations.len());
        let mut results = Vec::with_capacity(invocations.len());

        for (index, invocation) in invocations.iter().enumerate() {
            // Servers occasionally omit call ids; synthesize one so the tool
            // message can still back-reference its call.
            let id = invocation
                .id
                .clone()
                .unwrap_or_else(|| format!("probe_call_{index}"));

            calls.push(
                ToolCall::new(FunctionCall {
                    name: invocation.name.clone(),
                    arguments: invocation.arguments.clone(),
                    raw_arguments: invocation.raw_arguments.clone(),
                })
                .with_id(id.clone()),
            );

            let result = scenario
                .tools
                .iter()
                .find(|t| t.name == invocation.name)
                .and_then(|t| t.result.clone())
                .unwrap_or_else(|| serde_json::json!({"status": "ok"}));
            results.push((id, invocation.name.clone(), result));
        }

        messages.push(ChatMessage::assistant_tool_calls(calls));
        for (id, name, result) in results {
            messages.push(ChatMessage::tool(id, name, result.to_string()));
        }

        let request = self.build_request(scenario, messages);
        let payload = match self.endpoint.complete(&request).await {
            Ok(payload) => payload,
            Err(err) => {
                diagnostics.push(format!("follow-up request failed: {err}"));
                return false;
            }
        };

        let result = classify(&payload);
        diagnostics.extend(result.diagnostics);

        if result.classification != follow_up.expect {
            diagnostics.push(format!(
                "follow-up classification mismatch: expected {}, observed {}",
                follow_up.expect, result.classification
            ));
            return false;
        }

        if follow_up.expect == Classification::None {
            let Some(answer) = result.content.as_deref().filter(|t| !t.trim().is_empty()) else {
                diagnostics.push("follow-up turn produced no answer text".to_string());
                return false;
            };

            let mut ok = true;
            for needle in &follow_up.answer_contains {
                if !answer.contains(needle) {
                    diagnostics.push(format!(
                        "follow-up answer missing required substring: {needle}"
                    ));
                    ok = false;
                }
            }
            return ok;
        }

        true
    }
}
