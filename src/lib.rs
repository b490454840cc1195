pub mod classify;
pub mod client;
pub mod error;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod tools;
pub mod types;

pub use classify::{classify, Classification, CompletionResult, ToolInvocation};
pub use client::{ChatEndpoint, EndpointClient, EndpointConfig, ScriptedEndpoint};
pub use error::ProbeError;
pub use report::ProbeReport;
pub use runner::ScenarioRunner;
pub use scenario::{
    builtin_scenarios, load_scenarios, FollowUp, Scenario, ScenarioOutcome, ToolDecl,
};
pub use tools::{
    FunctionCall, FunctionDefinition, FunctionParameter, Tool, ToolCall, ToolCallType, ToolChoice,
};
pub use types::{ChatMessage, CompletionRequest, MessageRole};
