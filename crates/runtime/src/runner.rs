//! The agent runner: maps one conversation turn to a response, invoking
//! remote tools as the model asks for them.

use std::future::Future;

use capabilities::CapabilitySet;
use connector::{Connection, Tool, Transport};
use serde::Deserialize;
use serde_json::Value;

use crate::backend::{ChatRequest, LlmBackend, Message};
use crate::{Error, Result};

/// Upper bound on tool invocations within a single turn.
const MAX_TOOL_STEPS: usize = 8;

/// Something that can execute a named tool call.
///
/// Implemented by `connector::Connection`; tests drive the runner with a
/// scripted implementation instead.
pub trait ToolInvoker: Send + Sync {
    /// Invoke a tool and return its text output.
    fn invoke(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> impl Future<Output = Result<String>> + Send;
}

impl<T: Transport> ToolInvoker for Connection<T> {
    async fn invoke(&self, name: &str, arguments: Option<Value>) -> Result<String> {
        let result = self.call_tool(name, arguments).await?;
        Ok(result.text())
    }
}

/// A tool invocation the model asked for, parsed out of its reply.
#[derive(Debug, Deserialize)]
struct ToolDirective {
    tool: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// The composed agent: tool descriptors, a model backend, and the declared
/// capability grant.
pub struct Runner<B: LlmBackend> {
    backend: B,
    tools: Vec<Tool>,
    system: String,
    messages: Vec<Message>,
}

impl<B: LlmBackend> Runner<B> {
    /// Compose a runner from the listed tools, a model backend, and the
    /// capability allow-list.
    ///
    /// The tool descriptors pass through whole; the runner never inspects
    /// them beyond rendering name, description, and schema into the system
    /// prompt.
    pub fn build(tools: Vec<Tool>, backend: B, capabilities: &CapabilitySet) -> Self {
        let system = build_system_prompt(&tools, capabilities);
        Self {
            backend,
            tools,
            system,
            messages: Vec::new(),
        }
    }

    /// The tools this runner was built with.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Process one conversation turn.
    ///
    /// The model may direct any number of tool invocations (bounded by
    /// `MAX_TOOL_STEPS`) before answering in plain text. A failed turn
    /// leaves the committed transcript untouched, so the next turn starts
    /// clean.
    pub async fn respond(&mut self, invoker: &impl ToolInvoker, input: &str) -> Result<String> {
        let mut working = self.messages.clone();
        working.push(Message::user(input));

        for _ in 0..MAX_TOOL_STEPS {
            let response = self
                .backend
                .chat(ChatRequest {
                    messages: &working,
                    system: Some(&self.system),
                })
                .await?;

            let Some(directive) = parse_directive(&response.content) else {
                working.push(Message::assistant(response.content.clone()));
                self.messages = working;
                return Ok(response.content);
            };

            if !self.tools.iter().any(|t| t.name == directive.tool) {
                return Err(Error::Tool(format!(
                    "model requested unknown tool: {}",
                    directive.tool
                )));
            }

            tracing::debug!(tool = %directive.tool, "invoking tool");
            let output = invoker.invoke(&directive.tool, directive.arguments).await?;

            working.push(Message::assistant(response.content));
            working.push(Message::user(format!(
                "Tool {} returned:\n{output}",
                directive.tool
            )));
        }

        Err(Error::Tool(format!(
            "turn exceeded {MAX_TOOL_STEPS} tool invocations"
        )))
    }
}

/// Render the tool catalog and capability grant into the system prompt.
fn build_system_prompt(tools: &[Tool], capabilities: &CapabilitySet) -> String {
    let mut prompt = String::from(
        "You are purser, a concise assistant with access to remote tools.\n\n\
         Available tools:\n",
    );

    if tools.is_empty() {
        prompt.push_str("(none)\n");
    }
    for tool in tools {
        prompt.push_str(&format!(
            "- {}: {}\n  input schema: {}\n",
            tool.name,
            tool.description.as_deref().unwrap_or("(no description)"),
            tool.input_schema
        ));
    }

    prompt.push_str(
        "\nTo call a tool, reply with ONLY a JSON object of the form\n\
         {\"tool\": \"<name>\", \"arguments\": {...}}\n\
         and nothing else. The tool output will arrive in the next message.\n\
         When you have enough information, answer the user in plain text.\n",
    );

    if !capabilities.is_empty() {
        prompt.push_str(&format!(
            "\nWhen interpreting tool output you may use these helpers: {}.\n",
            capabilities.names().join(", ")
        ));
    }

    prompt
}

/// Try to read a tool directive out of a model reply.
///
/// Accepts the bare JSON object the prompt asks for, or one wrapped in a
/// fenced code block (models do that anyway).
fn parse_directive(content: &str) -> Option<ToolDirective> {
    let trimmed = content.trim();

    let candidate = if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.split("```").next()?.trim()
    } else {
        trimmed
    };

    serde_json::from_str(candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Backend that replays a fixed script of replies.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
            }
        }

        fn replying(replies: &[&str]) -> Self {
            Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
        }
    }

    impl LlmBackend for ScriptedBackend {
        async fn chat(&self, _request: ChatRequest<'_>) -> Result<ChatResponse> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted backend ran out of replies")
                .map(|content| ChatResponse { content })
        }
    }

    /// Invoker that records calls and returns a fixed output.
    struct ScriptedInvoker {
        output: String,
        calls: Mutex<Vec<(String, Option<Value>)>>,
    }

    impl ScriptedInvoker {
        fn returning(output: &str) -> Self {
            Self {
                output: output.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ToolInvoker for ScriptedInvoker {
        async fn invoke(&self, name: &str, arguments: Option<Value>) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));
            Ok(self.output.clone())
        }
    }

    fn sentiment_tool() -> Tool {
        serde_json::from_value(serde_json::json!({
            "name": "sentiment_analysis",
            "description": "Classify the sentiment of a text",
            "inputSchema": {"type": "object", "properties": {"text": {"type": "string"}}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn plain_answer_passes_through() {
        let backend = ScriptedBackend::replying(&["The sentiment is positive."]);
        let invoker = ScriptedInvoker::returning("");
        let mut runner = Runner::build(vec![sentiment_tool()], backend, &CapabilitySet::default());

        let answer = runner
            .respond(
                &invoker,
                "Analyze the sentiment of the following text 'This is awesome'",
            )
            .await
            .unwrap();

        assert!(!answer.is_empty());
        assert_eq!(answer, "The sentiment is positive.");
        assert!(invoker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_directive_invokes_and_feeds_back() {
        let backend = ScriptedBackend::replying(&[
            r#"{"tool": "sentiment_analysis", "arguments": {"text": "This is awesome"}}"#,
            "The text is clearly positive.",
        ]);
        let invoker = ScriptedInvoker::returning(r#"{"label": "positive", "score": 0.98}"#);
        let mut runner = Runner::build(vec![sentiment_tool()], backend, &CapabilitySet::default());

        let answer = runner.respond(&invoker, "How does this text feel?").await.unwrap();

        assert_eq!(answer, "The text is clearly positive.");
        let calls = invoker.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sentiment_analysis");
    }

    #[tokio::test]
    async fn fenced_directive_is_recognized() {
        let backend = ScriptedBackend::replying(&[
            "```json\n{\"tool\": \"sentiment_analysis\", \"arguments\": {\"text\": \"hi\"}}\n```",
            "Done.",
        ]);
        let invoker = ScriptedInvoker::returning("neutral");
        let mut runner = Runner::build(vec![sentiment_tool()], backend, &CapabilitySet::default());

        runner.respond(&invoker, "check").await.unwrap();
        assert_eq!(invoker.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_fails_the_turn() {
        let backend = ScriptedBackend::replying(&[r#"{"tool": "rm_rf", "arguments": {}}"#]);
        let invoker = ScriptedInvoker::returning("");
        let mut runner = Runner::build(vec![sentiment_tool()], backend, &CapabilitySet::default());

        let err = runner.respond(&invoker, "do it").await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)), "got {err:?}");
        assert!(invoker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_turn_does_not_poison_the_next() {
        let backend = ScriptedBackend::new(vec![
            Err(Error::Api("upstream hiccup".into())),
            Ok("All good now.".to_string()),
        ]);
        let invoker = ScriptedInvoker::returning("");
        let mut runner = Runner::build(vec![sentiment_tool()], backend, &CapabilitySet::default());

        let err = runner.respond(&invoker, "first try").await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));

        // Transcript was not committed; the next turn succeeds.
        let answer = runner.respond(&invoker, "second try").await.unwrap();
        assert_eq!(answer, "All good now.");
        assert_eq!(runner.messages.len(), 2);
        assert_eq!(runner.messages[0].content, "second try");
    }

    #[tokio::test]
    async fn runaway_tool_loop_is_bounded() {
        let directive = r#"{"tool": "sentiment_analysis", "arguments": {"text": "x"}}"#;
        let backend = ScriptedBackend::replying(&[directive; MAX_TOOL_STEPS]);
        let invoker = ScriptedInvoker::returning("positive");
        let mut runner = Runner::build(vec![sentiment_tool()], backend, &CapabilitySet::default());

        let err = runner.respond(&invoker, "loop forever").await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)), "got {err:?}");
        assert_eq!(invoker.calls.lock().unwrap().len(), MAX_TOOL_STEPS);
    }

    #[test]
    fn system_prompt_lists_tools_and_capabilities() {
        let prompt = build_system_prompt(&[sentiment_tool()], &CapabilitySet::default());
        assert!(prompt.contains("sentiment_analysis"));
        assert!(prompt.contains("json, ast, urllib, base64"));

        let bare = build_system_prompt(&[], &CapabilitySet::empty());
        assert!(bare.contains("(none)"));
        assert!(!bare.contains("helpers"));
    }

    #[test]
    fn directive_parsing_rejects_prose() {
        assert!(parse_directive("The sentiment is positive.").is_none());
        assert!(parse_directive(r#"{"not_a_tool": "x"}"#).is_none());
        assert!(parse_directive(r#"{"tool": "a"}"#).is_some());
    }
}
