//! Template-rendering agent action.
//!
//! Placeholders have the form `{type.field}` (a field of the consumed
//! payload) or `{type}` (the whole payload as JSON). `{{` and `}}` render a
//! literal brace. Referencing a type or field missing from the context is an
//! action failure.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::domain::ports::{AgentAction, Context};

/// Agent action that renders a template into `{output_key: text}`.
#[derive(Debug, Clone)]
pub struct TemplateAction {
    template: String,
    output_key: String,
    delay: Option<Duration>,
}

impl TemplateAction {
    /// Render `template` under `output_key`, without delay.
    pub fn new(template: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            output_key: output_key.into(),
            delay: None,
        }
    }

    /// Simulate external work before rendering.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl AgentAction for TemplateAction {
    async fn invoke(&self, context: Context) -> Result<Value> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = render_template(&self.template, &context)?;
        let mut output = serde_json::Map::new();
        output.insert(self.output_key.clone(), Value::String(text));
        Ok(Value::Object(output))
    }
}

/// Render a template against an agent context.
pub fn render_template(template: &str, context: &Context) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => key.push(k),
                        None => bail!("unterminated placeholder {{{key}"),
                    }
                }
                out.push_str(&resolve(key.trim(), context)?);
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn resolve(key: &str, context: &Context) -> Result<String> {
    let (trace_type, field) = match key.split_once('.') {
        Some((t, f)) => (t, Some(f)),
        None => (key, None),
    };

    let payload = context
        .get(trace_type)
        .ok_or_else(|| anyhow!("no input of type '{trace_type}'"))?;

    let Some(field) = field else {
        return Ok(Value::Object(payload.clone()).to_string());
    };

    match payload.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => bail!("input '{trace_type}' has no field '{field}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::normalize_outcome;
    use serde_json::json;

    fn context() -> Context {
        let mut context = Context::new();
        context.insert(
            "goal".to_string(),
            normalize_outcome(json!({"goal": "Build an API"})),
        );
        context.insert(
            "plan".to_string(),
            normalize_outcome(json!({"steps": ["design", "implement"]})),
        );
        context
    }

    #[test]
    fn test_renders_fields_and_payloads() {
        let text = render_template("Analyzed: {goal.goal} via {plan.steps}", &context()).unwrap();
        assert_eq!(text, "Analyzed: Build an API via [\"design\",\"implement\"]");

        let whole = render_template("{goal}", &context()).unwrap();
        assert_eq!(whole, "{\"goal\":\"Build an API\"}");
    }

    #[test]
    fn test_escaped_braces() {
        let text = render_template("fn main() {{ {goal.goal} }}", &context()).unwrap();
        assert_eq!(text, "fn main() { Build an API }");
    }

    #[test]
    fn test_missing_inputs_fail() {
        assert!(render_template("{analysis.text}", &context()).is_err());
        assert!(render_template("{goal.missing}", &context()).is_err());
        assert!(render_template("{goal.goal", &context()).is_err());
    }

    #[tokio::test]
    async fn test_invoke_wraps_output_key() {
        let action = TemplateAction::new("Plan for {goal.goal}", "plan");
        let out = action.invoke(context()).await.unwrap();
        assert_eq!(out, json!({"plan": "Plan for Build an API"}));
    }
}
