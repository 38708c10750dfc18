//! Structured steps emitted by the model.
//!
//! The model is asked to answer every request with exactly one JSON object
//! such as `{"step": "plan", "content": "..."}`. [`Step::parse`] turns that
//! text into a [`Step`] or explains why it can't.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde_json::{Map, Value, json};

/// The reasoning phase a step belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// The model restates what the user wants.
    Start,
    /// The model decides how to proceed.
    Plan,
    /// The model asks the host to run a tool.
    Action,
    /// A tool's output, always produced by the host.
    Observe,
    /// The final answer for the current query.
    Result,
}

impl StepKind {
    /// Returns the wire name of this kind.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Start => "start",
            StepKind::Plan => "plan",
            StepKind::Action => "action",
            StepKind::Observe => "observe",
            StepKind::Result => "result",
        }
    }
}

impl Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(StepKind::Start),
            "plan" => Ok(StepKind::Plan),
            "action" => Ok(StepKind::Action),
            "observe" => Ok(StepKind::Observe),
            "result" => Ok(StepKind::Result),
            other => Err(StepError::schema(format!("unknown step `{other}`"))),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    /// Name of the tool to call.
    pub function: String,
    /// The raw tool input, either a plain string or structured JSON.
    pub input: Value,
    /// Optional narration attached to the action.
    pub content: Option<String>,
}

/// One structured unit of model output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// See [`StepKind::Start`].
    Start {
        /// What the model understood.
        content: String,
    },
    /// See [`StepKind::Plan`].
    Plan {
        /// What the model intends to do.
        content: String,
    },
    /// See [`StepKind::Action`].
    Action(Action),
    /// See [`StepKind::Observe`].
    Observe {
        /// The tool's return value.
        output: Value,
    },
    /// See [`StepKind::Result`].
    Result {
        /// The final answer.
        content: String,
    },
}

/// Errors from [`Step::parse`].
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The text is not a JSON document.
    #[error("malformed step: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The text is JSON, but not a valid step.
    #[error("schema violation: {0}")]
    SchemaViolation(String),
}

impl StepError {
    #[inline]
    fn schema<S: Into<String>>(reason: S) -> Self {
        StepError::SchemaViolation(reason.into())
    }
}

impl Step {
    /// Parses the raw model output.
    ///
    /// The kind is read from the `step` key (`kind` is accepted too). The
    /// fields each kind requires must be present with the right types;
    /// nothing is defaulted.
    pub fn parse(raw: &str) -> Result<Step, StepError> {
        let value: Value =
            serde_json::from_str(raw.trim()).map_err(StepError::Malformed)?;
        let Value::Object(mut fields) = value else {
            return Err(StepError::schema("expected a JSON object"));
        };

        let kind = match fields.remove("step").or_else(|| fields.remove("kind"))
        {
            Some(Value::String(kind)) => kind.parse::<StepKind>()?,
            Some(_) => return Err(StepError::schema("`step` must be a string")),
            None => return Err(StepError::schema("missing `step`")),
        };

        let step = match kind {
            StepKind::Start => Step::Start {
                content: required_string(&mut fields, kind, "content")?,
            },
            StepKind::Plan => Step::Plan {
                content: required_string(&mut fields, kind, "content")?,
            },
            StepKind::Result => Step::Result {
                content: required_string(&mut fields, kind, "content")?,
            },
            StepKind::Action => {
                let function = required_string(&mut fields, kind, "function")?;
                if function.trim().is_empty() {
                    return Err(StepError::schema(
                        "`function` of an action step must not be empty",
                    ));
                }
                let Some(input) = fields.remove("input") else {
                    return Err(StepError::schema(
                        "action step is missing `input`",
                    ));
                };
                let content = match fields.remove("content") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(content)) => Some(content),
                    Some(_) => {
                        return Err(StepError::schema(
                            "`content` must be a string",
                        ));
                    }
                };
                Step::Action(Action {
                    function,
                    input,
                    content,
                })
            }
            StepKind::Observe => {
                let Some(output) = fields.remove("output") else {
                    return Err(StepError::schema(
                        "observe step is missing `output`",
                    ));
                };
                Step::Observe { output }
            }
        };
        Ok(step)
    }

    /// Creates an observation carrying a tool's output.
    #[inline]
    pub fn observation<V: Into<Value>>(output: V) -> Step {
        Step::Observe {
            output: output.into(),
        }
    }

    /// Returns the kind of this step.
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Start { .. } => StepKind::Start,
            Step::Plan { .. } => StepKind::Plan,
            Step::Action(_) => StepKind::Action,
            Step::Observe { .. } => StepKind::Observe,
            Step::Result { .. } => StepKind::Result,
        }
    }

    /// Returns the narration text, if this step has any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Step::Start { content }
            | Step::Plan { content }
            | Step::Result { content } => Some(content),
            Step::Action(action) => action.content.as_deref(),
            Step::Observe { .. } => None,
        }
    }

    /// Converts the step back to its wire representation.
    pub fn to_value(&self) -> Value {
        let kind = self.kind().as_str();
        match self {
            Step::Start { content }
            | Step::Plan { content }
            | Step::Result { content } => {
                json!({ "step": kind, "content": content })
            }
            Step::Action(action) => {
                let mut value = json!({
                    "step": kind,
                    "function": action.function,
                    "input": action.input,
                });
                if let Some(content) = &action.content {
                    value["content"] = Value::String(content.clone());
                }
                value
            }
            Step::Observe { output } => json!({ "step": kind, "output": output }),
        }
    }

    /// Serializes the step as compact JSON.
    #[inline]
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

fn required_string(
    fields: &mut Map<String, Value>,
    kind: StepKind,
    name: &str,
) -> Result<String, StepError> {
    match fields.remove(name) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(StepError::schema(format!("`{name}` must be a string"))),
        None => Err(StepError::schema(format!(
            "{kind} step is missing `{name}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reasoning_steps() {
        let step =
            Step::parse(r#"{"step": "start", "content": "User wants files."}"#)
                .unwrap();
        assert_eq!(
            step,
            Step::Start {
                content: "User wants files.".to_owned()
            }
        );

        // Extra keys the prompt format mentions are tolerated.
        let step = Step::parse(
            r#"{"step": "plan", "content": "Use ls.", "function": null, "input": null}"#,
        )
        .unwrap();
        assert_eq!(step.kind(), StepKind::Plan);
        assert_eq!(step.content(), Some("Use ls."));

        let step =
            Step::parse(r#"  {"kind": "result", "content": "Done."}  "#).unwrap();
        assert_eq!(step.kind(), StepKind::Result);
    }

    #[test]
    fn test_parse_action() {
        let step = Step::parse(
            r#"{"step": "action", "function": "execute_shell_command", "input": "ls"}"#,
        )
        .unwrap();
        let Step::Action(action) = step else {
            panic!("expected an action");
        };
        assert_eq!(action.function, "execute_shell_command");
        assert_eq!(action.input, Value::String("ls".to_owned()));
        assert_eq!(action.content, None);

        let step = Step::parse(
            r#"{"step": "action", "content": "Reading.", "function": "read_file", "input": {"path": "a.txt"}}"#,
        )
        .unwrap();
        assert_eq!(step.content(), Some("Reading."));
    }

    #[test]
    fn test_action_requires_function() {
        for raw in [
            r#"{"step": "action", "input": "ls"}"#,
            r#"{"step": "action", "function": "", "input": "ls"}"#,
            r#"{"step": "action", "function": 3, "input": "ls"}"#,
            r#"{"step": "action", "function": "read_file"}"#,
        ] {
            let err = Step::parse(raw).unwrap_err();
            assert!(
                matches!(err, StepError::SchemaViolation(_)),
                "{raw}: {err:?}"
            );
        }
    }

    #[test]
    fn test_schema_violations() {
        for raw in [
            r#"["step", "plan"]"#,
            r#"{"content": "no kind"}"#,
            r#"{"step": "reflect", "content": "?"}"#,
            r#"{"step": 1}"#,
            r#"{"step": "plan"}"#,
            r#"{"step": "result", "content": null}"#,
            r#"{"step": "observe"}"#,
        ] {
            let err = Step::parse(raw).unwrap_err();
            assert!(
                matches!(err, StepError::SchemaViolation(_)),
                "{raw}: {err:?}"
            );
        }
    }

    #[test]
    fn test_malformed() {
        for raw in ["", "plan: start", r#"{"step": "plan", "content": "x""#] {
            assert!(matches!(
                Step::parse(raw).unwrap_err(),
                StepError::Malformed(_)
            ));
        }
    }

    #[test]
    fn test_to_json_parses_back() {
        let steps = [
            Step::Plan {
                content: "Check the weather.".to_owned(),
            },
            Step::Action(Action {
                function: "get_weather".to_owned(),
                input: json!("Paris"),
                content: Some("Looking it up.".to_owned()),
            }),
            Step::observation("Sunny +21°C"),
        ];
        for step in steps {
            assert_eq!(Step::parse(&step.to_json()).unwrap(), step);
        }
        assert_eq!(
            Step::observation("a.txt\nb.txt").to_value(),
            json!({ "step": "observe", "output": "a.txt\nb.txt" })
        );
    }
}
