/// Metric definitions and the per-metric value collection loop.
///
/// Each metric declares how raw input becomes a value: either a built-in
/// coercion kind or a custom preprocessor, never both on the same attempt.
use crate::prompt::LineSource;
use serde::Deserialize;
use std::fmt;

/// A collected datum, ready for CSV serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Coercion applied to raw input when no preprocessor is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Integer,
    Float,
    Text,
}

impl MetricKind {
    /// Name shown in re-prompt messages.
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Integer => "integer",
            MetricKind::Float => "float",
            MetricKind::Text => "text",
        }
    }

    fn coerce(self, raw: &str) -> Option<Value> {
        match self {
            MetricKind::Integer => raw.trim().parse::<i64>().ok().map(Value::Int),
            MetricKind::Float => raw.trim().parse::<f64>().ok().map(Value::Float),
            MetricKind::Text => Some(Value::Text(raw.to_string())),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Custom conversion from raw input text; replaces kind coercion entirely
/// when present on a definition. The error string is shown to the user
/// before re-prompting.
pub type Preprocessor = Box<dyn Fn(&str) -> Result<Value, String>>;

/// One value to collect per tracking session.
pub struct MetricDefinition {
    name: String,
    kind: MetricKind,
    prompt: String,
    preprocessor: Option<Preprocessor>,
    default: Option<Value>,
}

impl fmt::Debug for MetricDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("prompt", &self.prompt)
            .field("preprocessor", &self.preprocessor.is_some())
            .field("default", &self.default)
            .finish()
    }
}

impl MetricDefinition {
    /// Create a definition with no preprocessor and no default.
    /// `prompt` may contain a `{metric}` placeholder for the name.
    pub fn new(name: &str, kind: MetricKind, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            prompt: prompt.to_string(),
            preprocessor: None,
            default: None,
        }
    }

    /// Fallback value used when the user submits an empty line.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Custom conversion; fully replaces kind coercion.
    #[allow(dead_code)]
    pub fn with_preprocessor(mut self, pre: Preprocessor) -> Self {
        self.preprocessor = Some(pre);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Prompt the user until a usable value is obtained.
    ///
    /// Empty input uses the default when one is configured; otherwise the
    /// user is told a value is required and re-prompted. Input that fails
    /// coercion or preprocessing re-prompts with a message naming the
    /// expected kind. `max_attempts = None` retries forever; `Some(n)`
    /// fails with `AttemptsExhausted` after n failed attempts.
    pub fn collect(
        &self,
        source: &mut dyn LineSource,
        max_attempts: Option<u32>,
    ) -> Result<Value, CollectError> {
        let rendered = self.prompt.replace("{metric}", &self.name);
        let mut attempts = 0u32;
        loop {
            let line = source
                .read_line(&rendered)
                .map_err(|e| CollectError::Input {
                    metric: self.name.clone(),
                    source: e,
                })?;

            if line.is_empty() {
                if let Some(default) = &self.default {
                    return Ok(default.clone());
                }
                println!("This metric requires a value.");
            } else {
                match self.interpret(&line) {
                    Ok(value) => return Ok(value),
                    Err(message) => println!("{message}"),
                }
            }

            attempts += 1;
            if let Some(max) = max_attempts {
                if attempts >= max {
                    tracing::warn!(
                        metric = %self.name,
                        attempts,
                        "giving up after repeated invalid input"
                    );
                    return Err(CollectError::AttemptsExhausted {
                        metric: self.name.clone(),
                        attempts,
                    });
                }
            }
        }
    }

    /// Exactly one conversion path runs per attempt, chosen by presence of
    /// the preprocessor.
    fn interpret(&self, raw: &str) -> Result<Value, String> {
        match &self.preprocessor {
            Some(pre) => pre(raw).map_err(|e| format!("Invalid value: {e}")),
            None => self
                .kind
                .coerce(raw)
                .ok_or_else(|| format!("Please enter a valid {}.", self.kind.name())),
        }
    }
}

/// Errors that can terminate value collection.
#[derive(Debug)]
pub enum CollectError {
    /// The input channel failed (e.g. stdin closed).
    Input {
        metric: String,
        source: std::io::Error,
    },
    /// The configured attempt bound was reached without a usable value.
    AttemptsExhausted { metric: String, attempts: u32 },
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::Input { metric, source } => {
                write!(f, "failed to read input for metric '{metric}': {source}")
            }
            CollectError::AttemptsExhausted { metric, attempts } => {
                write!(
                    f,
                    "no valid value for metric '{metric}' after {attempts} attempts"
                )
            }
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Input { source, .. } => Some(source),
            CollectError::AttemptsExhausted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::QueuedLines;

    fn mood() -> MetricDefinition {
        MetricDefinition::new("mood", MetricKind::Integer, "Rate your {metric} 1-10: ")
    }

    #[test]
    fn test_integer_coercion() {
        let mut source = QueuedLines::new(["7"]);
        let value = mood().collect(&mut source, None).unwrap();
        assert_eq!(value, Value::Int(7));
    }

    #[test]
    fn test_integer_coercion_trims_whitespace() {
        let mut source = QueuedLines::new(["  42  "]);
        let value = mood().collect(&mut source, None).unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn test_float_coercion() {
        let def = MetricDefinition::new("weight", MetricKind::Float, "{metric}: ");
        let mut source = QueuedLines::new(["72.5"]);
        assert_eq!(def.collect(&mut source, None).unwrap(), Value::Float(72.5));
    }

    #[test]
    fn test_text_passes_raw_line_through() {
        let def = MetricDefinition::new("note", MetricKind::Text, "{metric}: ");
        let mut source = QueuedLines::new(["  slept well, no coffee  "]);
        assert_eq!(
            def.collect(&mut source, None).unwrap(),
            Value::Text("  slept well, no coffee  ".to_string())
        );
    }

    #[test]
    fn test_prompt_substitutes_metric_name() {
        let mut source = QueuedLines::new(["7"]);
        mood().collect(&mut source, None).unwrap();
        assert_eq!(source.prompts, vec!["Rate your mood 1-10: "]);
    }

    #[test]
    fn test_invalid_then_valid_reprompts() {
        // Scenario: "abc" is rejected, "3" succeeds on the second attempt.
        let mut source = QueuedLines::new(["abc", "3"]);
        let value = mood().collect(&mut source, None).unwrap();
        assert_eq!(value, Value::Int(3));
        assert_eq!(source.prompts.len(), 2);
    }

    #[test]
    fn test_empty_input_uses_default_without_reprompt() {
        let def = mood().with_default(Value::Int(5));
        let mut source = QueuedLines::new([""]);
        let value = def.collect(&mut source, None).unwrap();
        assert_eq!(value, Value::Int(5));
        assert_eq!(source.prompts.len(), 1);
    }

    #[test]
    fn test_empty_input_without_default_reprompts() {
        let mut source = QueuedLines::new(["", "", "7"]);
        let value = mood().collect(&mut source, None).unwrap();
        assert_eq!(value, Value::Int(7));
        assert_eq!(source.prompts.len(), 3);
    }

    #[test]
    fn test_nonempty_input_ignores_default() {
        let def = mood().with_default(Value::Int(5));
        let mut source = QueuedLines::new(["9"]);
        assert_eq!(def.collect(&mut source, None).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_preprocessor_replaces_kind_coercion() {
        // Declared kind is Integer but the preprocessor decides; the kind
        // is never consulted.
        let def = mood().with_preprocessor(Box::new(|raw| {
            Ok(Value::Text(raw.to_uppercase()))
        }));
        let mut source = QueuedLines::new(["good"]);
        assert_eq!(
            def.collect(&mut source, None).unwrap(),
            Value::Text("GOOD".to_string())
        );
    }

    #[test]
    fn test_preprocessor_error_reprompts() {
        let def = mood().with_preprocessor(Box::new(|raw| {
            if raw == "bad" {
                Err("not allowed".to_string())
            } else {
                Ok(Value::Int(1))
            }
        }));
        let mut source = QueuedLines::new(["bad", "ok"]);
        assert_eq!(def.collect(&mut source, None).unwrap(), Value::Int(1));
        assert_eq!(source.prompts.len(), 2);
    }

    #[test]
    fn test_attempts_exhausted() {
        let mut source = QueuedLines::new(["x", "y", "z"]);
        let err = mood().collect(&mut source, Some(2)).unwrap_err();
        match err {
            CollectError::AttemptsExhausted { metric, attempts } => {
                assert_eq!(metric, "mood");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(source.prompts.len(), 2);
    }

    #[test]
    fn test_empty_without_default_counts_as_attempt() {
        let mut source = QueuedLines::new(["", ""]);
        let err = mood().collect(&mut source, Some(2)).unwrap_err();
        assert!(matches!(err, CollectError::AttemptsExhausted { .. }));
    }

    #[test]
    fn test_unbounded_retries_outlast_many_failures() {
        let mut lines: Vec<String> = vec!["nope".to_string(); 50];
        lines.push("8".to_string());
        let mut source = QueuedLines::new(lines);
        assert_eq!(mood().collect(&mut source, None).unwrap(), Value::Int(8));
        assert_eq!(source.prompts.len(), 51);
    }

    #[test]
    fn test_stdin_closed_propagates() {
        let mut source = QueuedLines::new(Vec::<String>::new());
        let err = mood().collect(&mut source, None).unwrap_err();
        assert!(matches!(err, CollectError::Input { .. }));
        assert!(err.to_string().contains("mood"));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Float(72.5).to_string(), "72.5");
        assert_eq!(Value::Text("fine".to_string()).to_string(), "fine");
    }
}
