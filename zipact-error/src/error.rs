use crate::ErrorKind;
use std::fmt;

/// Harness error.
///
/// Raised once where the failure happens; callers only add operations and
/// context on the way up. Earlier operations are kept in the context under
/// `called`.
pub struct Error {
    kind: ErrorKind,
    message: String,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying error. Only one source is kept.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }
        if !self.context.is_empty() {
            let pairs: Vec<String> = self.context.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
            write!(f, " {{ {} }}", pairs.join(", "))?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Error");
        s.field("kind", &self.kind).field("message", &self.message);
        if !self.operation.is_empty() {
            s.field("operation", &self.operation);
        }
        if !self.context.is_empty() {
            s.field("context", &self.context);
        }
        if let Some(source) = &self.source {
            s.field("source", &format_args!("{:#}", source));
        }
        s.finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string()).set_source(err)
    }
}

impl Error {
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn unknown_environment(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::UnknownEnvironment, format!("unknown environment '{}'", name)).with_context("env", name)
    }

    pub fn environment_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EnvironmentFailed, message)
    }

    pub fn unknown_agent(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::UnknownAgent, format!("unknown agent '{}'", name)).with_context("agent", name)
    }

    pub fn step_limit_reached(max_steps: usize) -> Self {
        Self::new(ErrorKind::StepLimitReached, format!("step limit ({}) reached", max_steps))
            .with_context("max_steps", max_steps.to_string())
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }

    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationFailed, message)
    }

    pub fn template_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TemplateFailed, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_chain_into_context() {
        let err = Error::new(ErrorKind::IoFailed, "write failed")
            .with_operation("record::append")
            .with_context("path", "logs/a.jsonl")
            .with_operation("experiment::run");

        assert_eq!(err.operation(), "experiment::run");
        assert_eq!(
            err.context(),
            &[("path", "logs/a.jsonl".to_string()), ("called", "record::append".to_string())]
        );
    }

    #[test]
    fn test_display_is_single_line() {
        let err = Error::step_limit_reached(50).with_operation("agent::step");
        assert_eq!(
            err.to_string(),
            "StepLimitReached at agent::step { max_steps: 50 }: step limit (50) reached"
        );
        assert!(!format!("{:?}", err).contains('\n'));
    }

    #[test]
    fn test_retryable_follows_kind() {
        assert!(Error::environment_failed("connection reset").is_retryable());
        assert!(!Error::parse_failed("bad json").is_retryable());
    }

    #[test]
    fn test_io_conversion_keeps_source() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_source_in_display() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::parse_failed("state json").set_source(parse_err);
        assert!(err.to_string().contains("(caused by: "));
    }

    #[test]
    fn test_named_constructors_record_the_name() {
        let err = Error::unknown_agent("cot");
        assert_eq!(err.kind(), ErrorKind::UnknownAgent);
        assert_eq!(err.context()[0], ("agent", "cot".to_string()));
    }
}
