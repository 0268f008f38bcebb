use std::fmt;

/// What went wrong, grouped by the layer that raises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Bad experiment config, CLI flag or missing credential
    ConfigInvalid,

    // llm
    InferenceFailed,
    RateLimited,
    AuthenticationFailed,
    NetworkFailed,

    // environments
    UnknownEnvironment,
    EnvironmentFailed,

    // agents
    UnknownAgent,
    /// The agent's own step budget is spent; the episode ends as a failure.
    StepLimitReached,

    // model output, records and prompts
    ParseFailed,
    SerializationFailed,
    TemplateFailed,

    // filesystem
    FileNotFound,
    PermissionDenied,
    IoFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::UnknownEnvironment => "UnknownEnvironment",
            ErrorKind::EnvironmentFailed => "EnvironmentFailed",
            ErrorKind::UnknownAgent => "UnknownAgent",
            ErrorKind::StepLimitReached => "StepLimitReached",
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",
            ErrorKind::TemplateFailed => "TemplateFailed",
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
        }
    }

    /// Transient failures of a remote model or simulator.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed | ErrorKind::RateLimited | ErrorKind::NetworkFailed | ErrorKind::EnvironmentFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
