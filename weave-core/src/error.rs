//! Unified error type for the container
//!
//! Every failure raised while registering components, evaluating constants,
//! wiring instances or loading libraries is a [`ContainerError`]. Callers that
//! only care about the broad class of failure use [`ContainerError::kind`].

use thiserror::Error;

/// Result alias used throughout the crate
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// Broad classification of a [`ContainerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing instance, class, factory, hook or property
    NotFound,
    /// Two bindings for one name
    Duplicate,
    /// Kind mismatch or a value that cannot be coerced into the setter's type
    WrongInput,
    /// No registered cast edge between the supplied and the requested type
    CastUnavailable,
    /// Self-referencing alias, division by zero and similar states
    IllegalState,
    /// A shared library could not be loaded from any search path
    LibraryLoad,
    /// Malformed expression or timespan
    Syntax,
    /// Unreadable or unparseable configuration document
    Config,
    /// Failure reported by a component's own setter or hook
    Other,
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("missing instance of name {0}")]
    InstanceNotFound(String),

    #[error("attribute 'class' not specified for instance {0}")]
    ClassNotSpecified(String),

    #[error("factory for class {0} is missing")]
    FactoryNotFound(String),

    #[error("missing {kind} property {property} for type {type_name}")]
    PropertyNotFound {
        property: String,
        kind: &'static str,
        type_name: &'static str,
    },

    #[error("no such hook {hook} for type {type_name}")]
    HookNotFound {
        hook: String,
        type_name: &'static str,
    },

    #[error("constant {0} is missing attribute text, time, number or yes-when")]
    ConstantValueMissing(String),

    #[error("duplicate property {property} for type {type_name}")]
    DuplicateProperty {
        property: String,
        type_name: &'static str,
    },

    #[error("class {class} is already registered for type {existing}")]
    DuplicateFactory {
        class: String,
        existing: &'static str,
    },

    #[error("wrong input: {0}")]
    WrongInput(String),

    #[error("could not cast {from} to {to}")]
    CastUnavailable {
        from: &'static str,
        to: &'static str,
    },

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("failed to load library {library}: {}", failures.join("; "))]
    LibraryLoad {
        library: String,
        failures: Vec<String>,
    },

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ContainerError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InstanceNotFound(_)
            | Self::ClassNotSpecified(_)
            | Self::FactoryNotFound(_)
            | Self::PropertyNotFound { .. }
            | Self::HookNotFound { .. }
            | Self::ConstantValueMissing(_) => ErrorKind::NotFound,
            Self::DuplicateProperty { .. } | Self::DuplicateFactory { .. } => ErrorKind::Duplicate,
            Self::WrongInput(_) => ErrorKind::WrongInput,
            Self::CastUnavailable { .. } => ErrorKind::CastUnavailable,
            Self::IllegalState(_) => ErrorKind::IllegalState,
            Self::LibraryLoad { .. } => ErrorKind::LibraryLoad,
            Self::Syntax(_) => ErrorKind::Syntax,
            Self::Config(_) => ErrorKind::Config,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    pub(crate) fn wrong_input(message: impl Into<String>) -> Self {
        Self::WrongInput(message.into())
    }

    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ContainerError::InstanceNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ContainerError::CastUnavailable { from: "A", to: "B" }.kind(),
            ErrorKind::CastUnavailable
        );
        assert_eq!(
            ContainerError::from(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Other
        );
    }

    #[test]
    fn test_library_load_message_lists_failures() {
        let error = ContainerError::LibraryLoad {
            library: "plugin".into(),
            failures: vec!["/a: not found".into(), "/b: not found".into()],
        };

        assert_eq!(
            error.to_string(),
            "failed to load library plugin: /a: not found; /b: not found"
        );
    }
}
