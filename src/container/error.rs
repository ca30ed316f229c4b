use std::fmt;

pub type ContainerResult<T> = Result<T, ContainerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    RegistrationConflict { name: String },
    InvalidRegistration { reason: String },
    NoSuchBean { requested: String },
    NoUniqueBean { requested: String, candidates: Vec<String> },
    InstantiationFailed { name: String, reason: String },
    CircularDependency { path: Vec<String> },
    ContainerDropped { name: String },
    /// A stored bean did not downcast to the requested view; sealed registrations only
    /// declare views of their supplier's type, so this signals a broken registration.
    TypeMismatch { name: String, expected: String },
    ConditionFailed { reason: String },
    InvalidEnvironment { reason: String },
    Supplier { reason: String },
}

impl ContainerError {
    /// Error for factories to report their own failures.
    pub fn supplier(reason: impl Into<String>) -> Self {
        ContainerError::Supplier {
            reason: reason.into(),
        }
    }

    /// Error for conditions that cannot decide.
    pub fn condition(reason: impl Into<String>) -> Self {
        ContainerError::ConditionFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ContainerError::InvalidRegistration {
            reason: reason.into(),
        }
    }

    /// True for the two cardinality failures a `Selection` can report.
    pub fn is_cardinality_error(&self) -> bool {
        matches!(
            self,
            ContainerError::NoSuchBean { .. } | ContainerError::NoUniqueBean { .. }
        )
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::RegistrationConflict { name } => {
                write!(f, "Bean {name} has already been registered")
            }
            ContainerError::InvalidRegistration { reason } => {
                write!(f, "Invalid registration: {reason}")
            }
            ContainerError::NoSuchBean { requested } => {
                write!(f, "No bean matches {requested}")
            }
            ContainerError::NoUniqueBean {
                requested,
                candidates,
            } => write!(
                f,
                "Expected a single bean matching {requested} but found {}: {}",
                candidates.len(),
                candidates.join(", ")
            ),
            ContainerError::InstantiationFailed { name, reason } => {
                write!(f, "Bean {name} failed to instantiate: {reason}")
            }
            ContainerError::CircularDependency { path } => {
                write!(f, "Circular dependency detected: {}", path.join(" -> "))
            }
            ContainerError::ContainerDropped { name } => {
                write!(f, "Bean {name} outlived its container")
            }
            ContainerError::TypeMismatch { name, expected } => {
                write!(f, "Bean {name} cannot be viewed as {expected}")
            }
            ContainerError::ConditionFailed { reason } => {
                write!(f, "Condition could not be evaluated: {reason}")
            }
            ContainerError::InvalidEnvironment { reason } => {
                write!(f, "Invalid environment: {reason}")
            }
            ContainerError::Supplier { reason } => f.write_str(reason),
        }
    }
}

impl std::error::Error for ContainerError {}
