use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::container::container::Container;
use crate::container::environment::Environment;
use crate::container::error::ContainerResult;
use crate::container::selector::Selector;
use crate::container::types::Origin;

type Evaluate =
    Arc<dyn Fn(&ConditionContext<'_>) -> ContainerResult<ConditionOutcome> + Send + Sync>;

/// Result of evaluating a single [`Condition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionOutcome {
    is_match: bool,
    message: Option<String>,
}

impl ConditionOutcome {
    pub fn matched(message: impl Into<String>) -> Self {
        Self {
            is_match: true,
            message: Some(message.into()),
        }
    }

    pub fn no_match(message: impl Into<String>) -> Self {
        Self {
            is_match: false,
            message: Some(message.into()),
        }
    }

    pub fn is_match(&self) -> bool {
        self.is_match
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl From<bool> for ConditionOutcome {
    fn from(is_match: bool) -> Self {
        Self {
            is_match,
            message: None,
        }
    }
}

/// What a condition gets to look at: the environment and the beans registered so far.
pub struct ConditionContext<'a> {
    container: &'a Container,
}

impl<'a> ConditionContext<'a> {
    pub(crate) fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub fn environment(&self) -> &Environment {
        self.container.environment()
    }

    /// True when at least one registration matches `selector`; never instantiates.
    pub fn contains<T: ?Sized + 'static>(&self, selector: &Selector<T>) -> bool {
        !self.container.select(selector).is_empty()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.container.contains_name(name)
    }
}

/// Gate deciding whether a registration, or a whole registrar, takes effect.
#[derive(Clone)]
pub struct Condition {
    evaluate: Evaluate,
    origin: Option<Origin>,
}

impl Condition {
    pub fn new<F, O>(evaluate: F) -> Self
    where
        F: Fn(&ConditionContext<'_>) -> ContainerResult<O> + Send + Sync + 'static,
        O: Into<ConditionOutcome>,
    {
        Self {
            evaluate: evaluator(move |context| evaluate(context).map(Into::into)),
            origin: None,
        }
    }

    /// Tags the condition for diagnostics; evaluation is unaffected.
    pub fn with_origin(&self, origin: impl Into<Origin>) -> Self {
        Self {
            evaluate: Arc::clone(&self.evaluate),
            origin: Some(origin.into()),
        }
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn evaluate(&self, context: &ConditionContext<'_>) -> ContainerResult<ConditionOutcome> {
        (self.evaluate)(context)
    }

    /// Matches when `profile` is among the active profiles.
    pub fn has_profile(profile: impl Into<String>) -> Self {
        let profile = profile.into();
        Self::new(move |context| {
            Ok(if context.environment().has_profile(&profile) {
                ConditionOutcome::matched(format!("profile {profile} is active"))
            } else {
                ConditionOutcome::no_match(format!("profile {profile} is not active"))
            })
        })
    }

    /// Matches when the property at `key` equals `expected`.
    pub fn on_property(key: impl Into<String>, expected: Value) -> Self {
        let key = key.into();
        Self::new(move |context| {
            Ok(match context.environment().property(&key) {
                Some(actual) if *actual == expected => {
                    ConditionOutcome::matched(format!("property {key} is {expected}"))
                }
                Some(actual) => ConditionOutcome::no_match(format!(
                    "property {key} is {actual}, not {expected}"
                )),
                None => ConditionOutcome::no_match(format!("property {key} is not set")),
            })
        })
    }

    /// Matches when something matching `selector` is already registered.
    pub fn on_present<T: ?Sized + 'static>(selector: Selector<T>) -> Self {
        Self::new(move |context| {
            Ok(if context.contains(&selector) {
                ConditionOutcome::matched(format!("found {}", selector.describe()))
            } else {
                ConditionOutcome::no_match(format!("no {}", selector.describe()))
            })
        })
    }

    /// Matches when nothing matching `selector` is registered yet.
    pub fn on_missing<T: ?Sized + 'static>(selector: Selector<T>) -> Self {
        Self::on_present(selector).negate()
    }

    pub fn negate(&self) -> Self {
        let inner = Arc::clone(&self.evaluate);
        Self {
            evaluate: evaluator(move |context| {
                let outcome = inner(context)?;
                Ok(ConditionOutcome {
                    is_match: !outcome.is_match,
                    message: outcome.message.map(|message| format!("not ({message})")),
                })
            }),
            origin: self.origin.clone(),
        }
    }
}

fn evaluator<F>(evaluate: F) -> Evaluate
where
    F: Fn(&ConditionContext<'_>) -> ContainerResult<ConditionOutcome> + Send + Sync + 'static,
{
    Arc::new(evaluate)
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Evaluates `conditions` as a conjunction and returns the first outcome that did not match.
///
/// An empty slice matches. Errors abort evaluation and are returned as is.
pub(crate) fn first_mismatch(
    conditions: &[Condition],
    context: &ConditionContext<'_>,
) -> ContainerResult<Option<ConditionOutcome>> {
    for condition in conditions {
        let outcome = condition.evaluate(context)?;
        if !outcome.is_match() {
            return Ok(Some(outcome));
        }
    }
    Ok(None)
}
