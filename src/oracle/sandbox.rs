use std::{sync::mpsc, thread, time::Duration};

use boa_engine::{error::JsNativeErrorKind, vm::RuntimeLimits, Context, JsError, Source};
use thiserror::Error;

use crate::{
    oracle::{DependencyClosure, OracleConfig, SandboxValue},
    syntax::SourceTree,
    Error, Result,
};

/// Stack size of the worker thread; deep recursion inside the engine needs more than the
/// default.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Why an evaluation produced no value.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OracleError {
    /// The target expression threw.
    #[error("evaluation threw: {0}")]
    Thrown(String),

    /// A declaration in the prelude threw.
    #[error("prelude threw: {0}")]
    Prelude(String),

    /// The wall-clock limit elapsed.
    #[error("evaluation timed out after {0:?}")]
    Timeout(Duration),

    /// A loop, recursion or stack limit of the engine was hit.
    #[error("runtime limit exceeded: {0}")]
    RuntimeLimit(String),

    /// A name was read that the closure does not declare.
    #[error("'{0}' is not defined")]
    UndefinedReference(String),

    /// The result has no literal form.
    #[error("cannot represent a {0} as a literal")]
    Unrepresentable(&'static str),

    /// The result could not be copied out of the engine.
    #[error("cannot marshal result: {0}")]
    Marshal(String),

    /// The worker stopped without reporting.
    #[error("sandbox worker disconnected")]
    Disconnected,
}

impl OracleError {
    /// True if retrying with a larger closure cannot help.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Self::UndefinedReference(_))
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutcome {
    /// The fragment evaluated to this value.
    Value(SandboxValue),
    /// The fragment read a name the closure does not declare.
    MissingName(String),
    /// The evaluation failed for any other reason.
    Fatal(OracleError),
}

impl OracleOutcome {
    /// Collapses the outcome for callers that cannot grow the closure.
    ///
    /// # Errors
    ///
    /// A missing name becomes [`OracleError::UndefinedReference`].
    pub fn into_value(self) -> std::result::Result<SandboxValue, OracleError> {
        match self {
            Self::Value(value) => Ok(value),
            Self::MissingName(name) => Err(OracleError::UndefinedReference(name)),
            Self::Fatal(error) => Err(error),
        }
    }
}

/// Factory for isolated evaluations.
///
/// The sandbox itself holds only configuration. Each call to [`Sandbox::evaluate`] creates a
/// fresh engine context on a fresh worker thread and drops both afterwards.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: OracleConfig,
}

impl Sandbox {
    /// Creates a sandbox with the given resource bounds.
    #[must_use]
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    /// The resource bounds in use.
    #[must_use]
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Evaluates `target` after the declarations of `closure`.
    ///
    /// # Arguments
    ///
    /// * `closure` - Declarations to run first, printed in original position order.
    /// * `tree` - The tree the declarations come from; used for printing.
    /// * `target` - Source text of the expression whose value is wanted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codegen`] if the prelude cannot be printed and [`Error::Sandbox`] if no
    /// worker thread can be started. Failures of the evaluation itself are reported through
    /// [`OracleOutcome`].
    pub fn evaluate(
        &self,
        closure: &DependencyClosure,
        tree: &SourceTree,
        target: &str,
    ) -> Result<OracleOutcome> {
        let prelude = if closure.is_empty() {
            String::new()
        } else {
            closure.prelude(tree)?
        };
        self.run(prelude, target.to_string())
    }

    /// Evaluates raw prelude text followed by `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sandbox`] if no worker thread can be started.
    pub fn evaluate_source(&self, prelude: &str, target: &str) -> Result<OracleOutcome> {
        self.run(prelude.to_string(), target.to_string())
    }

    fn run(&self, prelude: String, target: String) -> Result<OracleOutcome> {
        let (tx, rx) = mpsc::channel();
        let config = self.config.clone();

        thread::Builder::new()
            .name("deconfuser-sandbox".into())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                let outcome = evaluate_isolated(&config, &prelude, &target);
                let _ = tx.send(outcome);
            })
            .map_err(|e| Error::Sandbox(e.to_string()))?;

        // A timed-out worker is left to run into the engine's loop limit on its own.
        Ok(match rx.recv_timeout(self.config.timeout) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                OracleOutcome::Fatal(OracleError::Timeout(self.config.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                OracleOutcome::Fatal(OracleError::Disconnected)
            }
        })
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Prelude,
    Target,
}

fn evaluate_isolated(config: &OracleConfig, prelude: &str, target: &str) -> OracleOutcome {
    let mut context = Context::default();
    let mut limits = RuntimeLimits::default();
    limits.set_loop_iteration_limit(config.loop_iteration_limit);
    limits.set_recursion_limit(config.recursion_limit);
    limits.set_stack_size_limit(config.stack_size_limit);
    context.set_runtime_limits(limits);

    if !prelude.is_empty() {
        if let Err(err) = context.eval(Source::from_bytes(prelude.as_bytes())) {
            return classify(&err, &mut context, Stage::Prelude);
        }
    }
    match context.eval(Source::from_bytes(target.as_bytes())) {
        Ok(value) => match SandboxValue::from_js(&value, &mut context) {
            Ok(value) => OracleOutcome::Value(value),
            Err(error) => OracleOutcome::Fatal(error),
        },
        Err(err) => classify(&err, &mut context, Stage::Target),
    }
}

fn classify(err: &JsError, context: &mut Context, stage: Stage) -> OracleOutcome {
    if let Ok(native) = err.try_native(context) {
        match native.kind {
            JsNativeErrorKind::Reference => {
                if let Some(name) = missing_name(native.message()) {
                    return OracleOutcome::MissingName(name);
                }
            }
            JsNativeErrorKind::RuntimeLimit => {
                return OracleOutcome::Fatal(OracleError::RuntimeLimit(
                    native.message().to_string(),
                ));
            }
            _ => {}
        }
    }
    let text = err.to_string();
    OracleOutcome::Fatal(match stage {
        Stage::Prelude => OracleError::Prelude(text),
        Stage::Target => OracleError::Thrown(text),
    })
}

/// Extracts `name` from a `<name> is not defined` reference error message.
fn missing_name(message: &str) -> Option<String> {
    let name = message.strip_suffix(" is not defined")?;
    let mut chars = name.chars();
    let first = chars.next()?;
    let valid_start = first == '_' || first == '$' || first.is_alphabetic();
    if valid_start && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric()) {
        Some(name.to_string())
    } else {
        None
    }
}
