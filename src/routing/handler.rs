//! Handler references and their resolution.
//!
//! # Responsibilities
//! - Represent what a route points at (`Controller@action`, a callable, or garbage)
//! - Map controller names to constructors and typed action tables
//! - Invoke the resolved action with positional parameters
//!
//! # Design Decisions
//! - No reflection: controllers are registered by name at startup
//! - A fresh controller is constructed for every invocation
//! - Missing controllers, missing actions and arity mismatches are fatal

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::http::context::RequestContext;
use crate::http::response::PortalResponse;
use crate::routing::error::DispatchError;
use crate::services::PortalServices;

/// An early exit from an action (guard redirect, validation failure).
#[derive(Debug)]
pub struct Halt(pub PortalResponse);

impl From<PortalResponse> for Halt {
    fn from(response: PortalResponse) -> Self {
        Halt(response)
    }
}

/// What every handler returns. `Err(Halt)` carries a complete response too.
pub type Outcome = Result<PortalResponse, Halt>;

/// Signature of a directly registered handler.
pub type CallableFn = dyn Fn(&mut RequestContext, &[String]) -> Outcome + Send + Sync;

/// What a route dispatches to.
#[derive(Clone)]
pub enum HandlerRef {
    ControllerAction { controller: String, action: String },
    Callable(Arc<CallableFn>),
    Invalid(String),
}

impl HandlerRef {
    /// Parse the `Controller@action` notation.
    pub fn action(notation: &str) -> Self {
        match notation.split_once('@') {
            Some((controller, action)) if !controller.is_empty() && !action.is_empty() => {
                HandlerRef::ControllerAction {
                    controller: controller.to_string(),
                    action: action.to_string(),
                }
            }
            _ => HandlerRef::Invalid(notation.to_string()),
        }
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&mut RequestContext, &[String]) -> Outcome + Send + Sync + 'static,
    {
        HandlerRef::Callable(Arc::new(f))
    }

    /// Resolve and run the handler.
    pub fn invoke(
        &self,
        registry: &ControllerRegistry,
        ctx: &mut RequestContext,
        params: &[String],
    ) -> Result<PortalResponse, DispatchError> {
        let outcome = match self {
            HandlerRef::ControllerAction { controller, action } => {
                registry.invoke(controller, action, ctx, params)?
            }
            HandlerRef::Callable(f) => f(ctx, params),
            HandlerRef::Invalid(text) => return Err(DispatchError::InvalidHandler(text.clone())),
        };

        Ok(match outcome {
            Ok(response) => response,
            Err(Halt(response)) => response,
        })
    }
}

impl From<&str> for HandlerRef {
    fn from(notation: &str) -> Self {
        HandlerRef::action(notation)
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::ControllerAction { controller, action } => {
                write!(f, "{}@{}", controller, action)
            }
            HandlerRef::Callable(_) => write!(f, "<callable>"),
            HandlerRef::Invalid(text) => write!(f, "<invalid: {}>", text),
        }
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerRef({})", self)
    }
}

/// A typed controller action.
pub enum Action<C> {
    Nullary(fn(&C, &mut RequestContext) -> Outcome),
    Unary(fn(&C, &mut RequestContext, &str) -> Outcome),
    Binary(fn(&C, &mut RequestContext, &str, &str) -> Outcome),
}

impl<C> Action<C> {
    pub fn arity(&self) -> usize {
        match self {
            Action::Nullary(_) => 0,
            Action::Unary(_) => 1,
            Action::Binary(_) => 2,
        }
    }

    /// Caller guarantees `params.len() == self.arity()`.
    fn call(&self, controller: &C, ctx: &mut RequestContext, params: &[String]) -> Outcome {
        match self {
            Action::Nullary(f) => f(controller, ctx),
            Action::Unary(f) => f(controller, ctx, &params[0]),
            Action::Binary(f) => f(controller, ctx, &params[0], &params[1]),
        }
    }
}

/// A controller type that can be registered by name.
pub trait Controller: Sized + 'static {
    /// Build a fresh instance for one request.
    fn new(services: &Arc<PortalServices>) -> Self;

    /// Look up an action by the name used in route definitions.
    fn action(name: &str) -> Option<Action<Self>>;
}

type InvokeFn = fn(&str, &str, &mut RequestContext, &[String]) -> Result<Outcome, DispatchError>;
type ArityFn = fn(&str) -> Option<usize>;

#[derive(Clone, Copy)]
struct ControllerEntry {
    invoke: InvokeFn,
    arity: ArityFn,
}

fn invoke_controller<C: Controller>(
    controller_name: &str,
    action_name: &str,
    ctx: &mut RequestContext,
    params: &[String],
) -> Result<Outcome, DispatchError> {
    let services = Arc::clone(ctx.services());
    let controller = C::new(&services);

    let action = C::action(action_name).ok_or_else(|| DispatchError::ActionNotFound {
        controller: controller_name.to_string(),
        action: action_name.to_string(),
    })?;

    if action.arity() != params.len() {
        return Err(DispatchError::ArityMismatch {
            controller: controller_name.to_string(),
            action: action_name.to_string(),
            expected: action.arity(),
            given: params.len(),
        });
    }

    Ok(action.call(&controller, ctx, params))
}

fn action_arity<C: Controller>(action_name: &str) -> Option<usize> {
    C::action(action_name).map(|a| a.arity())
}

/// Name → controller lookup, built once at startup.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, ControllerEntry>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller type under a name. A later registration under the
    /// same name replaces the earlier one.
    pub fn register<C: Controller>(&mut self, name: impl Into<String>) -> &mut Self {
        self.controllers.insert(
            name.into(),
            ControllerEntry {
                invoke: invoke_controller::<C>,
                arity: action_arity::<C>,
            },
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    /// Arity of `controller@action`, or the reason it cannot be resolved.
    pub fn arity_of(&self, controller: &str, action: &str) -> Result<usize, DispatchError> {
        let entry = self
            .controllers
            .get(controller)
            .ok_or_else(|| DispatchError::ControllerNotFound(controller.to_string()))?;
        (entry.arity)(action).ok_or_else(|| DispatchError::ActionNotFound {
            controller: controller.to_string(),
            action: action.to_string(),
        })
    }

    fn invoke(
        &self,
        controller: &str,
        action: &str,
        ctx: &mut RequestContext,
        params: &[String],
    ) -> Result<Outcome, DispatchError> {
        let entry = self
            .controllers
            .get(controller)
            .ok_or_else(|| DispatchError::ControllerNotFound(controller.to_string()))?;
        (entry.invoke)(controller, action, ctx, params)
    }
}
