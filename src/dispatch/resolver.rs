//! Candidate selection, parameter binding and invocation.
//!
//! Selection and binding are pure functions of the message and the
//! descriptors. [`Dispatcher`] adds the delivery hook and the
//! first-match / all-matches policy on top.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Level, debug, error, info, trace, warn};

use crate::dispatch::descriptor::{HandlerDescriptor, HandlerGroup};
use crate::dispatch::hook::{DeliveryGuard, DeliveryHook, NoopHook};
use crate::dispatch::message::Message;
use crate::dispatch::reply::Reply;
use crate::dispatch::value::{Args, convert};
use crate::error::{ConversionError, InvocationError};
use crate::template::TemplateMatch;

/// Descriptors whose facet patterns all accept `message`, in ascending
/// identity order regardless of the order they were given in.
pub fn select_candidates<'a>(
    message: &Message,
    descriptors: &'a [HandlerDescriptor],
) -> Vec<&'a HandlerDescriptor> {
    let mut ordered: Vec<&HandlerDescriptor> = descriptors.iter().collect();
    ordered.sort_by(|a, b| a.identity().cmp(b.identity()));
    ordered
        .into_iter()
        .filter(|d| {
            d.patterns()
                .all(|(facet, pattern)| pattern.matches(message.get(facet)))
        })
        .collect()
}

/// Extract and convert the arguments for one invocation of `descriptor`.
///
/// Captures are recomputed from the facet templates on every call; the
/// selection step may have accepted the message through the raw regex
/// path, which captures nothing.
pub fn bind_parameters(
    message: &Message,
    descriptor: &HandlerDescriptor,
) -> Result<Args, ConversionError> {
    let mut captures: HashMap<&str, Option<TemplateMatch>> = HashMap::new();
    let mut values = Vec::with_capacity(descriptor.bindings().len());

    for binding in descriptor.bindings() {
        let facet_value = message.get(&binding.facet);
        let raw = match &binding.variable {
            None => facet_value,
            Some(name) => {
                let matched = captures.entry(binding.facet.as_str()).or_insert_with(|| {
                    descriptor
                        .pattern(&binding.facet)
                        .and_then(|p| p.captures(facet_value))
                });
                matched.as_ref().and_then(|m| m.first(name))
            }
        };
        values.push(convert(raw, binding.target)?);
    }

    Ok(Args::new(values))
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Result of invoking one candidate.
#[derive(Debug)]
pub struct Invocation {
    pub identity: String,
    pub result: Result<Reply, InvocationError>,
}

/// What a dispatch did.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// No candidate accepted the message. Nothing was invoked.
    NoMatch,
    /// The candidates that ran, in invocation order.
    Invoked(Vec<Invocation>),
}

impl DispatchOutcome {
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch)
    }

    pub fn invocations(&self) -> &[Invocation] {
        match self {
            Self::NoMatch => &[],
            Self::Invoked(invocations) => invocations,
        }
    }

    /// Identities of the invoked candidates, in order.
    pub fn identities(&self) -> Vec<&str> {
        self.invocations()
            .iter()
            .map(|i| i.identity.as_str())
            .collect()
    }

    /// Replies of the successful invocations.
    pub fn replies(&self) -> impl Iterator<Item = &Reply> {
        self.invocations()
            .iter()
            .filter_map(|i| i.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &InvocationError> {
        self.invocations()
            .iter()
            .filter_map(|i| i.result.as_ref().err())
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Invokes selected candidates under a delivery hook.
#[derive(Clone)]
pub struct Dispatcher {
    hook: Arc<dyn DeliveryHook>,
    delivery_level: Level,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(NoopHook))
    }
}

impl Dispatcher {
    pub fn new(hook: Arc<dyn DeliveryHook>) -> Self {
        Self {
            hook,
            delivery_level: Level::INFO,
        }
    }

    /// Level at which each handler invocation is logged.
    pub fn with_delivery_level(mut self, level: Level) -> Self {
        self.delivery_level = level;
        self
    }

    /// Dispatch `message` to `group` using the group's multiplicity.
    pub fn dispatch(&self, message: &Message, group: &HandlerGroup) -> DispatchOutcome {
        let candidates = select_candidates(message, group.descriptors());
        if candidates.is_empty() {
            info!(group = %group.name(), message = %message, "No handler matched");
            return DispatchOutcome::NoMatch;
        }
        self.run(message, candidates, group.invoke_all_matches())
    }

    /// Dispatch to a loose descriptor list. Multiplicity follows the
    /// `invoke_all_matches` flag of the first selected candidate.
    pub fn dispatch_descriptors(
        &self,
        message: &Message,
        descriptors: &[HandlerDescriptor],
    ) -> DispatchOutcome {
        let candidates = select_candidates(message, descriptors);
        let Some(first) = candidates.first() else {
            info!(message = %message, "No handler matched");
            return DispatchOutcome::NoMatch;
        };
        let invoke_all = first.invoke_all_matches();
        self.run(message, candidates, invoke_all)
    }

    fn run(
        &self,
        message: &Message,
        candidates: Vec<&HandlerDescriptor>,
        invoke_all: bool,
    ) -> DispatchOutcome {
        debug!(
            message_id = %message.id,
            candidates = candidates.len(),
            invoke_all,
            "Dispatching"
        );
        let take = if invoke_all { candidates.len() } else { 1 };
        let invocations = candidates
            .into_iter()
            .take(take)
            .map(|d| self.invoke(message, d))
            .collect();
        DispatchOutcome::Invoked(invocations)
    }

    /// Bind and call a single descriptor inside the delivery hook.
    pub fn invoke(&self, message: &Message, descriptor: &HandlerDescriptor) -> Invocation {
        let identity = descriptor.identity().to_string();
        self.log_delivery(&identity, message);

        let result = {
            let (_guard, before) = DeliveryGuard::enter(self.hook.as_ref(), descriptor);
            match before {
                Err(e) => Err(InvocationError::Delivery {
                    identity: identity.clone(),
                    reason: e.to_string(),
                }),
                Ok(()) => match bind_parameters(message, descriptor) {
                    Err(source) => Err(InvocationError::Conversion {
                        identity: identity.clone(),
                        source,
                    }),
                    Ok(args) => descriptor.call(&args).map_err(|source| {
                        InvocationError::Handler {
                            identity: identity.clone(),
                            source,
                        }
                    }),
                },
            }
        };

        if let Err(e) = &result {
            error!(identity = %identity, message = %message, error = %e, "Unable to invoke handler");
        }

        Invocation { identity, result }
    }

    fn log_delivery(&self, identity: &str, message: &Message) {
        let level = self.delivery_level;
        if level == Level::ERROR {
            error!(identity = %identity, message = %message, "Invoking handler");
        } else if level == Level::WARN {
            warn!(identity = %identity, message = %message, "Invoking handler");
        } else if level == Level::INFO {
            info!(identity = %identity, message = %message, "Invoking handler");
        } else if level == Level::DEBUG {
            debug!(identity = %identity, message = %message, "Invoking handler");
        } else {
            trace!(identity = %identity, message = %message, "Invoking handler");
        }
    }
}
