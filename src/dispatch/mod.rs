//! Pattern-routed message dispatch.
//!
//! A [`Message`] is a bag of named facets. Handlers declare a pattern per
//! facet and how their parameters are bound; the resolver selects every
//! handler whose patterns accept the message, orders them by identity
//! and invokes the first (or all) of them under a [`DeliveryHook`].
//!
//! ```text
//! Message ──► select_candidates ──► bind_parameters ──► handler ──► Reply
//!                                        │                           │
//!                                   DeliveryHook              ConversationRouter
//! ```

pub mod continuation;
pub mod descriptor;
pub mod hook;
pub mod message;
pub mod reply;
pub mod resolver;
pub mod value;

pub use continuation::{ContinuationStore, ConversationRouter};
pub use descriptor::{
    DescriptorBuilder, FacetPattern, HandlerDescriptor, HandlerFn, HandlerGroup,
    HandlerGroupBuilder, MatchPath, ParamBinding,
};
pub use hook::{DeliveryHook, NoopHook};
pub use message::Message;
pub use reply::{Dialog, Reply, Response, ResponseBuilder};
pub use resolver::{DispatchOutcome, Dispatcher, Invocation, bind_parameters, select_candidates};
pub use value::{Args, TargetType, Value, convert};
