//! Flow runtime and live-sync primitives for the wirebench API workbench.
//!
//! This crate owns everything that does not touch a database
//! connection: the domain model, the time-ordered [`id::Id`], the
//! topic-filtered event streams with snapshot⊕tail subscriptions, the
//! expression evaluator, the HTTP base+delta resolver, and the flow
//! runner with its execution side-channel. Storage and the RPC surface
//! live in `wirebench-storage` and `wirebench-server`.

pub mod event;
pub mod expr;
pub mod id;
pub mod js;
pub mod model;
pub mod resolver;
pub mod runner;
pub mod scope;
pub mod stream;

pub use event::{ChangeKind, EventHub};
pub use id::Id;
