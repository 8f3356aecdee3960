//! Domain model — the contract between storage, services, and runner.
//!
//! Node kinds, edge handles, error-handling modes, and sub-config
//! presence are all closed sums. Wire tags are fixed integers; keep
//! the explicit discriminants stable.

/// Integer-tag conversions for a closed wire enum. Unknown tags map
/// to the named fallback variant instead of failing.
macro_rules! wire_enum {
    ($name:ident, fallback = $fallback:ident, { $($tag:literal => $variant:ident),+ $(,)? }) => {
        impl $name {
            pub fn from_i32(value: i32) -> Self {
                match value {
                    $($tag => Self::$variant,)+
                    _ => Self::$fallback,
                }
            }

            pub fn as_i32(self) -> i32 {
                self as i32
            }
        }
    };
}

pub(crate) use wire_enum;

mod execution;
mod flow;
mod http;
mod node;

pub use execution::{ExecutionState, NodeExecution};
pub use flow::{Flow, FlowVariable, Workspace, WorkspaceRole, WorkspaceUser};
pub use http::{
    AssertResult, BodyKind, FormField, HttpAssert, HttpBody, HttpDefinition, HttpHeader, HttpQuery,
    HttpResponse, ResponseAssert, ResponseHeader, UrlEncodedField,
};
pub use node::{
    CompressionKind, Edge, EdgeHandle, EdgeKind, ErrorHandling, Node, NodeCondition, NodeFor,
    NodeForEach, NodeHttp, NodeJs, NodeKind, NodeNoOp, NodeState, NoOpKind,
};
