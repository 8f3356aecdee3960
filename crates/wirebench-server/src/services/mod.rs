//! Authoring CRUD, one module per entity family.
//!
//! Every mutation is bulk and all-or-nothing: validation (id checks,
//! access, target fetches) runs first against the pooled connection,
//! then a single [`wirebench_storage::ChangeTxn`] performs only writes
//! and publishes the tracked events after commit. A failed validation
//! leaves storage untouched and publishes nothing.
//!
//! Update DTOs encode per-field presence with `Option`: a present
//! field replaces the stored value even when it is the type's zero,
//! an absent field preserves it.

pub mod edge;
pub mod execution;
pub mod flow;
pub mod node;
pub mod node_config;
pub mod variable;

use wirebench_engine::Id;

use crate::rpc::RpcError;

pub(crate) fn require_id(id: Id, what: &str) -> Result<(), RpcError> {
    if id.is_zero() {
        return Err(RpcError::invalid_argument(format!("{what} id is required")));
    }
    Ok(())
}
