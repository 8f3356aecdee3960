//! Store functions per entity family, generic over the connection so
//! reads run on the pool and writes run inside a [`crate::ChangeTxn`].
//!
//! Cascading deletes take the child ids as arguments instead of
//! reading them inside the transaction; callers fetch them during
//! validation, before the write transaction opens.

pub mod edge_store;
pub mod execution_store;
pub mod flow_store;
pub mod http_store;
pub mod node_config_store;
pub mod node_store;
pub mod response_store;
pub mod variable_store;
pub mod workspace_store;

use wirebench_engine::Id;

use crate::StoreError;

pub(crate) fn id_bytes(id: Id) -> Vec<u8> {
    id.as_bytes().to_vec()
}

pub(crate) fn opt_id_bytes(id: Option<Id>) -> Option<Vec<u8>> {
    id.map(id_bytes)
}

pub(crate) fn read_id(bytes: &[u8]) -> Result<Id, StoreError> {
    Ok(Id::from_bytes(bytes)?)
}

pub(crate) fn read_opt_id(bytes: &Option<Vec<u8>>) -> Result<Option<Id>, StoreError> {
    bytes.as_deref().map(read_id).transpose()
}

pub(crate) fn id_bytes_list(ids: &[Id]) -> Vec<Vec<u8>> {
    ids.iter().copied().map(id_bytes).collect()
}
