//! SeaORM entities, one per table. Id columns are 16-byte blobs; the
//! stores convert to and from [`wirebench_engine::Id`].

pub mod edge;
pub mod flow;
pub mod flow_variable;
pub mod http_assert;
pub mod http_definition;
pub mod http_form_field;
pub mod http_header;
pub mod http_query;
pub mod http_response;
pub mod http_response_assert;
pub mod http_response_header;
pub mod http_url_encoded_field;
pub mod node;
pub mod node_condition;
pub mod node_execution;
pub mod node_for;
pub mod node_for_each;
pub mod node_http;
pub mod node_js;
pub mod node_no_op;
pub mod workspace;
pub mod workspace_user;
