//! Shared HTTP definitions, their delta overrides, and run-time responses.
//!
//! A definition's children (headers, queries, asserts) carry delta
//! linkage inline: `is_delta` marks a child belonging to a delta
//! definition, and `parent_id` points at the base child it overrides.
//! A delta child without a `parent_id` adds an entry instead.

use serde::{Deserialize, Serialize};

use crate::id::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum BodyKind {
    #[default]
    None = 0,
    Raw = 1,
    Form = 2,
    UrlEncoded = 3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDefinition {
    pub id: Id,
    pub workspace_id: Id,
    pub method: String,
    pub url: String,
    pub body_kind: BodyKind,
    pub body_raw: Option<Vec<u8>>,
    /// Set on delta definitions; points at the base definition.
    pub parent_id: Option<Id>,
    /// Delta-only scalar overrides. Present wins over the base value.
    pub method_override: Option<String>,
    pub url_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpHeader {
    pub id: Id,
    pub http_id: Id,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub is_delta: bool,
    pub parent_id: Option<Id>,
    pub value_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpQuery {
    pub id: Id,
    pub http_id: Id,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub is_delta: bool,
    pub parent_id: Option<Id>,
    pub value_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub id: Id,
    pub http_id: Id,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub is_delta: bool,
    pub parent_id: Option<Id>,
    pub value_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlEncodedField {
    pub id: Id,
    pub http_id: Id,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub is_delta: bool,
    pub parent_id: Option<Id>,
    pub value_override: Option<String>,
}

/// An assertion evaluated against the response, e.g.
/// `response.status == 200`. `blocking` asserts fail the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpAssert {
    pub id: Id,
    pub http_id: Id,
    pub expr: String,
    pub enabled: bool,
    pub blocking: bool,
}

/// Full body for a definition, loaded alongside its children.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpBody {
    pub raw: Option<Vec<u8>>,
    pub form: Vec<FormField>,
    pub url_encoded: Vec<UrlEncodedField>,
}

// ---------------------------------------------------------------------------
// Run-time artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    pub id: Id,
    pub request_node_id: Id,
    pub status: u16,
    pub body: Vec<u8>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub id: Id,
    pub response_id: Id,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertResult {
    Passed,
    Failed,
}

super::wire_enum!(BodyKind, fallback = None, {
    1 => Raw,
    2 => Form,
    3 => UrlEncoded,
});

impl AssertResult {
    pub fn from_i32(value: i32) -> Self {
        if value == 1 {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Passed => 1,
            Self::Failed => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseAssert {
    pub id: Id,
    pub response_id: Id,
    pub expr: String,
    pub result: AssertResult,
}
