//! Base + delta HTTP resolution.
//!
//! A request node references a shared base definition and optionally a
//! delta definition. Resolution merges the two into a frozen
//! [`ResolvedRequest`] that execution operates on:
//!
//! - Method and URL: delta scalar overrides win when present.
//! - Headers / queries / body fields: a delta child with a parent
//!   reference overrides the matched base child (value replaced only
//!   when the override is present); a delta child without one adds a
//!   new entry. Disabled children are skipped on both sides.
//! - Asserts: union by id.

use crate::model::{
    BodyKind, FormField, HttpAssert, HttpBody, HttpDefinition, HttpHeader, HttpQuery,
    UrlEncodedField,
};

/// A definition with all child records loaded.
#[derive(Debug, Clone)]
pub struct HttpBundle {
    pub definition: HttpDefinition,
    pub headers: Vec<HttpHeader>,
    pub queries: Vec<HttpQuery>,
    pub body: HttpBody,
    pub asserts: Vec<HttpAssert>,
}

/// The frozen merge result a request node executes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub queries: Vec<(String, String)>,
    pub body: ResolvedBody,
    pub asserts: Vec<HttpAssert>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResolvedBody {
    #[default]
    None,
    Raw(Vec<u8>),
    Form(Vec<(String, String)>),
    UrlEncoded(Vec<(String, String)>),
}

/// Merge a base bundle with an optional delta bundle.
pub fn resolve(base: &HttpBundle, delta: Option<&HttpBundle>) -> ResolvedRequest {
    let method = delta
        .and_then(|d| d.definition.method_override.clone())
        .unwrap_or_else(|| base.definition.method.clone());
    let url = delta
        .and_then(|d| d.definition.url_override.clone())
        .unwrap_or_else(|| base.definition.url.clone());

    let headers = merge_children(
        &base.headers,
        delta.map(|d| d.headers.as_slice()).unwrap_or_default(),
        |h: &HttpHeader| (h.id, h.parent_id, h.enabled),
        |h| (h.key.clone(), h.value.clone()),
        |h| h.value_override.clone(),
    );
    let queries = merge_children(
        &base.queries,
        delta.map(|d| d.queries.as_slice()).unwrap_or_default(),
        |q: &HttpQuery| (q.id, q.parent_id, q.enabled),
        |q| (q.key.clone(), q.value.clone()),
        |q| q.value_override.clone(),
    );

    let body = resolve_body(base, delta);

    let mut asserts: Vec<HttpAssert> = base.asserts.iter().filter(|a| a.enabled).cloned().collect();
    if let Some(delta) = delta {
        for assert in delta.asserts.iter().filter(|a| a.enabled) {
            if !asserts.iter().any(|a| a.id == assert.id) {
                asserts.push(assert.clone());
            }
        }
    }

    ResolvedRequest {
        method,
        url,
        headers,
        queries,
        body,
        asserts,
    }
}

/// Shared merge for headers, queries, and body fields: base entries in
/// order, delta overrides applied by parent reference, delta additions
/// appended.
fn merge_children<C>(
    base: &[C],
    delta: &[C],
    meta: impl Fn(&C) -> (crate::Id, Option<crate::Id>, bool),
    pair: impl Fn(&C) -> (String, String),
    override_value: impl Fn(&C) -> Option<String>,
) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for child in base {
        let (id, _, enabled) = meta(child);
        if !enabled {
            continue;
        }
        let (key, mut value) = pair(child);
        for d in delta {
            let (_, parent, d_enabled) = meta(d);
            if d_enabled && parent == Some(id) {
                if let Some(v) = override_value(d) {
                    value = v;
                }
            }
        }
        out.push((key, value));
    }
    for d in delta {
        let (_, parent, enabled) = meta(d);
        if enabled && parent.is_none() {
            out.push(pair(d));
        }
    }
    out
}

fn resolve_body(base: &HttpBundle, delta: Option<&HttpBundle>) -> ResolvedBody {
    let kind = match delta.map(|d| d.definition.body_kind) {
        Some(k) if k != BodyKind::None => k,
        _ => base.definition.body_kind,
    };
    match kind {
        BodyKind::None => ResolvedBody::None,
        BodyKind::Raw => {
            let raw = delta
                .and_then(|d| d.definition.body_raw.clone())
                .or_else(|| base.definition.body_raw.clone())
                .unwrap_or_default();
            ResolvedBody::Raw(raw)
        }
        BodyKind::Form => ResolvedBody::Form(merge_children(
            &base.body.form,
            delta.map(|d| d.body.form.as_slice()).unwrap_or_default(),
            |f: &FormField| (f.id, f.parent_id, f.enabled),
            |f| (f.key.clone(), f.value.clone()),
            |f| f.value_override.clone(),
        )),
        BodyKind::UrlEncoded => ResolvedBody::UrlEncoded(merge_children(
            &base.body.url_encoded,
            delta
                .map(|d| d.body.url_encoded.as_slice())
                .unwrap_or_default(),
            |f: &UrlEncodedField| (f.id, f.parent_id, f.enabled),
            |f| (f.key.clone(), f.value.clone()),
            |f| f.value_override.clone(),
        )),
    }
}
