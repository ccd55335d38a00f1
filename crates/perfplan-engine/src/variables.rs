//! Per-virtual-user variables
//!
//! Extractors store values read from a response; later requests of the same
//! virtual user refer to them as `${name}` in their URL, headers or body.
//! Values persist across iterations. Placeholders naming an unknown variable
//! are sent as written.

use std::collections::HashMap;

use bytes::Bytes;
use perfplan_core::{JsonExtractor, NodeId, NodeKind, TestPlan};
use serde_json::Value;

use crate::executor::SampleRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replaces every `${name}` with its value.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let name = &after[..end];
                    match self.values.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 1]),
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Substitutes into the URL, header values and a UTF-8 body of `request`.
    pub fn apply(&self, request: &mut SampleRequest) {
        if self.is_empty() {
            return;
        }

        request.url = self.substitute(&request.url);
        for (_, value) in &mut request.headers {
            if value.contains("${") {
                *value = self.substitute(value);
            }
        }

        let body = request
            .body
            .as_ref()
            .and_then(|body| std::str::from_utf8(body).ok())
            .filter(|text| text.contains("${"))
            .map(|text| self.substitute(text));
        if let Some(body) = body {
            request.body = Some(Bytes::from(body));
        }
    }

    /// Runs `extractors` against a response body and stores their results.
    pub fn extract_all<'a>(&mut self, extractors: impl IntoIterator<Item = &'a JsonExtractor>, body: &[u8]) {
        let mut parsed: Option<Option<Value>> = None;

        for extractor in extractors {
            let document = parsed.get_or_insert_with(|| serde_json::from_slice(body).ok());
            let value = match document {
                Some(document) => extract(extractor, document),
                None => extractor.default.clone(),
            };

            tracing::trace!(variable = %extractor.variable, path = %extractor.path, value = %value, "extracted variable");
            self.set(extractor.variable.clone(), value);
        }
    }
}

/// Value at the extractor's path, or its default when nothing matches.
pub fn extract(extractor: &JsonExtractor, document: &Value) -> String {
    match document.pointer(&extractor.pointer) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => extractor.default.clone(),
        Some(other) => other.to_string(),
    }
}

/// Extractors attached directly to `node`, in document order.
pub fn extractors_of(plan: &TestPlan, node: NodeId) -> Vec<JsonExtractor> {
    plan.children(node)
        .filter_map(|child| match child.kind() {
            NodeKind::Extractor(extractor) => Some(extractor.clone()),
            _ => None,
        })
        .collect()
}
