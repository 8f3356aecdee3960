//! Lexical variable scope for a flow run.
//!
//! The base frame holds enabled flow variables and the workspace
//! environment. Each loop iteration pushes a frame binding
//! `iteration_index` (and `item` for for_each). Request-node output is
//! bound under `nodes.<name>.response` in the parent frame, so a
//! response produced inside a loop iteration is still visible after
//! the iteration's frame is popped. Resolution walks frames
//! innermost-first.

use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<Map<String, Value>>,
}

impl Scope {
    pub fn new(base: Map<String, Value>) -> Self {
        Self { frames: vec![base] }
    }

    /// Push an empty frame for a loop iteration.
    pub fn push_frame(&mut self) {
        self.frames.push(Map::new());
    }

    /// Pop the innermost frame. The base frame is never popped.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Bind a name in the innermost frame, shadowing outer frames.
    pub fn bind(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Record a request node's output under `nodes.<name>.response` in
    /// the parent frame (one below the innermost, base at top level),
    /// so the binding outlives the loop iteration that produced it.
    pub fn bind_node_response(&mut self, node_name: &str, response: Value) {
        let parent = self.frames.len().saturating_sub(2);
        let frame = match self.frames.get_mut(parent) {
            Some(f) => f,
            None => return,
        };
        let nodes = frame
            .entry("nodes".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = nodes {
            let mut entry = Map::new();
            entry.insert("response".to_string(), response);
            map.insert(node_name.to_string(), Value::Object(entry));
        }
    }

    /// Resolve a name against the innermost frame that defines it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    /// Merge all frames into one object, inner frames shadowing outer.
    /// This is the evaluation context for expressions and the payload
    /// shipped to the JS executor.
    pub fn flatten(&self) -> Value {
        let mut merged = Map::new();
        for frame in &self.frames {
            for (k, v) in frame {
                // "nodes" accumulates across frames rather than shadowing.
                if k == "nodes" {
                    if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                        (merged.get_mut(k), v)
                    {
                        for (name, entry) in incoming {
                            existing.insert(name.clone(), entry.clone());
                        }
                        continue;
                    }
                }
                merged.insert(k.clone(), v.clone());
            }
        }
        Value::Object(merged)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("host".into(), json!("example.com"));
        m
    }

    #[test]
    fn inner_frame_shadows_outer() {
        let mut scope = Scope::new(base());
        scope.push_frame();
        scope.bind("host", json!("inner.test"));
        assert_eq!(scope.get("host"), Some(&json!("inner.test")));
        scope.pop_frame();
        assert_eq!(scope.get("host"), Some(&json!("example.com")));
    }

    #[test]
    fn base_frame_never_popped() {
        let mut scope = Scope::new(base());
        scope.pop_frame();
        scope.pop_frame();
        assert_eq!(scope.depth(), 1);
        assert_eq!(scope.get("host"), Some(&json!("example.com")));
    }

    #[test]
    fn node_response_visible_in_flatten() {
        let mut scope = Scope::new(base());
        scope.bind_node_response("login", json!({"status": 200}));
        let ctx = scope.flatten();
        assert_eq!(ctx["nodes"]["login"]["response"]["status"], json!(200));
    }

    #[test]
    fn node_responses_accumulate_across_frames() {
        let mut scope = Scope::new(base());
        scope.bind_node_response("first", json!({"status": 200}));
        scope.push_frame();
        scope.bind_node_response("second", json!({"status": 404}));
        let ctx = scope.flatten();
        assert_eq!(ctx["nodes"]["first"]["response"]["status"], json!(200));
        assert_eq!(ctx["nodes"]["second"]["response"]["status"], json!(404));
    }

    #[test]
    fn node_response_survives_frame_pop() {
        let mut scope = Scope::new(base());
        scope.push_frame();
        scope.bind_node_response("ping", json!({"status": 200}));
        scope.pop_frame();
        let ctx = scope.flatten();
        assert_eq!(ctx["nodes"]["ping"]["response"]["status"], json!(200));
    }

    #[test]
    fn loop_bindings_disappear_after_pop() {
        let mut scope = Scope::new(base());
        scope.push_frame();
        scope.bind("iteration_index", json!(3));
        assert_eq!(scope.get("iteration_index"), Some(&json!(3)));
        scope.pop_frame();
        assert_eq!(scope.get("iteration_index"), None);
    }
}
