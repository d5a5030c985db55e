//! Tool stub registry: pure, side-effect-free stand-ins for real tool
//! adapters, consulted only by the simulator so a plan can be previewed
//! without touching the outside world.

use std::collections::HashMap;

use paladin_core::ports::ToolStub;

#[derive(Default)]
pub struct StubRegistry {
    stubs: HashMap<String, Box<dyn ToolStub>>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool_name: impl Into<String>, stub: impl ToolStub + 'static) -> &mut Self {
        self.stubs.insert(tool_name.into(), Box::new(stub));
        self
    }

    pub fn get(&self, tool_name: &str) -> Option<&dyn ToolStub> {
        self.stubs.get(tool_name).map(|b| b.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registered_stub_is_pure() {
        let mut registry = StubRegistry::new();
        registry.register("Calendar.check", |args: &serde_json::Value| {
            json!({ "available": true, "echo": args.clone() })
        });
        let stub = registry.get("Calendar.check").unwrap();
        let a = stub.call(&json!({"date": "2026-02-10"}));
        let b = stub.call(&json!({"date": "2026-02-10"}));
        assert_eq!(a, b);
    }

    #[test]
    fn unregistered_tool_returns_none() {
        let registry = StubRegistry::new();
        assert!(registry.get("Nothing.here").is_none());
    }
}
