//! Hierarchical metrics emission.
//!
//! Samplers do not format their output themselves; they describe it through
//! [`MetricsEmitter`]: open a named section, write scalar key-value pairs, open
//! and close nested sub-sections, close the section. [`JsonEmitter`] turns those
//! calls into a [`serde_json::Value`] tree.
//!
//! ```rust
//! use cgmeter::emit::{JsonEmitter, MetricsEmitter};
//!
//! let mut emitter = JsonEmitter::default();
//! emitter.section("cgroup_cpuacct_stats");
//! emitter.sub("cpu0");
//! emitter.double("user", 12.5);
//! emitter.sub_end();
//! emitter.section_end();
//!
//! let doc = emitter.take();
//! assert_eq!(doc["cgroup_cpuacct_stats"]["cpu0"]["user"], 12.5);
//! ```

use serde_json::{Map, Value};

/// Receiver of hierarchical metric output.
pub trait MetricsEmitter {
    /// Opens a top-level section.
    fn section(&mut self, name: &str);
    /// Closes the innermost open section.
    fn section_end(&mut self);
    /// Opens a sub-section inside the current section.
    fn sub(&mut self, name: &str);
    /// Closes the innermost open sub-section.
    fn sub_end(&mut self);
    fn string(&mut self, key: &str, value: &str);
    fn long(&mut self, key: &str, value: u64);
    fn double(&mut self, key: &str, value: f64);
}

/// Builds a JSON object out of emitted metrics.
///
/// Scalars written outside of any section land at the top level of the document.
/// Non-finite floating point values are stored as `null`.
#[derive(Debug, Default)]
pub struct JsonEmitter {
    root: Map<String, Value>,
    open: Vec<(String, Map<String, Value>)>,
}

impl JsonEmitter {
    /// Returns the document built so far and resets the emitter.
    ///
    /// Sections left open are closed first.
    pub fn take(&mut self) -> Value {
        while !self.open.is_empty() {
            self.close();
        }
        Value::Object(std::mem::take(&mut self.root))
    }

    fn open(&mut self, name: &str) {
        self.open.push((name.to_owned(), Map::new()));
    }

    fn close(&mut self) {
        match self.open.pop() {
            Some((name, map)) => {
                self.current().insert(name, Value::Object(map));
            }
            None => log::debug!("ignoring unbalanced section end"),
        }
    }

    fn current(&mut self) -> &mut Map<String, Value> {
        match self.open.last_mut() {
            Some((_, map)) => map,
            None => &mut self.root,
        }
    }
}

impl MetricsEmitter for JsonEmitter {
    fn section(&mut self, name: &str) {
        self.open(name);
    }

    fn section_end(&mut self) {
        self.close();
    }

    fn sub(&mut self, name: &str) {
        self.open(name);
    }

    fn sub_end(&mut self) {
        self.close();
    }

    fn string(&mut self, key: &str, value: &str) {
        self.current()
            .insert(key.to_owned(), Value::String(value.to_owned()));
    }

    fn long(&mut self, key: &str, value: u64) {
        self.current().insert(key.to_owned(), Value::from(value));
    }

    fn double(&mut self, key: &str, value: f64) {
        self.current().insert(key.to_owned(), Value::from(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_sections() {
        let mut emitter = JsonEmitter::default();
        emitter.section("cgroup_config");
        emitter.string("cpus", "0,1");
        emitter.long("memory_limit_bytes", 1024);
        emitter.section_end();
        emitter.section("cgroup_cpuacct_stats");
        emitter.sub("cpu1");
        emitter.double("user", 50.0);
        emitter.double("sys", 0.5);
        emitter.sub_end();
        emitter.section_end();

        assert_eq!(
            emitter.take(),
            json!({
                "cgroup_config": {"cpus": "0,1", "memory_limit_bytes": 1024},
                "cgroup_cpuacct_stats": {"cpu1": {"user": 50.0, "sys": 0.5}},
            })
        );
    }

    #[test]
    fn test_take_resets_and_closes_open_sections() {
        let mut emitter = JsonEmitter::default();
        emitter.section("cgroup_memory_stats");
        emitter.long("failcnt", 2);

        assert_eq!(
            emitter.take(),
            json!({"cgroup_memory_stats": {"failcnt": 2}})
        );
        assert_eq!(emitter.take(), json!({}));
    }

    #[test]
    fn test_empty_section_is_kept() {
        let mut emitter = JsonEmitter::default();
        emitter.section("cgroup_cpuacct_stats");
        emitter.section_end();
        assert_eq!(emitter.take(), json!({"cgroup_cpuacct_stats": {}}));
    }

    #[test]
    fn test_unbalanced_end_is_ignored() {
        let mut emitter = JsonEmitter::default();
        emitter.sub_end();
        emitter.long("top", 1);
        assert_eq!(emitter.take(), json!({"top": 1}));
    }

    #[test]
    fn test_non_finite_double_is_null() {
        let mut emitter = JsonEmitter::default();
        emitter.double("nan", f64::NAN);
        assert_eq!(emitter.take(), json!({"nan": null}));
    }
}
