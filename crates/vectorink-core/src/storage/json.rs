//! JSON implementation of the node storage.

use super::{Storage, StorageError, StorageResult, node_key};
use serde_json::{Map, Number, Value};

/// Node storage backed by a `serde_json::Value` tree.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    root: Value,
    /// Keys of the currently opened nodes, outermost first.
    path: Vec<String>,
    error: Option<String>,
}

impl Default for JsonStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonStorage {
    /// An empty storage ready for writing.
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
            path: Vec::new(),
            error: None,
        }
    }

    /// Wrap parsed JSON for reading.
    pub fn from_value(root: Value) -> Self {
        Self {
            root,
            path: Vec::new(),
            error: None,
        }
    }

    pub fn from_json(text: &str) -> StorageResult<Self> {
        let root: Value =
            serde_json::from_str(text).map_err(|e| StorageError::Serialization(e.to_string()))?;
        if !root.is_object() {
            return Err(StorageError::Serialization(
                "root is not an object".to_string(),
            ));
        }
        Ok(Self::from_value(root))
    }

    pub fn to_json(&self, pretty: bool) -> StorageResult<String> {
        let text = if pretty {
            serde_json::to_string_pretty(&self.root)
        } else {
            serde_json::to_string(&self.root)
        };
        text.map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    /// Whether all opened nodes were closed.
    pub fn is_balanced(&self) -> bool {
        self.path.is_empty()
    }

    fn current(&self) -> Option<&Map<String, Value>> {
        let mut node = self.root.as_object()?;
        for key in &self.path {
            node = node.get(key)?.as_object()?;
        }
        Some(node)
    }

    fn current_mut(&mut self) -> Option<&mut Map<String, Value>> {
        let mut node = self.root.as_object_mut()?;
        for key in &self.path {
            node = node.get_mut(key)?.as_object_mut()?;
        }
        Some(node)
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.current()?.get(name)
    }

    fn put(&mut self, name: &str, value: Value) {
        if let Some(node) = self.current_mut() {
            node.insert(name.to_string(), value);
        }
    }
}

impl Storage for JsonStorage {
    fn read_node(&mut self, name: &str, index: i32, ended: bool) -> bool {
        if ended {
            return self.path.pop().is_some();
        }
        let key = node_key(name, index);
        let exists = self
            .get(&key)
            .map(|v| v.is_object())
            .unwrap_or(false);
        if exists {
            self.path.push(key);
        }
        exists
    }

    fn write_node(&mut self, name: &str, index: i32, ended: bool) -> bool {
        if ended {
            return self.path.pop().is_some();
        }
        let key = node_key(name, index);
        match self.current_mut() {
            Some(node) => {
                node.insert(key.clone(), Value::Object(Map::new()));
                self.path.push(key);
                true
            }
            None => false,
        }
    }

    fn read_int(&mut self, name: &str, default: i32) -> i32 {
        self.get(name)
            .and_then(Value::as_i64)
            .map(|v| v as i32)
            .unwrap_or(default)
    }

    fn read_uint(&mut self, name: &str, default: u32) -> u32 {
        self.get(name)
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(default)
    }

    fn read_long(&mut self, name: &str, default: i64) -> i64 {
        self.get(name).and_then(Value::as_i64).unwrap_or(default)
    }

    fn read_bool(&mut self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().map(|v| v != 0).unwrap_or(default),
            _ => default,
        }
    }

    fn read_float(&mut self, name: &str, default: f64) -> f64 {
        self.get(name).and_then(Value::as_f64).unwrap_or(default)
    }

    fn read_float_array(&mut self, name: &str) -> Option<Vec<f64>> {
        let values = self.get(name)?.as_array()?;
        Some(values.iter().filter_map(Value::as_f64).collect())
    }

    fn read_string(&mut self, name: &str) -> Option<String> {
        self.get(name).and_then(Value::as_str).map(str::to_string)
    }

    fn write_int(&mut self, name: &str, value: i32) {
        self.put(name, Value::from(value));
    }

    fn write_uint(&mut self, name: &str, value: u32) {
        self.put(name, Value::from(value));
    }

    fn write_long(&mut self, name: &str, value: i64) {
        self.put(name, Value::from(value));
    }

    fn write_bool(&mut self, name: &str, value: bool) {
        self.put(name, Value::Bool(value));
    }

    fn write_float(&mut self, name: &str, value: f64) {
        // Non-finite numbers have no JSON representation.
        let number = Number::from_f64(value).unwrap_or_else(|| Number::from(0));
        self.put(name, Value::Number(number));
    }

    fn write_float_array(&mut self, name: &str, values: &[f64]) {
        let array = values
            .iter()
            .map(|v| Value::Number(Number::from_f64(*v).unwrap_or_else(|| Number::from(0))))
            .collect();
        self.put(name, Value::Array(array));
    }

    fn write_string(&mut self, name: &str, value: &str) {
        self.put(name, Value::String(value.to_string()));
    }

    fn set_error(&mut self, message: &str) -> bool {
        log::warn!("storage: {}", message);
        if self.error.is_none() {
            self.error = Some(message.to_string());
        }
        false
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::read_floats;

    #[test]
    fn test_nested_nodes() {
        let mut s = JsonStorage::new();
        assert!(s.write_node("shapes", -1, false));
        s.write_int("count", 2);
        assert!(s.write_node("shape", 0, false));
        s.write_uint("id", 7);
        s.write_float_array("extent", &[0.0, 1.0, 2.0, 3.0]);
        assert!(s.write_node("shape", 0, true));
        assert!(s.write_node("shapes", -1, true));
        assert!(s.is_balanced());

        let text = s.to_json(false).unwrap();
        let mut r = JsonStorage::from_json(&text).unwrap();
        assert!(r.read_node("shapes", -1, false));
        assert_eq!(r.read_int("count", 0), 2);
        assert!(r.read_node("shape", 0, false));
        assert_eq!(r.read_uint("id", 0), 7);
        let extent: [f64; 4] = read_floats(&mut r, "extent").unwrap();
        assert!((extent[3] - 3.0).abs() < f64::EPSILON);
        assert!(r.read_node("shape", 0, true));
        assert!(!r.read_node("shape", 1, false));
        assert!(r.read_node("shapes", -1, true));
    }

    #[test]
    fn test_missing_values_use_defaults() {
        let mut r = JsonStorage::from_json(r#"{"a": "text"}"#).unwrap();
        assert_eq!(r.read_int("missing", -3), -3);
        assert_eq!(r.read_int("a", 5), 5);
        assert_eq!(r.read_string("a").as_deref(), Some("text"));
        assert!(r.read_float_array("a").is_none());
        assert!((r.read_float("b", 1.5) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_error_is_sticky() {
        let mut s = JsonStorage::new();
        assert!(!s.set_error("first"));
        assert!(!s.set_error("second"));
        assert_eq!(s.error(), Some("first"));
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(JsonStorage::from_json("[1, 2]").is_err());
        assert!(JsonStorage::from_json("garbage").is_err());
    }
}
