//! Key-value node storage used to serialize shapes, documents and journals.
//!
//! Nodes are named and optionally indexed (`shape3`, `d0`); every opened node
//! must be closed with the same name and `ended = true`.

mod file;
mod json;

pub use file::{read_json_file, remove_file_quietly, write_file_atomic};
pub use json::JsonStorage;

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Missing node: {0}")]
    MissingNode(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Node-tree reader/writer.
///
/// A storage is opened either for reading or for writing; calling the other
/// half is allowed but meaningless.
pub trait Storage {
    /// Open (`ended == false`) or close (`ended == true`) a child node for reading.
    ///
    /// Returns false when the node does not exist.
    fn read_node(&mut self, name: &str, index: i32, ended: bool) -> bool;

    /// Open or close a child node for writing.
    fn write_node(&mut self, name: &str, index: i32, ended: bool) -> bool;

    fn read_int(&mut self, name: &str, default: i32) -> i32;
    fn read_uint(&mut self, name: &str, default: u32) -> u32;
    /// Read a 64-bit integer, used for millisecond ticks.
    fn read_long(&mut self, name: &str, default: i64) -> i64;
    fn read_bool(&mut self, name: &str, default: bool) -> bool;
    fn read_float(&mut self, name: &str, default: f64) -> f64;

    /// Read a number array. Returns `None` when the key is absent.
    fn read_float_array(&mut self, name: &str) -> Option<Vec<f64>>;

    fn read_string(&mut self, name: &str) -> Option<String>;

    fn write_int(&mut self, name: &str, value: i32);
    fn write_uint(&mut self, name: &str, value: u32);
    fn write_long(&mut self, name: &str, value: i64);
    fn write_bool(&mut self, name: &str, value: bool);
    fn write_float(&mut self, name: &str, value: f64);
    fn write_float_array(&mut self, name: &str, values: &[f64]);
    fn write_string(&mut self, name: &str, value: &str);

    /// Record a failure. Always returns false so loaders can `return s.set_error(..)`.
    fn set_error(&mut self, message: &str) -> bool;

    /// First error recorded with [`Storage::set_error`].
    fn error(&self) -> Option<&str>;
}

/// Key of an indexed node: `name` when `index < 0`, else `name{index}`.
pub(crate) fn node_key(name: &str, index: i32) -> String {
    if index < 0 {
        name.to_string()
    } else {
        format!("{}{}", name, index)
    }
}

/// Read exactly `N` floats; shorter or missing arrays yield `None`.
pub fn read_floats<const N: usize>(s: &mut dyn Storage, name: &str) -> Option<[f64; N]> {
    let values = s.read_float_array(name)?;
    if values.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    out.copy_from_slice(&values[..N]);
    Some(out)
}
