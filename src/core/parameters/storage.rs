//! Parameter Storage Types
//!
//! Provides the parameter value types and the `ParameterStore` holding the
//! tracker's named configuration values. The store lives in RAM; defaults come
//! from the parameter groups and the build-time environment.

use super::error::ParameterError;
use bitflags::bitflags;
use heapless::index_map::FnvIndexMap;
use heapless::String;

/// Maximum parameter name length
pub const PARAM_NAME_LEN: usize = 16;

/// Maximum number of parameters (power of two, required by `FnvIndexMap`)
pub const MAX_PARAMS: usize = 32;

/// Maximum string parameter length (long enough for an endpoint URL)
pub const MAX_STRING_LEN: usize = 127;

bitflags! {
    /// Parameter flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamFlags: u8 {
        /// Parameter is secret and excluded from listings
        const HIDDEN = 0b00000001;
        /// Parameter cannot be modified after registration
        const READ_ONLY = 0b00000010;
    }
}

/// Parameter value types
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// String parameter (max 127 chars)
    String(String<MAX_STRING_LEN>),
    /// Boolean parameter
    Bool(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit floating point
    Float(f32),
}

impl ParamValue {
    /// Build a string value, failing if `value` exceeds [`MAX_STRING_LEN`]
    pub fn text(value: &str) -> Result<Self, ParameterError> {
        let mut s = String::new();
        s.push_str(value).map_err(|_| ParameterError::InvalidValue)?;
        Ok(ParamValue::String(s))
    }

    fn same_kind(&self, other: &ParamValue) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

/// Parameter metadata
#[derive(Debug, Clone)]
pub struct ParamMetadata {
    /// Parameter flags
    pub flags: ParamFlags,
}

/// Parameter store for configuration management
///
/// Stores parameters as key-value pairs with metadata (flags). A parameter must
/// be registered before it can be set, and keeps the type it was registered
/// with.
pub struct ParameterStore {
    /// Parameter values
    parameters: FnvIndexMap<String<PARAM_NAME_LEN>, ParamValue, MAX_PARAMS>,
    /// Parameter metadata
    metadata: FnvIndexMap<String<PARAM_NAME_LEN>, ParamMetadata, MAX_PARAMS>,
}

/// Copy `value` into a fixed-capacity string, truncating at a char boundary
pub fn bounded_string<const N: usize>(value: &str) -> String<N> {
    let mut out = String::new();
    for ch in value.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

fn key_for(name: &str) -> Result<String<PARAM_NAME_LEN>, ParameterError> {
    let mut key = String::<PARAM_NAME_LEN>::new();
    key.push_str(name)
        .map_err(|_| ParameterError::InvalidConfig)?;
    Ok(key)
}

impl ParameterStore {
    /// Create a new empty parameter store
    pub fn new() -> Self {
        Self {
            parameters: FnvIndexMap::new(),
            metadata: FnvIndexMap::new(),
        }
    }

    /// Get parameter value
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        let key = key_for(name).ok()?;
        self.parameters.get(&key)
    }

    /// Integer view of a parameter (floats truncate, bools map to 0/1)
    pub fn get_int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i32),
            ParamValue::Bool(v) => Some(*v as i32),
            ParamValue::String(_) => None,
        }
    }

    /// Float view of a parameter
    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Boolean view of a parameter (non-zero numbers are true)
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ParamValue::Bool(v) => Some(*v),
            ParamValue::Int(v) => Some(*v != 0),
            ParamValue::Float(v) => Some(*v != 0.0),
            ParamValue::String(_) => None,
        }
    }

    /// String view of a parameter
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ParamValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Set parameter value
    ///
    /// The parameter must exist, be writable, and keep its registered type.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParameterError> {
        let key = key_for(name)?;

        let current = self
            .parameters
            .get(&key)
            .ok_or(ParameterError::InvalidConfig)?;
        if !current.same_kind(&value) {
            return Err(ParameterError::InvalidValue);
        }

        if let Some(meta) = self.metadata.get(&key) {
            if meta.flags.contains(ParamFlags::READ_ONLY) {
                return Err(ParameterError::ReadOnly);
            }
        }

        self.parameters.insert(key, value).ok();
        Ok(())
    }

    /// Register a new parameter with default value and flags
    ///
    /// If the parameter already exists, this is a no-op (idempotent).
    pub fn register(
        &mut self,
        name: &str,
        default_value: ParamValue,
        flags: ParamFlags,
    ) -> Result<(), ParameterError> {
        let key = key_for(name)?;

        if self.parameters.contains_key(&key) {
            // Already exists, don't overwrite
            return Ok(());
        }

        self.parameters
            .insert(key.clone(), default_value)
            .map_err(|_| ParameterError::StoreFull)?;
        self.metadata
            .insert(key, ParamMetadata { flags })
            .map_err(|_| ParameterError::StoreFull)?;
        Ok(())
    }

    /// Register a string parameter
    pub fn register_str(
        &mut self,
        name: &str,
        default_value: &str,
        flags: ParamFlags,
    ) -> Result<(), ParameterError> {
        self.register(name, ParamValue::text(default_value)?, flags)
    }

    /// Check if parameter is hidden
    pub fn is_hidden(&self, name: &str) -> bool {
        self.get_metadata(name)
            .map(|meta| meta.flags.contains(ParamFlags::HIDDEN))
            .unwrap_or(false)
    }

    /// Get all parameter names (excluding hidden parameters)
    pub fn iter_names(&self) -> impl Iterator<Item = &String<PARAM_NAME_LEN>> {
        self.parameters
            .keys()
            .filter(|name| !self.is_hidden(name.as_str()))
    }

    /// Get parameter count (excluding hidden parameters)
    pub fn count(&self) -> usize {
        self.iter_names().count()
    }

    /// Get total parameter count (including hidden parameters)
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get metadata for a parameter by name
    pub fn get_metadata(&self, name: &str) -> Option<&ParamMetadata> {
        let key = key_for(name).ok()?;
        self.metadata.get(&key)
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_store_new() {
        let store = ParameterStore::new();
        assert_eq!(store.count(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_parameter_store_register_and_get() {
        let mut store = ParameterStore::new();
        store
            .register("TEST", ParamValue::Int(42), ParamFlags::empty())
            .unwrap();
        assert_eq!(store.get("TEST"), Some(&ParamValue::Int(42)));
        assert_eq!(store.get_int("TEST"), Some(42));
        assert_eq!(store.get_float("TEST"), Some(42.0));
        assert_eq!(store.get_bool("TEST"), Some(true));
        assert_eq!(store.get_str("TEST"), None);
    }

    #[test]
    fn test_parameter_store_set() {
        let mut store = ParameterStore::new();
        store
            .register("TEST", ParamValue::Int(42), ParamFlags::empty())
            .unwrap();
        store.set("TEST", ParamValue::Int(100)).unwrap();
        assert_eq!(store.get("TEST"), Some(&ParamValue::Int(100)));
    }

    #[test]
    fn test_parameter_store_set_unknown() {
        let mut store = ParameterStore::new();
        assert_eq!(
            store.set("UNKNOWN", ParamValue::Int(1)),
            Err(ParameterError::InvalidConfig)
        );
    }

    #[test]
    fn test_parameter_store_set_keeps_type() {
        let mut store = ParameterStore::new();
        store
            .register("RADIUS", ParamValue::Float(100.0), ParamFlags::empty())
            .unwrap();
        assert_eq!(
            store.set("RADIUS", ParamValue::Int(5)),
            Err(ParameterError::InvalidValue)
        );
        assert_eq!(store.get_float("RADIUS"), Some(100.0));
    }

    #[test]
    fn test_parameter_store_register_idempotent() {
        let mut store = ParameterStore::new();
        store
            .register("TEST", ParamValue::Int(42), ParamFlags::empty())
            .unwrap();
        store.set("TEST", ParamValue::Int(100)).unwrap();
        // Re-register should not overwrite
        store
            .register("TEST", ParamValue::Int(42), ParamFlags::empty())
            .unwrap();
        assert_eq!(store.get("TEST"), Some(&ParamValue::Int(100)));
    }

    #[test]
    fn test_parameter_name_too_long() {
        let mut store = ParameterStore::new();
        assert_eq!(
            store.register("A_VERY_LONG_PARAMETER", ParamValue::Int(1), ParamFlags::empty()),
            Err(ParameterError::InvalidConfig)
        );
    }

    #[test]
    fn test_parameter_store_full() {
        let mut store = ParameterStore::new();
        let mut name: String<PARAM_NAME_LEN> = String::new();
        for i in 0..MAX_PARAMS {
            name.clear();
            core::fmt::Write::write_fmt(&mut name, format_args!("P{}", i)).unwrap();
            store
                .register(name.as_str(), ParamValue::Int(i as i32), ParamFlags::empty())
                .unwrap();
        }
        assert_eq!(
            store.register("ONE_TOO_MANY", ParamValue::Int(0), ParamFlags::empty()),
            Err(ParameterError::StoreFull)
        );
    }

    #[test]
    fn test_string_parameters() {
        let mut store = ParameterStore::new();
        store
            .register_str("NET_APN", "internet", ParamFlags::empty())
            .unwrap();
        assert_eq!(store.get_str("NET_APN"), Some("internet"));

        store
            .set("NET_APN", ParamValue::text("fast.t-mobile.com").unwrap())
            .unwrap();
        assert_eq!(store.get_str("NET_APN"), Some("fast.t-mobile.com"));
    }

    #[test]
    fn test_bounded_string_truncates() {
        let s: String<4> = bounded_string("+639171234567");
        assert_eq!(s.as_str(), "+639");
        let t: String<8> = bounded_string("abc");
        assert_eq!(t.as_str(), "abc");
    }

    #[test]
    fn test_parameter_hidden() {
        let mut store = ParameterStore::new();
        store
            .register_str("NET_PASS", "secret", ParamFlags::HIDDEN)
            .unwrap();
        store
            .register("NET_MONITOR", ParamValue::Int(1), ParamFlags::empty())
            .unwrap();
        assert!(store.is_hidden("NET_PASS"));
        assert!(!store.is_hidden("NET_MONITOR"));
        assert_eq!(store.count(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_parameter_read_only() {
        let mut store = ParameterStore::new();
        store
            .register("READONLY", ParamValue::Int(42), ParamFlags::READ_ONLY)
            .unwrap();
        assert_eq!(
            store.set("READONLY", ParamValue::Int(100)),
            Err(ParameterError::ReadOnly)
        );
    }
}
