//! Naming and exclusion policies applied when a capability table is built

use std::marker::PhantomData;

use super::class::Scriptable;

/// Injectable policy pair: name remapping and exclusion
pub trait ScriptingPolicy: Send + Sync {
    fn script_name_for_method(&self, selector: &str) -> Option<String>;
    fn script_name_for_key(&self, key: &str) -> Option<String>;
    fn is_method_excluded(&self, selector: &str) -> bool;
    fn is_key_excluded(&self, key: &str) -> bool;
}

/// The policy a [`Scriptable`] type declares through its associated functions
pub struct TypePolicy<T>(PhantomData<fn() -> T>);

impl<T> TypePolicy<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TypePolicy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scriptable> ScriptingPolicy for TypePolicy<T> {
    fn script_name_for_method(&self, selector: &str) -> Option<String> {
        T::script_name_for_method(selector)
    }

    fn script_name_for_key(&self, key: &str) -> Option<String> {
        T::script_name_for_key(key)
    }

    fn is_method_excluded(&self, selector: &str) -> bool {
        T::is_method_excluded_from_script(selector)
    }

    fn is_key_excluded(&self, key: &str) -> bool {
        T::is_key_excluded_from_script(key)
    }
}

/// Exposes everything under its native name
#[derive(Debug, Clone, Copy, Default)]
pub struct ExposeAll;

impl ScriptingPolicy for ExposeAll {
    fn script_name_for_method(&self, _selector: &str) -> Option<String> {
        None
    }

    fn script_name_for_key(&self, _key: &str) -> Option<String> {
        None
    }

    fn is_method_excluded(&self, _selector: &str) -> bool {
        false
    }

    fn is_key_excluded(&self, _key: &str) -> bool {
        false
    }
}
