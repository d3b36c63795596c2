//! Lookup abstraction over host-provided configuration strings.

use std::{
    collections::{BTreeMap, HashMap},
    hash::BuildHasher,
};

/// A flat, read-only set of named configuration strings.
///
/// Keys are matched case-insensitively, mirroring how the host treats
/// output-plugin properties. Values are trimmed and an empty value counts as
/// unset.
pub trait ConfigSource {
    /// Return the raw value stored under `key`, if any.
    fn raw(&self, key: &str) -> Option<String>;

    /// Return the trimmed, non-empty value stored under `key`.
    fn value(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }
}

fn find_ignore_case<'a, V: AsRef<str> + 'a>(
    entries: impl IntoIterator<Item = (&'a String, &'a V)>,
    key: &str,
) -> Option<String> {
    entries
        .into_iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_ref().to_owned())
}

impl<S: BuildHasher> ConfigSource for HashMap<String, String, S> {
    fn raw(&self, key: &str) -> Option<String> {
        self.get(key)
            .cloned()
            .or_else(|| find_ignore_case(self.iter(), key))
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn raw(&self, key: &str) -> Option<String> {
        self.get(key)
            .cloned()
            .or_else(|| find_ignore_case(self.iter(), key))
    }
}

impl ConfigSource for [(&str, &str)] {
    fn raw(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| (*v).to_owned())
    }
}

impl<const N: usize> ConfigSource for [(&str, &str); N] {
    fn raw(&self, key: &str) -> Option<String> {
        self.as_slice().raw(key)
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for &T {
    fn raw(&self, key: &str) -> Option<String> {
        (**self).raw(key)
    }
}

/// Reads values from the process environment.
///
/// Used for the tokens blob, which deployments deliver through an
/// environment variable rather than a plugin property.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}
