use crate::error::*;
use std::collections::BTreeMap;

/// Estimated input frame rate of every source extracted in this run, by logical name.
///
/// Filled while extracting, then only read while encoding.
#[derive(Debug, Default, Clone)]
pub struct FpsRegistry {
    fps: BTreeMap<String, u32>,
}

impl FpsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins. Returns the rate it replaced, if the name was already taken.
    pub fn put(&mut self, name: impl Into<String>, fps: u32) -> Option<u32> {
        self.fps.insert(name.into(), fps)
    }

    pub fn get(&self, name: &str) -> CatResult<u32> {
        self.fps.get(name).copied().ok_or_else(|| Error::KeyNotFound(name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.fps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fps.is_empty()
    }

    /// Sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.fps.iter().map(|(name, &fps)| (name.as_str(), fps))
    }
}
