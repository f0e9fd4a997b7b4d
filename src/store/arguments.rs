//! Argument payload side table.

use std::collections::HashMap;
use std::rc::Rc;

/// A decoded key/value argument record.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Id-indexed storage for argument payloads.
///
/// Id 0 is reserved as "no arguments"; real ids start at 1. Payloads sit
/// behind `Rc` so iterators can hand them out without copying the map.
/// Overriding a payload stashes the original the first time so it can be
/// restored later; annotation tooling uses that to redecorate events and
/// then undo.
#[derive(Debug, Default)]
pub struct ArgumentTable {
    slots: HashMap<u32, Rc<Arguments>>,
    originals: HashMap<u32, Option<Rc<Arguments>>>,
    next_id: u32,
}

impl ArgumentTable {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            originals: HashMap::new(),
            next_id: 1,
        }
    }

    /// Store a payload, returning its new id.
    pub fn insert(&mut self, args: Arguments) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(id, Rc::new(args));
        id
    }

    /// Fetch the payload for an id. Id 0 and consumed slots yield `None`.
    pub fn get(&self, args_id: u32) -> Option<Rc<Arguments>> {
        self.slots.get(&args_id).cloned()
    }

    /// Replace a payload, allocating a fresh id when 0 is passed.
    ///
    /// The value being replaced is stashed on the first override only, so
    /// repeated sets still restore to the true original.
    pub fn set(&mut self, args_id: u32, values: Arguments) -> u32 {
        let args_id = if args_id == 0 {
            let id = self.next_id;
            self.next_id += 1;
            id
        } else {
            args_id
        };
        self.originals
            .entry(args_id)
            .or_insert_with(|| self.slots.get(&args_id).cloned());
        self.slots.insert(args_id, Rc::new(values));
        args_id
    }

    /// Restore a payload overridden with [`set`](Self::set).
    pub fn reset(&mut self, args_id: u32) {
        if let Some(original) = self.originals.remove(&args_id) {
            match original {
                Some(args) => {
                    self.slots.insert(args_id, args);
                }
                None => {
                    self.slots.remove(&args_id);
                }
            }
        }
    }

    /// Drop a payload that was consumed during rescoping (generic enters,
    /// timestamps, and append-data records give up their slots).
    pub fn consume(&mut self, args_id: u32) {
        self.slots.remove(&args_id);
    }

    /// Mutable access for the rescope pass to merge appended data.
    /// Clones only if the payload is shared.
    pub fn get_mut(&mut self, args_id: u32) -> Option<&mut Arguments> {
        self.slots.get_mut(&args_id).map(Rc::make_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, serde_json::Value)]) -> Arguments {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = ArgumentTable::new();
        let id = table.insert(args(&[("n", json!(5))]));
        assert_eq!(id, 1);
        assert_eq!(table.get(id).unwrap()["n"], json!(5));
        assert!(table.get(0).is_none());
    }

    #[test]
    fn test_set_and_reset_round_trip() {
        let mut table = ArgumentTable::new();
        let id = table.insert(args(&[("n", json!(5))]));

        table.set(id, args(&[("n", json!(99))]));
        assert_eq!(table.get(id).unwrap()["n"], json!(99));

        // A second override must not clobber the stashed original.
        table.set(id, args(&[("n", json!(100))]));
        table.reset(id);
        assert_eq!(table.get(id).unwrap()["n"], json!(5));
    }

    #[test]
    fn test_set_allocates_on_zero() {
        let mut table = ArgumentTable::new();
        let id = table.set(0, args(&[("fresh", json!(true))]));
        assert!(id != 0);
        assert_eq!(table.get(id).unwrap()["fresh"], json!(true));

        // Resetting a slot that had no prior value clears it.
        table.reset(id);
        assert!(table.get(id).is_none());
    }

    #[test]
    fn test_consume() {
        let mut table = ArgumentTable::new();
        let id = table.insert(args(&[("n", json!(1))]));
        table.consume(id);
        assert!(table.get(id).is_none());
    }
}
