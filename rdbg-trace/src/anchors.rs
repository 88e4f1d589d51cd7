//! Runtime-anchor resolver (component C11).
//!
//! Anchors mark the logical top of a stack walk: once the walker reaches a
//! frame whose function entry is one of these, it stops rather than
//! reading past the bottom of the goroutine/thread's real stack (spec
//! §4.8 step e). Resolution is lazy and memoized per spec §3/§9: the first
//! call resolves every anchor PC and caches either the result or the
//! error; both stick until the next `Run`.

use crate::breakpoint::Address;
use crate::error::Error;
use crate::traits::SymbolResolver;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeAnchors {
    pub goexit: Address,
    pub mstart: Address,
    pub mcall: Address,
    pub morestack: Address,
    pub lessstack: Address,
    pub rt0_go: Address,
    /// Stays 0 on non-Windows targets (spec §3); resolved only under
    /// `cfg(windows)`.
    pub externalthreadhandlerp: Address,
}

impl RuntimeAnchors {
    pub fn contains(&self, pc: Address) -> bool {
        pc != 0
            && (pc == self.goexit
                || pc == self.mstart
                || pc == self.mcall
                || pc == self.morestack
                || pc == self.lessstack
                || pc == self.rt0_go
                || (self.externalthreadhandlerp != 0 && pc == self.externalthreadhandlerp))
    }
}

/// One-way promotion cache: unresolved until the first [`ensure`] call,
/// then either a resolved table or a stashed error, either of which is
/// returned on every later call without re-resolving (spec §3, §9).
#[derive(Default)]
pub enum AnchorCache {
    #[default]
    Unresolved,
    Resolved(RuntimeAnchors),
    Failed(String),
}

impl AnchorCache {
    /// Resolves well-known runtime function PCs, memoizing the outcome.
    /// Re-entrant: once resolved (or failed), subsequent calls are free.
    pub fn ensure(&mut self, symbols: &dyn SymbolResolver) -> Result<RuntimeAnchors, Error> {
        match self {
            AnchorCache::Resolved(anchors) => return Ok(*anchors),
            AnchorCache::Failed(msg) => return Err(Error::RuntimeAnchorMissing(msg.clone())),
            AnchorCache::Unresolved => {}
        }

        let required = [
            "runtime.goexit",
            "runtime.mstart",
            "runtime.mcall",
            "runtime.morestack",
            "runtime.lessstack",
            "_rt0_go",
        ];

        let mut pcs = [0u64; 6];
        for (slot, name) in pcs.iter_mut().zip(required.iter()) {
            match symbols.pc_of(name) {
                Some(pc) => *slot = pc,
                None => {
                    let msg = format!("could not resolve runtime anchor symbol {name}");
                    *self = AnchorCache::Failed(msg.clone());
                    return Err(Error::RuntimeAnchorMissing(msg));
                }
            }
        }

        let externalthreadhandlerp = if cfg!(windows) {
            symbols.pc_of("runtime.externalthreadhandlerp").unwrap_or(0)
        } else {
            0
        };

        let anchors = RuntimeAnchors {
            goexit: pcs[0],
            mstart: pcs[1],
            mcall: pcs[2],
            morestack: pcs[3],
            lessstack: pcs[4],
            rt0_go: pcs[5],
            externalthreadhandlerp,
        };
        *self = AnchorCache::Resolved(anchors);
        Ok(anchors)
    }

    /// Invalidates the cache; called on `Run` (spec §8: "after Run, the
    /// runtime-anchors cache is invalidated").
    pub fn invalidate(&mut self) {
        *self = AnchorCache::Unresolved;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    struct FakeSymbols(HashMap<&'static str, Address>);

    impl SymbolResolver for FakeSymbols {
        fn pc_of(&self, name: &str) -> Option<Address> {
            self.0.get(name).copied()
        }
        fn name_at(&self, _pc: Address) -> Option<String> {
            None
        }
        fn names_matching(&self, _pattern: &regex::Regex) -> Vec<String> {
            Vec::new()
        }
    }

    fn full_symbol_set() -> FakeSymbols {
        FakeSymbols(HashMap::from([
            ("runtime.goexit", 0x1000),
            ("runtime.mstart", 0x2000),
            ("runtime.mcall", 0x3000),
            ("runtime.morestack", 0x4000),
            ("runtime.lessstack", 0x5000),
            ("_rt0_go", 0x6000),
        ]))
    }

    #[test]
    fn resolves_once_and_caches() {
        let symbols = full_symbol_set();
        let mut cache = AnchorCache::default();
        let first = cache.ensure(&symbols).unwrap();
        assert_eq!(first.goexit, 0x1000);
        assert!(matches!(cache, AnchorCache::Resolved(_)));
    }

    #[test]
    fn missing_symbol_caches_the_error() {
        let symbols = FakeSymbols(HashMap::new());
        let mut cache = AnchorCache::default();
        assert!(cache.ensure(&symbols).is_err());
        assert!(matches!(cache, AnchorCache::Failed(_)));
        // Second call returns the same cached error without re-querying.
        assert!(cache.ensure(&symbols).is_err());
    }

    #[test]
    fn invalidate_resets_to_unresolved() {
        let symbols = full_symbol_set();
        let mut cache = AnchorCache::default();
        cache.ensure(&symbols).unwrap();
        cache.invalidate();
        assert!(matches!(cache, AnchorCache::Unresolved));
    }

    #[test]
    fn contains_matches_any_nonzero_anchor() {
        let anchors = RuntimeAnchors {
            goexit: 0x1000,
            ..Default::default()
        };
        assert!(anchors.contains(0x1000));
        assert!(!anchors.contains(0x1));
        assert!(!anchors.contains(0));
    }
}
