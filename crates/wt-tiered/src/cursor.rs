//! The tiered merged cursor (§4.4): a K-way merge across one writable local
//! tier and zero or more older, read-only checkpointed tiers.
//!
//! Grounded on `tiered_cursor.c`'s `__curtiered_next`/`__curtiered_prev`
//! (the shared forward/backward merge step, including the "several tiers
//! share the winning key" duplicate-skip and the `iterate-next`/
//! `iterate-prev` direction flags that force a re-seek of every child on a
//! direction reversal) and `__curtiered_search_near` (closest-match
//! tracking with a tombstone fallback to the next live neighbor). Tier 0 is
//! always `LOCAL`, the writable tier; tiers at higher indices are
//! progressively older and read-only — on a tie, the lowest index always
//! wins, since that is the most recent version of the key.

use crate::tombstone;
use std::cmp::Ordering;
use std::sync::Arc;
use wt_core::{Collator, Error, Result, RowKey, TierCursor, Value};

/// Upper bound on how many tiers one cursor may merge. Chosen as a generous
/// but finite bound on how many generations a table accumulates between
/// merges; nothing in this crate depends on the exact number.
pub const MAX_TIERS: usize = 32;

/// Which way the merge was last stepped (§3: flags `iterate-next` /
/// `iterate-prev`). `next()`/`prev()` only re-seek every child when the
/// requested direction doesn't match this — continuing in the same
/// direction just steps the tiers that shared the last key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterDirection {
    Forward,
    Backward,
}

/// A merged cursor over `tiers[0..n)`, index 0 being the writable local
/// tier and every other index a read-only, already-checkpointed tier.
pub struct TieredCursor {
    tiers: Vec<Box<dyn TierCursor>>,
    collator: Arc<dyn Collator>,
    /// Which tier currently holds the cursor's logical position, if any.
    current: Option<usize>,
    /// The direction the merge is currently iterating in, if any. `None`
    /// after a reset, a `search`/`search_near`, or once iteration has run
    /// off either end.
    iterating: Option<IterDirection>,
    /// The most recently exposed key, kept even after iteration exhausts so
    /// a direction reversal (or a repeat call) has something to re-seek
    /// every child around (§4.4).
    last_key: Option<RowKey>,
    /// A bulk-load cursor only ever appends to tier 0; every other
    /// operation is refused (§4.4: "bulk-load applies only to the local
    /// tier").
    bulk: bool,
}

impl TieredCursor {
    /// Open a merged cursor over `tiers` (tier 0 first, oldest last).
    pub fn open(tiers: Vec<Box<dyn TierCursor>>, collator: Arc<dyn Collator>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(Error::InvalidArgument("a tiered cursor needs at least one tier".into()));
        }
        if tiers.len() > MAX_TIERS {
            return Err(Error::InvalidArgument(format!(
                "tiered cursor given {} tiers, more than MAX_TIERS ({MAX_TIERS})",
                tiers.len()
            )));
        }
        Ok(TieredCursor {
            tiers,
            collator,
            current: None,
            iterating: None,
            last_key: None,
            bulk: false,
        })
    }

    /// Open a bulk-load cursor: a single local tier, append-only.
    pub fn open_bulk(local: Box<dyn TierCursor>, collator: Arc<dyn Collator>) -> Result<Self> {
        let mut cursor = Self::open(vec![local], collator)?;
        cursor.bulk = true;
        Ok(cursor)
    }

    fn require_not_bulk(&self) -> Result<()> {
        if self.bulk {
            return Err(Error::NotSupported("operation not supported on a bulk-load cursor".into()));
        }
        Ok(())
    }

    /// Compare this cursor's current key against `other`'s (§4.4: "key
    /// comparison uses the tiered handle's collator directly").
    pub fn compare(&self, other: &TieredCursor) -> Result<Ordering> {
        let a = self.get_key().ok_or_else(|| Error::InvalidArgument("cursor not positioned".into()))?;
        let b = other.get_key().ok_or_else(|| Error::InvalidArgument("cursor not positioned".into()))?;
        Ok(self.collator.compare(&a, &b))
    }

    /// Among positioned tiers whose key satisfies `keep`, pick the
    /// smallest (`smallest = true`) or largest key, with the lowest tier
    /// index breaking ties — the shadowing rule (§4.4: "the lowest tier
    /// index wins").
    fn select_among(&self, mut keep: impl FnMut(&RowKey) -> bool, smallest: bool) -> Option<usize> {
        let mut best: Option<(usize, RowKey)> = None;
        for (i, tier) in self.tiers.iter().enumerate() {
            let Some(key) = tier.get_key() else { continue };
            if !keep(&key) {
                continue;
            }
            let replace = match &best {
                None => true,
                Some((best_idx, best_key)) => match self.collator.compare(&key, best_key) {
                    Ordering::Less => smallest,
                    Ordering::Greater => !smallest,
                    Ordering::Equal => i < *best_idx,
                },
            };
            if replace {
                best = Some((i, key));
            }
        }
        best.map(|(i, _)| i)
    }

    fn select_current(&self, forward: bool) -> Option<usize> {
        self.select_among(|_| true, forward)
    }

    /// Step every tier that is sitting on `self.last_key` one position in
    /// `forward`'s direction — the "several tiers share the winning key"
    /// case of a same-direction continuation.
    fn step_matching_last_key(&mut self, forward: bool) -> Result<()> {
        if let Some(current_key) = self.last_key.clone() {
            for tier in self.tiers.iter_mut() {
                if tier.get_key().as_ref() == Some(&current_key) {
                    step_one(tier.as_mut(), forward)?;
                }
            }
        }
        Ok(())
    }

    /// Re-seek every child around `self.last_key` when starting a fresh
    /// iteration or reversing direction (§4.4, §3 "flags {iterate-next,
    /// iterate-prev}"): with no prior key, just reset and step once; with a
    /// prior key, `search_near` each child and step past it so it lands
    /// strictly on the requested side.
    fn reposition_for_direction(&mut self, forward: bool) -> Result<()> {
        match self.last_key.clone() {
            None => {
                for tier in self.tiers.iter_mut() {
                    tier.reset()?;
                    step_one(tier.as_mut(), forward)?;
                }
            }
            Some(key) => {
                let n = self.tiers.len();
                for i in 0..n {
                    match self.tiers[i].search_near(&key) {
                        Ok(ord) => {
                            let need_step = if forward { ord != Ordering::Greater } else { ord != Ordering::Less };
                            if need_step {
                                step_one(self.tiers[i].as_mut(), forward)?;
                            }
                        }
                        Err(Error::NotFound) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }

    /// Step the merge one position forward or backward (§4.4: the shared
    /// `next`/`prev` algorithm), skipping any run of tombstoned keys.
    fn advance(&mut self, forward: bool) -> Result<()> {
        let want = if forward { IterDirection::Forward } else { IterDirection::Backward };
        if self.iterating != Some(want) {
            self.reposition_for_direction(forward)?;
            self.iterating = Some(want);
        } else {
            self.step_matching_last_key(forward)?;
        }

        loop {
            match self.select_current(forward) {
                None => {
                    // Run off the end: forget both the position and the
                    // direction so a repeat call (or a reversal) cleanly
                    // re-seeks from `last_key` instead of indexing a
                    // cleared `current`.
                    self.current = None;
                    self.iterating = None;
                    return Err(Error::NotFound);
                }
                Some(idx) => {
                    let key = self.tiers[idx].get_key().expect("selected tier must be positioned");
                    let value = self.tiers[idx].get_value().expect("selected tier must be positioned");
                    self.current = Some(idx);
                    self.last_key = Some(key);
                    if tombstone::is_tombstone(&value) {
                        self.iterating = Some(want);
                        self.step_matching_last_key(forward)?;
                        continue;
                    }
                    self.iterating = Some(want);
                    return Ok(());
                }
            }
        }
    }

    /// `search_near` landed on a tombstoned key: "attempt next(); if still
    /// deleted, attempt prev(); if both yield nothing, report not-found"
    /// (§4.4). `started_forward` says which side the landing came from —
    /// the opposite direction is tried second.
    fn resolve_tombstoned_landing(&mut self, started_forward: bool) -> Result<Ordering> {
        let (first, first_ord, second, second_ord) = if started_forward {
            (true, Ordering::Greater, false, Ordering::Less)
        } else {
            (false, Ordering::Less, true, Ordering::Greater)
        };
        match self.advance(first) {
            Ok(()) => Ok(first_ord),
            Err(Error::NotFound) => match self.advance(second) {
                Ok(()) => Ok(second_ord),
                Err(Error::NotFound) => {
                    self.current = None;
                    self.iterating = None;
                    Err(Error::NotFound)
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}

fn step_one(tier: &mut dyn TierCursor, forward: bool) -> Result<()> {
    match if forward { tier.next() } else { tier.prev() } {
        Ok(()) => Ok(()),
        Err(Error::NotFound) => Ok(()),
        Err(e) => Err(e),
    }
}

impl TierCursor for TieredCursor {
    fn search(&mut self, key: &RowKey) -> Result<()> {
        self.require_not_bulk()?;
        self.current = None;
        self.iterating = None;
        for (i, tier) in self.tiers.iter_mut().enumerate() {
            match tier.search(key) {
                Ok(()) => {
                    let value = tier.get_value().expect("search hit must position the cursor");
                    self.current = Some(i);
                    self.last_key = Some(key.clone());
                    if tombstone::is_tombstone(&value) {
                        // Lowest tier wins the key even when it records a
                        // deletion: older tiers' values are shadowed.
                        return Err(Error::NotFound);
                    }
                    return Ok(());
                }
                Err(Error::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        self.last_key = None;
        Err(Error::NotFound)
    }

    fn search_near(&mut self, key: &RowKey) -> Result<Ordering> {
        self.require_not_bulk()?;
        self.current = None;
        self.iterating = None;

        // Find the smallest key >= `key` across all tiers. Tiers whose
        // `search_near` falls back below `key` are left exactly where they
        // land — that position is their true candidate for the backward
        // fallback below, and must not be disturbed just because some
        // other tier had a match above `key`.
        let n = self.tiers.len();
        let mut forward_best: Option<usize> = None;
        for i in 0..n {
            match self.tiers[i].search_near(key) {
                Ok(Ordering::Less) => {}
                Ok(_) => {
                    let landed = self.tiers[i].get_key().expect("search_near hit must position the cursor");
                    let replace = match forward_best {
                        None => true,
                        Some(best_idx) => {
                            let best_key = self.tiers[best_idx].get_key().expect("positioned");
                            match self.collator.compare(&landed, &best_key) {
                                Ordering::Less => true,
                                Ordering::Equal => i < best_idx,
                                Ordering::Greater => false,
                            }
                        }
                    };
                    if replace {
                        forward_best = Some(i);
                    }
                }
                Err(Error::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(idx) = forward_best {
            let landed_key = self.tiers[idx].get_key().expect("positioned");
            let value = self.tiers[idx].get_value().expect("positioned");
            self.current = Some(idx);
            self.iterating = Some(IterDirection::Forward);
            self.last_key = Some(landed_key.clone());
            if !tombstone::is_tombstone(&value) {
                return Ok(if self.collator.compare(&landed_key, key) == Ordering::Equal {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                });
            }
            return self.resolve_tombstoned_landing(true);
        }

        let backward_idx = self.select_among(|k| self.collator.compare(k, key) == Ordering::Less, false);
        match backward_idx {
            Some(idx) => {
                let landed_key = self.tiers[idx].get_key().expect("positioned");
                let value = self.tiers[idx].get_value().expect("positioned");
                self.current = Some(idx);
                self.iterating = Some(IterDirection::Backward);
                self.last_key = Some(landed_key);
                if !tombstone::is_tombstone(&value) {
                    return Ok(Ordering::Less);
                }
                self.resolve_tombstoned_landing(false)
            }
            None => {
                self.current = None;
                self.iterating = None;
                Err(Error::NotFound)
            }
        }
    }

    fn next(&mut self) -> Result<()> {
        self.require_not_bulk()?;
        self.advance(true)
    }

    fn prev(&mut self) -> Result<()> {
        self.require_not_bulk()?;
        self.advance(false)
    }

    fn insert(&mut self, key: &RowKey, value: &Value) -> Result<()> {
        self.tiers[0].insert(key, &tombstone::encode(value))
    }

    fn update(&mut self, key: &RowKey, value: &Value) -> Result<()> {
        self.require_not_bulk()?;
        self.tiers[0].update(key, &tombstone::encode(value))
    }

    fn remove(&mut self, key: &RowKey) -> Result<()> {
        self.require_not_bulk()?;
        // A key that exists only in an older, read-only tier still needs a
        // recorded deletion in the local tier so the merge stops resurfacing
        // it (R1, GLOSSARY: "Tombstone marker").
        self.tiers[0].insert(key, &tombstone::tombstone_value())
    }

    fn reserve(&mut self, key: &RowKey) -> Result<()> {
        self.require_not_bulk()?;
        self.tiers[0].reserve(key)
    }

    fn reset(&mut self) -> Result<()> {
        for tier in self.tiers.iter_mut() {
            tier.reset()?;
        }
        self.current = None;
        self.iterating = None;
        self.last_key = None;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for tier in self.tiers.iter_mut() {
            if let Err(e) = tier.close() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn get_key(&self) -> Option<RowKey> {
        self.current.and_then(|i| self.tiers[i].get_key())
    }

    fn get_value(&self) -> Option<Value> {
        let idx = self.current?;
        let raw = self.tiers[idx].get_value()?;
        if tombstone::is_tombstone(&raw) {
            return None;
        }
        Some(tombstone::decode(&raw))
    }

    fn next_random(&mut self) -> Result<()> {
        self.require_not_bulk()?;
        self.current = None;
        self.iterating = None;

        // Select a random tier; if it's empty, try the next tier and so on,
        // wrapping around once until something is found (§4.4: "Random
        // read").
        let n = self.tiers.len();
        let start = rand::random::<usize>() % n;
        let mut landed_key = None;
        for offset in 0..n {
            let idx = (start + offset) % n;
            match self.tiers[idx].next_random() {
                Ok(()) => {
                    landed_key = self.tiers[idx].get_key();
                    break;
                }
                Err(Error::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        let Some(key) = landed_key else {
            return Err(Error::NotFound);
        };

        // Resolve any tombstone or older overwrite shadowing the randomly
        // chosen key by re-running the ordinary merged search_near from it.
        self.search_near(&key).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wt_core::ByteLexCollator;

    /// A minimal in-memory `TierCursor`: a sorted map plus a cursor index,
    /// enough to exercise the merge without any page/file layer.
    struct FakeTier {
        data: BTreeMap<RowKey, Value>,
        pos: Option<RowKey>,
    }

    impl FakeTier {
        fn new(entries: &[(&[u8], &[u8])]) -> Self {
            let mut data = BTreeMap::new();
            for (k, v) in entries {
                data.insert(RowKey::from(*k), Value::from(*v));
            }
            FakeTier { data, pos: None }
        }
    }

    impl TierCursor for FakeTier {
        fn search(&mut self, key: &RowKey) -> Result<()> {
            if self.data.contains_key(key) {
                self.pos = Some(key.clone());
                Ok(())
            } else {
                self.pos = None;
                Err(Error::NotFound)
            }
        }

        fn search_near(&mut self, key: &RowKey) -> Result<Ordering> {
            if let Some((k, _)) = self.data.range(key.clone()..).next() {
                let ord = if k == key { Ordering::Equal } else { Ordering::Greater };
                self.pos = Some(k.clone());
                return Ok(ord);
            }
            if let Some((k, _)) = self.data.range(..key.clone()).next_back() {
                self.pos = Some(k.clone());
                return Ok(Ordering::Less);
            }
            self.pos = None;
            Err(Error::NotFound)
        }

        fn next(&mut self) -> Result<()> {
            let next_key = match &self.pos {
                None => self.data.keys().next().cloned(),
                Some(cur) => self.data.range((std::ops::Bound::Excluded(cur.clone()), std::ops::Bound::Unbounded)).next().map(|(k, _)| k.clone()),
            };
            match next_key {
                Some(k) => {
                    self.pos = Some(k);
                    Ok(())
                }
                None => {
                    self.pos = None;
                    Err(Error::NotFound)
                }
            }
        }

        fn prev(&mut self) -> Result<()> {
            let prev_key = match &self.pos {
                None => self.data.keys().next_back().cloned(),
                Some(cur) => self.data.range(..cur.clone()).next_back().map(|(k, _)| k.clone()),
            };
            match prev_key {
                Some(k) => {
                    self.pos = Some(k);
                    Ok(())
                }
                None => {
                    self.pos = None;
                    Err(Error::NotFound)
                }
            }
        }

        fn insert(&mut self, key: &RowKey, value: &Value) -> Result<()> {
            self.data.insert(key.clone(), value.clone());
            self.pos = Some(key.clone());
            Ok(())
        }

        fn update(&mut self, key: &RowKey, value: &Value) -> Result<()> {
            self.data.insert(key.clone(), value.clone());
            Ok(())
        }

        fn remove(&mut self, key: &RowKey) -> Result<()> {
            self.data.remove(key);
            Ok(())
        }

        fn reserve(&mut self, key: &RowKey) -> Result<()> {
            self.data.insert(key.clone(), Value::default());
            Ok(())
        }

        fn reset(&mut self) -> Result<()> {
            self.pos = None;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn get_key(&self) -> Option<RowKey> {
            self.pos.clone()
        }

        fn get_value(&self) -> Option<Value> {
            self.pos.as_ref().and_then(|k| self.data.get(k).cloned())
        }

        fn next_random(&mut self) -> Result<()> {
            self.next()
        }
    }

    fn collator() -> Arc<dyn Collator> {
        Arc::new(ByteLexCollator)
    }

    #[test]
    fn merge_across_tiers_yields_sorted_union() {
        let tier0 = Box::new(FakeTier::new(&[(b"b", b"b0"), (b"d", b"d0")]));
        let tier1 = Box::new(FakeTier::new(&[(b"a", b"a1"), (b"c", b"c1")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();

        let mut seen = Vec::new();
        loop {
            match cursor.next() {
                Ok(()) => seen.push((cursor.get_key().unwrap().as_bytes().to_vec(), cursor.get_value().unwrap().as_bytes().to_vec())),
                Err(Error::NotFound) => break,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert_eq!(
            seen,
            vec![
                (b"a".to_vec(), b"a1".to_vec()),
                (b"b".to_vec(), b"b0".to_vec()),
                (b"c".to_vec(), b"c1".to_vec()),
                (b"d".to_vec(), b"d0".to_vec()),
            ]
        );
    }

    #[test]
    fn lowest_tier_shadows_older_tiers_on_tied_key() {
        let tier0 = Box::new(FakeTier::new(&[(b"k", b"new")]));
        let tier1 = Box::new(FakeTier::new(&[(b"k", b"old")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();

        cursor.next().unwrap();
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"k");
        assert_eq!(cursor.get_value().unwrap().as_bytes(), b"new");
        // The shadowed duplicate in tier1 must not resurface.
        assert!(matches!(cursor.next(), Err(Error::NotFound)));
    }

    #[test]
    fn tombstone_in_tier0_hides_older_value_during_iteration() {
        let tier0 = Box::new(FakeTier::new(&[(b"k", tombstone::tombstone_value().as_bytes())]));
        let tier1 = Box::new(FakeTier::new(&[(b"k", b"old")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();
        assert!(matches!(cursor.next(), Err(Error::NotFound)));
    }

    #[test]
    fn search_finds_lowest_tier_first() {
        let tier0 = Box::new(FakeTier::new(&[(b"k", b"new")]));
        let tier1 = Box::new(FakeTier::new(&[(b"k", b"old")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();
        cursor.search(&RowKey::from(b"k".as_slice())).unwrap();
        assert_eq!(cursor.get_value().unwrap().as_bytes(), b"new");
    }

    #[test]
    fn search_returns_not_found_for_tombstoned_key() {
        let tier0 = Box::new(FakeTier::new(&[(b"k", tombstone::tombstone_value().as_bytes())]));
        let tier1 = Box::new(FakeTier::new(&[(b"k", b"old")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();
        assert!(matches!(cursor.search(&RowKey::from(b"k".as_slice())), Err(Error::NotFound)));
    }

    #[test]
    fn search_near_skips_a_tombstoned_exact_match() {
        let tier0 = Box::new(FakeTier::new(&[(b"k", tombstone::tombstone_value().as_bytes()), (b"m", b"after")]));
        let tier1 = Box::new(FakeTier::new(&[(b"k", b"shadowed")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();
        let landing = cursor.search_near(&RowKey::from(b"k".as_slice())).unwrap();
        assert_eq!(landing, Ordering::Greater);
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"m");
    }

    #[test]
    fn search_near_falls_back_below_when_nothing_above_matches() {
        let tier0 = Box::new(FakeTier::new(&[(b"a", b"first")]));
        let mut cursor = TieredCursor::open(vec![tier0], collator()).unwrap();
        let landing = cursor.search_near(&RowKey::from(b"z".as_slice())).unwrap();
        assert_eq!(landing, Ordering::Less);
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"a");
    }

    /// §4.4's tombstone fallback on the *forward* side: the closest key at
    /// or above the search key is deleted and nothing live sits above it,
    /// but a live key sits below — the cursor must still land there rather
    /// than reporting not-found (the forward tombstone-skip must not
    /// destroy the tiers' positions needed for this backward fallback).
    #[test]
    fn search_near_falls_back_to_a_live_predecessor_past_a_tombstone() {
        let tier0 = Box::new(FakeTier::new(&[(b"a", b"first"), (b"k", tombstone::tombstone_value().as_bytes())]));
        let mut cursor = TieredCursor::open(vec![tier0], collator()).unwrap();
        let landing = cursor.search_near(&RowKey::from(b"k".as_slice())).unwrap();
        assert_eq!(landing, Ordering::Less);
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"a");
    }

    #[test]
    fn insert_and_remove_only_touch_the_local_tier() {
        let tier0 = Box::new(FakeTier::new(&[]));
        let tier1 = Box::new(FakeTier::new(&[(b"k", b"old")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();

        cursor.insert(&RowKey::from(b"new".as_slice()), &Value::from(b"v".as_slice())).unwrap();
        cursor.search(&RowKey::from(b"new".as_slice())).unwrap();
        assert_eq!(cursor.get_value().unwrap().as_bytes(), b"v");

        cursor.remove(&RowKey::from(b"k".as_slice())).unwrap();
        assert!(matches!(cursor.search(&RowKey::from(b"k".as_slice())), Err(Error::NotFound)));
    }

    #[test]
    fn next_random_lands_on_some_live_key_across_tiers() {
        let tier0 = Box::new(FakeTier::new(&[(b"a", b"1")]));
        let tier1 = Box::new(FakeTier::new(&[(b"b", b"2")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();
        cursor.next_random().unwrap();
        let key = cursor.get_key().unwrap();
        assert!(key.as_bytes() == b"a" || key.as_bytes() == b"b");
    }

    #[test]
    fn next_random_resolves_a_tombstoned_landing_via_search_near() {
        let tier0 = Box::new(FakeTier::new(&[(b"a", tombstone::tombstone_value().as_bytes())]));
        let tier1 = Box::new(FakeTier::new(&[(b"a", b"shadowed"), (b"b", b"live")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();
        cursor.next_random().unwrap();
        // The only non-tombstoned key in the merge is "b".
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"b");
    }

    #[test]
    fn next_random_on_empty_tiers_is_not_found() {
        let tier0 = Box::new(FakeTier::new(&[]));
        let mut cursor = TieredCursor::open(vec![tier0], collator()).unwrap();
        assert!(matches!(cursor.next_random(), Err(Error::NotFound)));
    }

    #[test]
    fn bulk_cursor_only_supports_insert() {
        let tier0 = Box::new(FakeTier::new(&[]));
        let mut cursor = TieredCursor::open_bulk(tier0, collator()).unwrap();
        cursor.insert(&RowKey::from(b"a".as_slice()), &Value::from(b"v".as_slice())).unwrap();
        assert!(cursor.next().is_err());
        assert!(cursor.update(&RowKey::from(b"a".as_slice()), &Value::from(b"w".as_slice())).is_err());
    }

    #[test]
    fn too_many_tiers_is_rejected() {
        let tiers: Vec<Box<dyn TierCursor>> = (0..MAX_TIERS + 1)
            .map(|_| Box::new(FakeTier::new(&[])) as Box<dyn TierCursor>)
            .collect();
        assert!(TieredCursor::open(tiers, collator()).is_err());
    }

    /// Calling `next()` again after it has already run off the end is
    /// ordinary cursor usage — it must report not-found again, not panic
    /// on a cleared `current`.
    #[test]
    fn next_past_the_end_then_next_again_stays_not_found() {
        let tier0 = Box::new(FakeTier::new(&[(b"a", b"1")]));
        let mut cursor = TieredCursor::open(vec![tier0], collator()).unwrap();

        assert!(cursor.next().is_ok());
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"a");
        assert!(matches!(cursor.next(), Err(Error::NotFound)));
        assert!(matches!(cursor.next(), Err(Error::NotFound)));
        assert!(matches!(cursor.next(), Err(Error::NotFound)));
    }

    /// P6's "next; prev returns to the original key", exercised across a
    /// direction reversal after several same-direction steps: tier0 = {a,
    /// c}, tier1 = {b}. `next` three times reaches the merge's last key
    /// ("c" from tier0, after "b" from tier1 was exhausted); `prev` from
    /// there must land back on "b", not resurface "a".
    #[test]
    fn next_three_times_then_prev_returns_to_the_previous_key() {
        let tier0 = Box::new(FakeTier::new(&[(b"a", b"a0"), (b"c", b"c0")]));
        let tier1 = Box::new(FakeTier::new(&[(b"b", b"b1")]));
        let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();

        cursor.next().unwrap();
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"a");
        cursor.next().unwrap();
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"b");
        cursor.next().unwrap();
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"c");

        cursor.prev().unwrap();
        assert_eq!(cursor.get_key().unwrap().as_bytes(), b"b");
    }

    proptest::proptest! {
        /// P6: repeated `next()` on a merge of two arbitrary key sets yields
        /// a strictly increasing key sequence, whatever the shadowing tier0
        /// adds over tier1.
        #[test]
        fn iteration_is_strictly_increasing(
            tier1_keys in proptest::collection::btree_set(0u8..40, 0..12),
            tier0_keys in proptest::collection::btree_set(0u8..40, 0..12),
        ) {
            let tier0 = Box::new(FakeTier {
                data: tier0_keys.iter().map(|k| (RowKey::from(vec![*k]), Value::from(b"v0".as_slice()))).collect(),
                pos: None,
            });
            let tier1 = Box::new(FakeTier {
                data: tier1_keys.iter().map(|k| (RowKey::from(vec![*k]), Value::from(b"v1".as_slice()))).collect(),
                pos: None,
            });
            let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();

            let mut seen = Vec::new();
            loop {
                match cursor.next() {
                    Ok(()) => seen.push(cursor.get_key().unwrap().as_bytes().to_vec()),
                    Err(Error::NotFound) => break,
                    Err(e) => panic!("unexpected error: {e:?}"),
                }
            }
            for window in seen.windows(2) {
                proptest::prop_assert!(window[0] < window[1]);
            }
            let mut expected: std::collections::BTreeSet<u8> = tier0_keys.clone();
            expected.extend(tier1_keys.iter().copied());
            proptest::prop_assert_eq!(seen.len(), expected.len());
        }

        /// P6's "next; prev returns to the original key", with arbitrary
        /// two-tier key sets: landing anywhere mid-iteration and reversing
        /// once must land back on the key just before.
        #[test]
        fn next_then_prev_returns_to_the_prior_key(
            tier1_keys in proptest::collection::btree_set(0u8..40, 1..12),
            tier0_keys in proptest::collection::btree_set(0u8..40, 0..12),
            steps in 1usize..8,
        ) {
            let tier0 = Box::new(FakeTier {
                data: tier0_keys.iter().map(|k| (RowKey::from(vec![*k]), Value::from(b"v0".as_slice()))).collect(),
                pos: None,
            });
            let tier1 = Box::new(FakeTier {
                data: tier1_keys.iter().map(|k| (RowKey::from(vec![*k]), Value::from(b"v1".as_slice()))).collect(),
                pos: None,
            });
            let mut cursor = TieredCursor::open(vec![tier0, tier1], collator()).unwrap();

            let mut keys = Vec::new();
            for _ in 0..steps {
                match cursor.next() {
                    Ok(()) => keys.push(cursor.get_key().unwrap()),
                    Err(Error::NotFound) => break,
                    Err(e) => panic!("unexpected error: {e:?}"),
                }
            }
            if keys.len() < 2 {
                return Ok(());
            }
            cursor.prev().unwrap();
            proptest::prop_assert_eq!(cursor.get_key().unwrap(), keys[keys.len() - 2].clone());
        }
    }
}
