//! Ordered iteration over layered staker sets
//!
//! A view is a committed base plus a stack of overlays. The iterator runs a
//! k-way merge over one cursor per layer, skipping every entry whose identity
//! a shallower layer has touched. The result is the same sequence a flat set
//! holding the folded view would produce.

use pchain_core::{PlatformError, PlatformResult};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::iter::FusedIterator;

use crate::staker::{SortKey, Staker};
use crate::stakers::{Cursor, Layers, Scope, SetChanges};

/// Next candidate from one layer
struct Head {
    key: SortKey,
    layer: usize,
    staker: Staker,
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.layer.cmp(&other.layer))
    }
}

/// Merged, masked view of one staker set.
///
/// Yields `Err` at most once; after that the iterator is exhausted.
/// Dropping it releases every cursor it holds.
pub struct StakerIterator<'a> {
    scope: Scope,
    /// Layer 0 is the base, layer `k` is `overlays[k - 1]`
    cursors: Vec<Cursor<'a>>,
    overlays: Vec<&'a SetChanges>,
    heap: BinaryHeap<Reverse<Head>>,
    failed: Option<PlatformError>,
    done: bool,
}

impl<'a> StakerIterator<'a> {
    pub fn new(layers: Layers<'a>, scope: Scope) -> Self {
        let Layers { base, overlays } = layers;
        let mut cursors = Vec::with_capacity(overlays.len() + 1);
        cursors.push(base);
        cursors.extend(overlays.iter().map(|o| o.cursor(&scope)));

        let mut iter = Self {
            scope,
            cursors,
            overlays,
            heap: BinaryHeap::new(),
            failed: None,
            done: false,
        };
        for layer in 0..iter.cursors.len() {
            iter.advance(layer);
        }
        iter
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Drop every cursor now instead of waiting for the iterator to go out of scope
    pub fn release(&mut self) {
        self.cursors.clear();
        self.overlays.clear();
        self.heap.clear();
        self.done = true;
    }

    fn advance(&mut self, layer: usize) {
        let Some(cursor) = self.cursors.get_mut(layer) else {
            return;
        };
        match cursor.next() {
            Some(Ok(staker)) => self.heap.push(Reverse(Head {
                key: staker.sort_key(),
                layer,
                staker,
            })),
            Some(Err(err)) => {
                if self.failed.is_none() {
                    self.failed = Some(err);
                }
            }
            None => {}
        }
    }

    fn masked(&self, head: &Head) -> bool {
        self.overlays[head.layer..]
            .iter()
            .any(|overlay| overlay.shadows(&head.staker))
    }
}

impl<'a> Iterator for StakerIterator<'a> {
    type Item = PlatformResult<Staker>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(err) = self.failed.take() {
                self.release();
                return Some(Err(err));
            }
            let Some(Reverse(head)) = self.heap.pop() else {
                self.release();
                return None;
            };
            self.advance(head.layer);
            if !self.masked(&head) {
                return Some(Ok(head.staker));
            }
        }
    }
}

impl<'a> FusedIterator for StakerIterator<'a> {}
