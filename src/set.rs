//! An ordered set of owned keys.

use alloc::{boxed::Box, vec::Vec};
use core::{
    borrow::Borrow,
    fmt,
    iter::FusedIterator,
    marker::PhantomPinned,
    ptr::{self, NonNull},
};

use cordyceps::Linked;

use crate::{AvlTree, Links, TreeNode};

/// An ordered set based on an [AVL tree].
///
/// Every operation that searches or edits the set completes in _O(log(n))_ time.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlSet<K: Ord> {
    tree: AvlTree<SetNode<K>>,
}

struct SetNode<K> {
    links: Links<SetNode<K>>,
    key: K,
    _unpin: PhantomPinned,
}

impl<K> SetNode<K> {
    fn new(key: K) -> Box<Self> {
        Box::new(SetNode {
            links: Links::new(),
            key,
            _unpin: PhantomPinned,
        })
    }
}

unsafe impl<K> Linked<Links<SetNode<K>>> for SetNode<K> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<SetNode<K>>> {
        let ptr = ptr.as_ptr();
        // SAFETY: a field of a valid node is never null.
        unsafe { NonNull::new_unchecked(ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<K: Ord> TreeNode<Links<SetNode<K>>> for SetNode<K> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

#[inline]
#[allow(clippy::boxed_local)]
fn into_key<K>(node: Box<SetNode<K>>) -> K {
    let SetNode { key, .. } = *node;
    key
}

impl<K: Ord> AvlSet<K> {
    /// Creates a new, empty `AvlSet`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the set contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set.
    #[doc(alias = "size")]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree: -1 when empty, 0 with a single element.
    pub fn height(&self) -> i8 {
        self.tree.height()
    }

    /// Returns `true` if the set contains `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the element equal to `key`, if any.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| &node.get_ref().key)
    }

    /// Adds `key` to the set.
    ///
    /// Returns `false`, leaving the set unchanged, if the set already contained an equal key.
    #[inline]
    pub fn insert(&mut self, key: K) -> bool {
        self.tree.insert(SetNode::new(key)).is_none()
    }

    /// Removes `key` from the set.
    ///
    /// Returns `false`, leaving the set unchanged, if the set did not contain `key`.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).is_some()
    }

    /// Removes and returns the element equal to `key`, if any.
    #[inline]
    pub fn take<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(into_key)
    }

    /// Returns `key` itself if it is in the set, and otherwise the greatest element less than
    /// `key`.
    ///
    /// Returns `None` if the set has no element less than or equal to `key`.
    #[inline]
    pub fn predecessor<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.predecessor(key).map(|node| &node.get_ref().key)
    }

    /// Returns `key` itself if it is in the set, and otherwise the least element greater than
    /// `key`.
    ///
    /// Returns `None` if the set has no element greater than or equal to `key`.
    #[inline]
    pub fn successor<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.successor(key).map(|node| &node.get_ref().key)
    }

    /// Returns the minimum element of the set.
    #[inline]
    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|node| &node.get_ref().key)
    }

    /// Returns the maximum element of the set.
    #[inline]
    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|node| &node.get_ref().key)
    }

    /// Removes and returns the minimum element of the set.
    #[inline]
    pub fn pop_first(&mut self) -> Option<K> {
        self.tree.pop_first().map(into_key)
    }

    /// Removes and returns the maximum element of the set.
    #[inline]
    pub fn pop_last(&mut self) -> Option<K> {
        self.tree.pop_last().map(into_key)
    }

    /// Returns all elements of the set in ascending order.
    ///
    /// The sequence is a snapshot; it is rebuilt on every call.
    pub fn sequence(&self) -> Vec<&K> {
        self.iter().collect()
    }

    /// Returns an iterator over the elements of the set in ascending order.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    /// Clears the set, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    #[doc(hidden)]
    #[track_caller]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }

    /// Writes the underlying tree to `w` as a Graphviz `digraph` named `name`.
    pub fn dotgraph<W>(&self, name: &str, w: W) -> fmt::Result
    where
        K: fmt::Display,
        W: fmt::Write,
    {
        self.tree.dotgraph(name, w)
    }
}

impl<K: Ord> Default for AvlSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug> fmt::Debug for AvlSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: Ord + Clone> Clone for AvlSet<K> {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl<K: Ord> PartialEq for AvlSet<K> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Ord> Eq for AvlSet<K> {}

impl<K: Ord> Extend<K> for AvlSet<K> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K: Ord> FromIterator<K> for AvlSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = AvlSet::new();
        set.extend(iter);
        set
    }
}

impl<'a, K: Ord> IntoIterator for &'a AvlSet<K> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the elements of an [`AvlSet`] in ascending order.
pub struct Iter<'a, K: Ord> {
    inner: crate::Iter<'a, SetNode<K>>,
}

impl<'a, K: Ord> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| &node.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K: Ord> ExactSizeIterator for Iter<'a, K> {}

impl<'a, K: Ord> FusedIterator for Iter<'a, K> {}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::{format, string::String, vec, vec::Vec};

    use super::*;

    fn set_of(keys: &[u32]) -> AvlSet<u32> {
        let set: AvlSet<u32> = keys.iter().copied().collect();
        set.assert_invariants();
        set
    }

    fn keys(set: &AvlSet<u32>) -> Vec<u32> {
        set.sequence().into_iter().copied().collect()
    }

    #[test]
    fn ascending_inserts_balance() {
        let set = set_of(&[1, 2, 3, 4, 5, 6, 7]);

        assert_eq!(keys(&set), [1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(set.len(), 7);
        // Seven keys fit exactly in a perfect tree.
        assert_eq!(set.height(), 2);
    }

    #[test]
    fn bounds() {
        let set = set_of(&[5, 3, 8, 1, 4, 7, 9]);

        assert_eq!(set.predecessor(&6), Some(&5));
        assert_eq!(set.successor(&6), Some(&7));
        assert_eq!(set.predecessor(&1), Some(&1));
        assert_eq!(set.successor(&9), Some(&9));

        assert_eq!(set.predecessor(&0), None);
        assert_eq!(set.successor(&10), None);
        assert_eq!(set.predecessor(&100), Some(&9));
        assert_eq!(set.successor(&2), Some(&3));
        assert_eq!(set.predecessor(&2), Some(&1));
    }

    #[test]
    fn bounds_on_empty_set() {
        let set: AvlSet<u32> = AvlSet::new();

        assert_eq!(set.predecessor(&0), None);
        assert_eq!(set.successor(&0), None);
        assert_eq!(set.first(), None);
        assert_eq!(set.last(), None);
        assert!(set.sequence().is_empty());
        assert_eq!(set.height(), -1);
    }

    #[test]
    fn remove_root_splices() {
        let mut set = set_of(&[10, 20, 30]);

        assert!(set.remove(&20));
        set.assert_invariants();
        assert!(set.remove(&10));
        set.assert_invariants();

        assert_eq!(keys(&set), [30]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_from_empty() {
        let mut set: AvlSet<u32> = AvlSet::new();

        assert!(!set.remove(&1));
        assert_eq!(set.len(), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut set = set_of(&[2, 1, 3]);

        assert!(!set.insert(2));
        assert_eq!(keys(&set), [1, 2, 3]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn missing_remove_is_rejected() {
        let mut set = set_of(&[2, 1, 3]);

        assert!(!set.remove(&4));
        assert_eq!(keys(&set), [1, 2, 3]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn take_and_pop() {
        let mut set = set_of(&[4, 2, 6, 1, 3, 5, 7]);

        assert_eq!(set.take(&4), Some(4));
        assert_eq!(set.take(&4), None);
        assert_eq!(set.pop_first(), Some(1));
        assert_eq!(set.pop_last(), Some(7));
        set.assert_invariants();

        assert_eq!(set.first(), Some(&2));
        assert_eq!(set.last(), Some(&6));
        assert_eq!(keys(&set), [2, 3, 5, 6]);
    }

    #[test]
    fn borrowed_lookups() {
        let mut set: AvlSet<String> = ["pear", "apple", "fig"]
            .into_iter()
            .map(String::from)
            .collect();

        assert!(set.contains("fig"));
        assert_eq!(set.get("apple").map(String::as_str), Some("apple"));
        assert_eq!(set.successor("b").map(String::as_str), Some("fig"));
        assert_eq!(set.predecessor("z").map(String::as_str), Some("pear"));
        assert!(set.remove("pear"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn extend_skips_duplicates() {
        let mut set = set_of(&[1, 2]);
        set.extend([2, 3, 3, 4]);
        set.assert_invariants();

        assert_eq!(keys(&set), [1, 2, 3, 4]);
    }

    #[test]
    fn clone_and_eq() {
        let set = set_of(&[3, 1, 2]);
        let mut copy = set.clone();
        copy.assert_invariants();
        assert_eq!(set, copy);

        copy.insert(4);
        assert_ne!(set, copy);
    }

    #[test]
    fn clear_releases_everything() {
        let mut set: AvlSet<u32> = (0..100).collect();
        set.clear();
        set.assert_invariants();

        assert!(set.is_empty());
        assert_eq!(set.iter().next(), None);

        // The set is reusable after clearing.
        assert!(set.insert(1));
        assert_eq!(keys(&set), [1]);
    }

    #[test]
    fn debug_uses_set_notation() {
        let set = set_of(&[2, 3, 1]);

        assert_eq!(format!("{set:?}"), "{1, 2, 3}");
    }

    #[test]
    fn iter_is_exact_size() {
        let set = set_of(&[5, 3, 8]);
        let mut iter = set.iter();

        assert_eq!(iter.len(), 3);
        iter.next();
        assert_eq!(iter.len(), 2);
        assert_eq!(iter.copied().collect::<Vec<_>>(), vec![5, 8]);
    }

    #[test]
    fn dotgraph() {
        let set = set_of(&[1, 2, 3]);
        let mut dot = String::new();
        set.dotgraph("g", &mut dot).unwrap();

        assert!(dot.starts_with("digraph \"graph-g\" {"));
        assert!(dot.contains("\"graphg-2\" [label=\"2:1\"];"));
        assert!(dot.contains("\"graphg-1\" [label=\"1:0\"];"));
        assert!(dot.contains("\"graphg-2\" -> \"graphg-1\";"));
        assert!(dot.contains("\"graphg-2\" -> \"graphg-3\";"));
        assert!(dot.contains("\"graphg-3\" -> \"graphg-missing3\";"));

        let empty: AvlSet<u32> = AvlSet::new();
        let mut dot = String::new();
        empty.dotgraph("e", &mut dot).unwrap();
        assert_eq!(dot, "digraph \"graph-e\" {}");
    }
}
