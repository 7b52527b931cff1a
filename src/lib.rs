//! An intrusive AVL tree, and an ordered set built on top of it.

// Conventions used in comments:
// - The height of a node `x` is denoted `h(x)`. Leaves have height 0 and a missing child has
//   height -1.
// - The balance factor of `x` is `h(left(x)) - h(right(x))`.
// - A node is left-heavy if its balance factor is positive and right-heavy if it is negative.
//
// The fundamental invariants of an AVL tree are:
// 1. The cached height of every node is `1 + max(h(left), h(right))`.
// 2. The balance factor of every node is -1, 0 or 1.
//
// Corollaries:
// 3. A tree of height `h` has at least `F(h + 3) - 1` nodes, where `F` is the Fibonacci
//    sequence, so `h < 1.4405 * log2(n + 2) - 0.3277`.
//
// 4. After attaching or detaching a single node, only the nodes on the path from the edit to
//    the root have stale heights, and their balance factors are in -2..=2.
//
//    Proof:
//    a. Every other node has both subtrees untouched.
//    b. A single edit changes the height of any subtree by at most one.
//    QED by (a), (b) and (2).

extern crate alloc;

use core::{borrow::Borrow, cmp::Ordering, fmt, pin::Pin, ptr::NonNull};

use cordyceps::Linked;
use log::{debug, trace};

mod debug;
mod iter;
mod links;
pub mod set;

#[cfg(any(test, feature = "model"))]
pub mod model;


pub use iter::Iter;
pub use links::Links;
pub use set::AvlSet;

use links::{Dir, Link};

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive [AVL tree].
///
/// Elements are linked through the [`Links`] they embed and are owned by the tree through their
/// [`Linked::Handle`] while linked. Keys are unique.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree.
    ///
    /// A tree with a single element has height 0; the empty tree has height -1.
    pub fn height(&self) -> i8 {
        unsafe { self.height_of(self.root) }
    }

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    #[doc(hidden)]
    #[track_caller]
    pub fn assert_invariants(&self) {
        let linked = match self.root {
            Some(root) => unsafe {
                assert_eq!(
                    T::links(root).as_ref().parent(),
                    None,
                    "root parent pointer must not be set"
                );

                self.assert_invariants_at(root, None, None)
            },
            None => 0,
        };

        assert_eq!(linked, self.len, "`len` must match the number of linked nodes");
    }

    // Checks the subtree rooted at `node`, whose keys must lie strictly between `lower` and
    // `upper`. Returns the number of nodes in the subtree.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(
        &self,
        node: NonNull<T>,
        lower: Option<&T::Key>,
        upper: Option<&T::Key>,
    ) -> usize {
        unsafe {
            let links = T::links(node).as_ref();
            let key = node.as_ref().key();

            // Ensure the search order holds against every ancestor.
            if let Some(lower) = lower {
                assert!(lower < key, "key must be greater than its left-side ancestors");
            }
            if let Some(upper) = upper {
                assert!(key < upper, "key must be less than its right-side ancestors");
            }

            let mut count = 1;

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = links.child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert!(
                        same_node(node, parent),
                        "child parent pointer must point to its parent"
                    );

                    count += match dir {
                        Dir::Left => self.assert_invariants_at(child, lower, Some(key)),
                        Dir::Right => self.assert_invariants_at(child, Some(key), upper),
                    };
                }
            }

            let left_height = self.height_of(links.left());
            let right_height = self.height_of(links.right());

            // Ensure the cached height is exact and the node is balanced.
            assert_eq!(links.height(), 1 + left_height.max(right_height));
            assert!(
                (-1..=1).contains(&(left_height - right_height)),
                "balance factor must be -1, 0 or 1"
            );

            count
        }
    }

    /// Returns a reference to the element corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns `true` if the tree contains an element corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the element corresponding to `key` if there is one, and otherwise the element with
    /// the greatest key less than `key`.
    ///
    /// Returns `None` if every key in the tree is greater than `key`.
    pub fn predecessor<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.nearest_raw(key, Dir::Left)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns the element corresponding to `key` if there is one, and otherwise the element with
    /// the least key greater than `key`.
    ///
    /// Returns `None` if every key in the tree is less than `key`.
    pub fn successor<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.nearest_raw(key, Dir::Right)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    // Returns the node matching `key`, or else the closest node on the `side` of `key`.
    fn nearest_raw<Q>(&self, key: &Q, side: Dir) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut best = None;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            let ordering = unsafe { cur.as_ref().key().borrow().cmp(key) };

            let next = match (ordering, side) {
                (Ordering::Equal, _) => return Some(cur),

                // `cur` is on the wanted side of `key`. Remember it and look for a closer bound
                // between it and `key`.
                (Ordering::Less, Dir::Left) | (Ordering::Greater, Dir::Right) => {
                    best = Some(cur);
                    !side
                }

                _ => side,
            };

            opt_cur = unsafe { T::links(cur).as_ref().child(next) };
        }

        best
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        unsafe {
            let first = self.end_of_subtree(self.root?, Dir::Left);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        unsafe {
            let last = self.end_of_subtree(self.root?, Dir::Right);
            Some(Pin::new_unchecked(last.as_ref()))
        }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        unsafe {
            let first = self.end_of_subtree(self.root?, Dir::Left);
            Some(self.remove_at(first))
        }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        unsafe {
            let last = self.end_of_subtree(self.root?, Dir::Right);
            Some(self.remove_at(last))
        }
    }

    // Follows `dir` links from `root` until there are none left.
    #[inline]
    unsafe fn end_of_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(next) = unsafe { T::links(cur).as_ref().child(dir) } {
            cur = next;
        }

        cur
    }

    #[inline]
    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    // Replaces `old_child` with `new_child` under `parent`, or as the root if `parent` is `None`.
    //
    // `new_child`'s parent pointer is updated.
    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => {
                self.root = new_child;
                unsafe { self.maybe_set_parent(new_child, None) };
            }
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            if let Some(new_child) = new_child {
                debug_assert_ne!(
                    T::links(parent).as_ref().child(!dir),
                    Some(new_child),
                    "`new_child` must not be a child of `parent`"
                );
            }

            T::links(parent).as_mut().set_child(dir, new_child);
            self.maybe_set_parent(new_child, Some(parent));
        }
    }

    // Rotates the subtree rooted at `node` so that `node` moves down in direction `dir` and its
    // `!dir` child takes its place. Returns the new subtree root.
    //
    // The heights of `node` and the promoted child are updated, those of its ancestors are not.
    unsafe fn rotate(&mut self, node: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            // - `up` becomes the parent of `node`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `node`.
            let up = T::links(node)
                .as_ref()
                .child(!dir)
                .expect("rotation requires a child to promote");
            let across = T::links(up).as_ref().child(dir);
            let parent = T::links(node).as_ref().parent();

            T::links(node).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(node));

            T::links(up).as_mut().set_child(dir, Some(node));
            T::links(node).as_mut().set_parent(Some(up));

            self.replace_child_or_set_root(parent, node, Some(up));

            // `node` is now below `up`, so its height must be settled first.
            self.update_height(node);
            let height = self.update_height(up);

            trace!("rotated {dir:?}, subtree height is now {height}");

            up
        }
    }

    // Restores balance at `node`, whose `heavy` subtree is two levels taller than the other.
    // Returns the new subtree root.
    unsafe fn rebalance_heavy(&mut self, node: NonNull<T>, heavy: Dir) -> NonNull<T> {
        unsafe {
            let child = T::links(node)
                .as_ref()
                .child(heavy)
                .expect("the taller side of an unbalanced node cannot be empty");

            let child_balance = self.balance_factor(child);
            let leans_away = match heavy {
                Dir::Left => child_balance < 0,
                Dir::Right => child_balance > 0,
            };

            // A single rotation would carry `child`'s inner subtree across to the short side and
            // recreate the imbalance, so straighten `child` first.
            if leans_away {
                self.rotate(child, heavy);
            }

            self.rotate(node, !heavy)
        }
    }

    // Walks from `start` to the root after a single node was attached or detached below `start`,
    // recomputing heights and rotating unbalanced nodes.
    //
    // Returns the number of levels visited.
    unsafe fn rebalance(&mut self, start: Link<T>) -> usize {
        let mut levels = 0;
        let mut opt_node = start;

        while let Some(node) = opt_node {
            levels += 1;

            unsafe {
                let old_height = T::links(node).as_ref().height();

                let subtree = match self.balance_factor(node) {
                    -1..=1 => {
                        self.update_height(node);
                        node
                    }
                    2 => self.rebalance_heavy(node, Dir::Left),
                    -2 => self.rebalance_heavy(node, Dir::Right),
                    other => unreachable!("balance factor {other} after a single edit"),
                };

                // If this subtree kept its height, no ancestor's balance can have changed. After an
                // insertion this always holds once a rotation is made; after a removal a rotation
                // may shrink the subtree and the walk goes on.
                if T::links(subtree).as_ref().height() == old_height {
                    break;
                }

                opt_node = T::links(subtree).as_ref().parent();
            }
        }

        levels
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an item with an equal key, the tree is left unchanged and
    /// `item` is handed back.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe { T::links(ptr).as_mut().clear() };

        let Some(root) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            self.root = Some(ptr);
            self.len += 1;
            return None;
        };

        let mut parent = root;

        // Descend the tree, looking for a free child slot.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Some(unsafe { T::from_ptr(ptr) }),
                Ordering::Greater => Dir::Right,
            };

            unsafe {
                match T::links(parent).as_ref().child(dir) {
                    // Descend.
                    Some(child) => parent = child,

                    // Set `item` as child.
                    None => {
                        T::links(parent).as_mut().set_child(dir, Some(ptr));
                        T::links(ptr).as_mut().set_parent(Some(parent));
                        break;
                    }
                }
            }
        }

        self.len += 1;

        unsafe { self.rebalance(Some(parent)) };

        None
    }

    /// Removes the item corresponding to `key` from the tree and returns it.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are three possible cases:
        //
        // 1. `node` has two children.
        //
        //    `node`'s successor[^1] is unlinked and assumes `node`'s place, children and height.
        //    The successor has no left child, so unlinking it is case 2 or 3 at its old position,
        //    and the walk starts from the successor's old parent (or from the successor itself if
        //    it was `node`'s right child).
        //
        // 2. `node` has one child.
        //
        //    The child is spliced into `node`'s place.
        //
        // 3. `node` is a leaf.
        //
        //    `node` is unlinked from its parent.
        //
        // In every case exactly one subtree lost one node, and heights are stale only on the path
        // from the edit to the root.
        //
        // [^1]: The successor of a node `a` is the least node in `a`'s right subtree.

        unsafe {
            let parent = T::links(node).as_ref().parent();
            let left = T::links(node).as_ref().left();
            let right = T::links(node).as_ref().right();

            let start = match (left, right) {
                (Some(left), Some(right)) => {
                    let successor = self.end_of_subtree(right, Dir::Left);

                    let start = if same_node(successor, right) {
                        successor
                    } else {
                        let successor_parent = T::links(successor)
                            .as_ref()
                            .parent()
                            .expect("successor below `right` must have a parent");

                        // Elevate the successor's right child to replace it.
                        let successor_right = T::links(successor).as_ref().right();
                        self.replace_child(successor_parent, successor, successor_right);

                        T::links(successor).as_mut().set_right(Some(right));
                        T::links(right).as_mut().set_parent(Some(successor));

                        successor_parent
                    };

                    self.replace_child_or_set_root(parent, node, Some(successor));

                    // Transfer height of `node` to `successor`.
                    let height = T::links(node).as_ref().height();
                    T::links(successor).as_mut().set_height(height);
                    T::links(successor).as_mut().set_left(Some(left));
                    T::links(left).as_mut().set_parent(Some(successor));

                    Some(start)
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);
                    parent
                }
            };

            T::links(node).as_mut().clear();
            self.len -= 1;

            let levels = self.rebalance(start);
            debug!(
                "removal rebalanced {levels} levels, tree height is now {}",
                self.height()
            );

            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let cur = self.end_of_subtree(cur, Dir::Left);
                let parent = T::links(cur).as_ref().parent();
                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);

                // Drop the node.
                T::links(cur).as_mut().clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    /// Returns the height of the pointed-to node.
    #[inline]
    unsafe fn height_of(&self, node: Link<T>) -> i8 {
        node.map(|n| unsafe { T::links(n).as_ref().height() })
            .unwrap_or(-1)
    }

    #[inline]
    unsafe fn balance_factor(&self, node: NonNull<T>) -> i8 {
        unsafe {
            let links = T::links(node).as_ref();
            self.height_of(links.left()) - self.height_of(links.right())
        }
    }

    // Recomputes the cached height of `node` from its children and returns it.
    #[inline]
    unsafe fn update_height(&mut self, node: NonNull<T>) -> i8 {
        unsafe {
            let links = T::links(node).as_ref();
            let height = self
                .height_of(links.left())
                .max(self.height_of(links.right()))
                .checked_add(1)
                .expect("tree height overflow");

            T::links(node).as_mut().set_height(height);
            height
        }
    }

    #[inline]
    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        unsafe {
            if T::links(parent)
                .as_ref()
                .left()
                .is_some_and(|left| same_node(left, child))
            {
                Dir::Left
            } else {
                debug_assert!(
                    T::links(parent)
                        .as_ref()
                        .right()
                        .is_some_and(|right| same_node(right, child)),
                    "`child` must be a child of `parent`"
                );
                Dir::Right
            }
        }
    }
}

// Node identity is the address alone; a pointer to a `?Sized` node may also carry metadata.
#[inline]
fn same_node<T: ?Sized>(a: NonNull<T>, b: NonNull<T>) -> bool {
    a.cast::<u8>() == b.cast::<u8>()
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AvlTree<T>
where
    T: TreeNode<Links<T>> + fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'tree, T> IntoIterator for &'tree AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}
