use alloc::vec::Vec;
use core::{iter::FusedIterator, marker::PhantomData, ptr::NonNull};

use crate::{AvlTree, Link, Links, TreeNode};

/// An iterator over the elements of an [`AvlTree`] in ascending key order.
///
/// The traversal keeps its own stack of pending ancestors instead of recursing, so its memory use
/// is bounded by the tree height.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    // Nodes whose left subtree is being visited, innermost last.
    stack: Vec<NonNull<T>>,

    // Root of the subtree to visit before popping `stack`.
    pending: Link<T>,

    len: usize,
    _tree: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        let depth = usize::try_from(tree.height()).map_or(0, |h| h + 1);

        Iter {
            stack: Vec::with_capacity(depth),
            pending: tree.root,
            len: tree.len(),
            _tree: PhantomData,
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        // Upon entering a new subtree, stack its left spine. The innermost node is the minimum.
        while let Some(node) = self.pending {
            self.stack.push(node);
            self.pending = unsafe { T::links(node).as_ref().left() };
        }

        // The popped node's left subtree has been exhausted, so it is up next. Its right subtree
        // follows it.
        let node = self.stack.pop()?;
        self.pending = unsafe { T::links(node).as_ref().right() };
        self.len -= 1;

        Some(unsafe { node.as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'tree, T> {}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'tree, T> {}
