use core::{cell::UnsafeCell, marker::PhantomPinned, mem, ops::Not, ptr::NonNull};

pub(crate) type Link<T> = Option<NonNull<T>>;

/// Links embedded in every element of an [`AvlTree`](crate::AvlTree).
///
/// A node type stores a `Links<Self>` and hands it out through
/// [`Linked::links`](cordyceps::Linked::links). The tree owns the child links; the parent link is
/// a back-reference only.
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    // Height of the subtree rooted here. Leaves are 0, missing children count as -1.
    height: i8,
    _unpin: PhantomPinned,
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    pub(crate) fn height(&self) -> i8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    pub(crate) fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    pub(crate) fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    pub(crate) fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    pub(crate) fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    pub(crate) fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    pub(crate) fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    pub(crate) fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    pub(crate) fn set_height(&mut self, height: i8) -> i8 {
        mem::replace(&mut self.inner.get_mut().height, height)
    }

    /// Resets the links to the unlinked state of [`Links::new`].
    #[inline]
    pub(crate) fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.height = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> core::fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_links_are_an_unlinked_leaf() {
        let links: Links<u32> = Links::new();

        assert_eq!(links.left(), None);
        assert_eq!(links.right(), None);
        assert_eq!(links.height(), 0);
        assert_eq!(links.parent(), None);
    }

    #[test]
    fn set_child_returns_previous() {
        let mut a = 1u32;
        let mut b = 2u32;
        let a_ptr = NonNull::from(&mut a);
        let b_ptr = NonNull::from(&mut b);

        let mut links: Links<u32> = Links::new();
        assert_eq!(links.set_child(Dir::Left, Some(a_ptr)), None);
        assert_eq!(links.set_left(Some(b_ptr)), Some(a_ptr));
        assert_eq!(links.right(), None);

        links.set_height(3);
        links.clear();
        assert_eq!(links.left(), None);
        assert_eq!(links.height(), 0);
    }

    #[test]
    fn dir_not() {
        assert_eq!(!Dir::Left, Dir::Right);
        assert_eq!(!Dir::Right, Dir::Left);
    }
}
