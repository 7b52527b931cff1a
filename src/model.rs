extern crate std;

use std::{collections::BTreeSet, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlSet, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// Panics if a tree of `len` elements is taller than any AVL tree of that size can be.
#[track_caller]
pub fn assert_height_bound(len: usize, height: i8) {
    let bound = 1.44 * ((len + 2) as f64).log2() - 0.328;

    assert!(
        f64::from(height) <= bound,
        "height {height} exceeds the AVL bound {bound:.3} for {len} elements"
    );
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Contains(ItemValue),
    Remove(ItemValue),
    Predecessor(ItemValue),
    Successor(ItemValue),
    First,
    PopFirst,
    Last,
    PopLast,
}

impl Op {
    // Resolves `Index` values against the current contents so that lookups and removals hit
    // existing keys often.
    fn finalize(self, current: &BTreeSet<u32>) -> FinalOp {
        fn get_value(set: &BTreeSet<u32>, i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => set
                    .iter()
                    .nth(idx % set.len().max(1))
                    .copied()
                    .unwrap_or(idx as u32),
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(current, item)),
            Op::Contains(item) => FinalOp::Contains(get_value(current, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(current, item)),
            Op::Predecessor(item) => FinalOp::Predecessor(get_value(current, item)),
            Op::Successor(item) => FinalOp::Successor(get_value(current, item)),
            Op::First => FinalOp::First,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Last => FinalOp::Last,
            Op::PopLast => FinalOp::PopLast,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Contains(u32),
    Remove(u32),
    Predecessor(u32),
    Successor(u32),
    First,
    PopFirst,
    Last,
    PopLast,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Contains),
        value_strategy().prop_map(Op::Remove),
        value_strategy().prop_map(Op::Predecessor),
        value_strategy().prop_map(Op::Successor),
        Just(Op::First),
        Just(Op::PopFirst),
        Just(Op::Last),
        Just(Op::PopLast),
    ]
}

/// Applies `ops` to an [`AvlSet`] and a [`BTreeSet`] side by side, asserting that every result
/// matches and that the tree stays a valid AVL tree after every operation.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut btree = BTreeSet::new();
    let mut avl: AvlSet<u32> = AvlSet::new();

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&btree);

        match final_op {
            FinalOp::Insert(value) => {
                let from_btree = btree.insert(value);
                let from_avl = avl.insert(value);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Contains(value) => {
                let from_btree = btree.contains(&value);
                let from_avl = avl.contains(&value);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(value) => {
                let from_btree = btree.remove(&value);
                let from_avl = avl.remove(&value);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Predecessor(value) => {
                let from_btree = btree.range(..=value).next_back();
                let from_avl = avl.predecessor(&value);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Successor(value) => {
                let from_btree = btree.range(value..).next();
                let from_avl = avl.successor(&value);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_btree = btree.first();
                let from_avl = avl.first();

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopFirst => {
                let from_btree = btree.pop_first();
                let from_avl = avl.pop_first();

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_btree = btree.last();
                let from_avl = avl.last();

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopLast => {
                let from_btree = btree.pop_last();
                let from_avl = avl.pop_last();

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }
        }

        avl.assert_invariants();
        assert_height_bound(avl.len(), avl.height());
        assert_eq!(btree.len(), avl.len());
        assert!(btree.iter().eq(avl.iter()));
    }
}

#[derive(Clone, Debug)]
pub struct BoundsEquivalenceInput {
    pub values: Vec<u32>,
    pub queries: Vec<u32>,
}

impl<'a> arbitrary::Arbitrary<'a> for BoundsEquivalenceInput {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        // Keys are kept small so that queries land on stored keys as well as between them.
        fn value(u: &mut arbitrary::Unstructured<'_>) -> u32 {
            u16::arbitrary(u).map(u32::from).unwrap_or(0) % 2048
        }

        let num_values = u8::arbitrary(u)? % 200;
        let num_queries = u8::arbitrary(u)?;

        let values = core::iter::repeat_with(|| value(u))
            .take(num_values.into())
            .collect();

        let queries = core::iter::repeat_with(|| value(u))
            .take(num_queries.into())
            .collect();

        Ok(BoundsEquivalenceInput { values, queries })
    }
}

pub fn bounds_strategy() -> impl Strategy<Value = BoundsEquivalenceInput> {
    (
        proptest::collection::vec(0u32..2048, 0..200),
        proptest::collection::vec(0u32..2100, 0..100),
    )
        .prop_map(|(values, queries)| BoundsEquivalenceInput { values, queries })
}

/// Builds a set from `values` and checks `predecessor` and `successor` for every query against a
/// linear scan of the set's sequence.
pub fn run_bounds_equivalence(values: Vec<u32>, queries: Vec<u32>) {
    let set: AvlSet<u32> = values.into_iter().collect();
    set.assert_invariants();
    assert_height_bound(set.len(), set.height());

    let sequence = set.sequence();
    assert!(sequence.windows(2).all(|pair| pair[0] < pair[1]));

    for query in queries {
        let predecessor = sequence.iter().rev().copied().find(|&&key| key <= query);
        let successor = sequence.iter().copied().find(|&&key| key >= query);

        assert_eq!(set.predecessor(&query), predecessor, "predecessor of {query}");
        assert_eq!(set.successor(&query), successor, "successor of {query}");
        assert_eq!(
            set.contains(&query),
            sequence.binary_search(&&query).is_ok(),
            "contains {query}"
        );
    }
}
