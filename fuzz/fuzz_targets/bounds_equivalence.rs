#![no_main]

use cordyceps_avl::model::BoundsEquivalenceInput;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: BoundsEquivalenceInput| {
    cordyceps_avl::model::run_bounds_equivalence(input.values, input.queries);
});
