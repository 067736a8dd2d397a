//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;

pub(crate) use circular::{with_circular_catch, CycleClass};
pub(crate) use dispose_bag::DisposeBag;
