mod parallelize_op;

pub (crate) use parallelize_op::parallelize_op as parallelize_op;

/// Frames handed to each worker by `parallelize_op!`. Small
/// enough that a batch spreads across threads, large enough
/// that each worker amortizes opening its own file.
pub (crate) const FRAMES_PER_WORKER : usize = 16;
