// Licensed under the MIT License.

//! A fixed-size contiguous-slot pool with heap fallback, implementing the
//! coroutine-stack/control-block allocator interface the core contract treats
//! as an external collaborator (see `SPEC_FULL.md` §4.2). Not wired into
//! [`crate::task::Task`]'s own allocation: each task's boxed future is a
//! distinct compiler-generated type with its own size, which a pool of one
//! fixed `T` cannot host without unsound erasure. `Task` allocates through
//! the ordinary global allocator instead.

mod pool;

pub use pool::{Pool, SlotHandle};
