//! Stack growth for deeply nested scripts and expressions.
//!
//! Nesting depth is bounded by explicit counters (the tokenizer's bracket
//! ceiling, the interpreter's recursion limit). Each recursive entry point
//! runs through [`ensure_sufficient_stack`] so that reaching those ceilings
//! reports an error instead of overflowing the host stack first.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
