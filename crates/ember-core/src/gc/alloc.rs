//! Fatal-on-failure buffer growth
//!
//! Running out of memory is never recoverable in the VM: every growth path
//! either succeeds or terminates the process through the global allocator's
//! error handler.

use std::alloc::{handle_alloc_error, Layout};

/// Capacity used the first time a buffer grows.
pub const MIN_CAPACITY: usize = 8;

/// Next capacity for a geometrically growing buffer
#[inline]
pub const fn grow_capacity(capacity: usize) -> usize {
    if capacity < MIN_CAPACITY {
        MIN_CAPACITY
    } else {
        capacity * 2
    }
}

/// Grow `buf` so that it can hold at least `new_capacity` elements, or abort.
pub fn reserve_exact_or_abort<T>(buf: &mut Vec<T>, new_capacity: usize) {
    let additional = new_capacity.saturating_sub(buf.len());
    if buf.try_reserve_exact(additional).is_err() {
        out_of_memory::<T>(new_capacity);
    }
}

/// Report an unsatisfiable allocation and terminate
#[cold]
pub fn out_of_memory<T>(count: usize) -> ! {
    tracing::error!(
        count,
        element = std::any::type_name::<T>(),
        "allocation failed"
    );
    let layout = Layout::array::<T>(count).unwrap_or_else(|_| Layout::new::<T>());
    handle_alloc_error(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_capacity() {
        assert_eq!(grow_capacity(0), 8);
        assert_eq!(grow_capacity(7), 8);
        assert_eq!(grow_capacity(8), 16);
        assert_eq!(grow_capacity(1024), 2048);
    }

    #[test]
    fn test_reserve_exact() {
        let mut buf: Vec<u32> = Vec::new();
        reserve_exact_or_abort(&mut buf, 8);
        assert!(buf.capacity() >= 8);

        buf.extend(0..8);
        reserve_exact_or_abort(&mut buf, 16);
        assert!(buf.capacity() >= 16);
        assert_eq!(buf.len(), 8);
    }
}
