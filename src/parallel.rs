//! Scoped-thread parallel map for fitness evaluation.

use std::panic;
use std::thread;

/// Maps `f` over `items` on up to `workers` scoped threads.
///
/// Output order matches input order. With one worker, or fewer than two
/// items, runs on the calling thread. A panic in a worker is resumed on
/// the caller.
pub(crate) fn par_map<T, U, F>(items: &[T], workers: usize, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync,
{
    if workers <= 1 || items.len() < 2 {
        return items.iter().map(f).collect();
    }

    let chunk_size = items.len().div_ceil(workers);
    let f = &f;
    thread::scope(|scope| {
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || chunk.iter().map(f).collect::<Vec<U>>()))
            .collect();

        let mut out = Vec::with_capacity(items.len());
        for handle in handles {
            match handle.join() {
                Ok(part) => out.extend(part),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        out
    })
}
