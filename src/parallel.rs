use std::env;

/// Runs `action` on a dedicated rayon pool sized by `GRIDIRON_PARALLELISM`,
/// falling back to the global pool if one cannot be built.
pub fn with_engine_pool<T>(action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    let threads = engine_parallelism();
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}

fn engine_parallelism() -> usize {
    env::var("GRIDIRON_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
        .clamp(1, 32)
}
