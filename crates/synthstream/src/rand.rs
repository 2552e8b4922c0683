use ::rand::{Rng, rng};

/// A trait for random sources that return uniform draws from `[0, 1)`.
///
/// This abstraction allows you to plug in a real random source or a mocked
/// random source in tests. Producers hold their own source and never share it
/// across workers.
///
/// # Example
/// ```
/// use synthstream::RandSource;
///
/// struct FixedRand;
/// impl RandSource for FixedRand {
///     fn uniform(&mut self) -> f64 {
///         0.25
///     }
/// }
///
/// let mut rng = FixedRand;
/// assert_eq!(rng.uniform(), 0.25);
/// ```
pub trait RandSource: Send + 'static {
    /// Returns a uniformly distributed value in `[0, 1)`.
    fn uniform(&mut self) -> f64;
}

/// A `RandSource` that uses the thread-local RNG (`rand::rng()`).
///
/// This type does **not** store the RNG itself; it accesses the thread-local
/// generator on each call. That keeps it `Send`, so it can live inside a
/// producer task that Tokio moves between worker threads.
#[derive(Default, Clone, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn uniform(&mut self) -> f64 {
        rng().random()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_random_stays_in_the_unit_interval() {
        let mut rand = ThreadRandom;
        for _ in 0..10_000 {
            let v = rand.uniform();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
