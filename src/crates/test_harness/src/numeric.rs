//! Integer operators built from the generic ones.

use crate::operators::{Collect, FilterMap, Map, ProducerExt};
use crate::producer::Producer;

/// Returns `n` when it is prime, `None` otherwise.
pub fn prime_or_none<T>(n: T) -> Option<T>
where
    T: Copy + TryInto<u64>,
{
    let value: u64 = n.try_into().ok()?;
    if value == 2 {
        return Some(n);
    }
    if value < 2 || value % 2 == 0 {
        return None;
    }

    let mut divisor = 3u64;
    while divisor.saturating_mul(divisor) <= value {
        if value % divisor == 0 {
            return None;
        }
        divisor += 2;
    }
    Some(n)
}

type PrimeFilter<T> = fn(T) -> Option<T>;
type SumBatch<T> = fn(Vec<T>) -> T;

fn sum_batch<T: std::iter::Sum<T>>(values: Vec<T>) -> T {
    values.into_iter().sum()
}

/// Operators for producers of integers.
pub trait IntegerProducerExt: Producer + Sized
where
    Self::Output: Copy + TryInto<u64> + std::iter::Sum<Self::Output>,
{
    /// Forward only prime values.
    fn primes(self) -> FilterMap<Self, PrimeFilter<Self::Output>> {
        self.filter_map(prime_or_none::<Self::Output> as PrimeFilter<Self::Output>)
    }

    /// Emit the sum of every value once the upstream finishes.
    fn sum_of_integers(self) -> Map<Collect<Self>, SumBatch<Self::Output>> {
        self.collect()
            .map(sum_batch::<Self::Output> as SumBatch<Self::Output>)
    }
}

impl<P> IntegerProducerExt for P
where
    P: Producer,
    P::Output: Copy + TryInto<u64> + std::iter::Sum<P::Output>,
{
}
