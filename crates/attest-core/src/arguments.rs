//! Argument expansion for parameterized tests
//!
//! A parameterized test runs once per argument case. Cases come from one
//! source, or from several sources combined either as a cartesian
//! [`Strategy::Product`] or a positional [`Strategy::Zip`].
//!
//! Expansion works on index tuples so the counting and ordering rules are
//! shared by every source arity:
//! - `Product` over sizes `s1..sk` yields `s1 * .. * sk` tuples, first source
//!   varying slowest.
//! - `Zip` yields `min(s1..sk)` tuples. Extra elements in longer sources are
//!   dropped without complaint.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// How several argument sources are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Product,
    Zip,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Product => f.write_str("product"),
            Strategy::Zip => f.write_str("zip"),
        }
    }
}

/// Number of cases produced, or `None` when there are no sources or the
/// product overflows `usize`.
pub fn case_count(sizes: &[usize], strategy: Strategy) -> Option<usize> {
    if sizes.is_empty() {
        return None;
    }
    match strategy {
        Strategy::Product => sizes.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n)),
        Strategy::Zip => sizes.iter().copied().min(),
    }
}

/// Lazily enumerate index tuples for `sizes` under `strategy`.
pub fn expand(sizes: &[usize], strategy: Strategy) -> Expansion {
    Expansion {
        total: case_count(sizes, strategy).unwrap_or(0),
        sizes: sizes.to_vec(),
        strategy,
        next: 0,
    }
}

/// Iterator over index tuples, see [`expand`].
#[derive(Debug, Clone)]
pub struct Expansion {
    sizes: Vec<usize>,
    strategy: Strategy,
    next: usize,
    total: usize,
}

impl Iterator for Expansion {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let ordinal = self.next;
        self.next += 1;

        let indices = match self.strategy {
            Strategy::Zip => vec![ordinal; self.sizes.len()],
            Strategy::Product => {
                // Mixed-radix decode, last source is the least significant digit
                let mut indices = vec![0; self.sizes.len()];
                let mut rest = ordinal;
                for (slot, &size) in indices.iter_mut().zip(&self.sizes).rev() {
                    *slot = rest % size;
                    rest /= size;
                }
                indices
            }
        };
        Some(indices)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Expansion {}

type Picker<T> = Arc<dyn Fn(&[usize]) -> T + Send + Sync>;

/// Typed argument source for a parameterized test.
///
/// ```
/// use attest_core::Arguments;
///
/// let single = Arguments::new(["vanilla", "mint"]);
/// assert_eq!(single.len(), 2);
///
/// let product = Arguments::product([1, 2], ['a', 'b', 'c']);
/// assert_eq!(product.len(), 6);
///
/// let zipped = Arguments::zip([1, 2], ['a', 'b', 'c']);
/// assert_eq!(zipped.iter().collect::<Vec<_>>(), vec![(1, 'a'), (2, 'b')]);
/// ```
pub struct Arguments<T> {
    sizes: Vec<usize>,
    strategy: Strategy,
    pick: Picker<T>,
}

impl<T> Clone for Arguments<T> {
    fn clone(&self) -> Self {
        Self {
            sizes: self.sizes.clone(),
            strategy: self.strategy,
            pick: Arc::clone(&self.pick),
        }
    }
}

impl<T> fmt::Debug for Arguments<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("sizes", &self.sizes)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl<T> Arguments<T> {
    /// Number of cases this source expands to.
    pub fn len(&self) -> usize {
        case_count(&self.sizes, self.strategy).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Length of each underlying source.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Materialize the cases one at a time.
    pub fn iter(&self) -> impl Iterator<Item = T> + Send + '_ {
        expand(&self.sizes, self.strategy).map(move |indices| (self.pick)(&indices))
    }
}

impl<T> Arguments<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A single source; one case per value.
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        Self {
            sizes: vec![values.len()],
            strategy: Strategy::Product,
            pick: Arc::new(move |indices| values[indices[0]].clone()),
        }
    }
}

impl<T> FromIterator<T> for Arguments<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<T> From<Vec<T>> for Arguments<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}

impl<A, B> Arguments<(A, B)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// Every combination of `a` and `b`.
    pub fn product<IA, IB>(a: IA, b: IB) -> Self
    where
        IA: IntoIterator<Item = A>,
        IB: IntoIterator<Item = B>,
    {
        Self::pair(a, b, Strategy::Product)
    }

    /// `a` and `b` paired by position, truncated to the shorter.
    pub fn zip<IA, IB>(a: IA, b: IB) -> Self
    where
        IA: IntoIterator<Item = A>,
        IB: IntoIterator<Item = B>,
    {
        Self::pair(a, b, Strategy::Zip)
    }

    fn pair<IA, IB>(a: IA, b: IB, strategy: Strategy) -> Self
    where
        IA: IntoIterator<Item = A>,
        IB: IntoIterator<Item = B>,
    {
        let a: Vec<A> = a.into_iter().collect();
        let b: Vec<B> = b.into_iter().collect();
        Self {
            sizes: vec![a.len(), b.len()],
            strategy,
            pick: Arc::new(move |ix| (a[ix[0]].clone(), b[ix[1]].clone())),
        }
    }
}

impl<A, B, C> Arguments<(A, B, C)>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    pub fn product3<IA, IB, IC>(a: IA, b: IB, c: IC) -> Self
    where
        IA: IntoIterator<Item = A>,
        IB: IntoIterator<Item = B>,
        IC: IntoIterator<Item = C>,
    {
        Self::triple(a, b, c, Strategy::Product)
    }

    pub fn zip3<IA, IB, IC>(a: IA, b: IB, c: IC) -> Self
    where
        IA: IntoIterator<Item = A>,
        IB: IntoIterator<Item = B>,
        IC: IntoIterator<Item = C>,
    {
        Self::triple(a, b, c, Strategy::Zip)
    }

    fn triple<IA, IB, IC>(a: IA, b: IB, c: IC, strategy: Strategy) -> Self
    where
        IA: IntoIterator<Item = A>,
        IB: IntoIterator<Item = B>,
        IC: IntoIterator<Item = C>,
    {
        let a: Vec<A> = a.into_iter().collect();
        let b: Vec<B> = b.into_iter().collect();
        let c: Vec<C> = c.into_iter().collect();
        Self {
            sizes: vec![a.len(), b.len(), c.len()],
            strategy,
            pick: Arc::new(move |ix| (a[ix[0]].clone(), b[ix[1]].clone(), c[ix[2]].clone())),
        }
    }
}
