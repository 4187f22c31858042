//! Enumeration of strictly increasing position tuples
//!
//! Every PWM term is indexed by a k-combination of alignment positions.
//! Builders and scorers walk these combinations in lexicographic order
//! through [`for_each`], which avoids allocating per combination.

/// Highest correlation order supported anywhere in the crate
pub const MAX_ORDER: usize = 4;

/// Call `f` with every `r`-combination of `items`, in lexicographic order
/// of indices. `items` is expected to be sorted ascending, so every tuple
/// handed to `f` is strictly increasing.
///
/// Nothing is emitted when `r` is zero, exceeds [`MAX_ORDER`] or exceeds
/// `items.len()`.
pub fn for_each<F>(items: &[usize], r: usize, mut f: F)
where
    F: FnMut(&[usize]),
{
    let n = items.len();
    if r == 0 || r > MAX_ORDER || r > n {
        return;
    }

    let mut idx = [0usize; MAX_ORDER];
    let mut tuple = [0usize; MAX_ORDER];
    for i in 0..r {
        idx[i] = i;
    }

    loop {
        for i in 0..r {
            tuple[i] = items[idx[i]];
        }
        f(&tuple[..r]);

        // rightmost index that can still advance
        let mut i = r;
        loop {
            if i == 0 {
                return;
            }
            i -= 1;
            if idx[i] < n - r + i {
                break;
            }
        }
        idx[i] += 1;
        for j in i + 1..r {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

/// Number of `r`-combinations of `n` items
pub fn count(n: usize, r: usize) -> usize {
    if r > n {
        return 0;
    }
    let r = r.min(n - r);
    (0..r).fold(1usize, |acc, i| acc * (n - i) / (i + 1))
}
