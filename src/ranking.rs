// 📊 Ranking - one stable sort-by-key used for every ranked result list
//
// Ties keep encounter order. Non-finite keys (NaN, ±inf) sort after every
// finite key regardless of direction, in encounter order.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first (distances)
    Ascending,

    /// Largest first (strength of association, counts)
    Descending,
}

/// Stable in-place sort of `items` by a derived `f64` key
pub fn stable_rank<T, F>(items: &mut [T], direction: Direction, key: F)
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| compare_keys(key(a), key(b), direction));
}

fn compare_keys(a: f64, b: f64, direction: Direction) -> Ordering {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            match direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// True when `items` is already in rank order for `key`
pub fn is_ranked<T, F>(items: &[T], direction: Direction, key: F) -> bool
where
    F: Fn(&T) -> f64,
{
    items
        .windows(2)
        .all(|w| compare_keys(key(&w[0]), key(&w[1]), direction) != Ordering::Greater)
}
