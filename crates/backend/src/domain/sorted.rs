//! Set algorithms over sorted, unique sequences.
//!
//! Every collection in the scheduler (project parts, pending tasks, file path
//! ids) is kept as a `Vec` sorted by its identity key. Merging and diffing is
//! done with linear merge walks instead of hashing so results stay in a stable,
//! deterministic order.

use std::cmp::Ordering;

/// Sort and deduplicate a vector of plain ordered values.
pub fn sort_unique<T: Ord>(values: &mut Vec<T>) {
  values.sort();
  values.dedup();
}

/// Sort by `compare` and drop later duplicates (the first occurrence wins).
pub fn sort_unique_by<T, F>(values: &mut Vec<T>, mut compare: F)
where
  F: FnMut(&T, &T) -> Ordering,
{
  values.sort_by(&mut compare);
  values.dedup_by(|later, earlier| compare(&*earlier, &*later) == Ordering::Equal);
}

/// Union of two sorted-unique sequences.
///
/// When both sides contain an element with the same key, the element from
/// `preferred` is kept and the one from `other` is dropped, so resubmitting an
/// entry replaces the old one instead of duplicating it.
pub fn union_by<T, F>(preferred: Vec<T>, other: Vec<T>, mut compare: F) -> Vec<T>
where
  F: FnMut(&T, &T) -> Ordering,
{
  let mut merged = Vec::with_capacity(preferred.len() + other.len());
  let mut left = preferred.into_iter().peekable();
  let mut right = other.into_iter().peekable();

  loop {
    let ordering = match (left.peek(), right.peek()) {
      (Some(l), Some(r)) => compare(l, r),
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => break,
    };

    match ordering {
      Ordering::Less => merged.extend(left.next()),
      Ordering::Greater => merged.extend(right.next()),
      Ordering::Equal => {
        merged.extend(left.next());
        right.next();
      }
    }
  }

  merged
}

/// Keep every element of `items` whose key does not appear in `keys`.
///
/// Both inputs must be sorted by the key `compare` orders on. Keys without a
/// matching element are ignored.
pub fn difference_by<T, K, F>(items: Vec<T>, keys: &[K], mut compare: F) -> Vec<T>
where
  F: FnMut(&T, &K) -> Ordering,
{
  let mut keys = keys.iter().peekable();

  items
    .into_iter()
    .filter(|item| loop {
      let ordering = match keys.peek() {
        Some(key) => compare(item, *key),
        None => return true,
      };

      match ordering {
        Ordering::Greater => {
          keys.next();
        }
        Ordering::Equal => return false,
        Ordering::Less => return true,
      }
    })
    .collect()
}

/// Clone every element of `items` whose key appears in `keys`, in `items` order.
pub fn intersection_by<T, K, F>(items: &[T], keys: &[K], mut compare: F) -> Vec<T>
where
  T: Clone,
  F: FnMut(&T, &K) -> Ordering,
{
  let mut keys = keys.iter().peekable();

  items
    .iter()
    .filter(|item| loop {
      let ordering = match keys.peek() {
        Some(key) => compare(*item, *key),
        None => return false,
      };

      match ordering {
        Ordering::Greater => {
          keys.next();
        }
        Ordering::Equal => return true,
        Ordering::Less => return false,
      }
    })
    .cloned()
    .collect()
}

/// Union of two sorted-unique sequences of plain values.
pub fn union<T: Ord + Clone>(first: &[T], second: &[T]) -> Vec<T> {
  union_by(first.to_vec(), second.to_vec(), |a, b| a.cmp(b))
}

/// `first \ second` for sorted-unique sequences of plain values.
pub fn difference<T: Ord + Clone>(first: &[T], second: &[T]) -> Vec<T> {
  difference_by(first.to_vec(), second, |a, b| a.cmp(b))
}

/// `first ∩ second` for sorted-unique sequences of plain values.
pub fn intersection<T: Ord + Clone>(first: &[T], second: &[T]) -> Vec<T> {
  intersection_by(first, second, |a, b| a.cmp(b))
}
