//! Order-preserving list partitioning.

/// Split `items` into consecutive groups of at most `max_size` entries.
///
/// Produces exactly `ceil(len / max_size)` groups and never an empty one, so
/// an empty input yields no groups at all. A `max_size` of zero is treated
/// as one.
#[must_use]
pub fn chunk<T: Clone>(items: &[T], max_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(max_size.max(1))
        .map(<[T]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_group_count() {
        for len in 0..=25usize {
            for size in 1..=7usize {
                let items: Vec<usize> = (0..len).collect();
                let groups = chunk(&items, size);
                assert_eq!(groups.len(), len.div_ceil(size), "len={len} size={size}");
                assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= size));

                // Order is preserved across the concatenation.
                let flat: Vec<usize> = groups.into_iter().flatten().collect();
                assert_eq!(flat, items);
            }
        }
    }

    #[test]
    fn test_chunk_singleton() {
        let groups = chunk(&["a"], 1);
        assert_eq!(groups, vec![vec!["a"]]);
    }

    #[test]
    fn test_chunk_empty_input() {
        let groups: Vec<Vec<&str>> = chunk(&[], 100);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_chunk_boundary() {
        let items: Vec<u32> = (0..200).collect();
        let groups = chunk(&items, 100);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1][0], 100);

        let items: Vec<u32> = (0..201).collect();
        let groups = chunk(&items, 100);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[2], vec![200]);
    }

    #[test]
    fn test_chunk_zero_size() {
        let groups = chunk(&[1, 2], 0);
        assert_eq!(groups, vec![vec![1], vec![2]]);
    }
}
