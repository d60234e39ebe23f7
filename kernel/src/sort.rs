//! Bitonic comparator network over key/value pairs.
//!
//! Keys are compared as unsigned integers and always sorted ascending; the value
//! at an index moves with its key. Lane `t` of a pass over spans of `h` elements
//! owns exactly one pair inside span `2t / h`, so no two lanes of the same pass
//! ever touch the same element.

use shared::ThreadId;

/// Represents a comparison pair in the bitonic network
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ComparisonPair {
    pub lower: usize,
    pub upper: usize,
}

/// Start of the span lane `t` works in, and its offset inside the span's first half
#[inline]
fn span_base_and_offset(thread_id: ThreadId, h: u32) -> (u32, u32) {
    let t = thread_id.as_u32();
    let half_h = h >> 1;
    let q = ((2 * t) / h) * h;
    (q, t % half_h)
}

/// Flip: compares mirrored positions of a span, turning two sorted halves into
/// one bitonic sequence.
#[inline]
pub fn flip_pair(thread_id: ThreadId, h: u32) -> ComparisonPair {
    let (q, offset) = span_base_and_offset(thread_id, h);
    ComparisonPair {
        lower: (q + offset) as usize,
        upper: (q + h - offset - 1) as usize,
    }
}

/// Disperse: compares positions half a span apart.
#[inline]
pub fn disperse_pair(thread_id: ThreadId, h: u32) -> ComparisonPair {
    let (q, offset) = span_base_and_offset(thread_id, h);
    ComparisonPair {
        lower: (q + offset) as usize,
        upper: (q + offset + (h >> 1)) as usize,
    }
}

/// Order one pair so the smaller key sits at the lower index
#[inline]
pub fn compare_and_swap(keys: &mut [u32], values: &mut [u32], pair: ComparisonPair) {
    let i = pair.lower;
    let j = pair.upper;

    if keys[i] > keys[j] {
        keys.swap(i, j);
        values.swap(i, j);
    }
}

/// Same as [`compare_and_swap`] for elements the caller already split apart
#[inline]
pub fn compare_and_swap_elements(
    lower_key: &mut u32,
    lower_value: &mut u32,
    upper_key: &mut u32,
    upper_value: &mut u32,
) {
    if *lower_key > *upper_key {
        core::mem::swap(lower_key, upper_key);
        core::mem::swap(lower_value, upper_value);
    }
}

/// One flip step for every lane of a workgroup.
///
/// `keys`/`values` are the workgroup's block; it has `keys.len() / 2` lanes.
#[inline]
pub fn local_flip(keys: &mut [u32], values: &mut [u32], h: u32) {
    let lanes = (keys.len() / 2) as u32;
    for t in 0..lanes {
        compare_and_swap(keys, values, flip_pair(ThreadId::new(t), h));
    }
}

/// Disperse steps `h, h/2, ..., 2` for every lane of a workgroup.
/// Each step is separated by a workgroup barrier on a device.
#[inline]
pub fn local_disperse(keys: &mut [u32], values: &mut [u32], h: u32) {
    let lanes = (keys.len() / 2) as u32;
    let mut hh = h;
    while hh > 1 {
        for t in 0..lanes {
            compare_and_swap(keys, values, disperse_pair(ThreadId::new(t), hh));
        }
        hh >>= 1;
    }
}

/// Full bitonic merge sort of one block of `h` elements
#[inline]
pub fn local_bms(keys: &mut [u32], values: &mut [u32], h: u32) {
    let mut hh = 2;
    while hh <= h {
        local_flip(keys, values, hh);
        local_disperse(keys, values, hh / 2);
        hh <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn flip_pairs_mirror_within_span() {
        // span of 8: lanes 0..4 compare (0,7) (1,6) (2,5) (3,4)
        let pairs: Vec<_> = (0..4).map(|t| flip_pair(ThreadId::new(t), 8)).collect();
        assert_eq!(
            pairs,
            vec![
                ComparisonPair { lower: 0, upper: 7 },
                ComparisonPair { lower: 1, upper: 6 },
                ComparisonPair { lower: 2, upper: 5 },
                ComparisonPair { lower: 3, upper: 4 },
            ]
        );
        // lane 4 starts the second span
        assert_eq!(
            flip_pair(ThreadId::new(4), 8),
            ComparisonPair {
                lower: 8,
                upper: 15
            }
        );
    }

    #[test]
    fn disperse_pairs_are_half_a_span_apart() {
        assert_eq!(
            disperse_pair(ThreadId::new(0), 8),
            ComparisonPair { lower: 0, upper: 4 }
        );
        assert_eq!(
            disperse_pair(ThreadId::new(3), 8),
            ComparisonPair { lower: 3, upper: 7 }
        );
        assert_eq!(
            disperse_pair(ThreadId::new(5), 8),
            ComparisonPair {
                lower: 9,
                upper: 13
            }
        );
    }

    #[test]
    fn lanes_of_one_pass_touch_disjoint_elements() {
        for h in [2u32, 4, 8, 16, 64] {
            let n = 128usize;
            for pair_of in [
                flip_pair as fn(ThreadId, u32) -> ComparisonPair,
                disperse_pair,
            ] {
                let mut touched = vec![0u8; n];
                for t in 0..(n as u32 / 2) {
                    let pair = pair_of(ThreadId::new(t), h);
                    touched[pair.lower] += 1;
                    touched[pair.upper] += 1;
                }
                assert!(touched.iter().all(|&c| c == 1), "h = {h}");
            }
        }
    }

    #[test]
    fn compare_and_swap_moves_values_with_keys() {
        let mut keys = vec![9u32, 3];
        let mut values = vec![0u32, 1];
        compare_and_swap(&mut keys, &mut values, ComparisonPair { lower: 0, upper: 1 });
        assert_eq!(keys, vec![3, 9]);
        assert_eq!(values, vec![1, 0]);

        // already ordered pairs and ties are left alone
        compare_and_swap(&mut keys, &mut values, ComparisonPair { lower: 0, upper: 1 });
        assert_eq!(values, vec![1, 0]);
    }

    #[test]
    fn local_bms_sorts_a_block() {
        let mut keys = vec![20u32, 5, 12, 7, 18, 2, 15, 1];
        let mut values: Vec<u32> = (0..8).collect();
        local_bms(&mut keys, &mut values, 8);
        assert_eq!(keys, vec![1, 2, 5, 7, 12, 15, 18, 20]);
        assert_eq!(values, vec![7, 5, 1, 3, 2, 6, 4, 0]);
    }

    #[test]
    fn local_bms_of_one_element_is_a_no_op() {
        let mut keys = vec![4u32];
        let mut values = vec![0u32];
        local_bms(&mut keys, &mut values, 1);
        assert_eq!((keys[0], values[0]), (4, 0));
    }

    proptest! {
        #[test]
        fn local_bms_sorts_any_power_of_two_block(
            exp in 0u32..9,
            seed_keys in proptest::collection::vec(any::<u32>(), 256),
        ) {
            let n = 1usize << exp;
            let mut keys: Vec<u32> = seed_keys.iter().cycle().take(n).map(|k| k % 64).collect();
            let mut values: Vec<u32> = (0..n as u32).collect();
            let original = keys.clone();

            local_bms(&mut keys, &mut values, n as u32);

            prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]));
            let mut seen = vec![false; n];
            for (slot, &v) in values.iter().enumerate() {
                prop_assert!(!seen[v as usize]);
                seen[v as usize] = true;
                prop_assert_eq!(original[v as usize], keys[slot]);
            }
        }
    }
}
