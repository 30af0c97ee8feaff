/// Exclusive prefix sum computed on the host, used to validate device results.
///
/// `output[0] = 0` and `output[i] = output[i - 1] + input[i - 1]`, with wrapping additions.
pub fn reference_exclusive_scan(input: &[i32]) -> Vec<i32> {
    input
        .iter()
        .scan(0i32, |acc, value| {
            let current = *acc;
            *acc = acc.wrapping_add(*value);
            Some(current)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accumulates_every_previous_element() {
        assert_eq!(
            reference_exclusive_scan(&[3, 1, 4, 1, 5, 9, 2, 6]),
            vec![0, 3, 4, 8, 9, 14, 23, 25]
        );
    }

    #[test]
    fn empty_and_single() {
        assert_eq!(reference_exclusive_scan(&[]), Vec::<i32>::new());
        assert_eq!(reference_exclusive_scan(&[7]), vec![0]);
    }

    #[test]
    fn wraps_on_overflow() {
        assert_eq!(
            reference_exclusive_scan(&[i32::MAX, 1, 0]),
            vec![0, i32::MAX, i32::MIN]
        );
    }
}
