//! Integer helpers for shape and workspace arithmetic.

/// Alignment applied to every workspace region, in bytes.
pub(crate) const WORKSPACE_ALIGN: usize = 16;

/// Rounds `bytes` up to the next multiple of [`WORKSPACE_ALIGN`].
pub(crate) fn align_up(bytes: usize) -> usize {
    bytes.div_ceil(WORKSPACE_ALIGN) * WORKSPACE_ALIGN
}

/// Multiplies all factors, returning `None` on overflow.
pub(crate) fn checked_product(factors: &[usize]) -> Option<usize> {
    factors
        .iter()
        .try_fold(1usize, |acc, &factor| acc.checked_mul(factor))
}

#[cfg(test)]
mod tests {
    use super::{align_up, checked_product};

    #[test]
    fn align_up_rounds_to_sixteen() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 16);
        assert_eq!(align_up(16), 16);
        assert_eq!(align_up(17), 32);
    }

    #[test]
    fn checked_product_detects_overflow() {
        assert_eq!(checked_product(&[2, 3, 4]), Some(24));
        assert_eq!(checked_product(&[]), Some(1));
        assert_eq!(checked_product(&[usize::MAX, 2]), None);
    }
}
