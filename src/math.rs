//! Integer helpers

use num_traits::{PrimInt, Unsigned};

use crate::error::{Error, Result};

/// Greatest common divisor (Euclid)
pub fn gcd<T: PrimInt + Unsigned>(mut a: T, mut b: T) -> T {
    while b != T::zero() {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Least common multiple of all values, folded left to right.
///
/// Returns `Ok(None)` for an empty slice. Zero values are rejected since
/// the multiple is undefined for them, and a result that does not fit in
/// `T` is reported instead of wrapping.
pub fn compute_lcm<T: PrimInt + Unsigned>(values: &[T]) -> Result<Option<T>> {
    let Some((&first, rest)) = values.split_first() else {
        return Ok(None);
    };

    if values.iter().any(|v| v.is_zero()) {
        return Err(Error::invalid_input("lcm is undefined for zero values"));
    }

    let mut lcm = first;
    for &value in rest {
        lcm = (lcm / gcd(lcm, value))
            .checked_mul(&value)
            .ok_or_else(|| Error::invalid_input("lcm overflows the integer type"))?;
    }

    Ok(Some(lcm))
}
