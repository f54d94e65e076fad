// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Early-return macros for typed errors.

/// Returns `Err` with the given error, converted with `Into`.
///
/// # Example
///
/// ```
/// use kestrel_macros::bail;
///
/// #[derive(Debug, PartialEq)]
/// struct SlotOverflow(u32);
///
/// fn slot(index: u32) -> Result<u32, SlotOverflow> {
///     if index > 255 {
///         bail!(SlotOverflow(index));
///     }
///     Ok(index)
/// }
///
/// assert_eq!(slot(300), Err(SlotOverflow(300)));
/// assert_eq!(slot(3), Ok(3));
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr $(,)?) => {
        return ::core::result::Result::Err(::core::convert::Into::into($err))
    };
}

/// Returns `Err` with the given error unless the condition holds.
///
/// # Example
///
/// ```
/// use kestrel_macros::ensure;
///
/// #[derive(Debug, PartialEq)]
/// struct Overflow(usize);
///
/// fn push(len: usize) -> Result<usize, Overflow> {
///     ensure!(len < 4, Overflow(len));
///     Ok(len + 1)
/// }
///
/// assert_eq!(push(4), Err(Overflow(4)));
/// assert_eq!(push(1), Ok(2));
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            $crate::bail!($err);
        }
    };
}
