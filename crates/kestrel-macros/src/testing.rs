// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Testing helper macros.
//!
//! Provides macros for writing cleaner and more expressive tests.

/// Assert that an expression matches a pattern.
///
/// # Example
///
/// ```
/// use kestrel_macros::assert_matches;
///
/// #[derive(Debug)]
/// enum Operand { Reg(u32), Imm(i64) }
///
/// assert_matches!(Operand::Reg(3), Operand::Reg(n) if n == 3);
/// assert_matches!(Operand::Imm(-1), Operand::Imm(_));
/// ```
#[macro_export]
macro_rules! assert_matches {
    ($expr:expr, $pat:pat) => {
        match $expr {
            $pat => {}
            ref e => panic!(
                "assertion failed: `{}` does not match pattern `{}`\n  value: {:?}",
                stringify!($expr),
                stringify!($pat),
                e
            ),
        }
    };
    ($expr:expr, $pat:pat if $guard:expr) => {
        match $expr {
            $pat if $guard => {}
            ref e => panic!(
                "assertion failed: `{}` does not match pattern `{} if {}`\n  value: {:?}",
                stringify!($expr),
                stringify!($pat),
                stringify!($guard),
                e
            ),
        }
    };
}

/// Assert that a Result is Ok and extract the value.
///
/// # Example
///
/// ```
/// use kestrel_macros::assert_ok;
///
/// let value = assert_ok!("42".parse::<u32>());
/// assert_eq!(value, 42);
/// ```
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!(
                "assertion failed: expected Ok, got Err\n  expression: `{}`\n  error: {:?}",
                stringify!($expr),
                e
            ),
        }
    };
}

/// Assert that a Result is Err and extract the error.
///
/// # Example
///
/// ```
/// use kestrel_macros::assert_err;
///
/// let err = assert_err!("x".parse::<u32>());
/// assert!(!err.to_string().is_empty());
/// ```
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!(
                "assertion failed: expected Err, got Ok\n  expression: `{}`\n  value: {:?}",
                stringify!($expr),
                v
            ),
            Err(e) => e,
        }
    };
}

/// Assert that an Option is Some and extract the value.
///
/// # Example
///
/// ```
/// use kestrel_macros::assert_some;
///
/// let value = assert_some!([1, 2, 3].iter().position(|&x| x == 2));
/// assert_eq!(value, 1);
/// ```
#[macro_export]
macro_rules! assert_some {
    ($expr:expr) => {
        match $expr {
            Some(v) => v,
            None => panic!(
                "assertion failed: expected Some, got None\n  expression: `{}`",
                stringify!($expr)
            ),
        }
    };
}

/// Assert that a string contains a substring.
///
/// # Example
///
/// ```
/// use kestrel_macros::assert_contains;
///
/// let listing = "0000 ldai 1\n0001 return";
/// assert_contains!(listing, "return");
/// ```
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        if !$haystack.contains($needle) {
            panic!(
                "assertion failed: string does not contain substring\n  string: `{}`\n  expected: `{}`",
                $haystack, $needle
            );
        }
    };
}
