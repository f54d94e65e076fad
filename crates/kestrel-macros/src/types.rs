// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type definition macros.
//!
//! Provides macros for arena handles and integer-coded enums.

/// Assert at compile time.
///
/// # Example
///
/// ```
/// use kestrel_macros::const_assert;
///
/// const_assert!(u8::MAX as u32 == 255);
/// ```
#[macro_export]
macro_rules! const_assert {
    ($cond:expr) => {
        const _: () = assert!($cond);
    };
    ($cond:expr, $msg:literal) => {
        const _: () = assert!($cond, $msg);
    };
}

/// Create an enum that can convert to/from integers.
///
/// # Example
///
/// ```
/// use kestrel_macros::int_enum;
///
/// int_enum! {
///     #[derive(Debug, Clone, Copy, PartialEq)]
///     pub enum Severity: u16 {
///         Error = 1,
///         Warning = 2,
///     }
/// }
///
/// assert_eq!(Severity::Warning as u16, 2);
/// assert_eq!(Severity::try_from(1u16), Ok(Severity::Error));
/// assert!(Severity::try_from(9u16).is_err());
/// ```
#[macro_export]
macro_rules! int_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr($repr)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value
            ),+
        }

        impl ::core::convert::TryFrom<$repr> for $name {
            type Error = ();

            fn try_from(value: $repr) -> ::core::result::Result<Self, <Self as ::core::convert::TryFrom<$repr>>::Error> {
                match value {
                    $($value => ::core::result::Result::Ok(Self::$variant),)+
                    _ => ::core::result::Result::Err(()),
                }
            }
        }
    };
}

/// Create an arena handle: a copyable index newtype with a display prefix.
///
/// Handles are created from `usize` arena positions and convert back with
/// [`index`](#method.index). The `Display` form is the prefix followed by
/// the number, which is what disassembly listings print.
///
/// # Example
///
/// ```
/// use kestrel_macros::index_newtype;
///
/// index_newtype! {
///     /// A slot in some arena.
///     pub struct SlotId(u32) => "s";
/// }
///
/// let id = SlotId::new(7);
/// assert_eq!(id.index(), 7);
/// assert_eq!(id.to_string(), "s7");
/// assert!(SlotId::new(1) < SlotId::new(2));
/// ```
#[macro_export]
macro_rules! index_newtype {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($inner:ty) => $prefix:literal;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name($inner);

        impl $name {
            /// Creates a handle from an arena position.
            #[inline]
            pub const fn new(index: usize) -> Self {
                Self(index as $inner)
            }

            /// Returns the arena position of this handle.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Returns the raw number of this handle.
            #[inline]
            pub const fn raw(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}
