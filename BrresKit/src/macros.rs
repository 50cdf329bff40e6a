/// Declares a `u32`-backed hardware enum with checked decoding.
///
/// Generates `from_u32` (returning `None` for bit patterns with no meaning)
/// and `to_u32`.
macro_rules! hw_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            /// Decode a raw field value.
            #[must_use]
            pub const fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Raw field value.
            #[must_use]
            pub const fn to_u32(self) -> u32 {
                self as u32
            }
        }
    };
}
