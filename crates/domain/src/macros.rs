//! Macro for implementing string conversions on closed domain enums
//!
//! Collections, scheduler states and storage backends are all small closed
//! enums that travel as lowercase strings (config files, SQL columns, URL
//! segments). One macro keeps their `Display`, `FromStr` and `as_str`
//! implementations in agreement.
//!
//! # Example
//!
//! ```rust
//! use tfmkt_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Surface {
//!     Grass,
//!     Artificial,
//! }
//!
//! impl_domain_enum_conversions!(Surface {
//!     Grass => "grass",
//!     Artificial => "artificial",
//! });
//!
//! assert_eq!(Surface::ALL.len(), 2);
//! assert_eq!("GRASS".parse::<Surface>().unwrap(), Surface::Grass);
//! ```

/// Implements `Display`, `FromStr`, `as_str` and an `ALL` slice for an enum
///
/// Parsing is case-insensitive and ignores surrounding whitespace; output is
/// always the canonical lowercase name.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$enum_name] = &[$(Self::$variant),+];

            /// Canonical lowercase name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
