//! Macro for implementing Display and FromStr for label enums
//!
//! Circuit states, error kinds and telemetry event kinds all have a stable
//! lowercase label used in logs, metrics labels and config files. This macro
//! generates both directions of that mapping from one table.
//!
//! # Example
//!
//! ```rust
//! use bulwark_domain::impl_label_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Stage {
//!     Bulkhead,
//!     RateLimit,
//! }
//!
//! impl_label_conversions!(Stage {
//!     Bulkhead => "bulkhead",
//!     RateLimit => "rate_limit",
//! });
//!
//! assert_eq!(Stage::RateLimit.to_string(), "rate_limit");
//! assert_eq!("BULKHEAD".parse::<Stage>(), Ok(Stage::Bulkhead));
//! ```

/// Implements Display and FromStr traits for label enums
///
/// Parsing is case-insensitive; labels must be written in lowercase.
#[macro_export]
macro_rules! impl_label_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Stable lowercase label for this variant
            pub const fn as_str(&self) -> &'static str {
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

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
