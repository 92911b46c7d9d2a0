/// Declare a config section with each field's default written beside it.
///
/// Expands to the struct (all fields `pub`), a `Default` impl built from the
/// inline defaults, serde derives with `#[serde(default)]` so sparse TOML
/// still loads, and a `FIELDS` list of the TOML key names.
///
/// ```ignore
/// config_struct! {
///     /// Burn scan paging
///     pub struct ScannerConfig {
///         page_limit: usize = 1000,
///         transaction_concurrency: usize = 8,
///     }
/// }
/// assert_eq!(ScannerConfig::FIELDS, &["page_limit", "transaction_concurrency"]);
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$attr:meta])*
        $vis:vis struct $section:ident {
            $(
                $(#[$field_attr:meta])*
                $key:ident: $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $section {
            $( $(#[$field_attr])* pub $key: $ty, )*
        }

        impl $section {
            /// TOML keys accepted by this section
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($key)),*];
        }

        impl Default for $section {
            fn default() -> Self {
                Self { $( $key: $default, )* }
            }
        }
    };
}
