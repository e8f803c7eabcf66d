//! # Quarry Derive Macros
//!
//! `#[exposed_method]` turns a plain function into a registrable service
//! method. The function itself is left untouched; a unit struct named after
//! it (`subtract` -> `SubtractMethod`) converts into an `ExposedMethod`
//! whose signature mirrors the function's parameters.
//!
//! ```rust,ignore
//! use quarry_derive::exposed_method;
//!
//! /// Subtracts `subtrahend` from `minuend`
//! #[exposed_method]
//! fn subtract(minuend: i64, subtrahend: i64) -> i64 {
//!     minuend - subtrahend
//! }
//!
//! let service = Service::builder().name("calc").method(SubtractMethod).build()?;
//! ```

use proc_macro::TokenStream;
use syn::{ItemFn, Meta, Token, parse_macro_input, punctuated::Punctuated};

mod method_attr;

/// Expose a free function (blocking or `async`) as a service method.
///
/// # Arguments
///
/// - `name = "..."` - name callers use; defaults to the function name
/// - `private` - require an accepted credential token
/// - `description = "..."` - defaults to the function's doc comment
///
/// # Parameters
///
/// - `Option<T>` parameters are optional and default to `null`
/// - a `VarArgs` parameter collects surplus positional arguments
/// - a `KwArgs` parameter collects surplus keyword arguments
/// - anything else is required and deserialized with `serde`
///
/// The function may return any `Serialize` value, or a `Result` whose error
/// converts into `MethodError`.
#[proc_macro_attribute]
pub fn exposed_method(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input = parse_macro_input!(input as ItemFn);

    method_attr::exposed_method_impl(args, input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
