#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the nestkv crates.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! nestkv-derive = { path = "../derive" }
//! ```
//!
//! The examples below are `ignore`d to avoid compiling in this crate; the consuming crates
//! exercise them in their own tests.

mod error;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for declaring the error enums of the storage layer.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` when missing.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to any `Result` that can be converted into this error type.
/// * **Source Conversions**: Implements `From<T>` for variants holding a `source: T` field,
///   so upstream errors travel through `?`.
/// * **Widening Conversions**: A source field tagged `#[also_from(A, B)]` additionally gets
///   `From<A>` / `From<B>` impls that widen through `T::from`. This is how an engine's
///   family of narrow error types lands in a single variant without losing the original.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum**.
/// 2. Variants that support context must include a `context: Option<Cow<'static, str>>` field.
/// 3. Variants with a source must also carry a context field.
/// 4. Tuple or unit variants are rejected to keep error wiring explicit.
///
/// # Example
///
/// ```rust,ignore
/// use nestkv_derive::nestkv_error;
/// use std::borrow::Cow;
///
/// #[nestkv_error]
/// pub enum EngineError {
///     #[error("Engine failure{}: {source}", format_context(.context))]
///     Engine {
///         #[also_from(redb::TransactionError, redb::CommitError)]
///         source: redb::Error,
///         context: Option<Cow<'static, str>>,
///     },
///
///     #[error("Key not found{}: {key}", format_context(.context))]
///     KeyNotFound { key: String, context: Option<Cow<'static, str>> },
/// }
///
/// fn begin(db: &redb::Database) -> Result<redb::WriteTransaction, EngineError> {
///     db.begin_write().context("Opening write transaction")
/// }
/// ```
#[proc_macro_attribute]
pub fn nestkv_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    error::expand_derive(input).into()
}
