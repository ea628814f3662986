use nestkv_derive::nestkv_error;
use std::borrow::Cow;

#[nestkv_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[also_from(std::io::ErrorKind)]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Key not found{}: {key}", format_context(.context))]
    KeyNotFound { key: String, context: Option<Cow<'static, str>> },
}

fn main() {}
