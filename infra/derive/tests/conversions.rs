use nestkv_derive::nestkv_error;
use std::borrow::Cow;
use std::io;

#[nestkv_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[also_from(io::ErrorKind)]
        source: io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Key not found{}: {key}", format_context(.context))]
    KeyNotFound { key: String, context: Option<Cow<'static, str>> },

    #[error("Closed")]
    Closed {},
}

fn fail_with_kind() -> Result<(), io::ErrorKind> {
    Err(io::ErrorKind::NotFound)
}

fn lookup(key: &str) -> Result<(), DemoError> {
    Err(DemoError::KeyNotFound { key: key.to_owned(), context: None })
}

#[test]
fn source_converts_through_question_mark() {
    fn run() -> Result<(), DemoError> {
        Err::<(), _>(io::Error::other("disk"))?;
        Ok(())
    }
    let err = run().expect_err("io error should convert");
    assert!(matches!(err, DemoError::Io { context: None, .. }));
}

#[test]
fn also_from_widens_narrow_errors() {
    fn run() -> Result<(), DemoError> {
        fail_with_kind()?;
        Ok(())
    }
    match run().expect_err("kind should widen") {
        DemoError::Io { source, context } => {
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
            assert!(context.is_none());
        },
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn context_attaches_to_narrow_and_domain_errors() {
    let err = fail_with_kind().context("opening store").expect_err("should fail");
    assert_eq!(err.to_string(), "IO error (opening store): entity not found");

    let err = lookup("alpha").context("reading blob").expect_err("should fail");
    assert_eq!(err.to_string(), "Key not found (reading blob): alpha");
}

#[test]
fn context_leaves_contextless_variants_untouched() {
    let result: Result<(), DemoError> = Err(DemoError::Closed {});
    let err = result.context("ignored").expect_err("should fail");
    assert_eq!(err.to_string(), "Closed");
}
