/// Converts a `Result` into an `Option`, logging the error at debug level.
///
/// Sampling failures are expected on hosts without the right controllers and must not
/// interrupt the caller, so they only show up with `RUST_LOG=debug`.
pub trait ResultOkLogExt<T, E> {
    fn ok_log(self, context: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::debug!("{context}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_log() {
        let ok: Result<u8, std::io::Error> = Ok(3);
        assert_eq!(ok.ok_log("reading"), Some(3));

        let err: Result<u8, std::io::Error> = Err(std::io::Error::other("boom"));
        assert_eq!(err.ok_log("reading"), None);
    }
}
