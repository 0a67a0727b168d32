//! The embedder's business logic.

/// Maps the request's numeric argument to the response value.
///
/// Runs inside the event loop: a slow handler stalls every connection.
pub trait Handler {
    fn call(&self, arg: i64) -> i64;
}

impl<F> Handler for F
where
    F: Fn(i64) -> i64,
{
    fn call(&self, arg: i64) -> i64 {
        self(arg)
    }
}
