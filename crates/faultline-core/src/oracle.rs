use std::convert::Infallible;

/// The pass/fail test consulted by the minimizer: does this input still
/// reproduce the target failure?
///
/// Must be safely callable repeatedly with arbitrary byte strings,
/// including the empty string. The search assumes a deterministic oracle;
/// a flaky one may reduce to an input that does not reproduce reliably.
pub trait Oracle {
    type Error;

    fn reproduces(&mut self, input: &[u8]) -> Result<bool, Self::Error>;
}

impl<F> Oracle for F
where
    F: FnMut(&[u8]) -> bool,
{
    type Error = Infallible;

    fn reproduces(&mut self, input: &[u8]) -> Result<bool, Self::Error> {
        Ok(self(input))
    }
}
