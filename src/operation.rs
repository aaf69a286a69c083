use crate::error::Result;

/// A multi-step probe operation, driven one step per call to `next`. Each item is the number of
/// steps completed so far, the iterator is fused after the first error.
pub trait Operation: Iterator<Item = Result<usize>> {
    /// Number of steps the operation consists of.
    fn total(&self) -> usize;

    /// Runs all remaining steps.
    fn execute(&mut self) -> Result<()> {
        if let Some(Err(error)) = self.last() {
            Err(error)
        } else {
            Ok(())
        }
    }
}
