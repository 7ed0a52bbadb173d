//! Closure-backed processors

use switchyard_exchange::{Exchange, ProcessFuture, ProcessResult, Processor};

/// Processor wrapping a synchronous closure
///
/// # Example
///
/// ```
/// use switchyard_processor::FnProcessor;
///
/// let upper = FnProcessor::new(|exchange| {
///     let text = exchange.message().body().to_text()?.to_uppercase();
///     exchange.message_mut().set_body(text);
///     Ok(())
/// });
/// ```
pub struct FnProcessor<F> {
    f: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&mut Exchange) -> ProcessResult<()> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Processor for FnProcessor<F>
where
    F: Fn(&mut Exchange) -> ProcessResult<()> + Send + Sync,
{
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move { (self.f)(exchange) })
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
