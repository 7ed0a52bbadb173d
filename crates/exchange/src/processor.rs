//! The processor contract
//!
//! Everything that touches an exchange on its way through a route implements
//! [`Processor`]: EIPs, producers, error handlers and user code alike.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::{Exchange, ProcessResult};

/// Boxed future returned by [`Processor::process`]
pub type ProcessFuture<'a> = Pin<Box<dyn Future<Output = ProcessResult<()>> + Send + 'a>>;

/// A unit of routing behavior
///
/// Implementors must be `Send + Sync`: a built route is shared by every
/// concurrent exchange. Processors holding mutable state own their locking.
///
/// # Failure
///
/// Expected failures are never panics. A processor either records the
/// failure with [`Exchange::set_exception`] or returns `Err`; the pipeline
/// turns a returned error into an exchange exception, so the two are
/// equivalent for the dispatcher.
///
/// # Example
///
/// ```
/// use switchyard_exchange::{Exchange, ProcessFuture, Processor};
///
/// struct Upper;
///
/// impl Processor for Upper {
///     fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
///         Box::pin(async move {
///             let text = exchange.message().body().to_text()?.to_uppercase();
///             exchange.message_mut().set_body(text);
///             Ok(())
///         })
///     }
///
///     fn name(&self) -> &'static str {
///         "upper"
///     }
/// }
/// ```
pub trait Processor: Send + Sync {
    /// Process the exchange in place
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a>;

    /// Kind of processor, for logging and diagnostics
    fn name(&self) -> &'static str;
}

impl<P: Processor + ?Sized> Processor for Box<P> {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        (**self).process(exchange)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<P: Processor + ?Sized> Processor for Arc<P> {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        (**self).process(exchange)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
