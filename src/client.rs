//! A client running resolutions in the background.
//!
//! The [Client] owns a single worker task that runs one resolution at a
//! time. [Client::retrieve] queues a resolution and returns a [Pending]
//! handle for its result which can be awaited or, outside of async code,
//! waited on with [Pending::blocking_wait].
//!
//! ```no_run
//! # async fn run() -> Result<(), numlib::Error> {
//! use numlib::{Client, Config};
//!
//! let client = Client::new(Config::default());
//! let ctx = client.begin("numexample.com:1")?;
//! if let Some(resolved) = client.retrieve(ctx, ()).await? {
//!     println!("{}", resolved.interpreted);
//! }
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::dns::TxtLookup;
use crate::error::Error;
use crate::identifier::{Identifier, NumAddress};
use crate::interpret::Interpret;
use crate::location::LocationGenerator;
use crate::resolver::{Context, Handler, Resolved, Resolver};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[cfg(feature = "resolv")]
use crate::dns::StubLookup;
#[cfg(feature = "resolv")]
use crate::interpret::Passthrough;

/// The outcome of a resolution.
type Outcome = Result<Option<Resolved>, Error>;

//------------ Client --------------------------------------------------------

/// A NUM client.
pub struct Client {
    /// Queue of resolutions for the worker.
    sender: mpsc::UnboundedSender<ChanReq>,

    /// Tells the worker to stop picking up queued resolutions.
    closing: watch::Sender<bool>,

    /// The worker task.
    worker: JoinHandle<()>,

    /// Derives locations for new contexts.
    ///
    /// This shares its cache with the worker.
    generator: LocationGenerator,

    /// Whether new contexts may ask the populator.
    populator_required: bool,

    /// How long shutdown waits for the running resolution.
    shutdown_grace: Duration,
}

impl Client {
    /// Creates a client using the stub resolver and [Passthrough].
    ///
    /// # Panics
    ///
    /// The function panics if called outside of a Tokio runtime.
    #[cfg(feature = "resolv")]
    pub fn new(config: Config) -> Self {
        let lookup = StubLookup::from_config(&config);
        Self::with_lookup(config, lookup, Passthrough)
    }

    /// Creates a client using the given DNS transport and interpreter.
    ///
    /// # Panics
    ///
    /// The function panics if called outside of a Tokio runtime.
    pub fn with_lookup<L, I>(config: Config, lookup: L, interpreter: I) -> Self
    where
        L: TxtLookup + 'static,
        I: Interpret + 'static,
    {
        let generator = LocationGenerator::from_config(&config);
        let resolver = Resolver::with_generator(
            &config,
            generator.clone(),
            lookup,
            interpreter,
        );
        let (sender, receiver) = mpsc::unbounded_channel();
        let (closing, closing_rx) = watch::channel(false);
        let worker = tokio::spawn(
            Worker {
                resolver,
                receiver,
                closing: closing_rx,
            }
            .run(),
        );
        Client {
            sender,
            closing,
            worker,
            generator,
            populator_required: config.populator_required(),
            shutdown_grace: config.shutdown_grace(),
        }
    }

    /// Returns the location generator.
    pub fn generator(&self) -> &LocationGenerator {
        &self.generator
    }

    /// Creates a context for a NUM address.
    ///
    /// Addresses without a module number use module 0.
    pub fn begin(&self, address: &str) -> Result<Context, Error> {
        let (identifier, module) = NumAddress::parse(address)?.into_parts(0);
        Ok(self.context(identifier, module))
    }

    /// Creates a context for an identifier and module number.
    pub fn context(&self, identifier: Identifier, module: u32) -> Context {
        let locations = self.generator.locations(module, &identifier);
        let mut ctx = Context::new(identifier, module, locations);
        ctx.set_populator_required(self.populator_required);
        ctx
    }

    /// Queues a resolution.
    ///
    /// The handler is informed about progress while the resolution runs.
    pub fn retrieve<H: Handler + 'static>(
        &self,
        ctx: Context,
        handler: H,
    ) -> Pending {
        let (tx, rx) = oneshot::channel();
        let req = ChanReq {
            ctx,
            handler: Arc::new(handler),
            tx,
        };
        if self.sender.send(req).is_err() {
            return Pending::failed(Error::ShutDown);
        }
        Pending { rx }
    }

    /// Shuts the client down.
    ///
    /// Queued resolutions are cancelled. A running resolution gets the
    /// configured grace period to finish before it is aborted.
    pub async fn shutdown(self) {
        let Client {
            sender,
            closing,
            mut worker,
            shutdown_grace,
            ..
        } = self;
        info!("shutting down");

        // The worker may be gone already.
        let _ = closing.send(true);
        drop(sender);
        if timeout(shutdown_grace, &mut worker).await.is_err() {
            warn!(
                "resolution still running after {shutdown_grace:?}, aborting"
            );
            worker.abort();
            let _ = worker.await;
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("generator", &self.generator)
            .field("populator_required", &self.populator_required)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

//------------ Pending -------------------------------------------------------

/// The eventual result of a queued resolution.
///
/// If the resolution is dropped by the client before it completes, the
/// result is [Error::Cancelled].
#[derive(Debug)]
pub struct Pending {
    /// Receives the outcome from the worker.
    rx: oneshot::Receiver<Outcome>,
}

impl Pending {
    /// Creates a handle that is already complete with an error.
    fn failed(err: Error) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Pending { rx }
    }

    /// Waits for the result, blocking the current thread.
    ///
    /// # Panics
    ///
    /// The function panics if called from within an async context.
    pub fn blocking_wait(self) -> Outcome {
        self.rx.blocking_recv().unwrap_or(Err(Error::Cancelled))
    }
}

impl Future for Pending {
    type Output = Outcome;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(Error::Cancelled)))
    }
}

//------------ ChanReq -------------------------------------------------------

/// A queued resolution.
struct ChanReq {
    /// The resolution context.
    ctx: Context,

    /// Informed about progress.
    handler: Arc<dyn Handler>,

    /// Receives the outcome.
    tx: oneshot::Sender<Outcome>,
}

//------------ Worker --------------------------------------------------------

/// The task running resolutions.
struct Worker<L, I> {
    /// The resolver.
    resolver: Resolver<L, I>,

    /// Receive side of the queue.
    receiver: mpsc::UnboundedReceiver<ChanReq>,

    /// Becomes true when the client shuts down.
    closing: watch::Receiver<bool>,
}

impl<L: TxtLookup, I: Interpret> Worker<L, I> {
    /// Runs resolutions until the client goes away.
    async fn run(mut self) {
        while let Some(req) = self.receiver.recv().await {
            let closing = *self.closing.borrow();
            if closing {
                // Dropping the queue cancels what is left in it.
                break;
            }
            let ChanReq {
                mut ctx,
                handler,
                tx,
            } = req;
            if tx.is_closed() {
                debug!(
                    "skipping abandoned resolution of {}",
                    ctx.identifier()
                );
                continue;
            }
            let res = self.resolver.resolve(&mut ctx, handler.as_ref()).await;

            // Don't care if the caller is gone.
            let _ = tx.send(res);
        }
        debug!("worker finished");
    }
}
