//! The generic TCP interceptor (§4.G): accept inbound, resolve the upstream
//! address through the configured inbound strategy, dial outbound through
//! the configured outbound strategy, then hand both halves to whatever
//! intercept behavior the caller wants.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::NetError;
use crate::pipe::bidirectional_pipe;
use crate::socks5;

/// How the interceptor learns which upstream address an inbound connection wants.
#[derive(Debug, Clone)]
pub enum InboundMethod {
    /// Every connection is destined for the same fixed address (a transparent proxy).
    Transparent {
        /// The origin host every inbound connection is forwarded to.
        server_host: String,
        /// The origin port every inbound connection is forwarded to.
        server_port: u16,
    },
    /// The client speaks SOCKS5 and names its own target (§4.F inbound).
    Socks5,
}

impl InboundMethod {
    /// Resolve the upstream `(host, port)` for one accepted connection,
    /// consuming the SOCKS5 handshake bytes from `client` if applicable.
    async fn resolve(&self, client: &mut TcpStream) -> Result<(String, u16), NetError> {
        match self {
            Self::Transparent {
                server_host,
                server_port,
            } => Ok((server_host.clone(), *server_port)),
            Self::Socks5 => socks5::server_handshake(client).await,
        }
    }
}

/// How the interceptor reaches the resolved upstream address.
#[derive(Debug, Clone)]
pub enum OutboundMethod {
    /// Dial the upstream directly.
    Direct,
    /// Dial the upstream through a SOCKS5 proxy (§4.F outbound).
    Socks5 {
        /// The SOCKS5 proxy's host.
        proxy_host: String,
        /// The SOCKS5 proxy's port.
        proxy_port: u16,
    },
}

impl OutboundMethod {
    async fn dial(&self, host: &str, port: u16) -> Result<TcpStream, NetError> {
        match self {
            Self::Direct => Ok(TcpStream::connect((host, port)).await?),
            Self::Socks5 {
                proxy_host,
                proxy_port,
            } => socks5::connect((proxy_host.as_str(), *proxy_port), host, port).await,
        }
    }
}

/// A boxed, clonable async closure run on each accepted connection once both
/// halves are available. Boxed because the packet MITM and HTTP
/// join-patcher specializations each close over different shared state
/// (the registry, the event bus, the replacement slot) but must fit the
/// same interceptor loop.
pub type InterceptFn =
    Arc<dyn Fn(TcpStream, TcpStream) -> Pin<Box<dyn Future<Output = Result<(), NetError>> + Send>> + Send + Sync>;

/// Wrap a plain `fn(TcpStream, TcpStream) -> impl Future<...>` as an [`InterceptFn`].
pub fn intercept_fn<F, Fut>(f: F) -> InterceptFn
where
    F: Fn(TcpStream, TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), NetError>> + Send + 'static,
{
    Arc::new(move |client, upstream| Box::pin(f(client, upstream)))
}

/// The default intercept behavior: an uninterpreted bidirectional pipe (§4.G).
#[must_use]
pub fn raw_pipe() -> InterceptFn {
    intercept_fn(bidirectional_pipe)
}

/// Listen on `listen_addr` forever, applying `inbound`/`outbound` to resolve
/// and dial each connection and `on_intercept` to drive it, until `cancel`
/// fires.
///
/// # Errors
/// Returns [`NetError::Io`] if binding the listener itself fails. Per-connection
/// failures are logged and do not stop the loop.
pub async fn run(
    listen_addr: SocketAddr,
    inbound: InboundMethod,
    outbound: OutboundMethod,
    on_intercept: InterceptFn,
    cancel: CancellationToken,
) -> Result<(), NetError> {
    let listener = TcpListener::bind(listen_addr).await?;
    debug!(%listen_addr, "interceptor listening");

    loop {
        let (mut client, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            () = cancel.cancelled() => {
                debug!(%listen_addr, "interceptor shutting down");
                return Ok(());
            }
        };

        let inbound = inbound.clone();
        let outbound = outbound.clone();
        let on_intercept = Arc::clone(&on_intercept);
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let (host, port) = match inbound.resolve(&mut client).await {
                Ok(target) => target,
                Err(error) => {
                    warn!(%peer, %error, "inbound resolution failed");
                    return;
                }
            };

            let upstream = match outbound.dial(&host, port).await {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(%peer, %host, port, %error, "outbound dial failed");
                    return;
                }
            };

            let session = on_intercept(client, upstream);
            tokio::select! {
                result = session => {
                    if let Err(error) = result {
                        debug!(%peer, %error, "connection closed");
                    }
                }
                () = cancel.cancelled() => {}
            }
        });
    }
}
