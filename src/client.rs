use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use reqwest::Client as ReqwestClient;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::watch;

use crate::Result;
use crate::decode::{Decode, JsonDecoder};
use crate::error::{Error, Kind};
use crate::request::{RequestSpec, WireRequest};
use crate::trace::{ResponseTrace, mime_essence};

/// Client executing [`RequestSpec`]s and decoding their responses.
///
/// Every call goes through the same pipeline: build the wire request, send it, reject
/// non-2xx statuses, trace the response, decode the body. The pipeline is exposed in three
/// delivery styles with identical outcomes:
///
/// - [`request`](Self::request): `async` call returning the decoded value
/// - [`request_with_callback`](Self::request_with_callback): spawned call handing the result to
///   a closure exactly once
/// - [`request_stream`](Self::request_stream): stream yielding at most one result, optionally
///   driving a [`Loading`] flag
///
/// The client is cheap to clone; clones share the underlying connection pool and decoder.
///
/// # Example
///
/// ```no_run
/// use bgr_network::client::Client;
/// use bgr_network::request::RequestSpec;
/// use bgr_network::types::Parameters;
///
/// #[derive(Debug, serde::Deserialize)]
/// struct Item {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::default();
///
/// let spec = RequestSpec::<Item>::builder()
///     .url("https://api.example.com/items")
///     .parameters(Parameters::new().with("q", "x"))
///     .build();
///
/// let item = client.request(&spec).await?;
/// println!("{} {}", item.id, item.name);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client<D = JsonDecoder> {
    inner: Arc<ClientInner<D>>,
}

#[derive(Debug)]
struct ClientInner<D> {
    client: ReqwestClient,
    decoder: D,
}

impl<D> Clone for Client<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for Client<JsonDecoder> {
    fn default() -> Self {
        Client::new().expect("Client with default transport should succeed")
    }
}

impl Client<JsonDecoder> {
    /// Creates a client with a default `reqwest` transport and the [`JsonDecoder`].
    ///
    /// No default headers are configured; every header sent comes from the [`RequestSpec`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self> {
        let client = ReqwestClient::builder().build()?;

        Ok(Self::from_reqwest(client))
    }

    /// Creates a client on top of an existing `reqwest` transport.
    #[must_use]
    pub fn from_reqwest(client: ReqwestClient) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                client,
                decoder: JsonDecoder,
            }),
        }
    }
}

impl<D> Client<D> {
    /// Returns a client sharing this client's transport but decoding with `decoder`.
    #[must_use]
    pub fn with_decoder<E>(&self, decoder: E) -> Client<E> {
        Client {
            inner: Arc::new(ClientInner {
                client: self.inner.client.clone(),
                decoder,
            }),
        }
    }

    #[must_use]
    pub fn decoder(&self) -> &D {
        &self.inner.decoder
    }

    /// Executes `spec` and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// - [`Kind::Request`] if the URL is invalid, a header cannot be encoded, or the transport
    ///   fails before a response is obtained. The transport is not reached in the first two
    ///   cases.
    /// - [`Kind::Response`] if the status is outside `200..300` or the body cannot be read.
    /// - [`Kind::Decoding`] if the body does not decode into `T`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            level = "debug",
            skip(self, spec),
            fields(
                method = %spec.method(),
                url = spec.url(),
                status_code
            )
        )
    )]
    pub async fn request<T>(&self, spec: &RequestSpec<T>) -> Result<T>
    where
        D: Decode<T>,
    {
        let Some(wire) = spec.to_wire() else {
            #[cfg(feature = "tracing")]
            tracing::warn!(url = spec.url(), "unable to build request");
            return Err(Error::request("check your URL"));
        };

        self.execute(wire).await
    }

    /// Executes `spec` on the tokio runtime and hands the outcome to `on_complete`.
    ///
    /// `on_complete` is called exactly once, with either the decoded value or the error that
    /// [`request`](Self::request) would have returned. The task is detached so callers cannot
    /// cancel it. Must be called from within a tokio runtime.
    pub fn request_with_callback<T, F>(&self, spec: RequestSpec<T>, on_complete: F)
    where
        D: Decode<T>,
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let client = self.clone();

        tokio::spawn(async move {
            let result = client.request(&spec).await;
            on_complete(result);
        });
    }

    /// Returns a stream that executes `spec` when first polled and yields its single outcome.
    ///
    /// When `loading` is given, its flag is set to `true` once the request starts and back to
    /// `false` when it completes, fails, or the stream is dropped mid-flight.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bgr_network::client::{Client, Loading};
    /// use bgr_network::request::RequestSpec;
    /// use futures::StreamExt as _;
    /// use tokio::sync::watch;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::default();
    /// let (loading_tx, loading_rx) = watch::channel(false);
    ///
    /// let spec = RequestSpec::<serde_json::Value>::builder()
    ///     .url("https://api.example.com/items")
    ///     .build();
    ///
    /// let mut stream = Box::pin(client.request_stream(spec, Some(Loading::new(loading_tx))));
    /// while let Some(value) = stream.next().await {
    ///     println!("{}", value?);
    /// }
    /// assert!(!*loading_rx.borrow());
    /// # Ok(())
    /// # }
    /// ```
    pub fn request_stream<T>(
        &self,
        spec: RequestSpec<T>,
        loading: Option<Loading>,
    ) -> impl Stream<Item = Result<T>> + Send + 'static
    where
        D: Decode<T>,
        T: Send + 'static,
    {
        let client = self.clone();

        try_stream! {
            let guard = loading.map(Loading::start);
            let result = client.request(&spec).await;
            drop(guard);

            yield result?;
        }
    }

    async fn execute<T>(&self, wire: WireRequest) -> Result<T>
    where
        D: Decode<T>,
    {
        let method = wire.method;
        let request = wire.into_reqwest()?;

        let response = self.inner.client.execute(request).await?;
        let status_code = response.status();
        let url = response.url().clone();
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| mime_essence(value).to_owned());

        #[cfg(feature = "tracing")]
        tracing::Span::current().record("status_code", status_code.as_u16());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::with_source(Kind::Response, e))?;

        let trace = ResponseTrace::new(status_code, &url, mime_type.as_deref(), &body);
        #[cfg(feature = "tracing")]
        tracing::debug!("\n{trace}");
        #[cfg(not(feature = "tracing"))]
        let _ = &trace;

        if !status_code.is_success() {
            let message = String::from_utf8_lossy(&body).into_owned();

            #[cfg(feature = "tracing")]
            tracing::warn!(
                status = %status_code,
                method = %method,
                url = %url,
                message = %message,
                "API request failed"
            );

            return Err(Error::status(status_code, method, url, message));
        }

        self.inner.decoder.decode(&body)
    }
}

/// External "loading" flag driven by [`Client::request_stream`].
#[derive(Debug)]
pub struct Loading {
    flag: watch::Sender<bool>,
}

impl Loading {
    #[must_use]
    pub fn new(flag: watch::Sender<bool>) -> Self {
        Self { flag }
    }

    fn start(self) -> LoadingGuard {
        self.flag.send_replace(true);
        LoadingGuard { flag: self.flag }
    }
}

impl From<watch::Sender<bool>> for Loading {
    fn from(flag: watch::Sender<bool>) -> Self {
        Self::new(flag)
    }
}

/// Resets the flag on drop, covering completion, failure and cancellation alike.
struct LoadingGuard {
    flag: watch::Sender<bool>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}
