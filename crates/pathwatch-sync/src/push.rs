//! The push channel: a best-effort invalidation stream.
//!
//! The push channel never carries data the synchronizer trusts. A frame
//! whose discriminator is in the [`FrameFilter`]'s recognized set becomes
//! a [`PushSignal`], which only asks the synchronizer to re-fetch through
//! the fetch channel.
//!
//! Every failure on this side is absorbed here: a connection that never
//! opens, a peer that drops mid-session, and frames that fail to decode
//! are logged and otherwise ignored. Polling remains the fallback of
//! record. The connection is attempted once per activation, with no
//! reconnect loop.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FrameError, PushError};

/// Default time allowed for the stream handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the close handshake, so a wedged peer cannot hold up
/// deactivation.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// "Something changed, re-fetch." Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushSignal;

/// The recognized discriminator set for inbound frames.
///
/// A frame is recognized when any `(field, value)` pair matches a
/// top-level string field of the frame object. Several fields may be
/// registered, which covers backends that are inconsistent about whether
/// the discriminator lives in `type` or `event_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameFilter {
    discriminators: Vec<(String, String)>,
}

impl FrameFilter {
    /// An empty filter. Recognizes nothing.
    pub const fn new() -> Self {
        Self {
            discriminators: Vec::new(),
        }
    }

    /// Recognize frames whose `field` equals `value`.
    #[must_use]
    pub fn recognize(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.discriminators.push((field.into(), value.into()));
        self
    }

    /// Whether no discriminator is registered.
    pub const fn is_empty(&self) -> bool {
        self.discriminators.is_empty()
    }

    /// Decode one text frame.
    ///
    /// Returns `Ok(Some(PushSignal))` for a recognized frame and
    /// `Ok(None)` for a well-formed but irrelevant one.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the frame is not a JSON object.
    pub fn classify(&self, text: &str) -> Result<Option<PushSignal>, FrameError> {
        let frame: Value = serde_json::from_str(text)?;
        let object = frame.as_object().ok_or(FrameError::NotAnObject)?;

        let recognized = self.discriminators.iter().any(|(field, expected)| {
            object.get(field).and_then(Value::as_str) == Some(expected.as_str())
        });
        Ok(recognized.then_some(PushSignal))
    }
}

/// Decode a frame and forward the resulting signal, absorbing every
/// failure.
///
/// Returns `true` if a signal was queued. A full queue means a re-fetch is
/// already pending, so the extra signal is coalesced away.
pub fn dispatch_frame(filter: &FrameFilter, text: &str, signals: &mpsc::Sender<PushSignal>) -> bool {
    match filter.classify(text) {
        Ok(Some(signal)) => match signals.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("re-fetch already pending, coalescing push signal");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        },
        Ok(None) => {
            debug!(frame_len = text.len(), "ignoring unrecognized push frame");
            false
        }
        Err(e) => {
            warn!(error = %e, "dropping undecodable push frame");
            false
        }
    }
}

/// A source of push signals.
///
/// `open` must return immediately; connecting happens on the spawned
/// task. The task must end promptly once `cancel` fires and must never
/// send after it has ended.
pub trait PushSource: Send + Sync + 'static {
    /// Spawn the connection task.
    fn open(&self, signals: mpsc::Sender<PushSignal>, cancel: CancellationToken) -> JoinHandle<()>;
}

/// An open push connection.
#[derive(Debug)]
pub struct PushHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PushHandle {
    /// Open `source`, tying its lifetime to a child of `parent`.
    pub fn open(
        source: &dyn PushSource,
        signals: mpsc::Sender<PushSignal>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let task = source.open(signals, cancel.clone());
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Close the connection and wait for its task to end.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(error = %e, "push task panicked");
                }
            }
        }
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Event stream (WebSocket) source
// ---------------------------------------------------------------------------

/// Derive the event-stream URL for `path` on an HTTP `base_url`.
///
/// `http` becomes `ws` and `https` becomes `wss`; stream schemes pass
/// through unchanged.
///
/// # Errors
///
/// Returns [`PushError`] if the result does not parse or the scheme has no
/// streaming equivalent.
pub fn stream_url(base_url: &str, path: &str) -> Result<Url, PushError> {
    let mut url = Url::parse(&format!("{}{path}", base_url.trim_end_matches('/')))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(PushError::UnsupportedScheme(other.to_owned())),
    };
    url.set_scheme(scheme)
        .map_err(|()| PushError::UnsupportedScheme(scheme.to_owned()))?;
    Ok(url)
}

/// Push source backed by a WebSocket event stream.
#[derive(Debug, Clone)]
pub struct WebSocketPush {
    url: Url,
    filter: FrameFilter,
    connect_timeout: Duration,
}

impl WebSocketPush {
    /// Stream from `url`, signalling on frames recognized by `filter`.
    pub const fn new(url: Url, filter: FrameFilter) -> Self {
        Self {
            url,
            filter,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the handshake timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl PushSource for WebSocketPush {
    fn open(&self, signals: mpsc::Sender<PushSignal>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(run_stream(
            self.url.clone(),
            self.filter.clone(),
            self.connect_timeout,
            signals,
            cancel,
        ))
    }
}

/// Connect once and forward recognized frames until cancelled or dropped.
async fn run_stream(
    url: Url,
    filter: FrameFilter,
    connect_timeout: Duration,
    signals: mpsc::Sender<PushSignal>,
    cancel: CancellationToken,
) {
    let connect = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str()));

    let mut stream = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        result = connect => match result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "push channel failed to connect, relying on polling");
                return;
            }
            Err(_elapsed) => {
                warn!(url = %url, "push channel connect timed out, relying on polling");
                return;
            }
        },
    };

    info!(url = %url, "push channel connected");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                match tokio::time::timeout(CLOSE_TIMEOUT, stream.send(Message::Close(None))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(error = %e, "push channel close handshake failed"),
                    Err(_elapsed) => debug!(url = %url, "push channel close handshake timed out"),
                }
                debug!(url = %url, "push channel closed");
                return;
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(&filter, &text, &signals);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!(url = %url, "push channel dropped by peer, relying on polling");
                        return;
                    }
                    Some(Err(e)) => {
                        warn!(url = %url, error = %e, "push channel failed, relying on polling");
                        return;
                    }
                    Some(Ok(_)) => {
                        // Binary and control frames carry nothing for us;
                        // pings are answered by the protocol layer.
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn glyph_filter() -> FrameFilter {
        FrameFilter::new()
            .recognize("type", "glyph_collapse")
            .recognize("event_type", "path/bundle_generated")
    }

    #[test]
    fn recognizes_either_discriminator() {
        let filter = glyph_filter();
        assert_eq!(
            filter.classify(r#"{"type":"glyph_collapse"}"#).ok().flatten(),
            Some(PushSignal)
        );
        assert_eq!(
            filter
                .classify(r#"{"event_type":"path/bundle_generated","glyph":"Ψ"}"#)
                .ok()
                .flatten(),
            Some(PushSignal)
        );
    }

    #[test]
    fn ignores_unrelated_frames() {
        let filter = glyph_filter();
        assert_eq!(filter.classify(r#"{"type":"unrelated"}"#).ok().flatten(), None);
        assert_eq!(filter.classify(r#"{"event_type":"glyph_collapse"}"#).ok().flatten(), None);
        assert_eq!(filter.classify(r#"{"type":7}"#).ok().flatten(), None);
    }

    #[test]
    fn malformed_frames_are_errors() {
        let filter = glyph_filter();
        assert!(matches!(filter.classify("{not json"), Err(FrameError::Malformed(_))));
        assert!(matches!(filter.classify("[1,2]"), Err(FrameError::NotAnObject)));
    }

    #[test]
    fn empty_filter_recognizes_nothing() {
        let filter = FrameFilter::new();
        assert!(filter.is_empty());
        assert_eq!(filter.classify(r#"{"type":"glyph_collapse"}"#).ok().flatten(), None);
    }

    #[tokio::test]
    async fn dispatch_forwards_only_recognized_frames() {
        let filter = glyph_filter();
        let (tx, mut rx) = mpsc::channel(4);

        assert!(!dispatch_frame(&filter, "garbage", &tx));
        assert!(!dispatch_frame(&filter, r#"{"type":"unrelated"}"#, &tx));
        assert!(dispatch_frame(&filter, r#"{"type":"glyph_collapse"}"#, &tx));

        drop(tx);
        assert_eq!(rx.recv().await, Some(PushSignal));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dispatch_coalesces_when_queue_full() {
        let filter = glyph_filter();
        let (tx, _rx) = mpsc::channel(1);
        assert!(dispatch_frame(&filter, r#"{"type":"glyph_collapse"}"#, &tx));
        assert!(!dispatch_frame(&filter, r#"{"type":"glyph_collapse"}"#, &tx));
    }

    #[test]
    fn stream_url_swaps_scheme() {
        let url = stream_url("https://backend.example.com/", "/ws/path/glyph").ok();
        assert_eq!(
            url.map(String::from),
            Some("wss://backend.example.com/ws/path/glyph".to_owned())
        );

        let url = stream_url("http://127.0.0.1:8000", "/ws/path/glyph").ok();
        assert_eq!(
            url.map(String::from),
            Some("ws://127.0.0.1:8000/ws/path/glyph".to_owned())
        );
    }

    #[test]
    fn stream_url_rejects_other_schemes() {
        assert!(matches!(
            stream_url("ftp://backend", "/ws"),
            Err(PushError::UnsupportedScheme(_))
        ));
        assert!(matches!(stream_url("not a url", "/ws"), Err(PushError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn unreachable_stream_ends_quietly() {
        // Nothing listens on the discard port.
        let source = WebSocketPush::new(
            stream_url("http://127.0.0.1:9", "/ws/path/glyph").unwrap(),
            glyph_filter(),
        )
        .with_connect_timeout(Duration::from_millis(500));
        let (tx, mut rx) = mpsc::channel(4);
        let handle = PushHandle::open(&source, tx, &CancellationToken::new());

        // The task gives up on its own and drops its sender.
        assert_eq!(rx.recv().await, None);
        handle.close().await;
    }

    #[tokio::test]
    async fn close_completes_while_peer_stays_silent() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Text(r#"{"type":"glyph_collapse"}"#.into()))
                .await
                .unwrap();
            // Never read again, never answer the close.
            std::future::pending::<()>().await;
            drop(ws);
        });

        let source = WebSocketPush::new(
            stream_url(&format!("http://{addr}"), "/ws/path/glyph").unwrap(),
            glyph_filter(),
        );
        let (tx, mut rx) = mpsc::channel(4);
        let handle = PushHandle::open(&source, tx, &CancellationToken::new());
        assert_eq!(rx.recv().await, Some(PushSignal));

        let closed = tokio::time::timeout(Duration::from_secs(3), handle.close()).await;
        assert!(closed.is_ok());
        assert_eq!(rx.recv().await, None);
        peer.abort();
    }
}
