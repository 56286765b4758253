//! Stream adapter from raw response bytes to fragments.

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::decoder::{Fragment, StreamDecoder};
use crate::error::{StreamError, StreamResult};

pin_project! {
    /// Stream adapter that decodes fragments from a byte stream.
    ///
    /// Ends after the inner stream ends, after `[DONE]`, or after the first
    /// error.
    pub struct FragmentStream<S> {
        #[pin]
        inner: S,
        decoder: StreamDecoder,
        pending: VecDeque<Fragment>,
        finished: bool,
    }
}

impl<S> FragmentStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    /// Create a new fragment stream from a byte stream.
    pub fn new(inner: S) -> Self {
        Self::with_decoder(inner, StreamDecoder::new())
    }

    /// Create a fragment stream with a preconfigured decoder.
    pub fn with_decoder(inner: S, decoder: StreamDecoder) -> Self {
        Self {
            inner,
            decoder,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// The decoder driving this stream.
    pub fn decoder(&self) -> &StreamDecoder {
        &self.decoder
    }
}

impl<S> Stream for FragmentStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    type Item = StreamResult<Fragment>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(fragment) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(fragment)));
            }

            if *this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match this.decoder.feed(&bytes) {
                    Ok(fragments) => {
                        this.pending.extend(fragments);
                        if this.decoder.is_done() {
                            *this.finished = true;
                        }
                    }
                    Err(error) => {
                        *this.finished = true;
                        return Poll::Ready(Some(Err(error)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(StreamError::Io(e))));
                }
                Poll::Ready(None) => {
                    this.decoder.finish();
                    *this.finished = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
