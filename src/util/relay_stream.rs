use std::{
  pin::Pin,
  task::{Context, Poll},
};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, error, info};

use crate::{Error, Result};

/// Relays an upstream byte stream to a client response.
///
/// Construction waits for the first chunk, so any failure that happens
/// before audio is available is reported while a proper error status can
/// still be sent. Afterwards the response is committed: an upstream error
/// is logged and ends the body without a new status.
pub struct RelayStream<T> {
  stream: T,
  label: String,
  first: Option<Bytes>,
  relayed: usize,
  finished: bool,
}

impl<T> RelayStream<T>
where
  T: Stream<Item = Result<Bytes>> + Unpin,
{
  pub async fn start(label: impl Into<String>, mut stream: T) -> Result<Self> {
    let first = loop {
      match stream.next().await {
        Some(Ok(bytes)) if bytes.is_empty() => continue,
        Some(Ok(bytes)) => break bytes,
        Some(Err(err)) => return Err(err),
        None => return Err(Error::EmptyStream),
      }
    };

    Ok(Self {
      stream,
      label: label.into(),
      first: Some(first),
      relayed: 0,
      finished: false,
    })
  }
}

impl<T> Stream for RelayStream<T>
where
  T: Stream<Item = Result<Bytes>> + Unpin,
{
  type Item = Result<Bytes>;

  fn poll_next(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Option<Self::Item>> {
    let this = &mut *self;

    if let Some(bytes) = this.first.take() {
      this.relayed += bytes.len();
      return Poll::Ready(Some(Ok(bytes)));
    }

    if this.finished {
      return Poll::Ready(None);
    }

    match Pin::new(&mut this.stream).poll_next(cx) {
      Poll::Ready(Some(Ok(bytes))) => {
        this.relayed += bytes.len();
        Poll::Ready(Some(Ok(bytes)))
      }
      Poll::Ready(Some(Err(err))) => {
        error!(
          "{}: upstream failed after {} bytes: {}",
          this.label, this.relayed, err
        );
        this.finished = true;
        Poll::Ready(Some(Err(err)))
      }
      Poll::Ready(None) => {
        info!("{}: relayed {} bytes", this.label, this.relayed);
        this.finished = true;
        Poll::Ready(None)
      }
      Poll::Pending => Poll::Pending,
    }
  }
}

impl<T> Drop for RelayStream<T> {
  fn drop(&mut self) {
    if !self.finished {
      debug!(
        "{}: client went away after {} bytes",
        self.label, self.relayed
      );
    }
  }
}
