use crate::error::Error;
use crate::message::Frame;
use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

/// Write target for SSE frames.
///
/// A sink is owned by exactly one [`crate::connection::Connection`], which
/// serializes all access to it. Any error returned here terminates that
/// connection.
#[async_trait]
pub trait Sink: Send {
    async fn write_frame(&mut self, frame: &Frame) -> Result<(), Error>;

    async fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Sink that forwards frames to an HTTP response body over a bounded channel.
///
/// The receiving end turns each frame into an HTTP SSE event, so there is
/// nothing to flush. A dropped receiver means the client went away and every
/// write fails.
pub struct ChannelSink {
    sender: Sender<Frame>,
}

impl ChannelSink {
    pub fn new(sender: Sender<Frame>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn write_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        self.sender
            .send(frame.clone())
            .await
            .map_err(Error::write)
    }
}
