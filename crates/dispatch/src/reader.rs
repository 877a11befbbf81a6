//! Message reader: drains a live connection into a frame channel.

use relay::FrameStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// Capacity of the reader → dispatcher channel.
///
/// One slot: the reader blocks until the dispatcher has taken the previous
/// frame, so a slow webhook throttles reading instead of buffering.
pub const FRAME_CHANNEL_CAPACITY: usize = 1;

/// Spawns a task that forwards every frame from `stream` onto the returned
/// channel.
///
/// The channel closes exactly when the connection ends (read error or remote
/// close). The task also stops when the receiver is dropped. In every case
/// the connection is closed before the task exits. A reader is single-use; a
/// new connection needs a new reader.
pub fn spawn_reader(stream: Box<dyn FrameStream>) -> (mpsc::Receiver<Vec<u8>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let handle = tokio::spawn(read_frames(stream, tx).in_current_span());
    (rx, handle)
}

async fn read_frames(mut stream: Box<dyn FrameStream>, tx: mpsc::Sender<Vec<u8>>) {
    loop {
        let next = tokio::select! {
            next = stream.next_frame() => next,
            _ = tx.closed() => {
                debug!("frame consumer gone, closing connection");
                break;
            }
        };

        match next {
            Some(Ok(frame)) => {
                if tx.send(frame).await.is_err() {
                    debug!("frame consumer gone, closing connection");
                    break;
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "stream read failed");
                break;
            }
            None => {
                info!("stream closed by remote");
                break;
            }
        }
    }

    drop(tx);
    stream.close().await;
}
