//! The default raw bidirectional byte pipe (§4.G): two concurrent "read
//! available, write it to the other side" loops, racing to completion so
//! either direction hitting EOF tears down both.

use tokio::io::{AsyncReadExt, AsyncWriteExt, split};
use tokio::net::TcpStream;

use crate::error::NetError;
use crate::io_ext::read_available;

/// Pipe bytes between `a` and `b` until either side reaches EOF, then close
/// both halves.
///
/// # Errors
/// Returns [`NetError::Io`] if either socket errors before EOF.
pub async fn bidirectional_pipe(a: TcpStream, b: TcpStream) -> Result<(), NetError> {
    let (mut a_read, mut a_write) = split(a);
    let (mut b_read, mut b_write) = split(b);

    let a_to_b = async {
        loop {
            let chunk = read_available(&mut a_read).await?;
            if chunk.is_empty() {
                break;
            }
            b_write.write_all(&chunk).await?;
        }
        let _ = b_write.shutdown().await;
        Ok::<(), NetError>(())
    };

    let b_to_a = async {
        loop {
            let chunk = read_available(&mut b_read).await?;
            if chunk.is_empty() {
                break;
            }
            a_write.write_all(&chunk).await?;
        }
        let _ = a_write.shutdown().await;
        Ok::<(), NetError>(())
    };

    tokio::try_join!(a_to_b, b_to_a)?;
    Ok(())
}
