use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use cfb8::cipher::{AsyncStreamCipher, KeyIvInit};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// AES-128 CFB-8 encryptor, keyed with `iv := key` per §4.B/§9.
pub type Aes128Cfb8Enc = cfb8::Encryptor<aes::Aes128>;
/// AES-128 CFB-8 decryptor, keyed with `iv := key` per §4.B/§9.
pub type Aes128Cfb8Dec = cfb8::Decryptor<aes::Aes128>;

fn new_encryptor(key: [u8; 16]) -> Aes128Cfb8Enc {
    Aes128Cfb8Enc::new(&key.into(), &key.into())
}

fn new_decryptor(key: [u8; 16]) -> Aes128Cfb8Dec {
    Aes128Cfb8Dec::new(&key.into(), &key.into())
}

/// An optional-CFB write half (§4.B). Before `enable` is called, writes pass
/// through untouched. Writes are buffered and non-suspending; `poll_flush`
/// is where buffered (and, once armed, encrypted) bytes actually reach the
/// underlying sink, matching the suspension-point contract in §5.
pub struct StreamEncryptor<W> {
    inner: W,
    cipher: Option<Aes128Cfb8Enc>,
    pending: VecDeque<u8>,
}

impl<W> StreamEncryptor<W> {
    /// Wrap `inner`, initially unencrypted.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            cipher: None,
            pending: VecDeque::new(),
        }
    }

    /// Arm encryption with `key`. One-way: once armed, every subsequent byte
    /// is encrypted (§3 invariants).
    pub fn enable_encryption(&mut self, key: [u8; 16]) {
        self.cipher = Some(new_encryptor(key));
    }

    /// Whether encryption has been armed on this half.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for StreamEncryptor<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let mut chunk = buf.to_vec();
        if let Some(cipher) = &mut this.cipher {
            cipher.encrypt(&mut chunk);
        }
        this.pending.extend(chunk);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        while !this.pending.is_empty() {
            let (front, _) = this.pending.as_slices();
            let n = ready!(Pin::new(&mut this.inner).poll_write(cx, front))?;
            if n == 0 {
                return Poll::Ready(Err(std::io::Error::from(std::io::ErrorKind::WriteZero)));
            }
            this.pending.drain(..n);
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        match Pin::new(&mut *self).poll_flush(cx) {
            Poll::Ready(Ok(())) => {}
            other => return other,
        }
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

/// An optional-CFB read half (§4.B). Before `enable` is called, reads pass
/// through untouched.
pub struct StreamDecryptor<R> {
    inner: R,
    cipher: Option<Aes128Cfb8Dec>,
}

impl<R> StreamDecryptor<R> {
    /// Wrap `inner`, initially unencrypted.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cipher: None,
        }
    }

    /// Arm decryption with `key`. One-way, mirroring [`StreamEncryptor::enable_encryption`].
    pub fn enable_encryption(&mut self, key: [u8; 16]) {
        self.cipher = Some(new_decryptor(key));
    }

    /// Whether decryption has been armed on this half.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for StreamDecryptor<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let filled_before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if let Some(cipher) = &mut this.cipher {
            let filled_after = buf.filled().len();
            cipher.decrypt(&mut buf.filled_mut()[filled_before..filled_after]);
        }
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn round_trips_at_every_chunk_size() {
        let key = [7u8; 16];
        for chunk_size in [1usize, 2, 3, 7, 16, 64] {
            let plaintext: Vec<u8> = (0..200u16).map(|i| i as u8).collect();

            let mut wire = Vec::new();
            {
                let mut enc = StreamEncryptor::new(&mut wire);
                enc.enable_encryption(key);
                for chunk in plaintext.chunks(chunk_size) {
                    enc.write_all(chunk).await.unwrap();
                }
                enc.flush().await.unwrap();
            }

            let mut dec = StreamDecryptor::new(wire.as_slice());
            dec.enable_encryption(key);
            let mut out = Vec::new();
            dec.read_to_end(&mut out).await.unwrap();
            assert_eq!(out, plaintext, "chunk_size={chunk_size}");
        }
    }

    #[tokio::test]
    async fn passthrough_when_not_enabled() {
        let mut wire = Vec::new();
        {
            let mut enc = StreamEncryptor::new(&mut wire);
            enc.write_all(b"plaintext").await.unwrap();
            enc.flush().await.unwrap();
        }
        assert_eq!(wire, b"plaintext");
    }
}
