use std::io::{Error, ErrorKind, Read, Write};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::serial::{ReadFrom, WriteTo};

/// A variable-length signed 32-bit integer, encoded as per §3/§4.C: seven
/// value bits per byte, high bit set while more bytes follow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(pub i32);

impl VarInt {
    /// The maximum number of bytes a `VarInt` can occupy on the wire.
    pub const MAX_SIZE: usize = 5;

    /// The number of bytes `self` would occupy on the wire.
    #[must_use]
    pub fn written_size(self) -> usize {
        let mut val = self.0 as u32;
        let mut size = 1;
        while val >= 0x80 {
            val >>= 7;
            size += 1;
        }
        size
    }

    /// Read a `VarInt` one byte at a time from an async source.
    ///
    /// Needed because the frame-length prefix must be decoded before the
    /// rest of the frame is known to be available (§4.C).
    pub async fn read_async(read: &mut (impl AsyncRead + Unpin)) -> std::io::Result<Self> {
        let mut val = 0i32;
        for i in 0..Self::MAX_SIZE {
            let byte = read.read_u8().await?;
            val |= (i32::from(byte) & 0x7F) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(Self(val));
            }
        }
        Err(Error::new(ErrorKind::InvalidData, "VarInt too long"))
    }

    /// Write a `VarInt` to an async sink.
    pub async fn write_async(self, write: &mut (impl AsyncWrite + Unpin)) -> std::io::Result<()> {
        let mut val = self.0 as u32;
        loop {
            let b = (val & 0x7F) as u8;
            val >>= 7;
            if val == 0 {
                write.write_u8(b).await?;
                break;
            }
            write.write_u8(b | 0x80).await?;
        }
        Ok(())
    }
}

impl ReadFrom for VarInt {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        let mut val = 0i32;
        for i in 0..Self::MAX_SIZE {
            let byte = u8::read(read)?;
            val |= (i32::from(byte) & 0x7F) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(Self(val));
            }
        }
        Err(Error::new(ErrorKind::InvalidData, "VarInt too long"))
    }
}

impl WriteTo for VarInt {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        let mut val = self.0 as u32;
        loop {
            let b: u8 = (val & 0x7F) as u8;
            val >>= 7;
            if val == 0 {
                b.write(writer)?;
                break;
            }
            (b | 0x80).write(writer)?;
        }
        Ok(())
    }
}

impl From<i32> for VarInt {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<VarInt> for i32 {
    fn from(value: VarInt) -> i32 {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_varint_read_write() {
        let test_values = vec![
            0i32,
            1i32,
            2i32,
            127i32,
            128i32,
            255i32,
            2_147_483_647i32,
            -1i32,
            -2_147_483_648i32,
        ];

        for val in test_values {
            let var_int = VarInt(val);
            let mut buf = Vec::new();
            var_int.write(&mut buf).expect("write failed");
            assert_eq!(buf.len(), var_int.written_size());

            let mut cursor = Cursor::new(buf);
            let read_val = VarInt::read(&mut cursor).expect("read failed");
            assert_eq!(read_val, var_int, "Failed for value {val}");
        }
    }

    #[test]
    fn test_varint_overflow_is_decode_error() {
        // Five continuation bytes followed by a sixth: one byte too many.
        let buf = [0xFFu8, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut cursor = Cursor::new(buf);
        assert!(VarInt::read(&mut cursor).is_err());
    }

    #[tokio::test]
    async fn test_varint_async_round_trip() {
        for val in [0i32, 300i32, -300i32, i32::MAX, i32::MIN] {
            let mut buf = Vec::new();
            VarInt(val).write_async(&mut buf).await.unwrap();
            let mut cursor = Cursor::new(buf);
            let read = VarInt::read_async(&mut cursor).await.unwrap();
            assert_eq!(read.0, val);
        }
    }
}
