use std::io::{Error, ErrorKind, Read};

use super::ReadFrom;
use crate::codec::VarInt;

impl ReadFrom for bool {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(u8::read(read)? != 0)
    }
}

impl ReadFrom for u8 {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        let mut buf = [0u8; 1];
        read.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl ReadFrom for i8 {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        Ok(u8::read(read)? as i8)
    }
}

macro_rules! impl_read_from_be {
    ($($t:ty),+) => {
        $(
            impl ReadFrom for $t {
                fn read(read: &mut impl Read) -> std::io::Result<Self> {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    read.read_exact(&mut buf)?;
                    Ok(<$t>::from_be_bytes(buf))
                }
            }
        )+
    };
}

impl_read_from_be!(u16, i16, u32, i32, u64, i64, f32, f64);

impl ReadFrom for String {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        let len = VarInt::read(read)?.0;
        if len < 0 {
            return Err(Error::new(ErrorKind::InvalidData, "negative string length"));
        }
        let mut buf = vec![0u8; len as usize];
        read.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::new(ErrorKind::InvalidData, e))
    }
}

/// Length-prefixed raw byte array (the `Bytes` wire type in §3/§4.C).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ByteArray(pub Vec<u8>);

impl ReadFrom for ByteArray {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        let len = VarInt::read(read)?.0;
        if len < 0 {
            return Err(Error::new(ErrorKind::InvalidData, "negative byte array length"));
        }
        let mut buf = vec![0u8; len as usize];
        read.read_exact(&mut buf)?;
        Ok(ByteArray(buf))
    }
}

impl<T: ReadFrom> ReadFrom for Option<T> {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        if bool::read(read)? {
            Ok(Some(T::read(read)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: ReadFrom> ReadFrom for Vec<T> {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        let len = VarInt::read(read)?.0;
        if len < 0 {
            return Err(Error::new(ErrorKind::InvalidData, "negative array length"));
        }
        let mut vec = Vec::with_capacity(len as usize);
        for _ in 0..len {
            vec.push(T::read(read)?);
        }
        Ok(vec)
    }
}

/// The raw 16-byte UUID wire type (§3). Not `uuid`-crate-backed: the only
/// packet in this protocol revision that carries an account id (`LoginSuccess`)
/// encodes it as a hyphenated `String`, not these 16 raw bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RawUuid(pub [u8; 16]);

impl ReadFrom for RawUuid {
    fn read(read: &mut impl Read) -> std::io::Result<Self> {
        let mut buf = [0u8; 16];
        read.read_exact(&mut buf)?;
        Ok(RawUuid(buf))
    }
}
