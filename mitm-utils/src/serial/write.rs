use std::io::Write;

use super::WriteTo;
use crate::codec::VarInt;
use super::read::{ByteArray, RawUuid};

impl WriteTo for bool {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        (*self as u8).write(writer)
    }
}

impl WriteTo for u8 {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(&[*self])
    }
}

impl WriteTo for i8 {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        (*self as u8).write(writer)
    }
}

macro_rules! impl_write_to_be {
    ($($t:ty),+) => {
        $(
            impl WriteTo for $t {
                fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
                    writer.write_all(&self.to_be_bytes())
                }
            }
        )+
    };
}

impl_write_to_be!(u16, i16, u32, i32, u64, i64, f32, f64);

impl WriteTo for str {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        VarInt(self.len() as i32).write(writer)?;
        writer.write_all(self.as_bytes())
    }
}

impl WriteTo for String {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        self.as_str().write(writer)
    }
}

impl WriteTo for ByteArray {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        VarInt(self.0.len() as i32).write(writer)?;
        writer.write_all(&self.0)
    }
}

impl<T: WriteTo> WriteTo for Option<T> {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        match self {
            Some(v) => {
                true.write(writer)?;
                v.write(writer)
            }
            None => false.write(writer),
        }
    }
}

impl<T: WriteTo> WriteTo for Vec<T> {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        VarInt(self.len() as i32).write(writer)?;
        for item in self {
            item.write(writer)?;
        }
        Ok(())
    }
}

impl WriteTo for RawUuid {
    fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(&self.0)
    }
}
