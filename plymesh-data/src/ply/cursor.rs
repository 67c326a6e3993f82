//! Sequential reader over the data section of a PLY file.

use crate::error::{PlyError, PlyResult};
use crate::ply::header::{PlyFormat, PropertyKind, ScalarType};

/// A cursor that walks the data section one value at a time.
///
/// Every read advances a single offset into `bytes`. Binary encodings read fixed-width values in
/// the file's byte order; ASCII reads one whitespace-delimited token per value.
#[derive(Debug)]
pub struct DataCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
    format: PlyFormat,
}

impl<'a> DataCursor<'a> {
    pub fn new(bytes: &'a [u8], offset: usize, format: PlyFormat) -> Self {
        Self {
            bytes,
            offset,
            format,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn format(&self) -> PlyFormat {
        self.format
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    /// Read one scalar, widened to `f64`. Every PLY scalar type is exactly representable.
    pub fn read_scalar(&mut self, ty: ScalarType) -> PlyResult<f64> {
        match self.format {
            PlyFormat::Ascii => self.read_ascii(ty),
            PlyFormat::BinaryLittleEndian => self.read_binary(ty, true),
            PlyFormat::BinaryBigEndian => self.read_binary(ty, false),
        }
    }

    /// Read a list: its length at `count` width, then that many values at `value` width.
    /// `out` is cleared first; the list length is returned.
    pub fn read_list(
        &mut self,
        count: ScalarType,
        value: ScalarType,
        out: &mut Vec<f64>,
    ) -> PlyResult<usize> {
        let len = self.read_list_len(count)?;
        if self.format != PlyFormat::Ascii {
            self.ensure_available(value, len)?;
        }
        out.clear();
        // An ASCII value takes at least one byte, so this bounds the reservation either way.
        out.reserve(len.min(self.remaining()));
        for _ in 0..len {
            out.push(self.read_scalar(value)?);
        }
        Ok(len)
    }

    /// Consume one property without materializing it.
    pub fn skip_property(&mut self, kind: PropertyKind) -> PlyResult<()> {
        match kind {
            PropertyKind::Scalar(ty) => self.skip_values(ty, 1),
            PropertyKind::List { count, value } => {
                let len = self.read_list_len(count)?;
                self.skip_values(value, len)
            }
        }
    }

    /// Advance over `len` raw bytes. Only meaningful for the binary encodings.
    pub fn skip_bytes(&mut self, len: usize) -> PlyResult<()> {
        self.take(len).map(|_| ())
    }

    fn read_list_len(&mut self, count: ScalarType) -> PlyResult<usize> {
        let start = self.offset;
        let raw = self.read_scalar(count)?;
        if raw < 0.0 || raw.fract() != 0.0 {
            return Err(PlyError::MalformedData {
                offset: start,
                token: format!("list length {raw}"),
            });
        }
        Ok(raw as usize)
    }

    fn skip_values(&mut self, ty: ScalarType, n: usize) -> PlyResult<()> {
        match self.format {
            PlyFormat::Ascii => {
                for _ in 0..n {
                    self.next_token()?;
                }
                Ok(())
            }
            PlyFormat::BinaryLittleEndian | PlyFormat::BinaryBigEndian => {
                self.ensure_available(ty, n)?;
                self.skip_bytes(ty.size_bytes() * n)
            }
        }
    }

    /// Fail with `TruncatedData` unless `n` binary values of type `ty` fit in what is left.
    fn ensure_available(&self, ty: ScalarType, n: usize) -> PlyResult<()> {
        let available = self.remaining();
        match ty.size_bytes().checked_mul(n) {
            Some(len) if len <= available => Ok(()),
            Some(len) => Err(PlyError::TruncatedData {
                offset: self.offset,
                needed: len - available,
            }),
            None => Err(PlyError::TruncatedData {
                offset: self.offset,
                needed: usize::MAX,
            }),
        }
    }

    fn take(&mut self, len: usize) -> PlyResult<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(PlyError::TruncatedData {
                offset: self.offset,
                needed: len - available,
            });
        }
        let bytes: &'a [u8] = self.bytes;
        let slice = &bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> PlyResult<[u8; N]> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    fn read_binary(&mut self, ty: ScalarType, little: bool) -> PlyResult<f64> {
        macro_rules! read_as {
            ($t:ty, $n:literal) => {{
                let arr = self.take_array::<$n>()?;
                let v = if little {
                    <$t>::from_le_bytes(arr)
                } else {
                    <$t>::from_be_bytes(arr)
                };
                v as f64
            }};
        }

        let v = match ty {
            ScalarType::Int8 => read_as!(i8, 1),
            ScalarType::UInt8 => read_as!(u8, 1),
            ScalarType::Int16 => read_as!(i16, 2),
            ScalarType::UInt16 => read_as!(u16, 2),
            ScalarType::Int32 => read_as!(i32, 4),
            ScalarType::UInt32 => read_as!(u32, 4),
            ScalarType::Float32 => read_as!(f32, 4),
            ScalarType::Float64 => read_as!(f64, 8),
        };
        Ok(v)
    }

    fn next_token(&mut self) -> PlyResult<&'a str> {
        let bytes: &'a [u8] = self.bytes;
        let rest = &bytes[self.offset.min(bytes.len())..];
        let Some(start) = rest.iter().position(|b| !b.is_ascii_whitespace()) else {
            return Err(PlyError::TruncatedData {
                offset: bytes.len(),
                needed: 1,
            });
        };
        let len = rest[start..]
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(rest.len() - start);

        let token_offset = self.offset + start;
        let raw = &rest[start..start + len];
        self.offset = token_offset + len;

        std::str::from_utf8(raw).map_err(|_| PlyError::MalformedData {
            offset: token_offset,
            token: String::from_utf8_lossy(raw).into_owned(),
        })
    }

    fn read_ascii(&mut self, ty: ScalarType) -> PlyResult<f64> {
        let start = self.offset;
        let token = self.next_token()?;
        let bad = || PlyError::MalformedData {
            offset: start,
            token: token.to_string(),
        };

        let v = match ty {
            ScalarType::Int8 => token.parse::<i8>().map_err(|_| bad())? as f64,
            ScalarType::UInt8 => token.parse::<u8>().map_err(|_| bad())? as f64,
            ScalarType::Int16 => token.parse::<i16>().map_err(|_| bad())? as f64,
            ScalarType::UInt16 => token.parse::<u16>().map_err(|_| bad())? as f64,
            ScalarType::Int32 => token.parse::<i32>().map_err(|_| bad())? as f64,
            ScalarType::UInt32 => token.parse::<u32>().map_err(|_| bad())? as f64,
            ScalarType::Float32 => token.parse::<f32>().map_err(|_| bad())? as f64,
            ScalarType::Float64 => token.parse::<f64>().map_err(|_| bad())?,
        };
        Ok(v)
    }
}
