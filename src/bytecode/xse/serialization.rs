use std::io::{self, Read, Write};

use crate::runtime::error::LoadError;

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), LoadError> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            LoadError::malformed("unexpected end of image")
        } else {
            LoadError::Io(err)
        }
    })
}

pub(super) fn read_u8<R: Read>(reader: &mut R) -> Result<u8, LoadError> {
    let mut buf = [0u8; 1];
    read_exact(reader, &mut buf)?;
    Ok(buf[0])
}

pub(super) fn read_u16<R: Read>(reader: &mut R) -> Result<u16, LoadError> {
    let mut buf = [0u8; 2];
    read_exact(reader, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(super) fn read_u32<R: Read>(reader: &mut R) -> Result<u32, LoadError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(super) fn read_i32<R: Read>(reader: &mut R) -> Result<i32, LoadError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub(super) fn read_f32<R: Read>(reader: &mut R) -> Result<f32, LoadError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

pub(super) fn read_bytes<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, LoadError> {
    let mut buf = Vec::new();
    reader
        .take(len as u64)
        .read_to_end(&mut buf)
        .map_err(LoadError::Io)?;
    if buf.len() != len {
        return Err(LoadError::malformed("unexpected end of image"));
    }
    Ok(buf)
}

/// String with a 4-byte length prefix (string table entries).
pub(super) fn read_long_string<R: Read>(reader: &mut R) -> Result<String, LoadError> {
    let len = read_u32(reader)? as usize;
    let bytes = read_bytes(reader, len)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// String with a 1-byte length prefix (function and host-call names).
pub(super) fn read_short_string<R: Read>(reader: &mut R) -> Result<String, LoadError> {
    let len = read_u8(reader)? as usize;
    let bytes = read_bytes(reader, len)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub(super) fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

pub(super) fn write_u16<W: Write>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(super) fn write_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(super) fn write_i32<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(super) fn write_f32<W: Write>(writer: &mut W, value: f32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(super) fn write_long_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let bytes = value.as_bytes();
    write_u32(writer, bytes.len() as u32)?;
    writer.write_all(bytes)
}

/// Names longer than 255 bytes are truncated to fit the 1-byte prefix.
pub(super) fn write_short_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let bytes = value.as_bytes();
    let len = bytes.len().min(u8::MAX as usize);
    write_u8(writer, len as u8)?;
    writer.write_all(&bytes[..len])
}
