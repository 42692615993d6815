//! The RESP2 wire gateway: decodes a client's multibulk command into the
//! pre-split argument vector `kv_server::Command::parse` expects, and
//! encodes a [`CommandReply`]/[`CommandError`] back onto the wire.
//!
//! This is the one place in the workspace that speaks raw RESP bytes —
//! every other crate operates on already-parsed arguments or typed
//! replies.

use kv_server::{CommandError, CommandReply};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads one multibulk command (`*<n>\r\n$<len>\r\n<bytes>\r\n...`).
/// Returns `Ok(None)` on a clean EOF before any bytes of a new command
/// arrive (the connection closed between commands).
pub async fn read_command<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<Vec<u8>>>> {
    let Some(line) = read_line(reader).await? else { return Ok(None) };
    let line = line.trim_end();
    let Some(count_str) = line.strip_prefix('*') else {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "expected RESP array ('*')"));
    };
    let count: usize = count_str.parse().map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed array length"))?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let header = read_line(reader).await?.ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated command"))?;
        let header = header.trim_end();
        let Some(len_str) = header.strip_prefix('$') else {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "expected bulk string ('$')"));
        };
        let len: usize = len_str.parse().map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed bulk length"))?;

        let mut buf = vec![0u8; len + 2]; // payload plus trailing \r\n
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(buf);
    }
    Ok(Some(args))
}

/// Reads a single CRLF-terminated line, returning `None` only if EOF hit
/// before any byte of it arrived.
async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

pub async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &CommandReply) -> io::Result<()> {
    writer.write_all(&encode_reply(reply)).await
}

pub async fn write_error<W: AsyncWrite + Unpin>(writer: &mut W, err: &CommandError) -> io::Result<()> {
    let line = format!("-{}\r\n", err.to_string().replace(['\r', '\n'], " "));
    writer.write_all(line.as_bytes()).await
}

fn encode_reply(reply: &CommandReply) -> Vec<u8> {
    match reply {
        CommandReply::Ok => b"+OK\r\n".to_vec(),
        CommandReply::Nil => b"$-1\r\n".to_vec(),
        CommandReply::Integer(n) => format!(":{n}\r\n").into_bytes(),
        CommandReply::SimpleString(s) => format!("+{s}\r\n").into_bytes(),
        CommandReply::Bulk(bytes) => {
            let mut out = format!("${}\r\n", bytes.len()).into_bytes();
            out.extend_from_slice(bytes);
            out.extend_from_slice(b"\r\n");
            out
        }
        CommandReply::Array(items) => {
            let mut out = format!("*{}\r\n", items.len()).into_bytes();
            for item in items {
                out.extend(encode_reply(item));
            }
            out
        }
    }
}
