//! Async I/O traits and utilities.

pub use tokio::io::{
    duplex, empty, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite,
    AsyncWriteExt, BufReader, BufWriter, DuplexStream, ReadBuf,
};
