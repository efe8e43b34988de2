// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stdio plumbing threaded through the tree interpreter (spec §4.5's
//! dispatch signature `(frame, node, stdin, stdout)`).
//!
//! A [`PipeEnd`] is either the host's own stdio (`Inherit`) or a real OS
//! pipe end (`Pipe`) — never an in-memory buffer, so a child process sees
//! genuine `EPIPE`/`SIGPIPE` behavior (spec §4.6). `Pipe` wraps an `Arc` so
//! `Sequence`'s "same stdout threaded to every child" rule (spec §4.5) can
//! hand out independent `dup()`s without consuming the original — each
//! child gets its own fd via `File::try_clone`, and the Arc's final drop
//! (when the owning dispatch call returns) is what lets the reader on the
//! other end observe EOF.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

#[derive(Clone)]
pub enum PipeEnd {
    Inherit,
    Pipe(Arc<std::fs::File>),
}

impl PipeEnd {
    /// `true` iff this end is a real OS pipe rather than the host's own
    /// stdio — the "is a named pipe (FIFO)" test spec §4.4 uses to
    /// disqualify a command from the worker pool.
    pub fn is_pipe(&self) -> bool {
        matches!(self, PipeEnd::Pipe(_))
    }

    /// A fresh `Stdio` for a direct child-process spawn. `Pipe` ends are
    /// duplicated (`dup(2)` via `try_clone`) so the original can still be
    /// handed to a later sibling (spec §4.5 Sequence).
    pub fn to_stdio(&self) -> io::Result<Stdio> {
        match self {
            PipeEnd::Inherit => Ok(Stdio::inherit()),
            PipeEnd::Pipe(file) => Ok(Stdio::from(file.try_clone()?)),
        }
    }

    /// A writer for the worker-pool path (spec §4.4's `RunSinks`, which
    /// wants an `AsyncWrite` rather than a `Stdio`). `None` for `Inherit`
    /// so the worker falls back to the host's own stdout/stderr.
    pub fn to_async_writer(&self) -> io::Result<Option<tokio::fs::File>> {
        match self {
            PipeEnd::Inherit => Ok(None),
            PipeEnd::Pipe(file) => Ok(Some(tokio::fs::File::from_std(file.try_clone()?))),
        }
    }
}

/// A redirect/sink bridge: an OS pipe whose one end is handed to a child
/// process as its stdin or stdout, and whose other end is driven by a
/// background copy task into/out of an `opal_core::Io` reader or writer.
/// The caller awaits `task` after the bridged subtree has finished running
/// and has dropped its `PipeEnd` clone, so the copy task observes EOF and
/// finishes flushing (spec §4.7: sink close is deterministic).
pub struct Bridge {
    pub pipe_end: PipeEnd,
    pub task: tokio::task::JoinHandle<io::Result<()>>,
}

fn os_pipe() -> io::Result<(std::fs::File, std::fs::File)> {
    let (read, write) = nix::unistd::pipe()?;
    Ok((std::fs::File::from(read), std::fs::File::from(write)))
}

/// A fresh OS pipe as a `PipeEnd` pair — the building block the tree
/// interpreter's `Pipeline` dispatch uses to wire N-1 real pipes between N
/// stages (spec §4.6), mirroring `opal_shell::pipeline`'s algorithm at the
/// `PipeEnd`/`ExecNode` layer rather than the `Stdio`/process layer (that
/// layer can't host a non-shell decorator or a `Redirect`, which don't
/// read/write raw stdio at all).
pub fn pipe_pair() -> io::Result<(PipeEnd, PipeEnd)> {
    let (read, write) = os_pipe()?;
    Ok((PipeEnd::Pipe(Arc::new(read)), PipeEnd::Pipe(Arc::new(write))))
}

/// Bridge a sink's reader into a child's stdin (spec §4.7 `Input` mode):
/// the returned `PipeEnd` is the pipe's read side; a background task
/// copies `reader`'s bytes into the write side, closing it (and thus
/// delivering EOF to the child) once `reader` is exhausted.
pub fn bridge_reader(mut reader: Box<dyn AsyncRead + Send + Unpin>) -> io::Result<Bridge> {
    let (read_file, write_file) = os_pipe()?;
    let mut sink_write = tokio::fs::File::from_std(write_file);
    let task = tokio::spawn(async move {
        tokio::io::copy(&mut reader, &mut sink_write).await?;
        sink_write.shutdown().await?;
        Ok(())
    });
    Ok(Bridge { pipe_end: PipeEnd::Pipe(Arc::new(read_file)), task })
}

/// Bridge a child's stdout into a sink's writer (spec §4.7 `Overwrite`/
/// `Append` modes): the returned `PipeEnd` is the pipe's write side (what
/// the child writes into); a background task copies everything read from
/// the pipe into `writer`, flushing once the child closes its end.
pub fn bridge_writer(mut writer: Box<dyn AsyncWrite + Send + Unpin>) -> io::Result<Bridge> {
    let (read_file, write_file) = os_pipe()?;
    let mut pipe_read = tokio::fs::File::from_std(read_file);
    let task = tokio::spawn(async move {
        tokio::io::copy(&mut pipe_read, &mut writer).await?;
        writer.flush().await?;
        Ok(())
    });
    Ok(Bridge { pipe_end: PipeEnd::Pipe(Arc::new(write_file)), task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn inherit_has_no_async_writer() {
        assert!(PipeEnd::Inherit.to_async_writer().unwrap().is_none());
    }

    #[tokio::test]
    async fn bridge_reader_copies_bytes_before_closing() {
        let data: &[u8] = b"hello from sink";
        let bridge = bridge_reader(Box::new(data)).unwrap();
        assert!(bridge.pipe_end.is_pipe());

        let PipeEnd::Pipe(read_file) = &bridge.pipe_end else { unreachable!() };
        let mut child_stdin = tokio::fs::File::from_std(read_file.try_clone().unwrap());
        drop(bridge.pipe_end.clone());

        let mut buf = Vec::new();
        use tokio::io::AsyncReadExt;
        child_stdin.read_to_end(&mut buf).await.unwrap();
        bridge.task.await.unwrap().unwrap();
        assert_eq!(buf, data);
    }

    #[tokio::test]
    async fn bridge_writer_copies_bytes_written_by_child() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        struct CollectWriter(Option<tokio::sync::oneshot::Sender<Vec<u8>>>, Vec<u8>);
        impl tokio::io::AsyncWrite for CollectWriter {
            fn poll_write(
                mut self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                buf: &[u8],
            ) -> std::task::Poll<io::Result<usize>> {
                self.1.extend_from_slice(buf);
                std::task::Poll::Ready(Ok(buf.len()))
            }
            fn poll_flush(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Ok(()))
            }
            fn poll_shutdown(
                mut self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                if let Some(tx) = self.0.take() {
                    let _ = tx.send(std::mem::take(&mut self.1));
                }
                std::task::Poll::Ready(Ok(()))
            }
        }

        let bridge = bridge_writer(Box::new(CollectWriter(Some(tx), Vec::new()))).unwrap();
        assert!(bridge.pipe_end.is_pipe());

        let PipeEnd::Pipe(write_file) = &bridge.pipe_end else { unreachable!() };
        let mut child_stdout = tokio::fs::File::from_std(write_file.try_clone().unwrap());
        child_stdout.write_all(b"child output").await.unwrap();
        child_stdout.shutdown().await.unwrap();
        drop(child_stdout);
        drop(bridge.pipe_end.clone());

        bridge.task.await.unwrap().unwrap();
        let collected = rx.await.unwrap();
        assert_eq!(collected, b"child output");
    }
}
