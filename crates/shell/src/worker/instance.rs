// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single long-lived `bash` worker process (spec §4.4).
//!
//! Holds the child's stdin (to feed script blocks), two pump tasks
//! streaming stdout/stderr chunks back to callers, and a third pump
//! reading the FD-3 control pipe for the bootstrap-ready and per-command
//! status markers.

use super::control;
use crate::chunk_pool::ChunkPool;
use crate::error::{ShellWorkerCause, ShellWorkerError};
use crate::shell_kind::ShellKind;
use command_fds::{CommandFdExt, FdMapping};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::unistd::pipe;
use opal_session::Session;
use std::collections::BTreeMap;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, Mutex as AsyncMutex, OnceCell};
use tokio_util::sync::CancellationToken;

/// Wait at most this long for the bootstrap ready marker before declaring
/// the worker construction failed.
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(10);
/// Idle window after a status marker arrives before we stop draining
/// trailing stream output (spec §4.4 step 7: "~2 ms of idleness").
const FLUSH_IDLE: Duration = Duration::from_millis(2);
/// Bounded capacity of the stream-chunk channel (spec §5).
const STREAM_CHANNEL_CAPACITY: usize = 128;

pub(crate) enum StreamChunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Where a [`Worker::run`] call sends output and is fed input from. `None`
/// falls back to the host's own stdout/stderr (spec §4.4 step 6).
pub struct RunSinks<'a> {
    pub stdout: Option<&'a mut (dyn tokio::io::AsyncWrite + Send + Unpin)>,
    pub stderr: Option<&'a mut (dyn tokio::io::AsyncWrite + Send + Unpin)>,
}

pub struct RunOutcome {
    pub exit_code: i32,
}

/// One long-lived `bash --noprofile --norc` subprocess (spec §3 "Shell
/// worker").
pub struct Worker {
    pub(crate) id: String,
    pub(crate) transport_id: String,
    pub(crate) shell: ShellKind,
    child: AsyncMutex<Child>,
    stdin: AsyncMutex<tokio::process::ChildStdin>,
    control_lines: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    streams: AsyncMutex<mpsc::Receiver<StreamChunk>>,
    stream_errors: AsyncMutex<mpsc::UnboundedReceiver<std::io::Error>>,
    pool: Arc<ChunkPool>,
    alive: AtomicBool,
    pub(crate) busy: AtomicBool,
    marker_seq: AtomicU64,
    run_lock: AsyncMutex<()>,
    close_once: OnceCell<()>,
}

impl Worker {
    /// Construct and bootstrap a new worker for `transport_id`, using
    /// `session`'s frozen env/cwd (spec §4.4 construction steps 1-7).
    pub(crate) async fn spawn(
        transport_id: &str,
        session: &Arc<dyn Session>,
    ) -> Result<Arc<Worker>, ShellWorkerError> {
        let workdir: PathBuf = session.workdir();
        let env: BTreeMap<String, String> = session.env();

        let (control_read, control_write) = pipe().map_err(|e| {
            ShellWorkerError::not_started(transport_id, ShellWorkerCause::ControlPipe(e.to_string()))
        })?;

        let argv = ShellKind::Bash.worker_argv();
        let mut std_cmd = std::process::Command::new(&argv[0]);
        std_cmd.args(&argv[1..]);
        std_cmd.current_dir(&workdir);
        std_cmd.env_clear();
        std_cmd.envs(&env);
        std_cmd.stdin(Stdio::piped());
        std_cmd.stdout(Stdio::piped());
        std_cmd.stderr(Stdio::piped());

        std_cmd
            .fd_mappings(vec![FdMapping { parent_fd: control_write.as_raw_fd(), child_fd: 3 }])
            .map_err(|e| {
                ShellWorkerError::not_started(
                    transport_id,
                    ShellWorkerCause::ControlPipe(e.to_string()),
                )
            })?;

        let mut command = tokio::process::Command::from(std_cmd);
        command.kill_on_drop(true);
        let mut child = command
            .spawn()
            .map_err(|e| ShellWorkerError::not_started(transport_id, ShellWorkerCause::Spawn(e)))?;

        // The child now owns a dup'd copy of the write end on FD 3; close
        // ours so the control pipe's only writer is the child.
        drop(control_write);

        fcntl(control_read.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).map_err(|e| {
            ShellWorkerError::not_started(transport_id, ShellWorkerCause::ControlPipe(e.to_string()))
        })?;
        let control_file = std::fs::File::from(control_read);
        let control_pipe = tokio::net::unix::pipe::Receiver::from_file_unchecked(control_file)
            .map_err(|e| ShellWorkerError::not_started(transport_id, ShellWorkerCause::Spawn(e)))?;

        let stdin =
            child.stdin.take().unwrap_or_else(|| unreachable!("worker spawned with piped stdin"));
        let stdout =
            child.stdout.take().unwrap_or_else(|| unreachable!("worker spawned with piped stdout"));
        let stderr =
            child.stderr.take().unwrap_or_else(|| unreachable!("worker spawned with piped stderr"));

        let pool = Arc::new(ChunkPool::new());
        let (stream_tx, stream_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        tokio::spawn(pump_stream(stdout, Arc::clone(&pool), StreamChunk::Stdout, stream_tx.clone(), err_tx.clone()));
        tokio::spawn(pump_stream(stderr, Arc::clone(&pool), StreamChunk::Stderr, stream_tx, err_tx));
        tokio::spawn(pump_control(control_pipe, control_tx));

        let worker = Arc::new(Worker {
            id: uuid::Uuid::new_v4().to_string(),
            transport_id: transport_id.to_string(),
            shell: ShellKind::Bash,
            child: AsyncMutex::new(child),
            stdin: AsyncMutex::new(stdin),
            control_lines: AsyncMutex::new(control_rx),
            streams: AsyncMutex::new(stream_rx),
            stream_errors: AsyncMutex::new(err_rx),
            pool,
            alive: AtomicBool::new(true),
            busy: AtomicBool::new(false),
            marker_seq: AtomicU64::new(0),
            run_lock: AsyncMutex::new(()),
            close_once: OnceCell::new(),
        });

        worker.bootstrap().await?;
        tracing::debug!(worker_id = %worker.id, transport_id = %worker.transport_id, "shell worker bootstrapped");
        Ok(worker)
    }

    async fn bootstrap(&self) -> Result<(), ShellWorkerError> {
        let seq = self.marker_seq.fetch_add(1, Ordering::SeqCst);
        let script = control::bootstrap_script(&self.id, seq);
        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(script.as_bytes()).await.map_err(|e| {
                ShellWorkerError::not_started(&self.transport_id, ShellWorkerCause::StdinWrite(e))
            })?;
            stdin.flush().await.map_err(|e| {
                ShellWorkerError::not_started(&self.transport_id, ShellWorkerCause::StdinWrite(e))
            })?;
        }

        let wait_ready = async {
            let mut lines = self.control_lines.lock().await;
            loop {
                match lines.recv().await {
                    Some(line) if control::is_ready_line(&line, seq) => return Ok(()),
                    Some(_) => continue,
                    None => {
                        return Err(ShellWorkerError::not_started(
                            &self.transport_id,
                            ShellWorkerCause::ControlPipeClosed,
                        ))
                    }
                }
            }
        };

        match tokio::time::timeout(BOOTSTRAP_TIMEOUT, wait_ready).await {
            Ok(result) => result,
            Err(_) => Err(ShellWorkerError::not_started(
                &self.transport_id,
                ShellWorkerCause::BootstrapTimeout,
            )),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Run `command` on this worker (spec §4.4 `pool.Run` steps 2-7).
    /// `cd_target`/`env_delta` are the already-computed deltas against the
    /// session snapshot.
    pub(crate) async fn run(
        &self,
        cancel: &CancellationToken,
        cd_target: Option<&str>,
        env_delta: &[(String, String)],
        command: &str,
        sinks: RunSinks<'_>,
    ) -> Result<RunOutcome, ShellWorkerError> {
        let _serialize = self.run_lock.lock().await;

        for (name, _) in env_delta {
            if !control::is_valid_env_name(name) {
                return Err(ShellWorkerError::not_started(
                    &self.transport_id,
                    ShellWorkerCause::InvalidEnvName(name.clone()),
                ));
            }
        }

        self.drain_stale().await;

        let marker = self.marker_seq.fetch_add(1, Ordering::SeqCst);
        let script = control::build_script(cd_target, env_delta, command, marker);

        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = stdin.write_all(script.as_bytes()).await {
                self.mark_dead();
                return Err(ShellWorkerError::started(&self.transport_id, ShellWorkerCause::StdinWrite(e)));
            }
            if let Err(e) = stdin.flush().await {
                self.mark_dead();
                return Err(ShellWorkerError::started(&self.transport_id, ShellWorkerCause::StdinWrite(e)));
            }
        }

        self.drive(cancel, marker, sinks).await
    }

    /// The select loop (spec §4.4 step 6-7, §9): interleave status
    /// arrival, stream chunks, stream errors, and cancellation; once
    /// status arrives, keep draining for a short idle window before
    /// returning.
    async fn drive(
        &self,
        cancel: &CancellationToken,
        marker: u64,
        mut sinks: RunSinks<'_>,
    ) -> Result<RunOutcome, ShellWorkerError> {
        let mut control_lines = self.control_lines.lock().await;
        let mut streams = self.streams.lock().await;
        let mut stream_errors = self.stream_errors.lock().await;

        let mut exit_code: Option<i32> = None;
        let mut flush_deadline: Option<tokio::time::Instant> = None;

        loop {
            let flush_sleep = async {
                match flush_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                () = cancel.cancelled(), if exit_code.is_none() => {
                    self.mark_dead();
                    return Err(ShellWorkerError::started(&self.transport_id, ShellWorkerCause::Canceled));
                }

                Some(err) = stream_errors.recv() => {
                    tracing::warn!(worker_id = %self.id, error = %err, "shell worker stream read failed; killing worker");
                    self.mark_dead();
                    return Err(ShellWorkerError::started(&self.transport_id, ShellWorkerCause::StreamRead(err)));
                }

                Some(line) = control_lines.recv(), if exit_code.is_none() => {
                    if let Some(code) = control::parse_status_line(&line, marker) {
                        exit_code = Some(code);
                        flush_deadline = Some(tokio::time::Instant::now() + FLUSH_IDLE);
                    }
                }

                Some(chunk) = streams.recv() => {
                    if exit_code.is_some() {
                        flush_deadline = Some(tokio::time::Instant::now() + FLUSH_IDLE);
                    }
                    self.forward_chunk(chunk, &mut sinks).await;
                }

                () = flush_sleep, if exit_code.is_some() => {
                    break;
                }
            }
        }

        Ok(RunOutcome { exit_code: exit_code.unwrap_or(255) })
    }

    async fn forward_chunk(&self, chunk: StreamChunk, sinks: &mut RunSinks<'_>) {
        match chunk {
            StreamChunk::Stdout(buf) => {
                match sinks.stdout.as_mut() {
                    Some(writer) => {
                        let _ = writer.write_all(&buf).await;
                    }
                    None => {
                        let _ = tokio::io::stdout().write_all(&buf).await;
                    }
                }
                self.pool.put(buf);
            }
            StreamChunk::Stderr(buf) => {
                match sinks.stderr.as_mut() {
                    Some(writer) => {
                        let _ = writer.write_all(&buf).await;
                    }
                    None => {
                        let _ = tokio::io::stderr().write_all(&buf).await;
                    }
                }
                self.pool.put(buf);
            }
        }
    }

    /// Drain any pending chunks/errors left over from a previous run
    /// (spec §4.4 step 2 "idempotency safety").
    async fn drain_stale(&self) {
        let mut streams = self.streams.lock().await;
        while let Ok(chunk) = streams.try_recv() {
            match chunk {
                StreamChunk::Stdout(buf) | StreamChunk::Stderr(buf) => self.pool.put(buf),
            }
        }
        let mut errors = self.stream_errors.lock().await;
        while errors.try_recv().is_ok() {}
    }

    fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Tear the worker down: mark dead, kill the process, reap it. Safe to
    /// call more than once (spec §4.4 "close is closeOnce-guarded").
    pub(crate) async fn close(&self) {
        self.close_once
            .get_or_init(|| async {
                tracing::debug!(worker_id = %self.id, transport_id = %self.transport_id, "closing shell worker");
                self.mark_dead();
                let mut child = self.child.lock().await;
                let _ = child.start_kill();
                let _ = child.wait().await;
            })
            .await;
    }
}

async fn pump_stream(
    mut reader: impl tokio::io::AsyncRead + Unpin,
    pool: Arc<ChunkPool>,
    tag: fn(Vec<u8>) -> StreamChunk,
    tx: mpsc::Sender<StreamChunk>,
    err_tx: mpsc::UnboundedSender<std::io::Error>,
) {
    loop {
        let mut buf = pool.get();
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                buf.truncate(n);
                if tx.send(tag(buf)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = err_tx.send(e);
                break;
            }
        }
    }
}

async fn pump_control(reader: tokio::net::unix::pipe::Receiver, tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
}
