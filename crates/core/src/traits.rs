// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The two decorator capabilities (spec §4.3): `Exec` and `Io`.
//!
//! A decorator registration exposes one or both. There is no class
//! hierarchy here — a decorator is just an object implementing one of these
//! traits, looked up by name in a registry (`opal-engine`).

use crate::exit::ExitCode;
use crate::frame::ExecutionContext;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncWrite};

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type AsyncReader = Box<dyn AsyncRead + Send + Unpin>;
pub type AsyncWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The decorator-produced executable object the interpreter calls.
#[async_trait]
pub trait ExecNode: Send + Sync {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<ExitCode, DynError>;
}

/// An `Exec`-role decorator: wraps an optional nested block into a callable
/// [`ExecNode`]. `next` is `Some` iff the command node had a non-empty
/// block (spec §4.3).
pub trait Exec: Send + Sync {
    fn wrap(
        &self,
        next: Option<Box<dyn ExecNode>>,
        params: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn ExecNode>, DynError>;
}

/// Read/write/append capabilities an [`Io`] decorator supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoCaps {
    pub read: bool,
    pub write: bool,
    pub append: bool,
}

/// An `Io`-role decorator: a redirect sink or source (spec §4.3, §4.7).
#[async_trait]
pub trait Io: Send + Sync {
    fn io_caps(&self) -> IoCaps;

    async fn open_read(&self, ctx: &ExecutionContext) -> Result<AsyncReader, DynError>;

    async fn open_write(&self, ctx: &ExecutionContext, append: bool) -> Result<AsyncWriter, DynError>;

    /// Returns a parameterized instance if this sink accepts params;
    /// otherwise params are ignored and `self` is used unmodified.
    fn with_params(&self, _params: &BTreeMap<String, Value>) -> Option<Box<dyn Io>> {
        None
    }
}
