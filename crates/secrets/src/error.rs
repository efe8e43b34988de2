// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised while resolving or unwrapping secrets (spec §4.3, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretResolutionError {
    #[error("Error resolving secrets: display-id {display_id} not found in vault")]
    NotFound { display_id: String },

    #[error(
        "Error resolving secrets: display-id {display_id} was minted for transport \
         {minted_for}, but is being used on transport {requested}"
    )]
    TransportBoundary { display_id: String, minted_for: String, requested: String },

    #[error("Error resolving secrets: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
