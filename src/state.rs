// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::SessionIssuer;

#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<SessionIssuer>,
}

impl AppState {
    pub fn new(issuer: SessionIssuer) -> Self {
        Self {
            issuer: Arc::new(issuer),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::issuer::tests::test_issuer;

    pub(crate) fn test_state() -> AppState {
        let (_, issuer) = test_issuer();
        AppState::new(issuer)
    }
}
