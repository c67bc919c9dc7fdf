// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Navigation port.

use std::sync::Mutex;

use super::lock;

pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    /// Force-navigate (full page load in a browser).
    fn navigate(&self, path: &str);
}

/// Navigator that only tracks the current path and every forced navigation.
pub struct MemoryNavigator {
    path: Mutex<String>,
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self {
            path: Mutex::new(initial_path.into()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Paths navigated to, oldest first.
    pub fn history(&self) -> Vec<String> {
        lock(&self.history).clone()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        lock(&self.path).clone()
    }

    fn navigate(&self, path: &str) {
        *lock(&self.path) = path.to_string();
        lock(&self.history).push(path.to_string());
    }
}
