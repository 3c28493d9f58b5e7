//! Mock model renderer for testing
//!
//! Records the materials applied to each model and can be told to fail at
//! either step, without a GPU.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::ModelRenderer;
use crate::catalog::PbrHints;
use crate::error::RenderError;

/// Counter for generating unique model IDs
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Model handle produced by [`MockRenderer`]
#[derive(Clone, Debug, PartialEq)]
pub struct MockModel {
    pub id: u64,
    pub path: String,
}

#[derive(Debug, Default)]
struct MockRendererState {
    fail_load: bool,
    context_lost: bool,
    applied: Vec<(u64, PbrHints)>,
}

/// In-memory [`ModelRenderer`]
#[derive(Clone, Debug, Default)]
pub struct MockRenderer {
    state: Arc<RwLock<MockRendererState>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every model load fail
    pub fn fail_loads(&self) {
        self.state.write().fail_load = true;
    }

    /// Make material application report a lost context
    pub fn lose_context(&self) {
        self.state.write().context_lost = true;
    }

    /// Every `(model id, hints)` applied so far
    pub fn applied(&self) -> Vec<(u64, PbrHints)> {
        self.state.read().applied.clone()
    }
}

#[async_trait]
impl ModelRenderer for MockRenderer {
    type Model = MockModel;

    async fn load_model(&self, path: &str) -> Result<MockModel, RenderError> {
        if self.state.read().fail_load {
            return Err(RenderError::ModelLoad(format!("cannot parse {path}")));
        }
        Ok(MockModel {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            path: path.to_string(),
        })
    }

    fn apply_material(&self, model: &MockModel, hints: &PbrHints) -> Result<(), RenderError> {
        let mut state = self.state.write();
        if state.context_lost {
            return Err(RenderError::ContextLost);
        }
        state.applied.push((model.id, *hints));
        Ok(())
    }

    fn renderer_name(&self) -> &'static str {
        "Mock"
    }
}
