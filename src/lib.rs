pub mod common;
pub mod config;
pub mod error;
pub mod fitting;
pub mod forecast;
pub mod lifecycle;
pub mod logging;
pub mod msg;
pub mod target;

use crate::error::{Result, TargetError};
use crate::lifecycle::LifecycleNode;
use crate::target::evaluator::TargetPredictor;
use crate::target::TargetManager;

/// Core functionality for the simulation target
pub struct TargetCore {
    components: Vec<Box<dyn LifecycleNode>>,
}

impl TargetCore {
    /// Create a new instance of TargetCore
    pub fn new() -> Self {
        TargetCore {
            components: Vec::new(),
        }
    }

    /// Register a component with the core
    pub fn register<T: LifecycleNode + 'static>(&mut self, component: T) {
        self.components.push(Box::new(component));
    }

    /// Initialize all registered components
    pub fn init(&mut self) -> Result<()> {
        for component in &mut self.components {
            component.on_configure()?;
            component.on_activate()?;
        }
        Ok(())
    }

    /// Shutdown all registered components, in reverse registration order
    pub fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;
        for component in self.components.iter_mut().rev() {
            if let Err(e) = component.on_deactivate().and_then(|_| component.on_cleanup()) {
                tracing::error!("Component shutdown failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Get a mutable reference to the registered target manager
    pub fn target_manager_mut(&mut self) -> Option<&mut TargetManager> {
        self.components
            .iter_mut()
            .find_map(|component| component.as_any_mut().downcast_mut::<TargetManager>())
    }

    /// Get a mutable reference to the registered target predictor
    pub fn target_predictor_mut(&mut self) -> Option<&mut TargetPredictor> {
        self.components
            .iter_mut()
            .find_map(|component| component.as_any_mut().downcast_mut::<TargetPredictor>())
    }

    /// Like [`TargetCore::target_manager_mut`], but an error if none is registered
    pub fn require_target_manager(&mut self) -> Result<&mut TargetManager> {
        self.target_manager_mut()
            .ok_or_else(|| TargetError::Lifecycle("no target manager registered".to_string()))
    }
}

impl Default for TargetCore {
    fn default() -> Self {
        Self::new()
    }
}
