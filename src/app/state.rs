use super::{Component, ComponentState, UvcCamOrchestrator};
use std::collections::HashMap;
use tracing::debug;

impl UvcCamOrchestrator {
    pub async fn set_component_state(&self, component: Component, state: ComponentState) {
        let previous = self.component_states.lock().await.insert(component, state);
        if previous != Some(state) {
            debug!("Component '{}' state: {:?} -> {:?}", component, previous, state);
        }
    }

    pub async fn get_component_state(&self, component: Component) -> Option<ComponentState> {
        self.component_states.lock().await.get(&component).copied()
    }

    /// Snapshot of every registered component
    pub async fn get_all_component_states(&self) -> HashMap<Component, ComponentState> {
        self.component_states.lock().await.clone()
    }
}
