//! Application state and dependency injection.

use beamgate_access::AccessService;
use beamgate_dispatch::ManagerClient;

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection). Both fields
/// are cheap handles around shared internals, so cloning the state per
/// request costs two reference bumps.
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Debug, Clone)]
pub struct ServiceState {
    access: AccessService,
    manager: ManagerClient,
}

impl ServiceState {
    /// Builds the state from already-wired service handles.
    ///
    /// Construction of the handles themselves (providers, signer, store,
    /// transport worker) happens in the binary, where configuration lives.
    pub fn new(access: AccessService, manager: ManagerClient) -> Self {
        Self { access, manager }
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(access: AccessService);
impl_di!(manager: ManagerClient);
