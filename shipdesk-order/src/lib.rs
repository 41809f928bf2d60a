pub mod lifecycle;
pub mod orchestrator;
pub mod reconcile;

pub use lifecycle::{apply_transition, LifecycleError, TransitionOutcome, TransitionSource};
pub use orchestrator::{
    CancelOutcome, CarrierQuote, OrchestratorError, ShipOutcome, ShipmentOrchestrator,
    ShippingSettings,
};
pub use reconcile::{StatusPush, WebhookReconciler};
