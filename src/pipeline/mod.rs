//! Pipeline profiles and the coordinator that runs them.

pub mod coordinator;
pub mod escalation;
pub mod events;
pub mod profiles;
pub mod result;

pub use coordinator::{Coordinator, CoordinatorOptions};
pub use escalation::{
    EscalationDecision, EscalationHeuristic, EscalationPolicy, RouteAssessment,
    TextAndDetailHeuristic, DEFAULT_ESCALATION_SIGNAL,
};
pub use events::{EventBus, PipelineEvent};
pub use profiles::{EscalationMode, PipelineCatalog, PipelineProfile};
pub use result::{ImageProfile, RunNote};
