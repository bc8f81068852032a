//! Cloud configuration: document model, extension mapping, reconciliation.

mod document;
mod extensions;
mod reconciler;

pub use document::{CloudConfigDocument, VmExtension};
pub use extensions::{
    extensions_for, extensions_for_all, CF_ROUTER_EXTENSION, CF_SSH_PROXY_EXTENSION,
    CF_TCP_ROUTER_EXTENSION, CONCOURSE_EXTENSION,
};
pub use reconciler::{
    render_merged, BoshCli, CloudConfigReconciler, DirectorAdapter, ReconcileOutcome,
};
