mod reconciler;

pub use reconciler::{ReconcileReport, Reconciler};
