//! Shared state handed to every handler.

use crate::services::{
    graph_client::GraphClient, intake_service::IntakeService, payment::PaymentClient,
};
use std::{path::PathBuf, sync::Arc};

pub struct AppState<B = GraphClient> {
    pub intake: Arc<IntakeService<B>>,
    pub payments: Option<Arc<PaymentClient>>,
    pub spool_dir: Arc<PathBuf>,
}

impl<B> AppState<B> {
    pub fn new(
        intake: IntakeService<B>,
        payments: Option<PaymentClient>,
        spool_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            intake: Arc::new(intake),
            payments: payments.map(Arc::new),
            spool_dir: Arc::new(spool_dir.into()),
        }
    }
}

// Derived Clone would require `B: Clone`.
impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            intake: Arc::clone(&self.intake),
            payments: self.payments.clone(),
            spool_dir: Arc::clone(&self.spool_dir),
        }
    }
}
