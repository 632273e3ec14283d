use std::sync::Arc;

use roost_core::{
  analyzer::Analyzer,
  clock::{Clock, SystemClock},
};
use roost_graph::GraphApi;
use roost_vault::CredentialVault;

/// Everything a handler needs beyond its payload.
///
/// Cloned once per delivery; every field is cheap to clone.
#[derive(Clone)]
pub struct JobContext<S> {
  pub store:    S,
  pub vault:    CredentialVault,
  pub graph:    Arc<GraphApi>,
  pub analyzer: Arc<dyn Analyzer>,
  pub clock:    Arc<dyn Clock>,
}

impl<S> JobContext<S> {
  pub fn new(
    store: S,
    vault: CredentialVault,
    graph: Arc<GraphApi>,
    analyzer: Arc<dyn Analyzer>,
  ) -> Self {
    Self {
      store,
      vault,
      graph,
      analyzer,
      clock: Arc::new(SystemClock),
    }
  }

  /// Swap the time source. Refresh horizons, retention cutoffs, and queue
  /// maintenance all follow it.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }
}
