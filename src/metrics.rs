use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Operation {
    Manifests,
    Layers,
    Detail,
    Versions,
    Files,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Ok,
    Validation,
    NotFound,
    Cancelled,
    Internal,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub operation: Operation,
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Default)]
pub struct ResolverMetrics {
    pub requests: Family<RequestLabels, Counter>,
}

impl ResolverMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let registry = registry.sub_registry_with_prefix("artifact_resolver");

        let requests = Family::<RequestLabels, Counter>::default();
        registry.register(
            "resolver_requests",
            "Resolution requests by operation and outcome",
            requests.clone(),
        );

        Self { requests }
    }

    pub fn record(&self, operation: Operation, outcome: Outcome) {
        self.requests
            .get_or_create(&RequestLabels { operation, outcome })
            .inc();
    }

    pub fn count(&self, operation: Operation, outcome: Outcome) -> u64 {
        self.requests
            .get_or_create(&RequestLabels { operation, outcome })
            .get()
    }
}
