//! Result provenance and the observability hook of the data service.

use serde::Serialize;

use crate::config::TransportMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    /// Placeholder data from [`crate::mock_data`].
    Mock,
}

/// A value plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Sourced<T> {
    pub fn live(data: T) -> Self {
        Self {
            data,
            source: DataSource::Live,
        }
    }

    pub fn mock(data: T) -> Self {
        Self {
            data,
            source: DataSource::Mock,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.source == DataSource::Mock
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    CacheHit {
        path: String,
    },
    RequestSucceeded {
        path: String,
        transport: TransportMethod,
    },
    /// The broker failed and the request went direct instead.
    BrokerFallback {
        path: String,
        reason: String,
    },
    MockSubstituted {
        resource: &'static str,
        reason: String,
    },
}

pub trait ServiceObserver: Send + Sync {
    fn record(&self, event: &ServiceEvent);
}
