//! Catalog Service
//!
//! Thin coordinator between a port feed and a `PortStore`: ingest drains the
//! feed into sequential upserts, listing forwards a page request.
//!
//! An ingest stops at the first error. Records written before it stay
//! written; there is no batch rollback.

use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::engine::Engine;
use crate::error::{PortError, Result};
use crate::model::Port;

/// Persistence used by the catalog service
pub trait PortStore: Send + Sync {
    /// Insert or replace one port
    fn save_port(&self, cancel: &CancelToken, port: &Port) -> Result<()>;

    /// Up to `max_items` ports with ids strictly after `after_id`, ascending.
    /// Zero means the store's default page size.
    fn list_ports(&self, cancel: &CancelToken, after_id: &str, max_items: usize) -> Result<Vec<Port>>;
}

impl PortStore for Engine {
    fn save_port(&self, cancel: &CancelToken, port: &Port) -> Result<()> {
        self.upsert(cancel, &port.id, &port.details)
    }

    fn list_ports(&self, cancel: &CancelToken, after_id: &str, max_items: usize) -> Result<Vec<Port>> {
        self.list(cancel, after_id, max_items)
    }
}

impl<S: PortStore + ?Sized> PortStore for &S {
    fn save_port(&self, cancel: &CancelToken, port: &Port) -> Result<()> {
        (**self).save_port(cancel, port)
    }

    fn list_ports(&self, cancel: &CancelToken, after_id: &str, max_items: usize) -> Result<Vec<Port>> {
        (**self).list_ports(cancel, after_id, max_items)
    }
}

impl<S: PortStore + ?Sized> PortStore for Arc<S> {
    fn save_port(&self, cancel: &CancelToken, port: &Port) -> Result<()> {
        (**self).save_port(cancel, port)
    }

    fn list_ports(&self, cancel: &CancelToken, after_id: &str, max_items: usize) -> Result<Vec<Port>> {
        (**self).list_ports(cancel, after_id, max_items)
    }
}

/// Page request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortsFilter {
    /// Exclusive cursor; empty starts from the first port
    pub after_id: String,
    /// Page size; zero means the store default
    pub max_items: usize,
}

impl PortsFilter {
    pub fn new(after_id: impl Into<String>, max_items: usize) -> Self {
        Self {
            after_id: after_id.into(),
            max_items,
        }
    }
}

pub struct CatalogService<S> {
    store: S,
}

impl<S: PortStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back, e.g. to close it
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Store every record of `feed`, returning how many were written.
    ///
    /// Feed errors (decode failures, cancellation) are returned as they are;
    /// store failures become `StorageOperation`.
    pub fn update_ports<I>(&self, cancel: &CancelToken, feed: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Port>>,
    {
        let mut stored = 0;
        for port in feed {
            let port = port?;
            if let Err(e) = self.store.save_port(cancel, &port) {
                tracing::warn!("ingest stopped at port {:?} after {} records: {}", port.id, stored, e);
                return Err(storage_failure(e));
            }
            stored += 1;
        }

        tracing::info!("ingested {} ports", stored);
        Ok(stored)
    }

    /// One page of ports
    pub fn list_ports(&self, cancel: &CancelToken, filter: &PortsFilter) -> Result<Vec<Port>> {
        self.store
            .list_ports(cancel, &filter.after_id, filter.max_items)
            .map_err(storage_failure)
    }
}

/// Wrap a store error for callers, keeping cancellation distinguishable
fn storage_failure(err: PortError) -> PortError {
    match err {
        PortError::Cancelled => PortError::Cancelled,
        PortError::StorageOperation(message) => PortError::StorageOperation(message),
        other => PortError::StorageOperation(other.to_string()),
    }
}
