use crate::error::{constants, ProtocolError, Result};
use crate::protocol::connection::LinkEvent;
use crate::schema::{Namespace, TypeDescriptor, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

type HandlerFn = dyn Fn(&Value, bool) -> Result<()> + Send + Sync + 'static;

struct Route {
    descriptor: TypeDescriptor,
    handler: Box<HandlerFn>,
}

/// Routes reassembled messages by tag, decoding each payload with the
/// descriptor registered for that tag before calling its handler.
/// Handlers receive the decoded value and whether it arrived encrypted.
pub struct Dispatcher {
    routes: Arc<RwLock<HashMap<u8, Route>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register<F>(&self, tag: u8, descriptor: TypeDescriptor, handler: F) -> Result<()>
    where
        F: Fn(&Value, bool) -> Result<()> + Send + Sync + 'static,
    {
        let mut routes = self
            .routes
            .write()
            .map_err(|_| ProtocolError::Internal(constants::ERR_DISPATCHER_LOCK.into()))?;

        routes.insert(
            tag,
            Route {
                descriptor,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Register a handler for the type at `path` in a compiled schema
    pub fn register_type<F>(&self, tag: u8, schema: &Namespace, path: &str, handler: F) -> Result<()>
    where
        F: Fn(&Value, bool) -> Result<()> + Send + Sync + 'static,
    {
        self.register(tag, schema.type_descriptor(path)?, handler)
    }

    pub fn is_registered(&self, tag: u8) -> bool {
        self.routes
            .read()
            .map(|routes| routes.contains_key(&tag))
            .unwrap_or(false)
    }

    /// Encode `value` with the descriptor registered for `tag`
    pub fn encode(&self, tag: u8, value: &Value) -> Result<Vec<u8>> {
        let routes = self
            .routes
            .read()
            .map_err(|_| ProtocolError::Internal(constants::ERR_DISPATCHER_LOCK.into()))?;

        routes
            .get(&tag)
            .ok_or(ProtocolError::UnknownTag(tag))
            .and_then(|route| route.descriptor.encode_to_vec(value))
    }

    pub fn dispatch(&self, tag: u8, payload: &[u8], encrypted: bool) -> Result<()> {
        let routes = self
            .routes
            .read()
            .map_err(|_| ProtocolError::Internal(constants::ERR_DISPATCHER_LOCK.into()))?;

        let route = routes.get(&tag).ok_or(ProtocolError::UnknownTag(tag))?;
        let value = route.descriptor.decode_slice(payload)?;
        (route.handler)(&value, encrypted)
    }

    /// Dispatch one link event; pending notifications are ignored
    pub fn dispatch_event(&self, event: &LinkEvent) -> Result<()> {
        match event {
            LinkEvent::Message {
                tag,
                payload,
                encrypted,
            } => self.dispatch(*tag, payload, *encrypted),
            LinkEvent::EncryptedPending => Ok(()),
        }
    }

    /// Drain a connection's events until the connection is gone.
    /// Failures are logged and do not stop the loop.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<LinkEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.dispatch_event(&event) {
                warn!(error = %e, "Dispatch failed");
            }
        }
        debug!("Event channel closed");
    }
}
