//! AsyncDht node.

use std::{net::SocketAddr, thread};

use bytes::Bytes;

use crate::{common::Id, dht::Dht, Error, Result};

impl Dht {
    /// Return an async version of the Dht node.
    pub fn as_async(self) -> AsyncDht {
        AsyncDht(self)
    }
}

#[derive(Debug, Clone)]
/// Async version of the Dht node.
///
/// Every call runs the blocking operation on its own thread, and awaits its
/// result on a channel, so it works with any executor.
pub struct AsyncDht(Dht);

impl AsyncDht {
    // === Getters ===

    /// Returns the id of this node.
    pub fn id(&self) -> &Id {
        self.0.id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.0.local_addr()
    }

    /// Returns the blocking version of this node.
    pub fn as_sync(&self) -> &Dht {
        &self.0
    }

    // === Public Methods ===

    /// Async version of [Dht::bootstrap].
    pub async fn bootstrap(&self, address: SocketAddr) -> Result<()> {
        self.spawn("bootstrap", move |dht| dht.bootstrap(address))?
            .await
    }

    /// Async version of [Dht::get_value].
    pub async fn get_value(&self, key: Id) -> Result<Bytes> {
        self.spawn("get_value", move |dht| dht.get_value(&key))?
            .await
    }

    /// Async version of [Dht::set_value].
    pub async fn set_value(&self, key: Id, value: Bytes) -> Result<()> {
        self.spawn("set_value", move |dht| dht.set_value(&key, value))?
            .await
    }

    // === Private Methods ===

    fn spawn<T, F>(
        &self,
        name: &str,
        operation: F,
    ) -> Result<impl std::future::Future<Output = Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&Dht) -> Result<T> + Send + 'static,
    {
        let (sender, receiver) = flume::bounded::<Result<T>>(1);
        let dht = self.0.clone();

        thread::Builder::new()
            .name(format!("kvdht-{name}"))
            .spawn(move || {
                let _ = sender.send(operation(&dht));
            })?;

        Ok(async move {
            receiver
                .recv_async()
                .await
                .unwrap_or(Err(Error::Interrupted))
        })
    }
}
