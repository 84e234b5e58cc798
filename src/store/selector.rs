use ethers::providers::{Http, JsonRpcClient, Ws};
use futures::stream::{self, Stream};
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::store::GatewaySnapshot;

type SelectorFn<T, H, S> = Box<dyn Fn(&GatewaySnapshot<H, S>) -> T + Send + Sync>;

/// View over one slice of the gateway state.
///
/// Wakes only when the selected value changes, so a consumer watching the
/// balance is not disturbed by error message updates.
pub struct Selected<T, H = Http, S = Ws>
where
    H: JsonRpcClient,
    S: JsonRpcClient,
{
    rx: watch::Receiver<GatewaySnapshot<H, S>>,
    selector: SelectorFn<T, H, S>,
    current: T,
}

impl<T, H, S> Selected<T, H, S>
where
    T: Clone + PartialEq + Send + 'static,
    H: JsonRpcClient + 'static,
    S: JsonRpcClient + 'static,
{
    pub(crate) fn new<F>(mut rx: watch::Receiver<GatewaySnapshot<H, S>>, selector: F) -> Self
    where
        F: Fn(&GatewaySnapshot<H, S>) -> T + Send + Sync + 'static,
    {
        let current = selector(&rx.borrow_and_update());
        Self {
            rx,
            selector: Box::new(selector),
            current,
        }
    }

    /// Last value observed
    pub fn get(&self) -> &T {
        &self.current
    }

    /// Waits until the selected value differs from the last one observed.
    pub async fn changed(&mut self) -> Result<T, GatewayError> {
        loop {
            self.rx.changed().await.map_err(|_| GatewayError::Closed)?;
            let next = (self.selector)(&self.rx.borrow_and_update());
            if next != self.current {
                self.current = next.clone();
                return Ok(next);
            }
        }
    }

    /// Stream of distinct values, ending when the store goes away.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        stream::unfold(self, |mut selected| async move {
            match selected.changed().await {
                Ok(value) => Some((value, selected)),
                Err(_) => None,
            }
        })
    }
}
