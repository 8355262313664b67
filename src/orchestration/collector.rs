use crate::datasource::{MarketSource, TimeWindow};
use crate::domain::{sort_oldest_first, Transaction, TxKind};
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Merged history from every source, ready for reconciliation.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    /// Oldest first, so earlier sales claim purchases before later ones.
    pub sales: Vec<Transaction>,
    pub buys: Vec<Transaction>,
}

type Accumulator = Arc<Mutex<Vec<Transaction>>>;

/// Fetch sales and buys from every source concurrently.
///
/// Each source runs one task per direction. A failed fetch is logged and
/// contributes nothing; the call returns only after every task finished.
pub async fn collect(
    sources: &[Arc<dyn MarketSource>],
    sales_window: TimeWindow,
    buys_window: TimeWindow,
) -> Collected {
    let sales: Accumulator = Arc::new(Mutex::new(Vec::new()));
    let buys: Accumulator = Arc::new(Mutex::new(Vec::new()));

    let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(sources.len() * 2);
    for source in sources {
        tasks.push(spawn_fetch(source.clone(), TxKind::Sell, sales_window, sales.clone()));
        tasks.push(spawn_fetch(source.clone(), TxKind::Buy, buys_window, buys.clone()));
    }

    for result in join_all(tasks).await {
        if let Err(e) = result {
            warn!(error = %e, "Fetch task aborted");
        }
    }

    let mut collected = Collected {
        sales: drain(&sales),
        buys: drain(&buys),
    };
    sort_oldest_first(&mut collected.sales);
    sort_oldest_first(&mut collected.buys);

    info!(
        sources = sources.len(),
        sales = collected.sales.len(),
        buys = collected.buys.len(),
        "Fetching complete"
    );
    collected
}

fn spawn_fetch(
    source: Arc<dyn MarketSource>,
    kind: TxKind,
    window: TimeWindow,
    sink: Accumulator,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = source.name().to_string();
        info!(source = %name, kind = %kind, "Fetching history");

        let result = match kind {
            TxKind::Sell => source.get_sales(window.start, window.end).await,
            TxKind::Buy => source.get_buys(window.start, window.end).await,
        };

        match result {
            Ok(txs) => {
                info!(source = %name, kind = %kind, count = txs.len(), "Fetched history");
                match sink.lock() {
                    Ok(mut acc) => acc.extend(txs),
                    Err(poisoned) => poisoned.into_inner().extend(txs),
                }
            }
            Err(e) => {
                warn!(source = %name, kind = %kind, error = %e, "Fetch failed, continuing without it");
            }
        }
    })
}

fn drain(acc: &Accumulator) -> Vec<Transaction> {
    match acc.lock() {
        Ok(mut v) => std::mem::take(&mut *v),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    }
}
