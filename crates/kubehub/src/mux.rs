//! Fan-in of several watch streams into one consumer.

use std::fmt;

use anyhow::{Context, Result};
use futures::StreamExt;
use kspy_core::WatchEvent;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::source::{EventStream, WatchSource, WatchTarget};
use crate::Selector;

/// Merges one stream per target into a single blocking sequence of `(tag, event)`.
///
/// Each stream is pumped by its own task through a one-slot channel, so a slow consumer
/// stalls every source. Events rejected by a target's selector never reach the consumer.
pub struct Multiplexer<T> {
    rx: mpsc::Receiver<(T, WatchEvent)>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T> Multiplexer<T>
where
    T: Clone + fmt::Display + Send + 'static,
{
    /// Open every target before spawning anything: one failed open fails the whole set.
    pub async fn open<S>(source: &S, targets: Vec<(T, WatchTarget)>) -> Result<Self>
    where
        S: WatchSource + ?Sized,
    {
        let mut opened = Vec::with_capacity(targets.len());
        for (tag, target) in targets {
            let stream = source.open(&target).await.with_context(|| format!("cannot watch {target}"))?;
            info!(source = %tag, target = %target, "source attached");
            opened.push((tag, target.selector, stream));
        }
        let (tx, rx) = mpsc::channel(1);
        let tasks = opened
            .into_iter()
            .map(|(tag, selector, stream)| tokio::spawn(forward(tag, selector, stream, tx.clone())))
            .collect();
        Ok(Self { rx, tasks })
    }

    /// Next event from any source; `None` once every source has ended.
    pub async fn next(&mut self) -> Option<(T, WatchEvent)> { self.rx.recv().await }

    pub fn sources(&self) -> usize { self.tasks.len() }
}

impl<T> Drop for Multiplexer<T> {
    fn drop(&mut self) {
        for t in &self.tasks {
            t.abort();
        }
    }
}

async fn forward<T>(tag: T, selector: Selector, mut stream: EventStream, tx: mpsc::Sender<(T, WatchEvent)>)
where
    T: Clone + fmt::Display + Send + 'static,
{
    while let Some(item) = stream.next().await {
        match item {
            Ok(ev) => {
                if !selector.matches(&ev.object) {
                    counter!("kspy_watch_events_filtered_total", 1);
                    continue;
                }
                counter!("kspy_watch_events_total", 1, "source" => tag.to_string());
                if tx.send((tag.clone(), ev)).await.is_err() {
                    debug!(source = %tag, "consumer gone; stopping forwarder");
                    return;
                }
            }
            Err(e) => {
                counter!("kspy_watch_errors_total", 1);
                warn!(source = %tag, error = %e, "watch stream error");
            }
        }
    }
    debug!(source = %tag, "source ended");
}
