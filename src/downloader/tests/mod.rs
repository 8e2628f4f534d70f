use super::test_helpers::*;
use super::*;
use crate::error::{StorageError, TransportError};
use crate::record::Finding;
use std::time::Duration;
use tokio::sync::broadcast;


/// Events already delivered to `rx`
fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn terminal_count(events: &[Event]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

/// Wait for the first event matching `predicate`
async fn wait_for(rx: &mut broadcast::Receiver<Event>, predicate: impl Fn(&Event) -> bool) -> Event {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not received in time")
}
