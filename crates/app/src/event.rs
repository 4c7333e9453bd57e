use std::time::Duration;

use crossterm::event::{self, Event};
use kubedeck_engine::{Msg, Task};
use tokio::sync::mpsc;

pub fn spawn_event_reader(tx: mpsc::UnboundedSender<Event>) {
    tokio::task::spawn_blocking(move || loop {
        if event::poll(Duration::from_millis(50)).unwrap_or(false) {
            if let Ok(ev) = event::read() {
                if tx.send(ev).is_err() {
                    break;
                }
            }
        } else if tx.is_closed() {
            break;
        }
    });
}

/// Run each task on the runtime and feed its message back to the loop.
pub fn spawn_tasks(tasks: Vec<Task>, tx: &mpsc::UnboundedSender<Msg>) {
    for task in tasks {
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(task.await);
        });
    }
}
