//! Per-kind write queues.
//!
//! Each queue is a single-mutex slice: producers push one record at a time,
//! the batched writer takes ownership of the whole batch in O(1) with
//! [`WriteQueue::drain`], so producers never block on a transaction.

use std::sync::Mutex;

use ocap_persistence::{
    NewChatEvent, NewFiredEvent, NewFpsEvent, NewGeneralEvent, NewHitEvent, NewKillEvent,
    NewRadioEvent, NewSoldier, NewSoldierState, NewVehicle, NewVehicleState,
};

/// A mutex-guarded pending batch.
#[derive(Debug)]
pub struct WriteQueue<T> {
    inner: Mutex<Vec<T>>,
}

impl<T> WriteQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, record: T) {
        self.lock().push(record);
    }

    /// Move the entire pending batch out, leaving an empty queue.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Default for WriteQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// All per-kind queues, in the writer's fixed flush order.
#[derive(Debug, Default)]
pub struct WriteQueues {
    pub soldiers: WriteQueue<NewSoldier>,
    pub soldier_states: WriteQueue<NewSoldierState>,
    pub vehicles: WriteQueue<NewVehicle>,
    pub vehicle_states: WriteQueue<NewVehicleState>,
    pub fired: WriteQueue<NewFiredEvent>,
    pub general: WriteQueue<NewGeneralEvent>,
    pub hit: WriteQueue<NewHitEvent>,
    pub kill: WriteQueue<NewKillEvent>,
    pub chat: WriteQueue<NewChatEvent>,
    pub radio: WriteQueue<NewRadioEvent>,
    pub fps: WriteQueue<NewFpsEvent>,
}

impl WriteQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth of every queue, in flush order. Read by the status monitor.
    pub fn depths(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("soldiers", self.soldiers.len()),
            ("soldier_states", self.soldier_states.len()),
            ("vehicles", self.vehicles.len()),
            ("vehicle_states", self.vehicle_states.len()),
            ("fired", self.fired.len()),
            ("general", self.general.len()),
            ("hit", self.hit.len()),
            ("kill", self.kill.len()),
            ("chat", self.chat.len()),
            ("radio", self.radio.len()),
            ("fps", self.fps.len()),
        ]
    }

    pub fn total(&self) -> usize {
        self.depths().iter().map(|(_, n)| n).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_moves_batch_and_empties_queue() {
        let queue: WriteQueue<u32> = WriteQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);

        let batch = queue.drain();
        assert_eq!(batch, vec![1, 2, 3]);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }
}
