//! Frame-delayed command batches.
//!
//! Batches are counted down once per frame and released in the order they
//! were pushed.  Nothing is ever cancelled: a batch released later simply
//! overwrites what earlier commands set.

#[derive(Debug, Clone, PartialEq)]
struct Pending<T> {
    commands: Vec<T>,
    frames_remaining: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeferredQueue<T> {
    pending: Vec<Pending<T>>,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self { pending: Vec::new() }
    }
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `commands` for release on the `frames`-th following tick.  A
    /// delay of zero releases them on the next tick.
    pub fn push(&mut self, commands: Vec<T>, frames: u32) {
        if commands.is_empty() {
            return;
        }
        self.pending.push(Pending {
            commands,
            frames_remaining: frames.max(1),
        });
    }

    /// Put a released batch back in front of the queue, due on the next
    /// tick.  Used when a release could not be delivered.
    pub fn retry(&mut self, commands: Vec<T>) {
        if commands.is_empty() {
            return;
        }
        self.pending.insert(
            0,
            Pending {
                commands,
                frames_remaining: 1,
            },
        );
    }

    /// Count every batch down by one frame and return the commands of the
    /// batches that became due, oldest first.
    pub fn tick(&mut self) -> Vec<T> {
        let mut due = Vec::new();
        let mut waiting = Vec::with_capacity(self.pending.len());
        for mut batch in self.pending.drain(..) {
            batch.frames_remaining -= 1;
            if batch.frames_remaining == 0 {
                due.extend(batch.commands);
            } else {
                waiting.push(batch);
            }
        }
        self.pending = waiting;
        due
    }

    /// Number of batches still waiting.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_after_delay() {
        let mut q = DeferredQueue::new();
        q.push(vec!["open"], 3);
        assert!(q.tick().is_empty());
        assert!(q.tick().is_empty());
        assert_eq!(q.tick(), vec!["open"]);
        assert!(q.is_empty());
    }

    #[test]
    fn releases_in_push_order() {
        let mut q = DeferredQueue::new();
        q.push(vec![1, 2], 2);
        q.push(vec![3], 1);
        q.push(vec![4], 2);
        assert_eq!(q.tick(), vec![3]);
        assert_eq!(q.tick(), vec![1, 2, 4]);
    }

    #[test]
    fn retried_batch_goes_first() {
        let mut q = DeferredQueue::new();
        q.push(vec![1], 1);
        q.push(vec![2], 2);
        let due = q.tick();
        assert_eq!(due, vec![1]);
        q.retry(due);
        assert_eq!(q.len(), 2);
        assert_eq!(q.tick(), vec![1, 2]);
        assert!(q.is_empty());
    }

    #[test]
    fn zero_delay_means_next_tick() {
        let mut q = DeferredQueue::new();
        q.push(vec!['a'], 0);
        assert_eq!(q.len(), 1);
        assert_eq!(q.tick(), vec!['a']);
    }

    #[test]
    fn empty_batches_are_dropped() {
        let mut q: DeferredQueue<u8> = DeferredQueue::new();
        q.push(Vec::new(), 5);
        assert!(q.is_empty());
    }
}
