use parking_lot::Mutex;

/// Index-addressed result slots shared by the tasks of one run
///
/// Every slot starts as `R::default()`. A task writes only the slot for its
/// own item, and the slots are read once, after every task has been joined.
#[derive(Debug)]
pub struct ResultCollector<R> {
    slots: Mutex<Vec<R>>,
}

impl<R: Default> ResultCollector<R> {
    /// Create `len` slots holding the default value
    pub fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, R::default);
        Self {
            slots: Mutex::new(slots),
        }
    }

    /// Store the output for item `index`. Out-of-range writes are ignored.
    pub fn store(&self, index: usize, value: R) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(index) {
            *slot = value;
        }
    }

    /// Move the slots out, leaving the collector empty
    pub fn take(&self) -> Vec<R> {
        std::mem::take(&mut *self.slots.lock())
    }
}
