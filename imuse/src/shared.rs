use crate::driver::{Driver, SoundSource};
use crate::Engine;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Engine handle shared between the timer thread and script callers.
pub struct SharedEngine<D, S>(Arc<Mutex<Engine<D, S>>>);

impl<D, S> Clone for SharedEngine<D, S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<D: Driver, S: SoundSource> SharedEngine<D, S> {
    pub fn new(engine: Engine<D, S>) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Engine<D, S>> {
        self.0.lock()
    }

    pub fn on_timer(&self) {
        self.0.lock().on_timer();
    }

    pub fn do_command(&self, args: [i32; 8]) -> i32 {
        self.0.lock().do_command(args)
    }
}
