//! Input collaborator.
//!
//! The simulation only asks whether a key is held. A windowing backend would
//! implement [`InputSource`] over its own key state; headless runs and tests
//! use [`KeyState`].

use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
}

impl Key {
    fn bit(self) -> u8 {
        match self {
            Key::Up => 1,
            Key::Down => 1 << 1,
            Key::Left => 1 << 2,
            Key::Right => 1 << 3,
        }
    }
}

/// A pollable key-state query.
pub trait InputSource {
    fn is_pressed(&self, key: Key) -> bool;
}

impl<I: InputSource + ?Sized> InputSource for Rc<I> {
    fn is_pressed(&self, key: Key) -> bool {
        (**self).is_pressed(key)
    }
}

/// Held keys, settable from outside the simulation through a shared `Rc`.
#[derive(Debug, Default)]
pub struct KeyState {
    held: Cell<u8>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, key: Key) {
        self.held.set(self.held.get() | key.bit());
    }

    pub fn release(&self, key: Key) {
        self.held.set(self.held.get() & !key.bit());
    }

    pub fn release_all(&self) {
        self.held.set(0);
    }
}

impl InputSource for KeyState {
    fn is_pressed(&self, key: Key) -> bool {
        self.held.get() & key.bit() != 0
    }
}
