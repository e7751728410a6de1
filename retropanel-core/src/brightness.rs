//! Panel brightness levels.

use std::sync::{Mutex, PoisonError};

use log::info;

use crate::error::DisplayError;
use crate::panel::SharedPanel;

/// Cycles the panel contrast through a fixed sequence of levels.
pub struct Brightness {
    levels: Vec<u8>,
    index: Mutex<usize>,
    panel: SharedPanel,
}

impl Brightness {
    /// Start at the first level of `levels`. Nothing is applied until
    /// [`apply`](Self::apply) or [`cycle`](Self::cycle).
    ///
    /// # Errors
    ///
    /// [`DisplayError::EmptyBrightnessLevels`] if `levels` is empty.
    pub fn new(levels: Vec<u8>, panel: SharedPanel) -> Result<Self, DisplayError> {
        if levels.is_empty() {
            return Err(DisplayError::EmptyBrightnessLevels);
        }
        Ok(Self {
            levels,
            index: Mutex::new(0),
            panel,
        })
    }

    /// Current position in the level sequence.
    pub fn index(&self) -> usize {
        *self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current contrast value.
    pub fn level(&self) -> u8 {
        self.levels[self.index()]
    }

    /// Push the current level to the panel.
    pub fn apply(&self) -> Result<(), DisplayError> {
        let index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        self.set_contrast(self.levels[*index])
    }

    /// Step to the next level, wrapping, and apply it immediately.
    pub fn cycle(&self) -> Result<u8, DisplayError> {
        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        *index = (*index + 1) % self.levels.len();
        let level = self.levels[*index];
        info!("brightness level {} (contrast {})", *index, level);
        self.set_contrast(level)?;
        Ok(level)
    }

    fn set_contrast(&self, level: u8) -> Result<(), DisplayError> {
        self.panel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_contrast(level)
    }
}
