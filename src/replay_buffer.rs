use std::collections::VecDeque;

use rand::{Rng, rng};

use crate::error::{Result, RlError};

/// Fixed-capacity FIFO of past experience with uniform sampling.
#[derive(Debug, Clone)]
pub struct ReplayBuffer<T> {
    memory: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> ReplayBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RlError::config("replay buffer capacity must be positive"));
        }
        Ok(ReplayBuffer {
            memory: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Appends a record, evicting the oldest one when full.
    pub fn add(&mut self, record: T) {
        if self.memory.len() >= self.capacity {
            self.memory.pop_front();
        }
        self.memory.push_back(record);
    }

    /// Draws `n` records uniformly at random, with replacement.
    pub fn sample(&self, n: usize) -> Result<Vec<T>> {
        if n > self.memory.len() {
            return Err(RlError::InsufficientData {
                requested: n,
                available: self.memory.len(),
            });
        }
        let mut rng = rng();
        let batch = (0..n)
            .map(|_| self.memory[rng.random_range(0..self.memory.len())].clone())
            .collect();
        Ok(batch)
    }

    pub fn size(&self) -> usize {
        self.memory.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Contents from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.memory.iter()
    }

    pub fn clear(&mut self) {
        self.memory.clear();
    }
}
