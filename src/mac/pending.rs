//! The transactions a coordinator keeps for devices that will ask for them

use arraydeque::ArrayDeque;

use super::state::OutgoingFrame;
use crate::{
    consts::PENDING_QUEUE_CAPACITY,
    time::Instant,
    wire::{Address, AddressExt},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub msdu_handle: u8,
    pub frame: OutgoingFrame,
    pub expiry: Instant,
}

impl PendingTransaction {
    fn is_for(&self, device: &Address) -> bool {
        self.frame
            .destination
            .is_some_and(|destination| destination.same_device(device))
    }
}

#[derive(Debug)]
pub struct PendingQueue {
    transactions: ArrayDeque<PendingTransaction, PENDING_QUEUE_CAPACITY>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self {
            transactions: ArrayDeque::new(),
        }
    }

    /// Store a transaction. It's given back when the queue is full.
    pub fn push(&mut self, transaction: PendingTransaction) -> Result<(), PendingTransaction> {
        self.transactions
            .push_back(transaction)
            .map_err(|e| e.element)
    }

    pub fn has_pending_for(&self, device: &Address) -> bool {
        self.transactions.iter().any(|t| t.is_for(device))
    }

    /// Take the oldest transaction for the device
    pub fn take_for(&mut self, device: &Address) -> Option<PendingTransaction> {
        let index = self.transactions.iter().position(|t| t.is_for(device))?;
        self.transactions.remove(index)
    }

    /// Remove the transaction with the handle, returns false if there is none
    pub fn purge(&mut self, msdu_handle: u8) -> bool {
        match self
            .transactions
            .iter()
            .position(|t| t.msdu_handle == msdu_handle)
        {
            Some(index) => self.transactions.remove(index).is_some(),
            None => false,
        }
    }

    /// Take the oldest transaction that expired at `now`
    pub fn take_expired(&mut self, now: Instant) -> Option<PendingTransaction> {
        let index = self.transactions.iter().position(|t| t.expiry <= now)?;
        self.transactions.remove(index)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}
