//! Keeps everything a MAC tells its higher layer, so tests can look at it afterwards

use std::vec::Vec;

use crate::{
    sap::{
        beacon_notify::BeaconNotifyIndication,
        data::{DataConfirm, DataIndication},
        get::GetConfirm,
        poll::PollConfirm,
        purge::PurgeConfirm,
        reset::ResetConfirm,
        set::SetConfirm,
        start::StartConfirm,
        sync::SyncLossIndication,
        SentFrameReport,
    },
    time::Instant,
};

/// A confirm or indication as the higher layer received it
#[derive(Debug, Clone, PartialEq)]
pub enum Upcall {
    DataConfirm(DataConfirm),
    DataIndication(DataIndication),
    BeaconNotify(BeaconNotifyIndication),
    SyncLoss(SyncLossIndication),
    PollConfirm(PollConfirm),
    SentFrame(SentFrameReport),
    StartConfirm(StartConfirm),
    GetConfirm(GetConfirm),
    SetConfirm(SetConfirm),
    ResetConfirm(ResetConfirm),
    PurgeConfirm(PurgeConfirm),
}

#[derive(Debug, Default)]
pub struct Recorder {
    upcalls: Vec<(Instant, Upcall)>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at: Instant, upcall: Upcall) {
        trace!("Upcall at {}: {:?}", at, upcall);
        self.upcalls.push((at, upcall));
    }

    pub fn upcalls(&self) -> &[(Instant, Upcall)] {
        &self.upcalls
    }

    /// Everything recorded so far, leaving the recorder empty
    pub fn take(&mut self) -> Vec<(Instant, Upcall)> {
        core::mem::take(&mut self.upcalls)
    }

    pub fn data_confirms(&self) -> impl Iterator<Item = &DataConfirm> {
        self.upcalls.iter().filter_map(|(_, upcall)| match upcall {
            Upcall::DataConfirm(confirm) => Some(confirm),
            _ => None,
        })
    }

    pub fn data_indications(&self) -> impl Iterator<Item = &DataIndication> {
        self.upcalls.iter().filter_map(|(_, upcall)| match upcall {
            Upcall::DataIndication(indication) => Some(indication),
            _ => None,
        })
    }

    pub fn beacon_notifications(&self) -> impl Iterator<Item = (Instant, &BeaconNotifyIndication)> {
        self.upcalls.iter().filter_map(|(at, upcall)| match upcall {
            Upcall::BeaconNotify(indication) => Some((*at, indication)),
            _ => None,
        })
    }

    pub fn sync_losses(&self) -> impl Iterator<Item = (Instant, &SyncLossIndication)> {
        self.upcalls.iter().filter_map(|(at, upcall)| match upcall {
            Upcall::SyncLoss(indication) => Some((*at, indication)),
            _ => None,
        })
    }

    pub fn poll_confirms(&self) -> impl Iterator<Item = &PollConfirm> {
        self.upcalls.iter().filter_map(|(_, upcall)| match upcall {
            Upcall::PollConfirm(confirm) => Some(confirm),
            _ => None,
        })
    }

    pub fn sent_frames(&self) -> impl Iterator<Item = &SentFrameReport> {
        self.upcalls.iter().filter_map(|(_, upcall)| match upcall {
            Upcall::SentFrame(report) => Some(report),
            _ => None,
        })
    }
}
