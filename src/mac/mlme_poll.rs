use heapless::Vec;
use rand_core::RngCore;

use super::{
    state::{OutgoingFrame, TxOrigin, TxQueueElement},
    Environment, Mac,
};
use crate::{
    sap::{
        poll::{PollConfirm, PollRequest},
        Status,
    },
    wire::{self, command::Command, Address, Frame, FrameContent, FrameType},
};

impl<Rng: RngCore> Mac<Rng> {
    /// Ask the coordinator whether it has data for us.
    ///
    /// The outcome arrives through [`crate::sap::UpperLayer::mlme_poll_confirm`].
    pub fn mlme_poll_request(&mut self, env: &mut impl Environment, request: PollRequest) {
        let pan_id = self.mac_pib.pan_id;
        let source = if wire::is_assigned(self.mac_pib.short_address) {
            Address::Short(pan_id, self.mac_pib.short_address)
        } else {
            Address::Extended(pan_id, self.mac_pib.extended_address)
        };

        let mut header = wire::header(
            FrameType::MacCommand,
            self.mac_pib.dsn.peek_next(),
            Some(request.coord_address),
            Some(source),
        );
        header.ack_request = true;

        let frame = Frame {
            header,
            content: FrameContent::Command(Command::DataRequest),
            payload: Vec::new(),
        };

        let frame = match OutgoingFrame::new(&frame) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Could not build the data request: {:?}", e);
                env.mlme_poll_confirm(PollConfirm {
                    status: Status::InvalidParameter,
                });
                return;
            }
        };
        self.mac_pib.dsn.increment();

        let seq = frame.seq;
        let element = TxQueueElement {
            origin: TxOrigin::Poll,
            frame,
        };

        if self.tx_queue.push_back(element).is_err() {
            warn!("No room for the data request");
            self.counters.tx_overflow += 1;
            env.mlme_poll_confirm(PollConfirm {
                status: Status::TransactionOverflow,
            });
            return;
        }

        debug!("Polling the coordinator with data request {}", seq);
        self.counters.tx_enqueued += 1;
        self.check_queue(env);
    }
}
