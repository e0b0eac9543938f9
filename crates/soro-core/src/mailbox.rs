//! Agent mailboxes: the queue an agent's event loop drains.

use tokio::sync::{mpsc, oneshot};

use crate::messages::{Envelope, Payload};

pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// One queued delivery. `reply` is set when the caller is waiting synchronously (HTTP chat);
/// otherwise any reply is relayed back to the envelope's sender.
#[derive(Debug)]
pub struct Inbound {
    pub envelope: Envelope,
    pub reply: Option<oneshot::Sender<Payload>>,
}

impl Inbound {
    pub fn fire_and_forget(envelope: Envelope) -> Self {
        Self { envelope, reply: None }
    }

    pub fn awaiting_reply(envelope: Envelope) -> (Self, oneshot::Receiver<Payload>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                envelope,
                reply: Some(tx),
            },
            rx,
        )
    }
}

pub type MailboxSender = mpsc::Sender<Inbound>;
pub type MailboxReceiver = mpsc::Receiver<Inbound>;

pub fn mailbox(capacity: usize) -> (MailboxSender, MailboxReceiver) {
    mpsc::channel(capacity)
}
