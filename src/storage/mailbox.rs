//! Single-slot command mailbox
//!
//! A capacity-one exchange between the coordinator and one storage node,
//! guarded by a mutex and a condition variable. The slot alternates between
//! three owners: the coordinator while posting, the node while executing and
//! the coordinator again while consuming the response.

use crate::storage::FileId;
use crate::{DfsError, Result};
use parking_lot::{Condvar, Mutex};

/// Command posted to a storage node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Store `payload` under `file_id`
    Upload { file_id: FileId, payload: Vec<u8> },
    /// Return the blob stored under `file_id`, if any
    Download { file_id: FileId },
    /// Same lookup as `Download`; `offset` does not slice the returned blob
    DownloadById { file_id: FileId, offset: u64 },
    /// Report whether a blob is stored under `file_id`
    Locate { file_id: FileId, offset: u64 },
}

impl Request {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Upload { .. } => "upload",
            Request::Download { .. } => "download",
            Request::DownloadById { .. } => "download_by_id",
            Request::Locate { .. } => "locate",
        }
    }

    pub fn file_id(&self) -> FileId {
        match self {
            Request::Upload { file_id, .. }
            | Request::Download { file_id }
            | Request::DownloadById { file_id, .. }
            | Request::Locate { file_id, .. } => *file_id,
        }
    }
}

/// Result published by a storage node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Upload applied; `size` bytes now stored under the id
    Stored { size: u64 },
    /// Download result; empty when this node holds no replica
    Payload(Vec<u8>),
    /// Locate result
    Located(bool),
}

impl Response {
    /// Size of the response payload; a located blob reports a non-zero sentinel
    pub fn payload_size(&self) -> u64 {
        match self {
            Response::Stored { .. } => 0,
            Response::Payload(bytes) => bytes.len() as u64,
            Response::Located(found) => u64::from(*found),
        }
    }

    /// Take ownership of the returned bytes, if there are any
    pub fn into_payload(self) -> Option<Vec<u8>> {
        match self {
            Response::Payload(bytes) if !bytes.is_empty() => Some(bytes),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct SlotState {
    request: Option<Request>,
    response: Option<Response>,
    done: bool,
}

/// Lock-guarded command slot shared by the coordinator and one node
#[derive(Debug)]
pub struct Mailbox {
    owner: String,
    slot: Mutex<SlotState>,
    signal: Condvar,
}

impl Mailbox {
    /// Create an idle mailbox for the node named `owner`
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            slot: Mutex::new(SlotState {
                request: None,
                response: None,
                done: true,
            }),
            signal: Condvar::new(),
        }
    }

    /// Post a command. Fails if the previous command has not finished or its
    /// response has not been taken yet.
    pub fn post(&self, request: Request) -> Result<()> {
        let mut slot = self.slot.lock();
        if !slot.done || slot.request.is_some() || slot.response.is_some() {
            return Err(DfsError::MailboxBusy(self.owner.clone()));
        }
        slot.request = Some(request);
        slot.done = false;
        drop(slot);
        self.signal.notify_all();
        Ok(())
    }

    /// Block until a command is pending and take it (node side)
    pub fn wait_request(&self) -> Request {
        let mut slot = self.slot.lock();
        loop {
            if !slot.done {
                if let Some(request) = slot.request.take() {
                    return request;
                }
            }
            self.signal.wait(&mut slot);
        }
    }

    /// Publish the response and mark the command done (node side)
    pub fn complete(&self, response: Response) {
        let mut slot = self.slot.lock();
        slot.response = Some(response);
        slot.done = true;
        drop(slot);
        self.signal.notify_all();
    }

    /// Block until the posted command is done, then signal again so the node
    /// is released from the contested slot
    pub fn wait_done(&self) {
        let mut slot = self.slot.lock();
        while !slot.done {
            self.signal.wait(&mut slot);
        }
        drop(slot);
        self.signal.notify_all();
    }

    /// Consume the response of the last finished command
    pub fn take_response(&self) -> Option<Response> {
        let mut slot = self.slot.lock();
        if !slot.done {
            return None;
        }
        slot.response.take()
    }

    pub fn is_done(&self) -> bool {
        self.slot.lock().done
    }
}
