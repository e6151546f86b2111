use crate::{
    routes::sse::StudentChange,
    service::{DynStudentService, StudentService},
};
use std::ops::Deref;
use tokio::sync::broadcast::{Receiver, Sender, channel};

const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct StudentState {
    service: DynStudentService,
    change_sender: Sender<StudentChange>,
}

impl StudentState {
    pub fn new(service: DynStudentService) -> Self {
        let (tx, _rx) = channel(CHANGE_FEED_CAPACITY);

        Self {
            service,
            change_sender: tx,
        }
    }

    pub async fn sensible_shutdown(&self) {
        self.service.close().await;
    }

    pub fn subscribe_to_change_feed(&self) -> Receiver<StudentChange> {
        self.change_sender.subscribe()
    }

    pub fn send_change(&self, change: StudentChange) {
        //no subscribers is fine
        let _ = self.change_sender.send(change);
    }
}

impl Deref for StudentState {
    type Target = dyn StudentService + Send + Sync;

    fn deref(&self) -> &Self::Target {
        self.service.as_ref()
    }
}
