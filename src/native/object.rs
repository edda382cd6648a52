//! Native object that reports its own lifecycle on the host console

use tracing::warn;

use crate::errors::NativeFault;
use crate::host::{Host, Interpreter};

pub struct TracedObject<'h> {
    host: &'h Interpreter,
    id: u64,
}

impl<'h> TracedObject<'h> {
    pub fn new(host: &'h Interpreter) -> Self {
        let id = host.next_object_id();
        host.print(&format!("native object #{} is being constructed.", id));
        Self { host, id }
    }

    /// A constructor that always fails, for exercising the native-fault path.
    pub fn failing(host: &'h Interpreter) -> Result<Self, NativeFault> {
        let id = host.next_object_id();
        host.print(&format!("native object #{} failed to construct.", id));
        Err(NativeFault::new(format!(
            "native object #{} could not be constructed",
            id
        )))
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TracedObject<'_> {
    fn drop(&mut self) {
        // A raw host transfer would jump straight over this frame.
        if self.host.transfer_in_flight() {
            warn!(object = self.id, "destructor bypassed by host transfer");
            self.host.note_bypassed_destructor();
            return;
        }
        self.host
            .print(&format!("native object #{} is being destructed.", self.id));
    }
}
