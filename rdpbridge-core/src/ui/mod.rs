//! Worker-to-GUI rendering hand-off
//!
//! The worker is the only producer of [`UiOperation`]s and the display
//! dispatcher the only consumer. Operations cross the thread boundary in
//! push order through [`ui_queue`], and the GUI loop is woken through a
//! [`GuiWaker`] at most once per pending drain.

mod operation;
mod queue;
mod waker;

pub use operation::{
    ObjectId, ObjectIdAllocator, Region, UiOperation, ROP3_PATCOPY, ROP3_SRCCOPY,
};
pub use queue::{ui_queue, UiConsumer, UiProducer};
pub use waker::{ChannelWaker, GuiWaker};
