//! Display side of the bridge, owned by the GUI thread
//!
//! - [`DisplayDispatcher`] applies [`UiOperation`]s to software canvases
//! - [`DisplaySession`] ties a dispatcher to a shell [`ProtocolService`],
//!   handles the worker's wake-ups and forwards widget input
//! - [`ScaleGeometry`] maps the desktop into a scaled widget
//!
//! [`UiOperation`]: crate::ui::UiOperation

pub mod canvas;
pub mod dispatcher;
pub mod scale;
pub mod service;
pub mod session;

pub use canvas::{client_color, rop3, to_argb, Canvas};
pub use dispatcher::DisplayDispatcher;
pub use scale::ScaleGeometry;
pub use service::{HeadlessService, PointerState, ProtocolService, ProtocolSignal};
pub use session::{DisplaySession, Frame};
