pub mod button_state;
pub mod callback;
pub mod content_loader;
pub mod timing;

pub use button_state::{reconcile, SubmitButton};
pub use callback::{dress, PendingInit};
pub use content_loader::{ContentLoader, LoadOutcome, LoadTicket};
pub use timing::{Debounce, Throttle};
