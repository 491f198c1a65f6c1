//! Stream capability contract

use std::sync::Arc;

use crate::Direction;

/// An active audio session that wants to be connected to a route
///
/// Streams are owned by the audio I/O layer. The engine keeps shared
/// references (`Arc<dyn IoStream>`) for as long as the stream asks for
/// routing, and compares them by pointer identity.
pub trait IoStream: Send + Sync {
    /// Direction of the stream
    fn direction(&self) -> Direction;

    /// Returns true for playback streams
    fn is_out(&self) -> bool {
        self.direction().is_out()
    }

    /// Stream needs a dedicated low-latency path
    fn is_direct(&self) -> bool;

    /// Stream is currently running
    fn is_started(&self) -> bool;

    /// Stream has been assigned routing by the policy manager
    fn is_routed_by_policy(&self) -> bool;

    /// Stream was already given a new route during the current cycle
    fn is_new_route_available(&self) -> bool;

    /// Called by a route when it binds (or releases) this stream
    ///
    /// Routes set the flag from [`StreamRoute::set_stream`] so that a stream
    /// is claimed by at most one route per cycle, and clear it again from
    /// [`StreamRoute::reset_availability`].
    ///
    /// [`StreamRoute::set_stream`]: crate::StreamRoute::set_stream
    /// [`StreamRoute::reset_availability`]: crate::StreamRoute::reset_availability
    fn set_new_route_available(&self, available: bool);

    /// Attributes routes match against
    ///
    /// Output flags for playback streams, input source for capture streams.
    fn applicability_mask(&self) -> u32;

    /// Name used in logs
    fn name(&self) -> &str {
        "stream"
    }
}

/// Returns true if both handles refer to the same stream object
pub fn same_stream(a: &Arc<dyn IoStream>, b: &Arc<dyn IoStream>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
