// Application layer: sessions, feed assembly, optimistic mutations and the
// event loop that drives them.

pub mod app;
pub mod contact;
pub mod feed;
pub mod protocol;
pub mod reconciler;
pub mod remote;
pub mod session;
pub mod share;
