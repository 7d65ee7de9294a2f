//! Extension points: effect hooks, post-processing stages and stream signals.

/// Damage-limited gaussian blur and the stream padding it needs.
pub mod blur;
/// PRE / OVERLAY / POST hook registries.
pub mod hooks;
/// Buffer-to-buffer post-processing chain.
pub mod post;
/// `stream-pre`, `stream-post` and `start-rendering` notifications.
pub mod signals;
