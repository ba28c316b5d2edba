//! Error taxonomy shared across the workspace.
//!
//! Each failure mode gets its own typed error; [`HubError`] is the umbrella
//! that layers convert into via `#[from]`. Lifecycle-hook failures are
//! contained at the supervisor boundary and only ever surface as a `Failed`
//! plugin state plus a logged cause — they never cross into unrelated code
//! paths as panics.

use std::time::Duration;

/// Umbrella error for all hub operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A subscription pattern failed to compile.
    #[error(transparent)]
    InvalidPattern(#[from] InvalidPatternError),

    /// A device or plugin id did not resolve.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The owning plugin is not in the `Running` state.
    #[error(transparent)]
    Unavailable(#[from] UnavailableError),

    /// The device rejected or failed to execute a command.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A refresh/confirmation did not arrive in time.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// A plugin lifecycle hook failed.
    #[error(transparent)]
    Lifecycle(#[from] PluginLifecycleError),

    /// A plugin descriptor failed validation at registration time.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// A subscription pattern that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPatternError {
    /// A segment between separators was empty.
    #[error("pattern {pattern:?} contains an empty segment")]
    EmptySegment {
        /// The offending pattern text.
        pattern: String,
    },
    /// `#` appeared anywhere but the final token.
    #[error("pattern {pattern:?} uses '#' in a non-terminal position")]
    NonTerminalHash {
        /// The offending pattern text.
        pattern: String,
    },
}

/// A lookup that did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    /// Human-readable entity kind (`"Device"`, `"Plugin"`, …).
    pub entity: &'static str,
    /// The id that was looked up.
    pub id: String,
}

/// The plugin owning a device is not able to serve commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("plugin {plugin_id} is not running (state: {state})")]
pub struct UnavailableError {
    /// The plugin that owns the device.
    pub plugin_id: String,
    /// Its current lifecycle state, rendered for display.
    pub state: String,
}

/// A device-level command failure, as reported by the plugin.
///
/// A bad command is a user-visible failure, not a plugin failure — it never
/// changes the plugin's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command {command:?} failed for device {device_id}: {message}")]
pub struct CommandError {
    /// Target device.
    pub device_id: String,
    /// The command that failed.
    pub command: String,
    /// The plugin's message.
    pub message: String,
}

/// An awaited confirmation did not arrive within the deadline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("timed out after {timeout:?} waiting for {operation}")]
pub struct TimeoutError {
    /// What was being waited for.
    pub operation: String,
    /// The deadline that elapsed.
    pub timeout: Duration,
}

/// A plugin lifecycle hook raised an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("plugin {plugin_id} failed during {hook}: {message}")]
pub struct PluginLifecycleError {
    /// The plugin whose hook failed.
    pub plugin_id: String,
    /// Which hook failed (`initialize`, `start`, `stop`).
    pub hook: &'static str,
    /// The captured cause.
    pub message: String,
}

/// A plugin descriptor rejected before any lifecycle hook ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    /// The `id` field was missing or empty.
    #[error("plugin descriptor is missing an id")]
    MissingId,
    /// The `module` field was missing or empty.
    #[error("plugin descriptor {id:?} is missing a module reference")]
    MissingModule {
        /// Descriptor id.
        id: String,
    },
    /// A plugin with the same id is already registered.
    #[error("plugin id {id:?} is already registered")]
    DuplicateId {
        /// Descriptor id.
        id: String,
    },
}
