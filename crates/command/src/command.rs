use async_trait::async_trait;
use rollback_common::CommandId;
use std::error::Error;
use std::fmt;

/// A single reversible transition of a managed state `S`.
///
/// `execute` mutates the state and keeps whatever it needs to reverse itself.
/// `undo` restores the exact prior value from that retained data.
///
/// Implementations must:
/// - validate before mutating, so a failed `execute` leaves `state` untouched;
/// - derive the forward transition only from `state` and the command's own
///   parameters, since redo calls `execute` again rather than replaying a
///   cached result;
/// - restore a value equal to the pre-execute state on `undo`.
///
/// Both methods may await (for example an authoritative remote check). The
/// state is borrowed for the whole call, so nothing else can observe or
/// mutate it while a command is suspended.
#[async_trait]
pub trait Command<S>: Send
where
    S: Send,
{
    /// Identity for logs and traces.
    fn id(&self) -> CommandId;

    /// Short human-readable name of the command kind.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    async fn execute(&mut self, state: &mut S) -> Result<(), CommandFailure>;

    async fn undo(&mut self, state: &mut S) -> Result<(), CommandFailure>;
}

/// Error raised from inside a command body.
///
/// Each command domain brings its own error type and converts it with
/// [`CommandFailure::new`]; [`CommandFailure::downcast_ref`] recovers it.
pub struct CommandFailure(Box<dyn Error + Send + Sync + 'static>);

impl CommandFailure {
    pub fn new(err: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self(err.into())
    }

    /// Failure carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }

    /// Attempt to recover the concrete error raised by the command.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    pub fn into_inner(self) -> Box<dyn Error + Send + Sync + 'static> {
        self.0
    }
}

impl fmt::Debug for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Error for CommandFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}
