use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::Serialize;
use serde::de::DeserializeOwned;

use tracing::{info, warn};

use twinhub::serializer::{CompactJson, PayloadSerializer};

use crate::error::{Error, ErrorKind, Result};

/// Separator between the component and the command in a command name.
pub const COMPONENT_SEPARATOR: char = '*';

/// Status of a successful command.
pub const STATUS_OK: u16 = 200;
/// Status of a command whose payload cannot be deserialized.
pub const STATUS_BAD_REQUEST: u16 = 400;
/// Status of an unknown command.
pub const STATUS_NOT_FOUND: u16 = 404;
/// Status of a command whose result cannot be serialized.
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// A command invoked by the service on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    component: Option<String>,
    command: String,
    payload: String,
}

impl CommandRequest {
    /// Creates a [`CommandRequest`] from the name received from the service
    /// and the request payload.
    ///
    /// A command of a component is named `component*command`.
    #[must_use]
    pub fn new(name: &str, payload: impl Into<String>) -> Self {
        let (component, command) = match name.split_once(COMPONENT_SEPARATOR) {
            Some((component, command)) if !component.is_empty() => {
                (Some(component.to_owned()), command)
            }
            Some((_, command)) => (None, command),
            None => (None, name),
        };

        Self {
            component,
            command: command.into(),
            payload: payload.into(),
        }
    }

    /// Returns the component name, [`None`] for the root interface.
    #[must_use]
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    /// Returns the command name.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the request payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    fn display_name(&self) -> String {
        match &self.component {
            Some(component) => format!("{component}{COMPONENT_SEPARATOR}{}", self.command),
            None => self.command.clone(),
        }
    }
}

/// The result returned by a command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply<T> {
    status: u16,
    payload: T,
}

impl<T> CommandReply<T> {
    /// Creates a [`CommandReply`] with a [`STATUS_OK`] status.
    #[must_use]
    pub const fn ok(payload: T) -> Self {
        Self::new(STATUS_OK, payload)
    }

    /// Creates a [`CommandReply`] with the given status.
    #[must_use]
    pub const fn new(status: u16, payload: T) -> Self {
        Self { status, payload }
    }
}

/// The response sent back to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    status: u16,
    payload: String,
    content_type: &'static str,
}

impl CommandResponse {
    fn serialize<S, T>(serializer: &S, status: u16, payload: &T) -> Self
    where
        S: PayloadSerializer,
        T: Serialize + ?Sized,
    {
        match serializer.serialize(payload) {
            Ok(payload) => Self {
                status,
                payload,
                content_type: serializer.content_type(),
            },
            Err(e) => Self::error(
                serializer,
                STATUS_INTERNAL_ERROR,
                &format!("Unable to serialize the command result: {}", e.description()),
            ),
        }
    }

    fn error<S: PayloadSerializer>(serializer: &S, status: u16, description: &str) -> Self {
        Self {
            status,
            // A string always serializes.
            payload: serializer
                .serialize(description)
                .unwrap_or_else(|_| format!("{description:?}")),
            content_type: serializer.content_type(),
        }
    }

    /// Returns the response status.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the serialized response payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Returns the content type of the payload.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.content_type
    }
}

type CommandFuture<'a> = Pin<Box<dyn Future<Output = CommandResponse> + Send + 'a>>;

trait CommandHandler<S>: Send + Sync {
    fn key(&self) -> (&str, Option<&str>);

    fn invoke<'a>(&'a self, serializer: &'a S, request: &'a CommandRequest) -> CommandFuture<'a>;
}

struct TypedCommand<T, U, F> {
    command: String,
    component: Option<String>,
    handler: F,
    types: PhantomData<fn(T) -> U>,
}

impl<S, T, U, F, Fut> CommandHandler<S> for TypedCommand<T, U, F>
where
    S: PayloadSerializer,
    T: DeserializeOwned,
    U: Serialize + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = CommandReply<U>> + Send + 'static,
{
    fn key(&self) -> (&str, Option<&str>) {
        (&self.command, self.component.as_deref())
    }

    fn invoke<'a>(&'a self, serializer: &'a S, request: &'a CommandRequest) -> CommandFuture<'a> {
        // A command without a payload receives `null`.
        let payload = match request.payload().trim() {
            "" => "null",
            payload => payload,
        };

        let input = match serializer.deserialize::<T>(payload) {
            Ok(input) => (self.handler)(input),
            Err(e) => {
                let description = format!(
                    "Invalid payload for command `{}`: {}",
                    request.display_name(),
                    e.description()
                );
                warn!("{description}");
                return Box::pin(std::future::ready(CommandResponse::error(
                    serializer,
                    STATUS_BAD_REQUEST,
                    &description,
                )));
            }
        };

        Box::pin(async move {
            let reply = input.await;
            CommandResponse::serialize(serializer, reply.status, &reply.payload)
        })
    }
}

/// Dispatches the commands invoked by the service to the handlers of a
/// device.
///
/// Every command is answered: an unknown command with a
/// [`STATUS_NOT_FOUND`] status, a command whose payload cannot be
/// deserialized with a [`STATUS_BAD_REQUEST`] status, and any other command
/// with the status chosen by its handler.
pub struct CommandDispatcher<S = CompactJson>
where
    S: PayloadSerializer,
{
    serializer: S,
    handlers: Vec<Box<dyn CommandHandler<S>>>,
}

impl<S> std::fmt::Debug for CommandDispatcher<S>
where
    S: PayloadSerializer,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for handler in &self.handlers {
            list.entry(&handler.key());
        }
        list.finish()
    }
}

impl Default for CommandDispatcher<CompactJson> {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher<CompactJson> {
    /// Creates a [`CommandDispatcher`] with the [`CompactJson`] serializer.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::with_serializer(CompactJson)
    }
}

impl<S> CommandDispatcher<S>
where
    S: PayloadSerializer,
{
    /// Creates a [`CommandDispatcher`] with the given serializer.
    #[must_use]
    pub const fn with_serializer(serializer: S) -> Self {
        Self {
            serializer,
            handlers: Vec::new(),
        }
    }

    /// Registers the handler of a command.
    ///
    /// An empty component addresses the root interface.
    ///
    /// # Errors
    ///
    /// A handler is already registered for the same command.
    pub fn command<T, U, F, Fut>(
        mut self,
        name: &str,
        component: Option<&str>,
        handler: F,
    ) -> Result<Self>
    where
        T: DeserializeOwned + 'static,
        U: Serialize + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandReply<U>> + Send + 'static,
    {
        let component = component.filter(|component| !component.is_empty());
        if self.handlers.iter().any(|h| h.key() == (name, component)) {
            return Err(Error::new(
                ErrorKind::DuplicateHandler,
                format!(
                    "Command `{name}` of component `{}` already has a handler",
                    component.unwrap_or("root")
                ),
            ));
        }

        info!(
            "Handler registered for command `{name}` of component `{}`",
            component.unwrap_or("root")
        );
        self.handlers.push(Box::new(TypedCommand {
            command: name.into(),
            component: component.map(String::from),
            handler,
            types: PhantomData,
        }));

        Ok(self)
    }

    /// Returns the payload serializer.
    #[must_use]
    pub const fn serializer(&self) -> &S {
        &self.serializer
    }

    /// Runs the handler of a command and builds its response.
    pub async fn dispatch(&self, request: &CommandRequest) -> CommandResponse {
        let Some(handler) = self
            .handlers
            .iter()
            .find(|h| h.key() == (request.command(), request.component()))
        else {
            let description = format!("Unknown command `{}`", request.display_name());
            warn!("{description}");
            return CommandResponse::error(&self.serializer, STATUS_NOT_FOUND, &description);
        };

        let response = handler.invoke(&self.serializer, request).await;
        info!(
            "Command `{}` answered with status {}",
            request.display_name(),
            response.status()
        );
        response
    }
}
