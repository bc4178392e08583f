use alloc::format;
use alloc::string::String;

use log::{info, warn};

use serde::Serialize;

use crate::ack::AckCode;
use crate::convention::PropertyConvention;
use crate::desired::DesiredPropertySet;
use crate::error::{Error, ErrorKind, Result};
use crate::patch::{PropertyPatch, component_name};
use crate::serializer::PayloadSerializer;

/// State of a writable-property exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// No desired value has been acknowledged yet.
    Idle,
    /// The receipt of a desired value has been acknowledged and the device
    /// is applying it.
    Pending {
        /// Version of the desired-property set being applied.
        version: i64,
    },
    /// The exchange is closed.
    Terminal {
        /// Final acknowledgement code.
        code: AckCode,
        /// Version of the desired-property set which has been answered.
        version: i64,
    },
}

/// A writable-property exchange.
///
/// Tracks a single property of a single component through
/// `Idle → Pending → Terminal`, guaranteeing that the terminal
/// acknowledgement carries the same version as the pending one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritablePropertyExchange {
    property: String,
    component: Option<String>,
    state: ExchangeState,
}

impl WritablePropertyExchange {
    /// Creates an idle [`WritablePropertyExchange`].
    #[must_use]
    pub fn new(property: impl Into<String>, component: Option<&str>) -> Self {
        Self {
            property: property.into(),
            component: component_name(component).map(String::from),
            state: ExchangeState::Idle,
        }
    }

    /// Returns the property name.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Returns the component name.
    ///
    /// If [`None`], the property belongs to the root interface.
    #[must_use]
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    /// Returns the current [`ExchangeState`].
    #[must_use]
    pub const fn state(&self) -> ExchangeState {
        self.state
    }

    /// Acknowledges the receipt of a desired value with an
    /// [`AckCode::InProgress`] code and the desired-set version.
    ///
    /// Starts a new exchange from an idle state or from a terminal state
    /// answering an older version.
    ///
    /// # Errors
    ///
    /// The exchange is pending, or it has already answered the same or a
    /// newer version.
    pub fn acknowledge<S, T>(
        &mut self,
        convention: &PropertyConvention<S>,
        desired: &DesiredPropertySet,
        value: &T,
    ) -> Result<PropertyPatch>
    where
        S: PayloadSerializer,
        T: Serialize + ?Sized,
    {
        let version = desired.version();
        match self.state {
            ExchangeState::Idle => {}
            ExchangeState::Terminal {
                version: answered, ..
            } if answered < version => {}
            state => {
                let action = format!("acknowledge version {version} of");
                return Err(self.transition_error(state, &action));
            }
        }

        let patch = convention.build_ack(
            &self.property,
            value,
            AckCode::InProgress,
            version,
            None,
            self.component(),
        )?;

        info!(
            "Property `{}` pending with version {version}",
            self.property
        );
        self.state = ExchangeState::Pending { version };

        Ok(patch)
    }

    /// Closes a pending exchange with a terminal code, reusing the
    /// pending version.
    ///
    /// # Errors
    ///
    /// The exchange is not pending or the code is not terminal.
    pub fn complete<S, T>(
        &mut self,
        convention: &PropertyConvention<S>,
        code: AckCode,
        value: &T,
        description: Option<&str>,
    ) -> Result<PropertyPatch>
    where
        S: PayloadSerializer,
        T: Serialize + ?Sized,
    {
        let ExchangeState::Pending { version } = self.state else {
            return Err(self.transition_error(self.state, "complete"));
        };

        if !code.is_terminal() {
            return Err(Error::new(
                ErrorKind::InvalidTransition,
                format!("`{code}` does not close the exchange of `{}`", self.property),
            ));
        }

        let patch = convention.build_ack(
            &self.property,
            value,
            code,
            version,
            description,
            self.component(),
        )?;

        info!(
            "Property `{}` closed with {code} for version {version}",
            self.property
        );
        self.state = ExchangeState::Terminal { code, version };

        Ok(patch)
    }

    /// Rejects a malformed desired value, moving an idle exchange directly
    /// to a terminal [`AckCode::BadRequest`] state.
    ///
    /// # Errors
    ///
    /// The exchange is not idle and it has not answered an older version.
    pub fn reject<S, T>(
        &mut self,
        convention: &PropertyConvention<S>,
        version: i64,
        value: &T,
        description: &str,
    ) -> Result<PropertyPatch>
    where
        S: PayloadSerializer,
        T: Serialize + ?Sized,
    {
        match self.state {
            ExchangeState::Idle => {}
            ExchangeState::Terminal {
                version: answered, ..
            } if answered < version => {}
            state => {
                let action = format!("reject version {version} of");
                return Err(self.transition_error(state, &action));
            }
        }

        let patch = convention.build_ack(
            &self.property,
            value,
            AckCode::BadRequest,
            version,
            Some(description),
            self.component(),
        )?;

        warn!(
            "Property `{}` rejected for version {version}: {description}",
            self.property
        );
        self.state = ExchangeState::Terminal {
            code: AckCode::BadRequest,
            version,
        };

        Ok(patch)
    }

    fn transition_error(&self, state: ExchangeState, action: &str) -> Error {
        Error::new(
            ErrorKind::InvalidTransition,
            format!(
                "Cannot {action} property `{}` from state {state:?}",
                self.property
            ),
        )
    }
}
