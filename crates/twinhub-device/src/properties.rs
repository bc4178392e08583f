use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use futures_util::future::join_all;

use serde::Serialize;
use serde::de::DeserializeOwned;

use tokio::sync::Mutex;

use tracing::{debug, info, warn};

use twinhub::ack::AckCode;
use twinhub::convention::PropertyConvention;
use twinhub::desired::DesiredPropertySet;
use twinhub::exchange::{ExchangeState, WritablePropertyExchange};
use twinhub::serializer::{CompactJson, PayloadSerializer};

use crate::error::{Error, ErrorKind, Result};
use crate::reporter::PropertyReporter;

/// Outcome of the action applying a desired value.
///
/// The outcome closes the acknowledgement exchange of the property. A
/// non-terminal code is answered with [`AckCode::BadRequest`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckOutcome<T> {
    code: AckCode,
    value: T,
    description: Option<String>,
}

impl<T> AckOutcome<T> {
    /// Creates an [`AckOutcome`] reporting the applied value with an
    /// [`AckCode::Completed`] code.
    #[must_use]
    pub const fn completed(value: T) -> Self {
        Self::new(AckCode::Completed, value)
    }

    /// Creates an [`AckOutcome`] with the given code.
    #[must_use]
    pub const fn new(code: AckCode, value: T) -> Self {
        Self {
            code,
            value,
            description: None,
        }
    }

    /// Sets a description of the outcome.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Summary of an acknowledgement exchange closed by a
/// [`PropertyDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyAckReport {
    property: String,
    component: Option<String>,
    code: AckCode,
    version: i64,
    description: Option<String>,
}

impl PropertyAckReport {
    fn new(
        exchange: &WritablePropertyExchange,
        code: AckCode,
        version: i64,
        description: Option<String>,
    ) -> Self {
        Self {
            property: exchange.property().into(),
            component: exchange.component().map(String::from),
            code,
            version,
            description,
        }
    }

    /// Returns the property name.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Returns the component name, [`None`] for the root interface.
    #[must_use]
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    /// Returns the terminal code.
    #[must_use]
    pub const fn code(&self) -> AckCode {
        self.code
    }

    /// Returns the acknowledged desired-set version.
    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }

    /// Returns the description of the outcome.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<PropertyAckReport>>> + Send + 'a>>;

trait PropertyHandler<R, S>: Send + Sync
where
    S: PayloadSerializer,
{
    fn key(&self) -> (&str, Option<&str>);

    fn handle<'a>(
        &'a self,
        convention: &'a PropertyConvention<S>,
        reporter: &'a R,
        desired: &'a DesiredPropertySet,
    ) -> HandlerFuture<'a>;
}

struct TypedHandler<T, F> {
    property: String,
    component: Option<String>,
    // Held for the whole exchange, so the reports of one property never
    // interleave.
    exchange: Mutex<WritablePropertyExchange>,
    handler: F,
    value: PhantomData<fn() -> T>,
}

impl<R, S, T, F, Fut> PropertyHandler<R, S> for TypedHandler<T, F>
where
    R: PropertyReporter,
    S: PayloadSerializer,
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = AckOutcome<T>> + Send + 'static,
{
    fn key(&self) -> (&str, Option<&str>) {
        (&self.property, self.component.as_deref())
    }

    fn handle<'a>(
        &'a self,
        convention: &'a PropertyConvention<S>,
        reporter: &'a R,
        desired: &'a DesiredPropertySet,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let Some(raw) = desired.property(&self.property, self.component.as_deref()) else {
                return Ok(None);
            };

            let version = desired.version();
            let mut exchange = self.exchange.lock().await;
            match exchange.state() {
                ExchangeState::Terminal {
                    version: answered, ..
                } if answered >= version => {
                    debug!(
                        "Property `{}` already answered version {answered}",
                        self.property
                    );
                    return Ok(None);
                }
                ExchangeState::Pending { version: pending } => {
                    warn!(
                        "Restarting the interrupted exchange of property `{}` for version {pending}",
                        self.property
                    );
                    *exchange =
                        WritablePropertyExchange::new(&self.property, self.component.as_deref());
                }
                _ => {}
            }

            let value = match convention.serializer().from_value::<T>(raw) {
                Ok(value) => value,
                Err(e) => {
                    let description = format!("Invalid value: {}", e.description());
                    let patch = exchange.reject(convention, version, raw, &description)?;
                    reporter.report(patch).await?;
                    return Ok(Some(PropertyAckReport::new(
                        &exchange,
                        AckCode::BadRequest,
                        version,
                        Some(description),
                    )));
                }
            };

            // The receipt is delivered before the action starts.
            let patch = exchange.acknowledge(convention, desired, &value)?;
            reporter.report(patch).await?;

            let AckOutcome {
                code,
                value,
                description,
            } = (self.handler)(value).await;

            // Only a terminal code closes the exchange.
            let (code, description) = if code.is_terminal() {
                (code, description)
            } else {
                let description = format!("Handler answered with the non-terminal code {code}");
                warn!("Property `{}`: {description}", self.property);
                (AckCode::BadRequest, Some(description))
            };

            let patch = exchange.complete(convention, code, &value, description.as_deref())?;
            reporter.report(patch).await?;

            Ok(Some(PropertyAckReport::new(
                &exchange,
                code,
                version,
                description,
            )))
        })
    }
}

/// Dispatches desired properties to the handlers of a device.
///
/// A handler is registered for each writable property, identified by its
/// name and component. When a desired-property set arrives, every handler
/// whose property is present runs concurrently with the others. For each
/// of them the dispatcher:
///
/// 1. converts the desired value into the handler type, answering a
///    malformed value with an [`AckCode::BadRequest`] acknowledgement
/// 2. reports an [`AckCode::InProgress`] acknowledgement and waits for its
///    delivery
/// 3. runs the handler
/// 4. reports the handler outcome with the same version, or an
///    [`AckCode::BadRequest`] acknowledgement when the handler answered with
///    a non-terminal code
///
/// A desired version already answered for a property is skipped.
pub struct PropertyDispatcher<R, S = CompactJson>
where
    S: PayloadSerializer,
{
    convention: PropertyConvention<S>,
    reporter: R,
    handlers: Vec<Box<dyn PropertyHandler<R, S>>>,
}

impl<R, S> std::fmt::Debug for PropertyDispatcher<R, S>
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

impl<R> PropertyDispatcher<R, CompactJson>
where
    R: PropertyReporter,
{
    /// Creates a [`PropertyDispatcher`] with the default
    /// [`PropertyConvention`].
    #[must_use]
    #[inline]
    pub fn new(reporter: R) -> Self {
        Self::with_convention(PropertyConvention::new(), reporter)
    }
}

impl<R, S> PropertyDispatcher<R, S>
where
    R: PropertyReporter,
    S: PayloadSerializer,
{
    /// Creates a [`PropertyDispatcher`] with the given [`PropertyConvention`].
    #[must_use]
    pub const fn with_convention(convention: PropertyConvention<S>, reporter: R) -> Self {
        Self {
            convention,
            reporter,
            handlers: Vec::new(),
        }
    }

    /// Registers the handler of a writable property.
    ///
    /// An empty component addresses the root interface.
    ///
    /// # Errors
    ///
    /// A handler is already registered for the same property.
    pub fn property<T, F, Fut>(
        mut self,
        name: &str,
        component: Option<&str>,
        handler: F,
    ) -> Result<Self>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AckOutcome<T>> + Send + 'static,
    {
        let component = component.filter(|component| !component.is_empty());
        if self.handlers.iter().any(|h| h.key() == (name, component)) {
            return Err(Error::new(
                ErrorKind::DuplicateHandler,
                format!(
                    "Property `{name}` of component `{}` already has a handler",
                    component.unwrap_or("root")
                ),
            ));
        }

        info!(
            "Handler registered for property `{name}` of component `{}`",
            component.unwrap_or("root")
        );
        self.handlers.push(Box::new(TypedHandler {
            property: name.into(),
            component: component.map(String::from),
            exchange: Mutex::new(WritablePropertyExchange::new(name, component)),
            handler,
            value: PhantomData,
        }));

        Ok(self)
    }

    /// Returns the [`PropertyConvention`] in use.
    #[must_use]
    pub const fn convention(&self) -> &PropertyConvention<S> {
        &self.convention
    }

    /// Returns the [`PropertyReporter`].
    #[must_use]
    pub const fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Dispatches a desired-property set to the registered handlers.
    ///
    /// Returns a report for each closed exchange. Desired properties
    /// without a handler are ignored.
    ///
    /// # Errors
    ///
    /// An acknowledgement cannot be built or delivered. The other handlers
    /// run to completion anyway.
    pub async fn dispatch(&self, desired: &DesiredPropertySet) -> Result<Vec<PropertyAckReport>> {
        debug!("Dispatching desired properties version {}", desired.version());

        let outcomes = join_all(
            self.handlers
                .iter()
                .map(|handler| handler.handle(&self.convention, &self.reporter, desired)),
        )
        .await;

        let mut reports = Vec::new();
        for outcome in outcomes {
            if let Some(report) = outcome? {
                reports.push(report);
            }
        }

        Ok(reports)
    }

    /// Parses a desired-property payload and dispatches it.
    ///
    /// # Errors
    ///
    /// The payload is not a desired-property document, or an
    /// acknowledgement cannot be built or delivered.
    pub async fn dispatch_payload(&self, payload: &str) -> Result<Vec<PropertyAckReport>> {
        let desired = DesiredPropertySet::from_payload(self.convention.serializer(), payload)?;
        self.dispatch(&desired).await
    }

    /// Reports a device-owned property.
    ///
    /// # Errors
    ///
    /// The property name is empty or reserved, the value cannot be
    /// serialized, or the patch cannot be delivered.
    pub async fn report_property<T>(
        &self,
        name: &str,
        value: &T,
        component: Option<&str>,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let patch = self.convention.build_initial_report(name, value, component)?;
        self.reporter.report(patch).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use tokio::sync::mpsc::Receiver;

    use twinhub::ack::AckCode;
    use twinhub::convention::PropertyConvention;
    use twinhub::desired::DesiredPropertySet;
    use twinhub::patch::PropertyPatch;

    use crate::error::ErrorKind;
    use crate::reporter::ChannelReporter;

    use super::{AckOutcome, PropertyDispatcher};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    struct HumidityRange {
        min: u8,
        max: u8,
    }

    fn thermostat(version: i64, range: serde_json::Value) -> DesiredPropertySet {
        DesiredPropertySet::from_value(json!({
            "thermostat1": {"__t": "c", "humidityRange": range},
            "$version": version,
        }))
        .unwrap()
    }

    fn ack(patch: &PropertyPatch, property: &str, component: Option<&str>) -> (AckCode, i64) {
        let ack = PropertyConvention::new()
            .try_get_writable_ack::<serde_json::Value>(patch, property, component)
            .unwrap()
            .unwrap();
        (ack.ack_code(), ack.ack_version())
    }

    fn drain(receiver: &mut Receiver<PropertyPatch>) -> Vec<PropertyPatch> {
        let mut patches = Vec::new();
        while let Ok(patch) = receiver.try_recv() {
            patches.push(patch);
        }
        patches
    }

    #[tokio::test]
    async fn thermostat_scenario() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let (reporter, mut receiver) = ChannelReporter::new(8);
        let dispatcher = PropertyDispatcher::new(reporter)
            .property(
                "humidityRange",
                Some("thermostat1"),
                |range: HumidityRange| async move {
                    AckOutcome::completed(range).description("Humidity range applied")
                },
            )
            .unwrap();

        let reports = dispatcher
            .dispatch(&thermostat(7, json!({"min": 30, "max": 60})))
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].property(), "humidityRange");
        assert_eq!(reports[0].component(), Some("thermostat1"));
        assert_eq!(reports[0].code(), AckCode::Completed);
        assert_eq!(reports[0].version(), 7);

        let patches = drain(&mut receiver);
        assert_eq!(patches.len(), 2);
        assert_eq!(
            ack(&patches[0], "humidityRange", Some("thermostat1")),
            (AckCode::InProgress, 7)
        );
        assert_eq!(
            patches[1].clone().into_value(),
            json!({
                "thermostat1": {
                    "__t": "c",
                    "humidityRange": {
                        "value": {"min": 30, "max": 60},
                        "ac": 200,
                        "av": 7,
                        "ad": "Humidity range applied",
                    },
                },
            })
        );
    }

    #[tokio::test]
    async fn pending_is_delivered_before_the_action() {
        let (reporter, receiver) = ChannelReporter::new(8);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let observed = Arc::clone(&receiver);

        let dispatcher = PropertyDispatcher::new(reporter)
            .property("targetTemperature", None, move |target: f64| {
                let observed = Arc::clone(&observed);
                async move {
                    // The pending acknowledgement is already queued.
                    let pending = observed.lock().await.try_recv().unwrap();
                    assert_eq!(
                        ack(&pending, "targetTemperature", None),
                        (AckCode::InProgress, 3)
                    );
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    AckOutcome::completed(target)
                }
            })
            .unwrap();

        let desired =
            DesiredPropertySet::from_value(json!({"targetTemperature": 21.5, "$version": 3}))
                .unwrap();
        dispatcher.dispatch(&desired).await.unwrap();

        let terminal = drain(&mut *receiver.lock().await);
        assert_eq!(terminal.len(), 1);
        assert_eq!(
            ack(&terminal[0], "targetTemperature", None),
            (AckCode::Completed, 3)
        );
    }

    #[tokio::test]
    async fn malformed_value_is_rejected() {
        let (reporter, mut receiver) = ChannelReporter::new(8);
        let dispatcher = PropertyDispatcher::new(reporter)
            .property(
                "humidityRange",
                Some("thermostat1"),
                |range: HumidityRange| async move { AckOutcome::new(AckCode::NotFound, range) },
            )
            .unwrap();

        let reports = dispatcher
            .dispatch(&thermostat(9, json!("humid")))
            .await
            .unwrap();
        assert_eq!(reports[0].code(), AckCode::BadRequest);
        assert!(reports[0].description().unwrap().starts_with("Invalid value"));

        // Neither a pending acknowledgement nor the handler outcome.
        let patches = drain(&mut receiver);
        assert_eq!(patches.len(), 1);

        let entry = &patches[0].clone().into_value()["thermostat1"]["humidityRange"];
        assert_eq!(entry["value"], json!("humid"));
        assert_eq!(entry["ac"], json!(400));
        assert_eq!(entry["av"], json!(9));
    }

    #[tokio::test]
    async fn versions_and_failures() {
        let (reporter, mut receiver) = ChannelReporter::new(8);
        let dispatcher = PropertyDispatcher::new(reporter)
            .property("fanSpeed", None, |speed: u8| async move {
                if speed > 5 {
                    AckOutcome::new(AckCode::BadRequest, speed).description("Speed out of range")
                } else {
                    AckOutcome::completed(speed)
                }
            })
            .unwrap();

        let desired = |speed, version| {
            DesiredPropertySet::from_value(json!({"fanSpeed": speed, "$version": version}))
                .unwrap()
        };

        let reports = dispatcher.dispatch(&desired(9, 4)).await.unwrap();
        assert_eq!(reports[0].code(), AckCode::BadRequest);
        assert_eq!(reports[0].description(), Some("Speed out of range"));

        // The same version is not answered twice.
        assert!(dispatcher.dispatch(&desired(2, 4)).await.unwrap().is_empty());

        let reports = dispatcher.dispatch(&desired(2, 5)).await.unwrap();
        assert_eq!(reports[0].code(), AckCode::Completed);
        assert_eq!(reports[0].version(), 5);

        assert_eq!(drain(&mut receiver).len(), 4);
    }

    #[tokio::test]
    async fn non_terminal_outcome_is_closed() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let (reporter, mut receiver) = ChannelReporter::new(8);
        let dispatcher = PropertyDispatcher::new(reporter)
            .property("fanSpeed", None, |speed: u8| async move {
                AckOutcome::new(AckCode::InProgress, speed)
            })
            .unwrap();

        let desired =
            DesiredPropertySet::from_value(json!({"fanSpeed": 2, "$version": 4})).unwrap();
        let reports = dispatcher.dispatch(&desired).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].code(), AckCode::BadRequest);
        assert_eq!(reports[0].version(), 4);
        assert!(
            reports[0]
                .description()
                .unwrap()
                .contains("non-terminal code In Progress (202)")
        );

        let patches = drain(&mut receiver);
        assert_eq!(patches.len(), 2);
        assert_eq!(ack(&patches[0], "fanSpeed", None), (AckCode::InProgress, 4));
        assert_eq!(ack(&patches[1], "fanSpeed", None), (AckCode::BadRequest, 4));

        // The exchange is closed: the same version is not answered again.
        assert!(dispatcher.dispatch(&desired).await.unwrap().is_empty());
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn properties_are_acknowledged_independently() {
        let (reporter, mut receiver) = ChannelReporter::new(8);
        let dispatcher = PropertyDispatcher::new(reporter)
            .property("brightness", None, |level: u8| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                AckOutcome::completed(level)
            })
            .unwrap()
            .property("color", Some("lamp"), |color: String| async move {
                AckOutcome::completed(color)
            })
            .unwrap()
            .property("unused", None, |value: bool| async move {
                AckOutcome::completed(value)
            })
            .unwrap();

        let desired = DesiredPropertySet::from_value(json!({
            "brightness": 80,
            "lamp": {"__t": "c", "color": "red"},
            "$version": 2,
        }))
        .unwrap();

        let reports = dispatcher.dispatch(&desired).await.unwrap();
        assert_eq!(reports.len(), 2);

        let patches = drain(&mut receiver);
        assert_eq!(patches.len(), 4);

        // Per property, the pending acknowledgement precedes the terminal one.
        for (property, component) in [("brightness", None), ("color", Some("lamp"))] {
            let codes = patches
                .iter()
                .filter(|patch| patch.property(property, component).is_some())
                .map(|patch| ack(patch, property, component))
                .collect::<Vec<_>>();
            assert_eq!(codes, [(AckCode::InProgress, 2), (AckCode::Completed, 2)]);
        }
    }

    #[tokio::test]
    async fn duplicate_handler() {
        let (reporter, _receiver) = ChannelReporter::new(1);
        let error = PropertyDispatcher::new(reporter)
            .property("fanSpeed", Some(""), |speed: u8| async move {
                AckOutcome::completed(speed)
            })
            .unwrap()
            .property("fanSpeed", None, |speed: u8| async move {
                AckOutcome::completed(speed)
            })
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::DuplicateHandler);
    }

    #[tokio::test]
    async fn device_owned_property() {
        let (reporter, mut receiver) = ChannelReporter::new(2);
        let dispatcher = PropertyDispatcher::new(reporter);

        dispatcher
            .report_property("serialNumber", "SN-42", Some("deviceInformation"))
            .await
            .unwrap();
        dispatcher
            .dispatch_payload(r#"{"$version": 1}"#)
            .await
            .unwrap();

        assert_eq!(
            receiver.recv().await.unwrap().into_value(),
            json!({"deviceInformation": {"__t": "c", "serialNumber": "SN-42"}})
        );
        assert_eq!(
            dispatcher
                .report_property("", &1, None)
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::Convention
        );
    }
}
