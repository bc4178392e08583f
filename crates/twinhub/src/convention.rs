use alloc::string::String;

use log::debug;

use serde::Serialize;
use serde::de::DeserializeOwned;

use serde_json::Value;

use crate::ack::{AckCode, AckConvention, WritablePropertyAck};
use crate::error::Result;
use crate::patch::{PropertyPatch, check_property_name, component_name};
use crate::serializer::{CompactJson, PayloadSerializer};

/// The property convention engine.
///
/// Translates between property patches and typed application values and
/// builds correctly-shaped reported-property patches. The serializer and the
/// acknowledgement convention are chosen once, when the engine is created.
#[derive(Debug, Clone, Default)]
pub struct PropertyConvention<S = CompactJson>
where
    S: PayloadSerializer,
{
    serializer: S,
    ack_convention: AckConvention,
}

impl PropertyConvention<CompactJson> {
    /// Creates a [`PropertyConvention`] with the [`CompactJson`] serializer
    /// and the [`AckConvention::TwinCollection`] convention.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::with_serializer(CompactJson)
    }
}

impl<S> PropertyConvention<S>
where
    S: PayloadSerializer,
{
    /// Creates a [`PropertyConvention`] with the given serializer.
    #[must_use]
    pub const fn with_serializer(serializer: S) -> Self {
        Self {
            serializer,
            ack_convention: AckConvention::TwinCollection,
        }
    }

    /// Sets the acknowledgement convention.
    #[must_use]
    pub const fn ack_convention(mut self, ack_convention: AckConvention) -> Self {
        self.ack_convention = ack_convention;
        self
    }

    /// Returns the payload serializer.
    #[must_use]
    pub const fn serializer(&self) -> &S {
        &self.serializer
    }

    /// Returns the acknowledgement convention in use.
    #[must_use]
    pub const fn convention(&self) -> AckConvention {
        self.ack_convention
    }

    /// Retrieves a property value from a patch.
    ///
    /// If the component is [`None`] or empty, the property is searched at
    /// the top level of the patch, otherwise inside the component mapping.
    ///
    /// A property which is not present returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// The property exists but its value cannot be converted into `T`.
    pub fn try_get_property<T: DeserializeOwned>(
        &self,
        patch: &PropertyPatch,
        property_name: &str,
        component: Option<&str>,
    ) -> Result<Option<T>> {
        let Some(value) = patch.property(property_name, component) else {
            debug!(
                "Property `{property_name}` not found in component `{}`",
                component_name(component).unwrap_or("root")
            );
            return Ok(None);
        };

        self.serializer.from_value(value).map(Some)
    }

    /// Retrieves a writable-property acknowledgement from a patch.
    ///
    /// A property which is not present returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// The property exists but it is not an acknowledgement in the
    /// configured convention, or its value cannot be converted into `T`.
    pub fn try_get_writable_ack<T: DeserializeOwned>(
        &self,
        patch: &PropertyPatch,
        property_name: &str,
        component: Option<&str>,
    ) -> Result<Option<WritablePropertyAck<T>>> {
        let Some(envelope) = patch.property(property_name, component) else {
            return Ok(None);
        };

        let ack = self.ack_convention.decode(envelope)?;
        let value = self.serializer.from_value(ack.value())?;

        Ok(Some(ack.map_value(value)))
    }

    /// Builds the reported-property patch acknowledging a writable property.
    ///
    /// When a component is given, the acknowledgement is nested inside the
    /// component mapping, which always carries the component marker.
    ///
    /// # Errors
    ///
    /// The property name is empty or reserved, or the value cannot be
    /// serialized.
    pub fn build_ack<T: Serialize + ?Sized>(
        &self,
        property_name: &str,
        value: &T,
        ack_code: AckCode,
        ack_version: i64,
        ack_description: Option<&str>,
        component: Option<&str>,
    ) -> Result<PropertyPatch> {
        check_property_name(property_name)?;

        let value = self.serializer.to_value(value)?;
        let mut ack = WritablePropertyAck::new(value, ack_code, ack_version);
        if let Some(description) = ack_description {
            ack = ack.description(description);
        }

        Ok(Self::single_entry(
            property_name,
            self.ack_convention.encode(&ack),
            component,
        ))
    }

    /// Builds the patch of a [`WritablePropertyAck`].
    ///
    /// # Errors
    ///
    /// The property name is empty or reserved, or the value cannot be
    /// serialized.
    #[inline]
    pub fn build_ack_from<T: Serialize>(
        &self,
        property_name: &str,
        ack: &WritablePropertyAck<T>,
        component: Option<&str>,
    ) -> Result<PropertyPatch> {
        self.build_ack(
            property_name,
            ack.value(),
            ack.ack_code(),
            ack.ack_version(),
            ack.ack_description(),
            component,
        )
    }

    /// Builds the reported-property patch of a device-owned property.
    ///
    /// The value is reported as is, without an acknowledgement envelope.
    ///
    /// # Errors
    ///
    /// The property name is empty or reserved, or the value cannot be
    /// serialized.
    pub fn build_initial_report<T: Serialize + ?Sized>(
        &self,
        property_name: &str,
        value: &T,
        component: Option<&str>,
    ) -> Result<PropertyPatch> {
        check_property_name(property_name)?;

        Ok(Self::single_entry(
            property_name,
            self.serializer.to_value(value)?,
            component,
        ))
    }

    /// Serializes a patch into a payload.
    ///
    /// # Errors
    ///
    /// The patch cannot be serialized.
    #[inline]
    pub fn serialize_patch(&self, patch: &PropertyPatch) -> Result<String> {
        self.serializer.serialize(patch)
    }

    fn single_entry(property_name: &str, value: Value, component: Option<&str>) -> PropertyPatch {
        let mut patch = PropertyPatch::new();
        match component_name(component) {
            Some(component) => patch.insert_component_property(component, property_name, value),
            None => patch.insert_property(property_name, value),
        }
        patch
    }
}
