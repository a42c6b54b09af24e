/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The main entry type: a camera aggregates a control handle, a payload
//! stream and a `GenApi` context, and layers convenience accessors for
//! the common acquisition controls on top.

use auto_impl::auto_impl;
use tracing::info;

use super::{
    genapi::{DefaultGenApiCtxt, FromXml, GenApiCtxt, ParamsCtxt},
    payload::{buffer_channel, BufferQueue},
    AccessCheckPolicy, ControlResult, LucidaError, LucidaResult, RangeCheckPolicy,
    RegisterCachePolicy, StreamError, StreamResult,
};

/// Fallback spellings of the frame-rate feature across vendors.
const FRAME_RATE_NAMES: &[&str] = &[
    "AcquisitionFrameRate",
    "AcquisitionFrameRateAbs",
    "FPS",
];

/// Fallback spellings of the gain feature across vendors.
const GAIN_NAMES: &[&str] = &["Gain", "GainRaw", "GainAbs"];

/// Provides easy-to-use access to a `GenICam` compatible camera.
#[derive(Debug, Clone)]
pub struct Camera<Ctrl, Strm, Ctxt = DefaultGenApiCtxt> {
    /// Device control handle of the camera.
    pub ctrl: Ctrl,
    /// Payload stream handle of the camera.
    pub strm: Strm,
    /// `GenApi` context of the camera.
    pub ctxt: Option<Ctxt>,
    info: CameraInfo,
}

macro_rules! expect_node {
    ($ctxt:expr, $name:expr, $as_type:ident) => {{
        let name = $name;
        $ctxt
            .node(name)
            .ok_or_else(|| LucidaError::FeatureNotFound(name.to_string().into()))?
            .$as_type($ctxt)
            .ok_or_else(|| {
                LucidaError::WrongFeature(
                    format!("`{}` has an unexpected interface", name).into(),
                )
            })?
    }};
}

impl<Ctrl, Strm, Ctxt> Camera<Ctrl, Strm, Ctxt> {
    /// Opens the camera: claims control and prepares the stream handle.
    #[tracing::instrument(skip(self),
                          level = "info",
                          fields(camera = ?self.info()))]
    pub fn open(&mut self) -> LucidaResult<()>
    where
        Ctrl: DeviceControl,
        Strm: PayloadStream,
    {
        info!("try opening the device");
        self.ctrl.open()?;
        self.strm.open()?;
        info!("opened the device successfully");
        Ok(())
    }

    /// Closes the camera. Call this when an opened camera is no longer
    /// needed; it is NOT called automatically on drop.
    #[tracing::instrument(skip(self),
                          level = "info",
                          fields(camera = ?self.info()))]
    pub fn close(&mut self) -> LucidaResult<()>
    where
        Ctrl: DeviceControl,
        Strm: PayloadStream,
        Ctxt: GenApiCtxt,
    {
        self.stop_streaming().ok();
        self.ctrl.close()?;
        self.strm.close()?;
        if let Some(ctxt) = &mut self.ctxt {
            ctxt.clear_cache();
        }
        Ok(())
    }

    /// Loads the `GenApi` XML from the device, builds the context and
    /// returns the raw XML string. The string can be dropped once the
    /// context is built.
    pub fn load_context(&mut self) -> LucidaResult<String>
    where
        Ctrl: DeviceControl,
        Strm: PayloadStream,
        Ctxt: GenApiCtxt + FromXml,
    {
        let xml = self.ctrl.genapi()?;
        self.ctxt = Some(Ctxt::from_xml(&xml)?);
        Ok(xml)
    }

    /// Starts acquisition and returns the caller side of the buffer
    /// queues, with capacity `cap` on each side.
    ///
    /// The caller keeps the stream supplied by pushing empty buffers of
    /// [`Self::payload_size`] bytes.
    ///
    /// NOTE: `AcquisitionMode` is left untouched; set it to `Continuous`
    /// unless a different mode is wanted.
    #[tracing::instrument(skip(self),
                          level = "info",
                          fields(camera = ?self.info()))]
    pub fn start_streaming(&mut self, cap: usize) -> LucidaResult<BufferQueue>
    where
        Ctrl: DeviceControl,
        Strm: PayloadStream,
        Ctxt: GenApiCtxt,
    {
        info!("try starting streaming");
        if self.strm.is_loop_running() {
            return Err(StreamError::InStreaming.into());
        }

        self.ctrl.enable_streaming()?;
        let mut ctxt = self.params_ctxt()?;
        if let Some(lock) = ctxt.node("TLParamsLocked").and_then(|n| n.as_integer(&ctxt)) {
            lock.set_value(&mut ctxt, 1)?;
        }
        expect_node!(&ctxt, "AcquisitionStart", as_command).execute(&mut ctxt)?;

        let (supply, queue) = buffer_channel(cap);
        self.strm.start_streaming_loop(supply, &mut self.ctrl)?;

        info!("started streaming successfully");
        Ok(queue)
    }

    /// Stops acquisition. The queue handle returned by the previous
    /// [`Self::start_streaming`] call is invalidated.
    #[tracing::instrument(skip(self),
                          level = "info",
                          fields(camera = ?self.info()))]
    pub fn stop_streaming(&mut self) -> LucidaResult<()>
    where
        Ctrl: DeviceControl,
        Strm: PayloadStream,
        Ctxt: GenApiCtxt,
    {
        if !self.strm.is_loop_running() {
            return Ok(());
        }

        self.strm.stop_streaming_loop()?;

        let mut ctxt = self.params_ctxt()?;
        expect_node!(&ctxt, "AcquisitionStop", as_command).execute(&mut ctxt)?;
        if let Some(lock) = ctxt.node("TLParamsLocked").and_then(|n| n.as_integer(&ctxt)) {
            lock.set_value(&mut ctxt, 0)?;
        }
        self.ctrl.disable_streaming()?;

        Ok(())
    }

    /// Returns the parameter context. Load the `GenApi` context first
    /// with [`Self::load_context`].
    pub fn params_ctxt(&mut self) -> LucidaResult<ParamsCtxt<&mut Ctrl, &mut Ctxt>>
    where
        Ctrl: DeviceControl,
        Ctxt: GenApiCtxt,
    {
        if let Some(ctxt) = self.ctxt.as_mut() {
            Ok(ParamsCtxt {
                ctrl: &mut self.ctrl,
                ctxt,
            })
        } else {
            Err(LucidaError::GenApiContextMissing)
        }
    }

    /// Basic identification of the camera, available without opening it.
    pub fn info(&self) -> &CameraInfo {
        &self.info
    }

    pub fn new(ctrl: Ctrl, strm: Strm, ctxt: Option<Ctxt>, info: CameraInfo) -> Self {
        Self {
            ctrl,
            strm,
            ctxt,
            info,
        }
    }

    /// Converts internal types. This method works like
    /// `std::convert::From`, just a hack to avoid `E0119`.
    pub fn convert_from<Ctrl2, Strm2, Ctxt2>(from: Camera<Ctrl2, Strm2, Ctxt2>) -> Self
    where
        Ctrl: From<Ctrl2>,
        Strm: From<Strm2>,
        Ctxt: From<Ctxt2>,
    {
        Camera::new(
            from.ctrl.into(),
            from.strm.into(),
            from.ctxt.map(Into::into),
            from.info,
        )
    }

    /// Converts internal types. This method works like
    /// `std::convert::Into`, just a hack to avoid `E0119`.
    pub fn convert_into<Ctrl2, Strm2, Ctxt2>(self) -> Camera<Ctrl2, Strm2, Ctxt2>
    where
        Ctrl: Into<Ctrl2>,
        Strm: Into<Strm2>,
        Ctxt: Into<Ctxt2>,
    {
        Camera::new(
            self.ctrl.into(),
            self.strm.into(),
            self.ctxt.map(Into::into),
            self.info,
        )
    }

    /// Sets a prebuilt context instead of loading one from the device.
    pub fn set_context<Ctxt2>(self, ctxt: Ctxt2) -> Camera<Ctrl, Strm, Ctxt2> {
        Camera {
            ctrl: self.ctrl,
            strm: self.strm,
            ctxt: Some(ctxt),
            info: self.info,
        }
    }
}

/// Convenience accessors for the common acquisition controls. All of
/// them tolerate minor vendor naming variation and clamp written values
/// to the declared bounds.
impl<Ctrl, Strm, Ctxt> Camera<Ctrl, Strm, Ctxt>
where
    Ctrl: DeviceControl,
    Strm: PayloadStream,
    Ctxt: GenApiCtxt,
{
    /// Writes the region of interest: `OffsetX`, `OffsetY`, `Width`,
    /// `Height`.
    pub fn set_region(&mut self, x: i64, y: i64, width: i64, height: i64) -> LucidaResult<()> {
        let mut ctxt = self.params_ctxt()?;
        for (name, value) in &[
            ("Width", width),
            ("Height", height),
            ("OffsetX", x),
            ("OffsetY", y),
        ] {
            let node = expect_node!(&ctxt, *name, as_integer);
            let clamped = (*value)
                .max(node.min(&mut ctxt)?)
                .min(node.max(&mut ctxt)?);
            node.set_value(&mut ctxt, clamped)?;
        }
        Ok(())
    }

    /// Reads `(x, y, width, height)`.
    pub fn region(&mut self) -> LucidaResult<(i64, i64, i64, i64)> {
        let mut ctxt = self.params_ctxt()?;
        let x = expect_node!(&ctxt, "OffsetX", as_integer).value(&mut ctxt)?;
        let y = expect_node!(&ctxt, "OffsetY", as_integer).value(&mut ctxt)?;
        let width = expect_node!(&ctxt, "Width", as_integer).value(&mut ctxt)?;
        let height = expect_node!(&ctxt, "Height", as_integer).value(&mut ctxt)?;
        Ok((x, y, width, height))
    }

    /// Enables fixed-rate acquisition at `hz` frames per second.
    pub fn set_frame_rate(&mut self, hz: f64) -> LucidaResult<()> {
        let mut ctxt = self.params_ctxt()?;
        if let Some(enable) = ctxt
            .node("AcquisitionFrameRateEnable")
            .and_then(|n| n.as_boolean(&ctxt))
        {
            enable.set_value(&mut ctxt, true)?;
        }

        let node = Self::float_by_fallback(&ctxt, FRAME_RATE_NAMES)
            .ok_or(LucidaError::FeatureNotFound("AcquisitionFrameRate".into()))?;
        let clamped = hz.max(node.min(&mut ctxt)?).min(node.max(&mut ctxt)?);
        node.set_value(&mut ctxt, clamped)?;
        Ok(())
    }

    pub fn frame_rate(&mut self) -> LucidaResult<f64> {
        let mut ctxt = self.params_ctxt()?;
        let node = Self::float_by_fallback(&ctxt, FRAME_RATE_NAMES)
            .ok_or(LucidaError::FeatureNotFound("AcquisitionFrameRate".into()))?;
        node.value(&mut ctxt)
    }

    /// Writes the analog gain, in whatever unit the device declares.
    pub fn set_gain(&mut self, value: f64) -> LucidaResult<()> {
        let mut ctxt = self.params_ctxt()?;
        if let Some(node) = Self::float_by_fallback(&ctxt, GAIN_NAMES) {
            let clamped = value.max(node.min(&mut ctxt)?).min(node.max(&mut ctxt)?);
            return node.set_value(&mut ctxt, clamped);
        }
        // Some vendors declare the gain as a raw integer.
        for name in GAIN_NAMES {
            if let Some(node) = ctxt.node(name).and_then(|n| n.as_integer(&ctxt)) {
                let clamped = (value as i64)
                    .max(node.min(&mut ctxt)?)
                    .min(node.max(&mut ctxt)?);
                return node.set_value(&mut ctxt, clamped);
            }
        }
        Err(LucidaError::FeatureNotFound("Gain".into()))
    }

    pub fn gain(&mut self) -> LucidaResult<f64> {
        let mut ctxt = self.params_ctxt()?;
        if let Some(node) = Self::float_by_fallback(&ctxt, GAIN_NAMES) {
            return node.value(&mut ctxt);
        }
        for name in GAIN_NAMES {
            if let Some(node) = ctxt.node(name).and_then(|n| n.as_integer(&ctxt)) {
                return Ok(node.value(&mut ctxt)? as f64);
            }
        }
        Err(LucidaError::FeatureNotFound("Gain".into()))
    }

    /// Arms hardware triggering: `TriggerMode = On`,
    /// `TriggerSource = source`.
    pub fn set_trigger(&mut self, source: &str) -> LucidaResult<()> {
        let mut ctxt = self.params_ctxt()?;
        if let Some(selector) = ctxt
            .node("TriggerSelector")
            .and_then(|n| n.as_enumeration(&ctxt))
        {
            // FrameStart is the SFNC default trigger.
            selector.set_entry_by_name(&mut ctxt, "FrameStart").ok();
        }
        expect_node!(&ctxt, "TriggerMode", as_enumeration)
            .set_entry_by_name(&mut ctxt, "On")?;
        expect_node!(&ctxt, "TriggerSource", as_enumeration)
            .set_entry_by_name(&mut ctxt, source)?;
        Ok(())
    }

    /// Fires one software trigger.
    pub fn software_trigger(&mut self) -> LucidaResult<()> {
        let mut ctxt = self.params_ctxt()?;
        expect_node!(&ctxt, "TriggerSoftware", as_command).execute(&mut ctxt)
    }

    /// Bytes one frame occupies with the current settings.
    pub fn payload_size(&mut self) -> LucidaResult<usize> {
        let mut ctxt = self.params_ctxt()?;
        let node = expect_node!(&ctxt, "PayloadSize", as_integer);
        Ok(node.value(&mut ctxt)? as usize)
    }

    /// Applies a `"Name=Value Name=Value ..."` batch. A bare name
    /// executes the command of that name.
    pub fn set_features_from_string(&mut self, features: &str) -> LucidaResult<()> {
        for token in features.split_whitespace() {
            let mut ctxt = self.params_ctxt()?;
            match token.split_once('=') {
                Some((name, value)) => {
                    let node = ctxt
                        .node(name)
                        .ok_or_else(|| LucidaError::FeatureNotFound(name.to_string().into()))?;
                    if let Some(enumeration) = node.as_enumeration(&ctxt) {
                        enumeration.set_entry_by_name(&mut ctxt, value)?;
                    } else if let Some(boolean) = node.as_boolean(&ctxt) {
                        let parsed = matches!(value, "true" | "True" | "1" | "Yes");
                        boolean.set_value(&mut ctxt, parsed)?;
                    } else if let Some(integer) = node.as_integer(&ctxt) {
                        let parsed: i64 = value.parse().map_err(|_| {
                            LucidaError::WrongFeature(
                                format!("`{}` expects an integer value", name).into(),
                            )
                        })?;
                        integer.set_value(&mut ctxt, parsed)?;
                    } else if let Some(float) = node.as_float(&ctxt) {
                        let parsed: f64 = value.parse().map_err(|_| {
                            LucidaError::WrongFeature(
                                format!("`{}` expects a float value", name).into(),
                            )
                        })?;
                        float.set_value(&mut ctxt, parsed)?;
                    } else if let Some(string) = node.as_string(&ctxt) {
                        string.set_value(&mut ctxt, value.to_string())?;
                    } else {
                        return Err(LucidaError::WrongFeature(
                            format!("`{}` accepts no value", name).into(),
                        ));
                    }
                }
                None => {
                    let command = expect_node!(&ctxt, token, as_command);
                    command.execute(&mut ctxt)?;
                }
            }
        }
        Ok(())
    }

    /// Integer values of all entries of the named enumeration.
    pub fn enumeration_values(&mut self, name: &str) -> LucidaResult<Vec<i64>> {
        let ctxt = self.params_ctxt()?;
        let node = expect_node!(&ctxt, name, as_enumeration);
        Ok(node
            .entries(&ctxt)
            .into_iter()
            .filter_map(|entry| entry.value(&ctxt))
            .collect())
    }

    /// Symbolic names of all entries of the named enumeration.
    pub fn enumeration_values_as_strings(&mut self, name: &str) -> LucidaResult<Vec<String>> {
        let ctxt = self.params_ctxt()?;
        let node = expect_node!(&ctxt, name, as_enumeration);
        Ok(node
            .entries(&ctxt)
            .into_iter()
            .map(|entry| entry.name(&ctxt).to_string())
            .collect())
    }

    /// Display names of all entries of the named enumeration.
    pub fn enumeration_values_as_display_names(
        &mut self,
        name: &str,
    ) -> LucidaResult<Vec<String>> {
        let ctxt = self.params_ctxt()?;
        let node = expect_node!(&ctxt, name, as_enumeration);
        Ok(node
            .entries(&ctxt)
            .into_iter()
            .filter_map(|entry| entry.display_name(&ctxt).map(ToString::to_string))
            .collect())
    }

    /// `true` when the named feature exists and its `pIsImplemented`
    /// gate (if any) reads non-zero.
    pub fn is_feature_implemented(&mut self, name: &str) -> LucidaResult<bool> {
        let mut ctxt = self.params_ctxt()?;
        match ctxt.node(name) {
            Some(node) => node.is_implemented(&mut ctxt),
            None => Ok(false),
        }
    }

    /// `true` when the named feature exists and its `pIsAvailable` gate
    /// (if any) reads non-zero.
    pub fn is_feature_available(&mut self, name: &str) -> LucidaResult<bool> {
        let mut ctxt = self.params_ctxt()?;
        match ctxt.node(name) {
            Some(node) => node.is_available(&mut ctxt),
            None => Ok(false),
        }
    }

    pub fn set_register_cache_policy(&mut self, policy: RegisterCachePolicy) -> LucidaResult<()> {
        self.params_ctxt()?.set_register_cache_policy(policy);
        Ok(())
    }

    pub fn set_range_check_policy(&mut self, policy: RangeCheckPolicy) -> LucidaResult<()> {
        self.params_ctxt()?.set_range_check_policy(policy);
        Ok(())
    }

    pub fn set_access_check_policy(&mut self, policy: AccessCheckPolicy) -> LucidaResult<()> {
        self.params_ctxt()?.set_access_check_policy(policy);
        Ok(())
    }

    fn float_by_fallback<'a, 'b>(
        ctxt: &ParamsCtxt<&'a mut Ctrl, &'b mut Ctxt>,
        names: &[&str],
    ) -> Option<super::genapi::FloatNode> {
        names
            .iter()
            .find_map(|name| ctxt.node(name).and_then(|n| n.as_float(ctxt)))
    }
}

/// Information of the camera.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct CameraInfo {
    /// Vendor name of the camera.
    pub vendor_name: String,
    /// Model name of the camera.
    pub model_name: String,
    /// Serial number of the camera.
    pub serial_number: String,
}

/// Operations on the device's memory through its control channel.
#[auto_impl(&mut, Box)]
pub trait DeviceControl {
    /// Opens the handle, claiming control of the device.
    fn open(&mut self) -> ControlResult<()>;

    /// Closes the handle, releasing control best effort.
    fn close(&mut self) -> ControlResult<()>;

    fn is_opened(&self) -> bool;

    /// Reads `buf.len()` bytes from the device's memory.
    fn read(&mut self, address: u64, buf: &mut [u8]) -> ControlResult<()>;

    /// Reads one aligned 32-bit register.
    fn read_reg(&mut self, address: u64) -> ControlResult<u32>;

    /// Writes data to the device's memory.
    fn write(&mut self, address: u64, data: &[u8]) -> ControlResult<()>;

    /// Writes one aligned 32-bit register.
    fn write_reg(&mut self, address: u64, data: u32) -> ControlResult<()>;

    /// Retrieves the device's `GenICam` XML.
    fn genapi(&mut self) -> ControlResult<String>;

    /// Configures the device-side stream channel.
    fn enable_streaming(&mut self) -> ControlResult<()>;

    /// Deconfigures the device-side stream channel.
    fn disable_streaming(&mut self) -> ControlResult<()>;
}

/// Payload streaming capability.
#[auto_impl(&mut, Box)]
pub trait PayloadStream {
    fn open(&mut self) -> StreamResult<()>;

    fn close(&mut self) -> StreamResult<()>;

    /// Starts the receive thread, feeding it from `supply`.
    fn start_streaming_loop(
        &mut self,
        supply: super::payload::BufferSupply,
        ctrl: &mut dyn DeviceControl,
    ) -> StreamResult<()>;

    /// Signals the receive thread and joins it; returns within one poll
    /// period of the loop.
    fn stop_streaming_loop(&mut self) -> StreamResult<()>;

    fn is_loop_running(&self) -> bool;
}
