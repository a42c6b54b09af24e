/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Feature-tree scenarios against an in-memory register file: symbolic
//! accesses become the expected register traffic, selectors shift
//! addresses, caches stay coherent.

mod common;

use common::{MemoryDevice, NullStream, TRIGGER_MODE_ACQUISITION_START_OFFSET, TRIGGER_MODE_REG, WIDTH_REG};

use lucida::{
    camera::{Camera, CameraInfo},
    genapi::DefaultGenApiCtxt,
    LucidaError, RangeCheckPolicy, RegisterCachePolicy,
};

fn open_camera() -> Camera<MemoryDevice, NullStream, DefaultGenApiCtxt> {
    let mut camera = Camera::new(
        MemoryDevice::new(),
        NullStream::default(),
        None,
        CameraInfo {
            vendor_name: "Lucida".into(),
            model_name: "Synth-GV01".into(),
            serial_number: "SN0001".into(),
        },
    );
    camera.open().unwrap();
    camera.load_context().unwrap();
    camera
}

#[test]
fn width_read_write_round_trip() {
    let mut camera = open_camera();
    let mut ctxt = camera.params_ctxt().unwrap();

    let width = ctxt.node("Width").unwrap().as_integer(&ctxt).unwrap();
    assert_eq!(width.value(&mut ctxt).unwrap(), 512);

    width.set_value(&mut ctxt, 1024).unwrap();
    assert_eq!(width.value(&mut ctxt).unwrap(), 1024);

    // The write went through to the backing register.
    assert_eq!(camera.ctrl.peek_u32(WIDTH_REG), 1024);
}

#[test]
fn out_of_range_write_is_rejected() {
    let mut camera = open_camera();
    let mut ctxt = camera.params_ctxt().unwrap();

    let width = ctxt.node("Width").unwrap().as_integer(&ctxt).unwrap();
    let res = width.set_value(&mut ctxt, 5000);
    assert!(matches!(
        res,
        Err(LucidaError::GenApi(
            lucida::genapi::GenApiError::OutOfRange(_)
        ))
    ));

    // Disabled range checking lets the attempt through.
    ctxt.set_range_check_policy(RangeCheckPolicy::Disable);
    width.set_value(&mut ctxt, 5000).unwrap();
    assert_eq!(camera.ctrl.peek_u32(WIDTH_REG), 5000);
}

#[test]
fn selector_shifts_the_register_address() {
    let mut camera = open_camera();

    // Distinct values behind the two selector positions.
    camera.ctrl.poke_u32(TRIGGER_MODE_REG, 7);
    camera
        .ctrl
        .poke_u32(TRIGGER_MODE_REG + TRIGGER_MODE_ACQUISITION_START_OFFSET, 9);

    let mut ctxt = camera.params_ctxt().unwrap();
    let selector = ctxt
        .node("TriggerSelector")
        .unwrap()
        .as_enumeration(&ctxt)
        .unwrap();
    let mode = ctxt.node("TriggerMode").unwrap().as_integer(&ctxt).unwrap();

    assert_eq!(mode.value(&mut ctxt).unwrap(), 7);

    selector
        .set_entry_by_name(&mut ctxt, "AcquisitionStart")
        .unwrap();
    assert_eq!(mode.value(&mut ctxt).unwrap(), 9);

    // A write lands at the shifted address.
    mode.set_value(&mut ctxt, 1).unwrap();
    assert_eq!(
        camera
            .ctrl
            .peek_u32(TRIGGER_MODE_REG + TRIGGER_MODE_ACQUISITION_START_OFFSET),
        1
    );
    assert_eq!(camera.ctrl.peek_u32(TRIGGER_MODE_REG), 7);
}

#[test]
fn selector_write_invalidates_cached_reads() {
    let mut camera = open_camera();
    camera.ctrl.poke_u32(TRIGGER_MODE_REG, 7);
    camera
        .ctrl
        .poke_u32(TRIGGER_MODE_REG + TRIGGER_MODE_ACQUISITION_START_OFFSET, 9);

    let mut ctxt = camera.params_ctxt().unwrap();
    let selector = ctxt
        .node("TriggerSelector")
        .unwrap()
        .as_enumeration(&ctxt)
        .unwrap();
    let mode = ctxt.node("TriggerMode").unwrap().as_integer(&ctxt).unwrap();

    // Prime the cache under selector position 0.
    assert_eq!(mode.value(&mut ctxt).unwrap(), 7);
    assert_eq!(mode.value(&mut ctxt).unwrap(), 7);

    // The selector write must not let the stale entry answer.
    selector.set_entry_by_value(&mut ctxt, 1).unwrap();
    assert_eq!(mode.value(&mut ctxt).unwrap(), 9);
}

#[test]
fn cached_and_uncached_reads_agree() {
    let mut camera = open_camera();
    let mut ctxt = camera.params_ctxt().unwrap();
    let width = ctxt.node("Width").unwrap().as_integer(&ctxt).unwrap();

    let cached = width.value(&mut ctxt).unwrap();

    ctxt.set_register_cache_policy(RegisterCachePolicy::Disable);
    let uncached = width.value(&mut ctxt).unwrap();
    assert_eq!(cached, uncached);

    ctxt.set_register_cache_policy(RegisterCachePolicy::Enable);
    width.set_value(&mut ctxt, 768).unwrap();
    assert_eq!(width.value(&mut ctxt).unwrap(), 768);
    ctxt.set_register_cache_policy(RegisterCachePolicy::Disable);
    assert_eq!(width.value(&mut ctxt).unwrap(), 768);
}

#[test]
fn feature_batch_and_payload_size() {
    let mut camera = open_camera();
    camera
        .set_features_from_string("Width=640 Height=480 AcquisitionFrameRate=10")
        .unwrap();

    // Mono8: one byte per pixel.
    assert_eq!(camera.payload_size().unwrap(), 640 * 480);
    assert!((camera.frame_rate().unwrap() - 10.0).abs() < f64::EPSILON);

    assert_eq!(camera.ctrl.peek_u32(WIDTH_REG), 640);
}

#[test]
fn region_is_clamped_to_declared_bounds() {
    let mut camera = open_camera();
    camera.set_region(0, 0, 10_000, 480).unwrap();

    let (_, _, width, height) = camera.region().unwrap();
    assert_eq!(width, 4096);
    assert_eq!(height, 480);
}

#[test]
fn commands_write_their_command_value() {
    let mut camera = open_camera();
    let queue = camera.start_streaming(4).unwrap();
    assert_eq!(camera.ctrl.peek_u32(0x400), 1);

    camera.stop_streaming().unwrap();
    assert_eq!(camera.ctrl.peek_u32(0x404), 1);
    drop(queue);
}

#[test]
fn enumeration_values_are_listed() {
    let mut camera = open_camera();

    let values = camera.enumeration_values("TriggerSelector").unwrap();
    assert_eq!(values, vec![0, 1]);

    let names = camera
        .enumeration_values_as_strings("TriggerSelector")
        .unwrap();
    assert_eq!(names, vec!["FrameStart", "AcquisitionStart"]);
}
