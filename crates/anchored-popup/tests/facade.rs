//! Using the crate through its prelude, the way an embedding UI would.

use std::time::Duration;

use anchored_popup::prelude::*;
use anchored_popup::{DegradationAction, HeadlessHost, HostError, Vec2};

fn open_now(anchor: &AnchorHandle<HeadlessHost<()>>) -> Result<bool> {
    Ok(anchor.try_open_surface()?)
}

#[test]
fn prelude_covers_a_full_popup_cycle() {
    let rt = RuntimeBuilder::new()
        .screen(ScreenBounds::new(400.0, 800.0))
        .build(HeadlessHost::<DismissHandle>::new())
        .unwrap();

    let anchor = rt.attach_anchor(
        "toolbar",
        PopupConfig::new()
            .placement(Placement::ScreenRelative(UnitPoint::CENTER))
            .timing(Timing::ease_out(Duration::from_millis(300))),
        |dismiss| dismiss.clone(),
    );
    anchor.report_frame(Frame::new(175.0, 390.0, 50.0, 20.0));
    assert_eq!(anchor.tap(), StateWrite::Applied);

    let visuals = anchor.visuals().unwrap();
    visuals.content_measured(Size::new(200.0, 120.0));
    rt.run_until_idle();

    // anchor centred on a 400x800 screen: screen-centre placement adds no offset
    assert_eq!(visuals.transform().offset, Vec2::ZERO);
    assert_eq!(
        rt.registry().get("toolbar").unwrap().state,
        LifecycleState::Displayed
    );

    let dismiss = rt.host().content("toolbar").cloned().unwrap();
    dismiss.dismiss();
    rt.run_until_idle();
    assert_eq!(
        rt.registry().get("toolbar").unwrap().state,
        LifecycleState::Hidden
    );
}

#[test]
fn host_failure_maps_to_dropped_open() {
    let rt = RuntimeBuilder::new()
        .build(HeadlessHost::<()>::unavailable())
        .unwrap();
    let anchor = rt.attach_anchor("menu", PopupConfig::new(), |_| ());

    // nothing to open while hidden
    assert!(!open_now(&anchor).unwrap());

    rt.open("menu");
    let err = open_now(&anchor).unwrap_err();
    assert!(matches!(err, Error::Host(HostError::NoHostingContext)));
    assert_eq!(err.degradation(), DegradationAction::DropOpenRequest);
    assert!(err.is_recoverable());

    rt.host_mut().set_available(true);
    assert!(open_now(&anchor).unwrap());
    assert!(rt.host().is_open("menu"));
}

#[cfg(feature = "settings-file")]
#[test]
fn builder_loads_toml_settings() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[screen]\nwidth = 320.0\nheight = 568.0").unwrap();
    let rt = RuntimeBuilder::from_toml_file(file.path())
        .unwrap()
        .build(HeadlessHost::<()>::new())
        .unwrap();
    assert_eq!(rt.screen(), ScreenBounds::new(320.0, 568.0));
}

#[cfg(feature = "settings-file")]
#[test]
fn builder_surfaces_parse_errors() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "not toml at all [").unwrap();
    let err = RuntimeBuilder::from_toml_file(file.path()).unwrap_err();
    assert_eq!(err.error_type(), "settings");
    assert!(err.is_recoverable());
}
