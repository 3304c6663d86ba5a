//! Integration tests for `setTimeout`

mod common;

use common::{TIMEOUT, engine, event_channel, for_each_backend};

#[test]
fn test_set_timeout_fires_with_arguments() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        let fired = event_channel(&engine, "fired");
        engine
            .evaluate("setTimeout(function (a, b) { _triggerEvent('fired', a, b); }, 20, 'x', 1)")
            .unwrap();
        assert_eq!(fired.recv_timeout(TIMEOUT).unwrap(), vec!["x", "1"]);
    });
}

#[test]
fn test_set_timeout_order() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        let fired = event_channel(&engine, "fired");
        engine
            .evaluate(
                "setTimeout(function () { _triggerEvent('fired', 'late'); }, 200);
                 setTimeout(function () { _triggerEvent('fired', 'early'); });",
            )
            .unwrap();
        assert_eq!(fired.recv_timeout(TIMEOUT).unwrap(), vec!["early"]);
        assert_eq!(fired.recv_timeout(TIMEOUT).unwrap(), vec!["late"]);
    });
}

#[test]
fn test_set_timeout_requires_function() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        let caught = engine
            .evaluate("try { setTimeout('code', 1); false } catch (e) { e instanceof TypeError }")
            .unwrap();
        assert!(caught.as_bool().unwrap());
    });
}
