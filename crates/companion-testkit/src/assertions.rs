//! Assertion macros for view-model state.

/// Assert that a dialog is presented for the given session id.
#[macro_export]
macro_rules! assert_presenting {
    ($app:expr, $session:expr) => {{
        let dialog = $app
            .presented_feedback()
            .expect("expected a presented feedback dialog");
        assert_eq!(
            dialog.candidate().session_id.as_str(),
            $session,
            "presented {:?}, expected {}",
            dialog,
            $session
        );
        dialog
    }};
}

/// Assert that no feedback dialog is presented.
#[macro_export]
macro_rules! assert_no_dialog {
    ($app:expr) => {
        assert!(
            $app.presented_feedback().is_none(),
            "unexpected dialog {:?}",
            $app.presented_feedback()
        )
    };
}
