//! Behavioural tests for the frame buffering session.
//!
//! These drive the session on a `LocalPool` with a scripted decoder whose
//! decodes only finish when a test releases them, so the ordering of
//! requests, batches and completions is fully deterministic.

mod session_tests;
